//! Generational slot storage for view objects.

use super::view::ViewId;

struct Slot<V> {
    generation: u32,
    value: Option<V>,
    /// Reserved slots are live but their value is temporarily checked out.
    occupied: bool,
}

/// Slot arena handing out generational [`ViewId`]s.
///
/// A value can be checked out with [`take`](Self::take) while it is being
/// updated and put back with [`restore`](Self::restore); its handle stays
/// valid in between.
pub(crate) struct Arena<V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    len: usize,
}

impl<V> Arena<V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: V) -> ViewId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.occupied = true;
            return ViewId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).expect("view arena exceeded u32::MAX slots");
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
            occupied: true,
        });
        ViewId {
            index,
            generation: 0,
        }
    }

    fn slot(&self, id: ViewId) -> Option<&Slot<V>> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.occupied && s.generation == id.generation)
    }

    fn slot_mut(&mut self, id: ViewId) -> Option<&mut Slot<V>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.occupied && s.generation == id.generation)
    }

    pub fn get(&self, id: ViewId) -> Option<&V> {
        self.slot(id).and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut V> {
        self.slot_mut(id).and_then(|s| s.value.as_mut())
    }

    /// Checks a value out for updating. Returns `None` if the handle is stale
    /// or the value is already checked out.
    pub fn take(&mut self, id: ViewId) -> Option<V> {
        self.slot_mut(id).and_then(|s| s.value.take())
    }

    pub fn restore(&mut self, id: ViewId, value: V) {
        let slot = self
            .slot_mut(id)
            .expect("restoring a view object into a released slot");
        debug_assert!(slot.value.is_none(), "slot was not checked out");
        slot.value = Some(value);
    }

    /// Releases the slot, returning its value if it was not checked out.
    pub fn remove(&mut self, id: ViewId) -> Option<V> {
        let slot = self.slot_mut(id)?;
        let value = slot.value.take();
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        value
    }

    pub fn len(&self) -> usize {
        self.len
    }
}
