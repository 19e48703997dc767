//! Model resources shared by actor views.
//!
//! [`ModelCache`] is owned by the editing session and lives as long as it
//! does. It hands out reference-counted [`ModelResource`]s and keeps only
//! weak entries, so a model is unloaded as soon as the last view holding it
//! is dropped. Each load schedules a GPU upload on the session's
//! [`RenderTaskQueue`]; the resource picks the result up on its own once the
//! queue has been drained.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use levelforge_core::task_queue::{RenderTaskQueue, TaskError, TaskPromise};

/// GPU-side mesh produced by an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    pub handle: u64,
    pub vertex_count: u32,
}

enum UploadState {
    Pending(TaskPromise<GpuMesh>),
    Ready(GpuMesh),
    Failed(TaskError),
}

/// A loaded model.
pub struct ModelResource {
    name: String,
    vertex_count: u32,
    upload: RefCell<UploadState>,
}

impl ModelResource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// The uploaded mesh, once the upload task has run.
    pub fn gpu_mesh(&self) -> Option<GpuMesh> {
        let mut upload = self.upload.borrow_mut();
        if let UploadState::Pending(promise) = &*upload {
            match promise.try_take() {
                Some(Ok(mesh)) => *upload = UploadState::Ready(mesh),
                Some(Err(err)) => {
                    log::warn!("Upload of model '{}' failed: {err}", self.name);
                    *upload = UploadState::Failed(err);
                }
                None => return None,
            }
        }
        match &*upload {
            UploadState::Ready(mesh) => Some(*mesh),
            _ => None,
        }
    }

    /// Returns `true` if the upload task failed.
    pub fn upload_failed(&self) -> bool {
        self.gpu_mesh();
        matches!(&*self.upload.borrow(), UploadState::Failed(_))
    }
}

impl fmt::Debug for ModelResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.upload.borrow() {
            UploadState::Pending(_) => "pending",
            UploadState::Ready(_) => "ready",
            UploadState::Failed(_) => "failed",
        };
        f.debug_struct("ModelResource")
            .field("name", &self.name)
            .field("vertex_count", &self.vertex_count)
            .field("upload", &state)
            .finish()
    }
}

/// Session-lifetime cache of model resources keyed by model name.
pub struct ModelCache {
    entries: RefCell<HashMap<String, Weak<ModelResource>>>,
    loads: Cell<usize>,
    uploads: Arc<RenderTaskQueue<GpuMesh>>,
    /// Next GPU handle; shared with upload tasks running off this thread.
    next_handle: Arc<AtomicU64>,
}

impl ModelCache {
    pub fn new(uploads: Arc<RenderTaskQueue<GpuMesh>>) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            loads: Cell::new(0),
            uploads,
            next_handle: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Returns the resource for `name`, loading it if no live handle exists.
    pub fn acquire(&self, name: &str) -> Rc<ModelResource> {
        if let Some(resource) = self.entries.borrow().get(name).and_then(Weak::upgrade) {
            return resource;
        }

        let resource = Rc::new(self.load(name));
        self.entries
            .borrow_mut()
            .insert(name.to_string(), Rc::downgrade(&resource));
        resource
    }

    fn load(&self, name: &str) -> ModelResource {
        self.loads.set(self.loads.get() + 1);
        let vertex_count = procedural_vertex_count(name);
        log::debug!("Loading model '{name}' ({vertex_count} vertices)");

        let next_handle = self.next_handle.clone();
        let promise = self.uploads.schedule(move || GpuMesh {
            handle: next_handle.fetch_add(1, Ordering::Relaxed),
            vertex_count,
        });
        ModelResource {
            name: name.to_string(),
            vertex_count,
            upload: RefCell::new(UploadState::Pending(promise)),
        }
    }

    /// Drops entries whose resource is no longer referenced. Returns the
    /// number of entries removed.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, weak| weak.strong_count() > 0);
        let purged = before - entries.len();
        if purged > 0 {
            log::debug!("Purged {purged} unloaded models");
        }
        purged
    }

    /// Number of times a model was loaded (cache misses).
    pub fn load_count(&self) -> usize {
        self.loads.get()
    }

    /// Number of models currently held by at least one handle.
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .borrow()
            .get(name)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    pub fn upload_queue(&self) -> &Arc<RenderTaskQueue<GpuMesh>> {
        &self.uploads
    }
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("entries", &self.entries.borrow().len())
            .field("live", &self.live_count())
            .field("loads", &self.loads.get())
            .finish()
    }
}

/// Stand-in for parsing a model file: a stable vertex count per name.
fn procedural_vertex_count(name: &str) -> u32 {
    let hash = name
        .bytes()
        .fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    24 + (hash % 64) * 6
}
