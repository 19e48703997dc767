//! Course data model: actors, rails and groups.
//!
//! The course is the data side of the editor. It knows nothing about views,
//! selection or history; every edit made through the document goes through
//! a [`CourseCommand`](crate::commands::CourseCommand) that records what to
//! restore.

use std::fmt;

use levelforge_core::math::{self, Mat4, Quat, Vec3};

use crate::error::LevelError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identity of an [`Actor`]; stable across delete and undo.
    ActorId,
    "actor"
);
define_id!(
    /// Identity of a [`Rail`].
    RailId,
    "rail"
);
define_id!(
    /// Identity of a [`RailPoint`].
    RailPointId,
    "point"
);
define_id!(
    /// Identity of a [`Group`].
    GroupId,
    "group"
);

/// Identity of any editable object in a course.
///
/// Rail segments have no id of their own; they are named by the two points
/// they connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    Actor(ActorId),
    Rail(RailId),
    RailPoint(RailPointId),
    RailSegment(RailPointId, RailPointId),
    Group(GroupId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    /// World matrix of this transform.
    pub fn matrix(&self) -> Mat4 {
        math::mat4_from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: math::quat_identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

/// A placed object: a model instance with a name, a layer and a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    /// Name of the model resource this actor renders.
    pub model: String,
    pub layer: String,
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailPoint {
    pub id: RailPointId,
    pub position: Vec3,
}

/// A polyline path through the course, optionally closed into a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Rail {
    pub id: RailId,
    pub name: String,
    pub closed: bool,
    pub points: Vec<RailPoint>,
}

impl Rail {
    /// Consecutive point pairs, plus the closing pair for a closed rail with
    /// more than two points.
    pub fn segments(&self) -> Vec<(RailPointId, RailPointId)> {
        let mut segments: Vec<_> = self.points.windows(2).map(|w| (w[0].id, w[1].id)).collect();
        if self.closed && self.points.len() > 2 {
            let first = self.points[0].id;
            let last = self.points[self.points.len() - 1].id;
            segments.push((last, first));
        }
        segments
    }

    pub fn point(&self, id: RailPointId) -> Option<&RailPoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn point_index(&self, id: RailPointId) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }
}

/// A named set of actors moved and selected together.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<ActorId>,
}

/// A level: ordered actors, rails and groups.
#[derive(Debug, Clone, Default)]
pub struct Course {
    pub name: String,
    pub actors: Vec<Actor>,
    pub rails: Vec<Rail>,
    pub groups: Vec<Group>,
    next_id: u64,
}

impl Course {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn allocate_actor_id(&mut self) -> ActorId {
        ActorId(self.allocate())
    }

    pub fn allocate_rail_point_id(&mut self) -> RailPointId {
        RailPointId(self.allocate())
    }

    pub fn allocate_group_id(&mut self) -> GroupId {
        GroupId(self.allocate())
    }

    // ---------------------------------------------------------------------
    // Construction helpers (not recorded in history)
    // ---------------------------------------------------------------------

    pub fn push_actor(
        &mut self,
        name: impl Into<String>,
        model: impl Into<String>,
        transform: Transform,
    ) -> ActorId {
        let id = self.allocate_actor_id();
        self.actors.push(Actor {
            id,
            name: name.into(),
            model: model.into(),
            layer: "Common".into(),
            transform,
        });
        id
    }

    pub fn push_rail(
        &mut self,
        name: impl Into<String>,
        closed: bool,
        positions: impl IntoIterator<Item = Vec3>,
    ) -> RailId {
        let id = RailId(self.allocate());
        let points = positions
            .into_iter()
            .map(|position| RailPoint {
                id: self.allocate_rail_point_id(),
                position,
            })
            .collect();
        self.rails.push(Rail {
            id,
            name: name.into(),
            closed,
            points,
        });
        id
    }

    pub fn push_group(&mut self, name: impl Into<String>, members: Vec<ActorId>) -> GroupId {
        let id = self.allocate_group_id();
        self.groups.push(Group {
            id,
            name: name.into(),
            members,
        });
        id
    }

    // ---------------------------------------------------------------------
    // Actors
    // ---------------------------------------------------------------------

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Result<&mut Actor, LevelError> {
        self.actors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(LevelError::ActorNotFound(id))
    }

    pub fn insert_actor(&mut self, index: usize, actor: Actor) -> Result<(), LevelError> {
        if index > self.actors.len() {
            return Err(LevelError::InvalidIndex {
                index,
                len: self.actors.len(),
            });
        }
        self.actors.insert(index, actor);
        Ok(())
    }

    /// Removes an actor, returning its former index and the actor.
    pub fn remove_actor(&mut self, id: ActorId) -> Result<(usize, Actor), LevelError> {
        let index = self
            .actors
            .iter()
            .position(|a| a.id == id)
            .ok_or(LevelError::ActorNotFound(id))?;
        Ok((index, self.actors.remove(index)))
    }

    // ---------------------------------------------------------------------
    // Rails
    // ---------------------------------------------------------------------

    pub fn rail(&self, id: RailId) -> Option<&Rail> {
        self.rails.iter().find(|r| r.id == id)
    }

    pub fn rail_mut(&mut self, id: RailId) -> Result<&mut Rail, LevelError> {
        self.rails
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(LevelError::RailNotFound(id))
    }

    /// The rail holding `point`, and the point's index in it.
    pub fn find_rail_point(&self, point: RailPointId) -> Option<(RailId, usize)> {
        self.rails
            .iter()
            .find_map(|rail| rail.point_index(point).map(|index| (rail.id, index)))
    }

    pub fn rail_point(&self, point: RailPointId) -> Option<&RailPoint> {
        self.rails.iter().find_map(|rail| rail.point(point))
    }

    pub fn rail_point_mut(&mut self, point: RailPointId) -> Result<&mut RailPoint, LevelError> {
        self.rails
            .iter_mut()
            .flat_map(|rail| rail.points.iter_mut())
            .find(|p| p.id == point)
            .ok_or(LevelError::RailPointNotFound(point))
    }

    // ---------------------------------------------------------------------
    // Groups
    // ---------------------------------------------------------------------

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Result<&mut Group, LevelError> {
        self.groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(LevelError::GroupNotFound(id))
    }

    /// Groups that list `actor` as a member.
    pub fn groups_containing(&self, actor: ActorId) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|g| g.members.contains(&actor))
            .map(|g| g.id)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Keys
    // ---------------------------------------------------------------------

    /// Returns `true` if `key` names an object currently in the course.
    pub fn contains(&self, key: ObjectKey) -> bool {
        match key {
            ObjectKey::Actor(id) => self.actor(id).is_some(),
            ObjectKey::Rail(id) => self.rail(id).is_some(),
            ObjectKey::RailPoint(id) => self.rail_point(id).is_some(),
            ObjectKey::RailSegment(from, to) => self
                .rails
                .iter()
                .any(|rail| rail.segments().contains(&(from, to))),
            ObjectKey::Group(id) => self.group(id).is_some(),
        }
    }

    /// Representative position of an object, if it has one.
    pub fn position_of(&self, key: ObjectKey) -> Option<Vec3> {
        match key {
            ObjectKey::Actor(id) => self.actor(id).map(|a| a.transform.translation),
            ObjectKey::RailPoint(id) => self.rail_point(id).map(|p| p.position),
            ObjectKey::RailSegment(from, to) => {
                let a = self.rail_point(from)?.position;
                let b = self.rail_point(to)?.position;
                Some(math::midpoint(a, b))
            }
            ObjectKey::Rail(_) | ObjectKey::Group(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course_with_rail(closed: bool, count: usize) -> (Course, RailId) {
        let mut course = Course::new("test");
        let rail = course.push_rail(
            "rail",
            closed,
            (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)),
        );
        (course, rail)
    }

    #[test]
    fn ids_are_unique_across_kinds() {
        let mut course = Course::new("test");
        let a = course.push_actor("a", "Cube", Transform::default());
        let b = course.push_actor("b", "Cube", Transform::default());
        let g = course.push_group("g", vec![a, b]);
        assert_ne!(a, b);
        assert_ne!(a.raw(), g.raw());
        assert_ne!(b.raw(), g.raw());
    }

    #[test]
    fn open_rail_segments() {
        let (course, rail) = course_with_rail(false, 3);
        let rail = course.rail(rail).unwrap();
        let ids: Vec<_> = rail.points.iter().map(|p| p.id).collect();
        assert_eq!(rail.segments(), vec![(ids[0], ids[1]), (ids[1], ids[2])]);
    }

    #[test]
    fn closed_rail_has_closing_segment() {
        let (course, rail) = course_with_rail(true, 3);
        let rail = course.rail(rail).unwrap();
        let ids: Vec<_> = rail.points.iter().map(|p| p.id).collect();
        assert_eq!(rail.segments().len(), 3);
        assert_eq!(rail.segments()[2], (ids[2], ids[0]));
    }

    #[test]
    fn closed_rail_of_two_points_has_one_segment() {
        let (course, rail) = course_with_rail(true, 2);
        assert_eq!(course.rail(rail).unwrap().segments().len(), 1);
    }

    #[test]
    fn remove_and_reinsert_actor_keeps_order() {
        let mut course = Course::new("test");
        let a = course.push_actor("a", "Cube", Transform::default());
        let b = course.push_actor("b", "Cube", Transform::default());
        let c = course.push_actor("c", "Cube", Transform::default());

        let (index, actor) = course.remove_actor(b).unwrap();
        assert_eq!(index, 1);
        assert!(!course.contains(ObjectKey::Actor(b)));

        course.insert_actor(index, actor).unwrap();
        let order: Vec<_> = course.actors.iter().map(|a| a.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn missing_objects_are_errors() {
        let mut course = Course::new("test");
        let ghost = ActorId::new(99);
        assert_eq!(course.remove_actor(ghost), Err(LevelError::ActorNotFound(ghost)));
        assert!(matches!(
            course.insert_actor(3, Actor {
                id: ghost,
                name: "ghost".into(),
                model: "Cube".into(),
                layer: "Common".into(),
                transform: Transform::default(),
            }),
            Err(LevelError::InvalidIndex { index: 3, len: 0 })
        ));
    }

    #[test]
    fn segment_position_is_midpoint() {
        let (course, rail) = course_with_rail(false, 2);
        let points = &course.rail(rail).unwrap().points;
        let key = ObjectKey::RailSegment(points[0].id, points[1].id);
        assert!(course.contains(key));
        assert_eq!(course.position_of(key), Some(Vec3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn transform_matrix_carries_translation() {
        let t = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let m = t.matrix();
        assert_eq!(m[(0, 3)], 1.0);
        assert_eq!(m[(1, 3)], 2.0);
        assert_eq!(m[(2, 3)], 3.0);
    }
}
