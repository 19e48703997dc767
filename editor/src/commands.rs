//! Recorded course edits.
//!
//! Every variant stores the state to put back. Reverting swaps that state
//! into the course and returns a command holding what was there before, so
//! a command and its revert form an undo/redo pair.
//!
//! The constructors (`set_transform`, `remove_actor`, ...) perform the edit
//! on a [`Course`] and return the command that undoes it.

use levelforge_core::abstract_editor::Command;
use levelforge_core::math::Vec3;

use crate::error::LevelError;
use crate::level::{Actor, ActorId, Course, Group, GroupId, RailId, RailPoint, RailPointId, Transform};
use crate::view::SceneModel;

#[derive(Debug, Clone, PartialEq)]
pub enum CourseCommand {
    SetTransform {
        actor: ActorId,
        transform: Transform,
    },
    SetModel {
        actor: ActorId,
        model: String,
    },
    Rename {
        actor: ActorId,
        name: String,
    },
    /// The actor was added; reverting removes it.
    AddActor { actor: ActorId },
    /// The actor was removed from `index`; reverting puts it back.
    RemoveActor { index: usize, actor: Box<Actor> },
    SetRailPoint {
        point: RailPointId,
        position: Vec3,
    },
    SetRailClosed {
        rail: RailId,
        closed: bool,
    },
    /// The point was inserted; reverting removes it.
    InsertRailPoint { rail: RailId, point: RailPointId },
    /// The point was removed from `index`; reverting puts it back.
    RemoveRailPoint {
        rail: RailId,
        index: usize,
        point: RailPoint,
    },
    SetGroupMembers {
        group: GroupId,
        members: Vec<ActorId>,
    },
    /// The group was added; reverting removes it.
    AddGroup { group: GroupId },
    /// The group was removed from `index`; reverting puts it back.
    RemoveGroup { index: usize, group: Group },
}

impl CourseCommand {
    pub fn set_transform(
        course: &mut Course,
        actor: ActorId,
        transform: Transform,
    ) -> Result<Self, LevelError> {
        let previous = std::mem::replace(&mut course.actor_mut(actor)?.transform, transform);
        Ok(Self::SetTransform {
            actor,
            transform: previous,
        })
    }

    pub fn set_model(course: &mut Course, actor: ActorId, model: String) -> Result<Self, LevelError> {
        let previous = std::mem::replace(&mut course.actor_mut(actor)?.model, model);
        Ok(Self::SetModel {
            actor,
            model: previous,
        })
    }

    pub fn rename(course: &mut Course, actor: ActorId, name: String) -> Result<Self, LevelError> {
        let previous = std::mem::replace(&mut course.actor_mut(actor)?.name, name);
        Ok(Self::Rename {
            actor,
            name: previous,
        })
    }

    pub fn add_actor(course: &mut Course, index: usize, actor: Actor) -> Result<Self, LevelError> {
        let id = actor.id;
        course.insert_actor(index, actor)?;
        Ok(Self::AddActor { actor: id })
    }

    pub fn remove_actor(course: &mut Course, actor: ActorId) -> Result<Self, LevelError> {
        let (index, actor) = course.remove_actor(actor)?;
        Ok(Self::RemoveActor {
            index,
            actor: Box::new(actor),
        })
    }

    pub fn set_rail_point(
        course: &mut Course,
        point: RailPointId,
        position: Vec3,
    ) -> Result<Self, LevelError> {
        let previous = std::mem::replace(&mut course.rail_point_mut(point)?.position, position);
        Ok(Self::SetRailPoint {
            point,
            position: previous,
        })
    }

    pub fn set_rail_closed(course: &mut Course, rail: RailId, closed: bool) -> Result<Self, LevelError> {
        let previous = std::mem::replace(&mut course.rail_mut(rail)?.closed, closed);
        Ok(Self::SetRailClosed {
            rail,
            closed: previous,
        })
    }

    pub fn insert_rail_point(
        course: &mut Course,
        rail: RailId,
        index: usize,
        point: RailPoint,
    ) -> Result<Self, LevelError> {
        let points = &mut course.rail_mut(rail)?.points;
        if index > points.len() {
            return Err(LevelError::InvalidIndex {
                index,
                len: points.len(),
            });
        }
        let id = point.id;
        points.insert(index, point);
        Ok(Self::InsertRailPoint { rail, point: id })
    }

    pub fn remove_rail_point(course: &mut Course, point: RailPointId) -> Result<Self, LevelError> {
        let (rail, index) = course
            .find_rail_point(point)
            .ok_or(LevelError::RailPointNotFound(point))?;
        let removed = course.rail_mut(rail)?.points.remove(index);
        Ok(Self::RemoveRailPoint {
            rail,
            index,
            point: removed,
        })
    }

    pub fn set_group_members(
        course: &mut Course,
        group: GroupId,
        members: Vec<ActorId>,
    ) -> Result<Self, LevelError> {
        let previous = std::mem::replace(&mut course.group_mut(group)?.members, members);
        Ok(Self::SetGroupMembers {
            group,
            members: previous,
        })
    }

    pub fn add_group(course: &mut Course, group: Group) -> Self {
        let id = group.id;
        course.groups.push(group);
        Self::AddGroup { group: id }
    }

    pub fn remove_group(course: &mut Course, group: GroupId) -> Result<Self, LevelError> {
        let index = course
            .groups
            .iter()
            .position(|g| g.id == group)
            .ok_or(LevelError::GroupNotFound(group))?;
        Ok(Self::RemoveGroup {
            index,
            group: course.groups.remove(index),
        })
    }

    /// Applies the recorded state, returning the command that restores the
    /// state it replaced.
    fn swap(self, course: &mut Course) -> Result<Self, LevelError> {
        match self {
            Self::SetTransform { actor, transform } => Self::set_transform(course, actor, transform),
            Self::SetModel { actor, model } => Self::set_model(course, actor, model),
            Self::Rename { actor, name } => Self::rename(course, actor, name),
            Self::AddActor { actor } => Self::remove_actor(course, actor),
            Self::RemoveActor { index, actor } => Self::add_actor(course, index, *actor),
            Self::SetRailPoint { point, position } => Self::set_rail_point(course, point, position),
            Self::SetRailClosed { rail, closed } => Self::set_rail_closed(course, rail, closed),
            Self::InsertRailPoint { point, .. } => Self::remove_rail_point(course, point),
            Self::RemoveRailPoint { rail, index, point } => {
                Self::insert_rail_point(course, rail, index, point)
            }
            Self::SetGroupMembers { group, members } => {
                Self::set_group_members(course, group, members)
            }
            Self::AddGroup { group } => Self::remove_group(course, group),
            Self::RemoveGroup { index, group } => {
                if index > course.groups.len() {
                    return Err(LevelError::InvalidIndex {
                        index,
                        len: course.groups.len(),
                    });
                }
                let id = group.id;
                course.groups.insert(index, group);
                Ok(Self::AddGroup { group: id })
            }
        }
    }
}

impl Command for CourseCommand {
    type Model = SceneModel;

    fn name(&self) -> &str {
        match self {
            Self::SetTransform { .. } => "Move actor",
            Self::SetModel { .. } => "Change model",
            Self::Rename { .. } => "Rename actor",
            Self::AddActor { .. } => "Add actor",
            Self::RemoveActor { .. } => "Delete actor",
            Self::SetRailPoint { .. } => "Move rail point",
            Self::SetRailClosed { .. } => "Toggle rail loop",
            Self::InsertRailPoint { .. } => "Insert rail point",
            Self::RemoveRailPoint { .. } => "Remove rail point",
            Self::SetGroupMembers { .. } => "Set group members",
            Self::AddGroup { .. } => "Create group",
            Self::RemoveGroup { .. } => "Delete group",
        }
    }

    /// # Panics
    ///
    /// Panics if the object the command refers to is gone. History replays
    /// commands in the exact reverse order they were applied, so the course
    /// always holds the state the command was recorded against.
    fn revert(self, model: &mut SceneModel) -> Self {
        let name = self.name().to_owned();
        match self.swap(&mut model.course) {
            Ok(inverse) => inverse,
            Err(err) => panic!("history out of sync with course while reverting '{name}': {err}"),
        }
    }
}
