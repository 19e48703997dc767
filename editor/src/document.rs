//! The editable course document.
//!
//! [`CourseDocument`] is the single entry point the UI (or a script) uses to
//! change a course. Each operation records one undo entry, batching when it
//! touches several objects, and keeps the selection pointing at objects that
//! exist.

use levelforge_core::abstract_editor::{EditContext, EditError, EditResult, Selection};
use levelforge_core::math::Vec3;
use levelforge_core::reconcile::ViewId;

use crate::assets::ModelCache;
use crate::commands::CourseCommand;
use crate::error::LevelError;
use crate::history_panel;
use crate::level::{Actor, ActorId, Course, Group, GroupId, ObjectKey, RailId, RailPoint, RailPointId, Transform};
use crate::view::{Pickable, SceneModel, SceneView, Transformable, scene_reconciler};

/// Edit context specialised to courses.
pub type SceneContext = EditContext<SceneView, CourseCommand>;

/// Performs an edit on the course and commits the command it returns.
fn commit_edit(
    ctx: &mut SceneContext,
    edit: impl FnOnce(&mut Course) -> Result<CourseCommand, LevelError>,
) -> Result<(), LevelError> {
    let command = edit(&mut ctx.model_mut().course)?;
    ctx.commit(command);
    Ok(())
}

/// Drops selected keys whose objects no longer exist.
fn prune_selection(ctx: &mut SceneContext) {
    let course = &ctx.model().course;
    let stale: Vec<ObjectKey> = ctx
        .selection()
        .iter()
        .copied()
        .filter(|key| !course.contains(*key))
        .collect();
    if !stale.is_empty() {
        log::debug!("Dropping {} stale selected objects", stale.len());
        ctx.retain_selection(|key| !stale.contains(key));
    }
}

pub struct CourseDocument {
    ctx: SceneContext,
}

impl CourseDocument {
    /// Opens `course` for editing and builds its views.
    pub fn new(course: Course, models: ModelCache, max_undo: usize) -> Self {
        let mut ctx = EditContext::new(SceneModel { course, models }, scene_reconciler(), max_undo);
        ctx.set_selection_filter(|model: &SceneModel, key: &ObjectKey| model.course.contains(*key));
        ctx.rebuild();
        log::info!(
            "Opened course '{}' ({} views)",
            ctx.model().course.name,
            ctx.reconciler().len()
        );
        Self { ctx }
    }

    pub fn course(&self) -> &Course {
        &self.ctx.model().course
    }

    pub fn models(&self) -> &ModelCache {
        &self.ctx.model().models
    }

    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    /// Mutable access to the edit context, e.g. to register observers.
    pub fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    pub fn selection(&self) -> &Selection<ObjectKey> {
        self.ctx.selection()
    }

    /// The live view built for `key`.
    pub fn view_of(&self, key: ObjectKey) -> Option<&SceneView> {
        self.ctx.lookup(&key).and_then(|id| self.ctx.view(id))
    }

    // ---------------------------------------------------------------------
    // Actors
    // ---------------------------------------------------------------------

    /// Appends a new actor and selects it.
    pub fn add_actor(&mut self, name: &str, model: &str, transform: Transform) -> ActorId {
        let mut added = None;
        self.ctx.batch_action(|ctx| {
            let course = &mut ctx.model_mut().course;
            let id = course.allocate_actor_id();
            course.actors.push(Actor {
                id,
                name: name.to_string(),
                model: model.to_string(),
                layer: "Common".into(),
                transform,
            });
            ctx.commit(CourseCommand::AddActor { actor: id });
            ctx.select(ObjectKey::Actor(id));
            added = Some(id);
            format!("Add {name}")
        });
        let id = added.unwrap_or_else(|| unreachable!("batch body always runs"));
        log::debug!("Added {id} ({model})");
        id
    }

    pub fn set_actor_model(&mut self, actor: ActorId, model: &str) -> Result<(), LevelError> {
        commit_edit(&mut self.ctx, |course| {
            CourseCommand::set_model(course, actor, model.to_string())
        })
    }

    pub fn rename_actor(&mut self, actor: ActorId, name: &str) -> Result<(), LevelError> {
        commit_edit(&mut self.ctx, |course| {
            CourseCommand::rename(course, actor, name.to_string())
        })
    }

    pub fn set_actor_transform(&mut self, actor: ActorId, transform: Transform) -> Result<(), LevelError> {
        commit_edit(&mut self.ctx, |course| {
            CourseCommand::set_transform(course, actor, transform)
        })
    }

    // ---------------------------------------------------------------------
    // Selection-wide edits
    // ---------------------------------------------------------------------

    /// Deletes every selected actor, rail point and group as one undo step.
    ///
    /// Deleted actors are also removed from the groups listing them. Rails
    /// and segments are not deleted directly. Returns the number of objects
    /// removed.
    pub fn delete_selected(&mut self) -> usize {
        let selected: Vec<ObjectKey> = self.ctx.selection().iter().copied().collect();
        if selected.is_empty() {
            return 0;
        }

        let mut removed = 0;
        self.ctx.batch_action(|ctx| {
            for key in selected {
                let result = match key {
                    ObjectKey::Actor(id) => {
                        let groups = ctx.model().course.groups_containing(id);
                        for group in groups {
                            let edit = commit_edit(ctx, |course| {
                                let members = course
                                    .group(group)
                                    .ok_or(LevelError::GroupNotFound(group))?
                                    .members
                                    .iter()
                                    .copied()
                                    .filter(|&m| m != id)
                                    .collect();
                                CourseCommand::set_group_members(course, group, members)
                            });
                            if let Err(err) = edit {
                                log::warn!("Could not update {group}: {err}");
                            }
                        }
                        commit_edit(ctx, |course| CourseCommand::remove_actor(course, id))
                    }
                    ObjectKey::RailPoint(id) => {
                        commit_edit(ctx, |course| CourseCommand::remove_rail_point(course, id))
                    }
                    ObjectKey::Group(id) => {
                        commit_edit(ctx, |course| CourseCommand::remove_group(course, id))
                    }
                    ObjectKey::Rail(_) | ObjectKey::RailSegment(..) => continue,
                };
                match result {
                    Ok(()) => removed += 1,
                    Err(err) => log::warn!("Skipping delete of {key:?}: {err}"),
                }
            }
            ctx.deselect_all();
            format!("Delete {removed} objects")
        });
        removed
    }

    /// Moves every selected actor and rail point by `delta` as one undo
    /// step. Returns the number of objects moved.
    pub fn translate_selected(&mut self, delta: Vec3) -> usize {
        let mut moved = 0;
        self.ctx.batch_action(|ctx| {
            ctx.for_each::<Transformable>(|ctx, id| {
                let Some(key) = ctx.view(id).and_then(SceneView::key) else {
                    return;
                };
                if !ctx.is_selected(&key) {
                    return;
                }
                let result = match key {
                    ObjectKey::Actor(actor) => commit_edit(ctx, |course| {
                        let mut transform = course
                            .actor(actor)
                            .ok_or(LevelError::ActorNotFound(actor))?
                            .transform;
                        transform.translation += delta;
                        CourseCommand::set_transform(course, actor, transform)
                    }),
                    ObjectKey::RailPoint(point) => commit_edit(ctx, |course| {
                        let position = course
                            .rail_point(point)
                            .ok_or(LevelError::RailPointNotFound(point))?
                            .position;
                        CourseCommand::set_rail_point(course, point, position + delta)
                    }),
                    _ => return,
                };
                match result {
                    Ok(()) => moved += 1,
                    Err(err) => log::warn!("Skipping move of {key:?}: {err}"),
                }
            });
            "Move selection"
        });
        moved
    }

    /// Creates a group from the selected actors and selects it.
    ///
    /// Returns `None` when no actor is selected.
    pub fn group_selected(&mut self, name: &str) -> Option<GroupId> {
        let members: Vec<ActorId> = self
            .course()
            .actors
            .iter()
            .map(|a| a.id)
            .filter(|&id| self.ctx.is_selected(&ObjectKey::Actor(id)))
            .collect();
        if members.is_empty() {
            return None;
        }

        let mut created = None;
        self.ctx.batch_action(|ctx| {
            let course = &mut ctx.model_mut().course;
            let id = course.allocate_group_id();
            let command = CourseCommand::add_group(
                course,
                Group {
                    id,
                    name: name.to_string(),
                    members,
                },
            );
            ctx.commit(command);
            ctx.select(ObjectKey::Group(id));
            created = Some(id);
            format!("Group {name}")
        });
        created
    }

    // ---------------------------------------------------------------------
    // Rails
    // ---------------------------------------------------------------------

    pub fn insert_rail_point(
        &mut self,
        rail: RailId,
        index: usize,
        position: Vec3,
    ) -> Result<RailPointId, LevelError> {
        let id = self.ctx.model_mut().course.allocate_rail_point_id();
        commit_edit(&mut self.ctx, |course| {
            CourseCommand::insert_rail_point(course, rail, index, RailPoint { id, position })
        })?;
        Ok(id)
    }

    pub fn remove_rail_point(&mut self, point: RailPointId) -> Result<(), LevelError> {
        let mut result = Ok(());
        self.ctx.batch_action(|ctx| {
            result = commit_edit(ctx, |course| CourseCommand::remove_rail_point(course, point));
            prune_selection(ctx);
            "Remove rail point"
        });
        result
    }

    pub fn move_rail_point(&mut self, point: RailPointId, position: Vec3) -> Result<(), LevelError> {
        commit_edit(&mut self.ctx, |course| {
            CourseCommand::set_rail_point(course, point, position)
        })
    }

    pub fn set_rail_closed(&mut self, rail: RailId, closed: bool) -> Result<(), LevelError> {
        commit_edit(&mut self.ctx, |course| {
            CourseCommand::set_rail_closed(course, rail, closed)
        })
    }

    // ---------------------------------------------------------------------
    // Picking
    // ---------------------------------------------------------------------

    /// Selects `key` alone.
    pub fn pick(&mut self, key: ObjectKey) -> EditResult {
        if !self.course().contains(key) {
            return Err(EditError::UnknownObject(format!("{key:?}")));
        }
        self.ctx.select(key);
        Ok(())
    }

    /// Adds `key` to the selection and makes it active.
    pub fn pick_add(&mut self, key: ObjectKey) -> EditResult {
        if !self.course().contains(key) {
            return Err(EditError::UnknownObject(format!("{key:?}")));
        }
        self.ctx.add_to_selection(key);
        Ok(())
    }

    /// Selects the pickable object closest to `point`, if one lies within
    /// `radius`.
    pub fn pick_at(&mut self, point: Vec3, radius: f32) -> Option<ObjectKey> {
        let nearest = self
            .ctx
            .reconciler()
            .snapshot::<Pickable>()
            .into_iter()
            .filter_map(|id: ViewId| {
                let view = self.ctx.view(id)?;
                Some((view.key()?, view.distance_to(point)?))
            })
            .filter(|&(_, distance)| distance <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(key, _)| key);

        match nearest {
            Some(key) => self.ctx.select(key),
            None => self.ctx.deselect_all(),
        }
        nearest
    }

    pub fn deselect_all(&mut self) {
        self.ctx.deselect_all();
    }

    // ---------------------------------------------------------------------
    // History
    // ---------------------------------------------------------------------

    /// Reverts the last edit. Selected objects it removed are deselected
    /// before the single update fires.
    pub fn undo(&mut self) -> bool {
        self.ctx.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.ctx.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.ctx.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.ctx.can_redo()
    }

    /// Marks the current state as saved.
    pub fn save(&mut self) {
        self.ctx.mark_saved();
        log::info!("Saved course '{}'", self.course().name);
    }

    pub fn is_modified(&self) -> bool {
        self.ctx.has_unsaved_changes()
    }

    /// Text rendering of the undo/redo stacks.
    pub fn history_lines(&self) -> Vec<String> {
        history_panel::history_lines(self.ctx.history())
    }

    /// Unloads models no view uses any more.
    pub fn purge_models(&self) -> usize {
        self.models().purge()
    }
}

impl std::fmt::Debug for CourseDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourseDocument")
            .field("course", &self.course().name)
            .field("context", &self.ctx)
            .finish()
    }
}
