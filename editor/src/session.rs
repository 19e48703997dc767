//! Headless editing session.
//!
//! Drives a [`CourseDocument`] through a fixed script, one step per tick,
//! and drains the render-task queue after every step the way the viewport
//! does once per frame.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use levelforge_core::math::{self, Vec3};
use levelforge_core::task_queue::RenderTaskQueue;

use crate::assets::{GpuMesh, ModelCache};
use crate::config::EditorConfig;
use crate::document::CourseDocument;
use crate::error::LevelError;
use crate::level::{ActorId, Course, ObjectKey, RailId, RailPointId, Transform};

/// The course the session opens: a few props, a looping rail and a group.
pub fn demo_course() -> Course {
    let mut course = Course::new("Demo Meadow");
    let tree = course.push_actor(
        "Tree",
        "Tree",
        Transform::from_translation(Vec3::new(-4.0, 0.0, 0.0)),
    );
    let rock = course.push_actor(
        "Rock",
        "Rock",
        Transform::from_translation(Vec3::new(2.0, 0.0, 1.0)),
    );
    course.push_actor(
        "Gate",
        "Gate",
        Transform {
            rotation: math::quat_from_rotation_y(std::f32::consts::FRAC_PI_2),
            ..Transform::from_translation(Vec3::new(0.0, 0.0, 8.0))
        },
    );
    course.push_rail(
        "Patrol",
        true,
        [
            Vec3::new(-6.0, 0.0, -6.0),
            Vec3::new(6.0, 0.0, -6.0),
            Vec3::new(6.0, 0.0, 6.0),
            Vec3::new(-6.0, 0.0, 6.0),
        ],
    );
    course.push_group("Scenery", vec![tree, rock]);
    course
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub ticks: u64,
    pub updates: usize,
    pub tasks_executed: usize,
    pub live_views: usize,
    pub loaded_models: usize,
    pub modified: bool,
    pub history: Vec<String>,
}

const SCRIPT_LEN: u64 = 14;

pub struct Session {
    document: CourseDocument,
    uploads: Arc<RenderTaskQueue<GpuMesh>>,
    task_budget: Duration,
    tick: u64,
    tasks_executed: usize,
    updates: Rc<Cell<usize>>,
}

impl Session {
    pub fn new(config: &EditorConfig, course: Course) -> Self {
        let uploads = Arc::new(RenderTaskQueue::new());
        let models = ModelCache::new(uploads.clone());
        let mut document = CourseDocument::new(course, models, config.history.max_undo);

        let updates = Rc::new(Cell::new(0));
        let counter = updates.clone();
        document
            .context_mut()
            .on_update(move |_| counter.set(counter.get() + 1));
        document.context_mut().on_after_rebuild(|stats| {
            log::trace!("Views rebuilt: {} live, {} recreated", stats.live, stats.recreated);
        });

        Self {
            document,
            uploads,
            task_budget: config.render.task_budget(),
            tick: 0,
            tasks_executed: 0,
            updates,
        }
    }

    pub fn document(&self) -> &CourseDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut CourseDocument {
        &mut self.document
    }

    /// Runs one scripted step, then drains the render-task queue.
    pub fn tick(&mut self) {
        self.step(self.tick % SCRIPT_LEN);
        self.tick += 1;

        let executed = self.uploads.execute_pending(self.task_budget);
        self.tasks_executed += executed;
        if executed > 0 {
            log::debug!("Tick {}: {executed} render tasks", self.tick);
        }
    }

    /// Runs `ticks` steps and summarizes the result.
    pub fn run(&mut self, ticks: u64) -> SessionReport {
        for _ in 0..ticks {
            self.tick();
        }
        // Let uploads scheduled by the last step finish.
        while !self.uploads.is_empty() {
            self.tasks_executed += self.uploads.execute_pending(self.task_budget);
        }
        self.report()
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            ticks: self.tick,
            updates: self.updates.get(),
            tasks_executed: self.tasks_executed,
            live_views: self.document.context().reconciler().len(),
            loaded_models: self.document.models().live_count(),
            modified: self.document.is_modified(),
            history: self.document.history_lines(),
        }
    }

    fn first_actor(&self) -> Option<ObjectKey> {
        self.document
            .course()
            .actors
            .first()
            .map(|a| ObjectKey::Actor(a.id))
    }

    fn active_actor(&self) -> Option<ActorId> {
        match self.document.selection().active() {
            Some(ObjectKey::Actor(id)) => Some(id),
            _ => None,
        }
    }

    fn step(&mut self, step: u64) {
        let outcome: Result<String, String> = match step {
            0 => match self.first_actor() {
                Some(key) => self
                    .document
                    .pick(key)
                    .map(|()| format!("picked {key:?}"))
                    .map_err(|e| e.to_string()),
                None => Err("no actor to pick".into()),
            },
            1 => {
                let moved = self.document.translate_selected(Vec3::new(1.0, 0.0, 0.0));
                Ok(format!("moved {moved} objects"))
            }
            2 => {
                let x = (self.tick % 7) as f32;
                let id = self.document.add_actor(
                    "Lamp",
                    "Lamp",
                    Transform::from_translation(Vec3::new(x, 0.0, 3.0)),
                );
                Ok(format!("added {id}"))
            }
            3 => match self.active_actor() {
                Some(id) => self
                    .document
                    .set_actor_model(id, "LampTall")
                    .map(|()| format!("changed model of {id}"))
                    .map_err(|e| e.to_string()),
                None => Err("no active actor".into()),
            },
            4 => match self.active_actor() {
                Some(id) => {
                    let name = format!("Lamp {}", self.tick);
                    self.document
                        .rename_actor(id, &name)
                        .map(|()| format!("renamed {id} to {name}"))
                        .map_err(|e| e.to_string())
                }
                None => Err("no active actor".into()),
            },
            5 | 12 => Ok(format!("undo: {}", self.document.undo())),
            6 => Ok(format!("redo: {}", self.document.redo())),
            7 => self.edit_rail(|doc, _, points| {
                let first = points[0];
                let position = doc
                    .course()
                    .rail_point(first)
                    .map(|p| p.position + Vec3::new(0.0, 0.5, 0.0))
                    .ok_or(LevelError::RailPointNotFound(first))?;
                doc.move_rail_point(first, position)?;
                Ok(format!("moved {first}"))
            }),
            8 => self.edit_rail(|doc, rail, points| {
                let id = doc.insert_rail_point(rail, points.len(), Vec3::new(0.0, 0.0, -8.0))?;
                Ok(format!("inserted {id}"))
            }),
            9 => self.edit_rail(|doc, rail, _| {
                let closed = doc.course().rail(rail).is_some_and(|r| r.closed);
                doc.set_rail_closed(rail, !closed)?;
                Ok(format!("{rail} closed: {}", !closed))
            }),
            10 => self.group_first_actors(),
            11 => {
                let removed = self.document.delete_selected();
                Ok(format!("deleted {removed} objects"))
            }
            _ => {
                self.document.save();
                Ok(format!("saved; purged {} models", self.document.purge_models()))
            }
        };

        match outcome {
            Ok(message) => log::info!("[tick {}] {message}", self.tick),
            Err(message) => log::warn!("[tick {}] step {step} skipped: {message}", self.tick),
        }
    }

    fn group_first_actors(&mut self) -> Result<String, String> {
        let keys: Vec<ObjectKey> = self
            .document
            .course()
            .actors
            .iter()
            .take(2)
            .map(|a| ObjectKey::Actor(a.id))
            .collect();
        for key in keys {
            self.document.pick_add(key).map_err(|e| e.to_string())?;
        }
        match self.document.group_selected("Pair") {
            Some(id) => Ok(format!("grouped as {id}")),
            None => Err("nothing to group".into()),
        }
    }

    fn edit_rail(
        &mut self,
        edit: impl FnOnce(&mut CourseDocument, RailId, &[RailPointId]) -> Result<String, LevelError>,
    ) -> Result<String, String> {
        let Some(rail) = self.document.course().rails.first() else {
            return Err("course has no rail".into());
        };
        let rail_id = rail.id;
        let points: Vec<_> = rail.points.iter().map(|p| p.id).collect();
        if points.is_empty() {
            return Err(format!("{rail_id} has no points"));
        }
        edit(&mut self.document, rail_id, &points).map_err(|e| e.to_string())
    }
}
