//! Live view objects for a course.
//!
//! One [`SceneView`] exists per visible course object, plus one outline node
//! per group. The [`scene_reconciler`] root walks actors, then rails (each
//! registering its points and segments), then groups (each registering its
//! member actors and its outline).

use std::rc::Rc;

use levelforge_core::math::{Mat4, Vec3};
use levelforge_core::reconcile::{
    Capability, NodeId, Reconciler, UpdateContext, UpdateOutcome, ViewObject,
};

use crate::assets::{ModelCache, ModelResource};
use crate::level::{Actor, ActorId, Course, GroupId, ObjectKey, RailId, RailPointId};

/// Everything a view object may read while it updates.
#[derive(Debug)]
pub struct SceneModel {
    pub course: Course,
    pub models: ModelCache,
}

#[derive(Debug)]
pub struct ActorView {
    pub id: ActorId,
    pub model: Rc<ModelResource>,
    pub world: Mat4,
}

impl ActorView {
    fn load(actor: &Actor, models: &ModelCache) -> Self {
        Self {
            id: actor.id,
            model: models.acquire(&actor.model),
            world: actor.transform.matrix(),
        }
    }

    fn update(&mut self, model: &SceneModel) -> UpdateOutcome {
        let Some(actor) = model.course.actor(self.id) else {
            return UpdateOutcome::VALID;
        };
        if actor.model != self.model.name() {
            return UpdateOutcome::INVALID;
        }
        self.world = actor.transform.matrix();
        UpdateOutcome::VALID
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.world[(0, 3)], self.world[(1, 3)], self.world[(2, 3)])
    }
}

#[derive(Debug)]
pub struct RailView {
    pub id: RailId,
    /// Whether the rail was closed when this view was built.
    pub closed: bool,
    pub point_count: usize,
}

impl RailView {
    fn update(&mut self, ctx: &mut UpdateContext<'_, SceneView>, model: &SceneModel) -> UpdateOutcome {
        let Some(rail) = model.course.rail(self.id) else {
            return UpdateOutcome::VALID;
        };
        // Open and closed rails are drawn differently; rebuild on a switch.
        if rail.closed != self.closed {
            return UpdateOutcome::INVALID;
        }
        self.point_count = rail.points.len();

        for point in &rail.points {
            let (rail_id, point_id) = (rail.id, point.id);
            ctx.get_or_create(ObjectKey::RailPoint(point_id), || {
                SceneView::RailPoint(RailPointView {
                    id: point_id,
                    rail: rail_id,
                    position: Vec3::zeros(),
                })
            });
        }
        for (from, to) in rail.segments() {
            ctx.get_or_create(ObjectKey::RailSegment(from, to), || {
                SceneView::RailSegment(RailSegmentView {
                    from,
                    to,
                    start: Vec3::zeros(),
                    end: Vec3::zeros(),
                })
            });
        }
        UpdateOutcome::VALID
    }
}

#[derive(Debug)]
pub struct RailPointView {
    pub id: RailPointId,
    pub rail: RailId,
    pub position: Vec3,
}

#[derive(Debug)]
pub struct RailSegmentView {
    pub from: RailPointId,
    pub to: RailPointId,
    pub start: Vec3,
    pub end: Vec3,
}

#[derive(Debug)]
pub struct GroupView {
    pub id: GroupId,
    pub outline: Option<NodeId>,
    pub members: Vec<ActorId>,
}

impl GroupView {
    fn update(&mut self, ctx: &mut UpdateContext<'_, SceneView>, model: &SceneModel) -> UpdateOutcome {
        let Some(group) = model.course.group(self.id) else {
            return UpdateOutcome::VALID;
        };
        self.members.clone_from(&group.members);

        for &member in &group.members {
            if let Some(actor) = model.course.actor(member) {
                ctx.get_or_create(ObjectKey::Actor(member), || {
                    SceneView::Actor(ActorView::load(actor, &model.models))
                });
            }
        }

        let outline = *self.outline.get_or_insert_with(|| ctx.new_node_id());
        let group_id = self.id;
        ctx.add_or_update(outline, || {
            SceneView::GroupOutline(GroupOutlineView {
                group: group_id,
                min: Vec3::zeros(),
                max: Vec3::zeros(),
            })
        });
        UpdateOutcome::VALID
    }
}

/// Bounding box drawn around a group's members.
#[derive(Debug)]
pub struct GroupOutlineView {
    pub group: GroupId,
    pub min: Vec3,
    pub max: Vec3,
}

impl GroupOutlineView {
    fn update(&mut self, model: &SceneModel) -> UpdateOutcome {
        let positions: Vec<Vec3> = model
            .course
            .group(self.group)
            .into_iter()
            .flat_map(|g| g.members.iter())
            .filter_map(|&id| model.course.actor(id))
            .map(|a| a.transform.translation)
            .collect();

        let Some(first) = positions.first() else {
            self.min = Vec3::zeros();
            self.max = Vec3::zeros();
            return UpdateOutcome::VALID;
        };
        let (min, max) = positions
            .iter()
            .fold((*first, *first), |(min, max), p| (min.inf(p), max.sup(p)));
        self.min = min;
        self.max = max;
        UpdateOutcome::VALID
    }
}

/// The closed set of view objects the editor builds.
#[derive(Debug)]
pub enum SceneView {
    Actor(ActorView),
    Rail(RailView),
    RailPoint(RailPointView),
    RailSegment(RailSegmentView),
    Group(GroupView),
    GroupOutline(GroupOutlineView),
}

impl SceneView {
    /// The course object this view represents; `None` for outline nodes.
    pub fn key(&self) -> Option<ObjectKey> {
        match self {
            SceneView::Actor(v) => Some(ObjectKey::Actor(v.id)),
            SceneView::Rail(v) => Some(ObjectKey::Rail(v.id)),
            SceneView::RailPoint(v) => Some(ObjectKey::RailPoint(v.id)),
            SceneView::RailSegment(v) => Some(ObjectKey::RailSegment(v.from, v.to)),
            SceneView::Group(v) => Some(ObjectKey::Group(v.id)),
            SceneView::GroupOutline(_) => None,
        }
    }

    /// Distance from `point` to this view's pickable shape.
    pub fn distance_to(&self, point: Vec3) -> Option<f32> {
        match self {
            SceneView::Actor(v) => Some((v.translation() - point).norm()),
            SceneView::RailPoint(v) => Some((v.position - point).norm()),
            SceneView::RailSegment(v) => {
                Some(levelforge_core::math::distance_to_segment(point, v.start, v.end))
            }
            _ => None,
        }
    }
}

impl ViewObject for SceneView {
    type Key = ObjectKey;
    type Model = SceneModel;

    fn update(&mut self, ctx: &mut UpdateContext<'_, Self>, model: &SceneModel) -> UpdateOutcome {
        match self {
            SceneView::Actor(view) => view.update(model),
            SceneView::Rail(view) => view.update(ctx, model),
            SceneView::RailPoint(view) => {
                if let Some(point) = model.course.rail_point(view.id) {
                    view.position = point.position;
                }
                UpdateOutcome::VALID
            }
            SceneView::RailSegment(view) => {
                if let Some(start) = model.course.rail_point(view.from) {
                    view.start = start.position;
                }
                if let Some(end) = model.course.rail_point(view.to) {
                    view.end = end.position;
                }
                UpdateOutcome::VALID
            }
            SceneView::Group(view) => view.update(ctx, model),
            SceneView::GroupOutline(view) => view.update(model),
        }
    }
}

/// Views that can be moved: actors and rail points.
pub struct Transformable;

impl Capability<SceneView> for Transformable {
    fn applies_to(view: &SceneView) -> bool {
        matches!(view, SceneView::Actor(_) | SceneView::RailPoint(_))
    }
}

/// Views that can be clicked in the viewport.
pub struct Pickable;

impl Capability<SceneView> for Pickable {
    fn applies_to(view: &SceneView) -> bool {
        matches!(
            view,
            SceneView::Actor(_) | SceneView::RailPoint(_) | SceneView::RailSegment(_)
        )
    }
}

/// Builds the reconciler whose root walks every actor, rail and group.
pub fn scene_reconciler() -> Reconciler<SceneView> {
    Reconciler::<SceneView>::new(|ctx, model: &SceneModel| {
        let course = &model.course;
        for actor in &course.actors {
            ctx.get_or_create(ObjectKey::Actor(actor.id), || {
                SceneView::Actor(ActorView::load(actor, &model.models))
            });
        }
        for rail in &course.rails {
            let (id, closed) = (rail.id, rail.closed);
            ctx.get_or_create(ObjectKey::Rail(id), || {
                SceneView::Rail(RailView {
                    id,
                    closed,
                    point_count: 0,
                })
            });
        }
        for group in &course.groups {
            let id = group.id;
            ctx.get_or_create(ObjectKey::Group(id), || {
                SceneView::Group(GroupView {
                    id,
                    outline: None,
                    members: Vec::new(),
                })
            });
        }
    })
}
