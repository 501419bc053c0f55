//! Camera-follow collaborator.
//!
//! The world tells its camera which entity to follow whenever the hero is
//! (re)placed, and asks it for a pan at the start of every tick.

use crate::entity::EntityId;
use crate::grid::{Point, Rect, Size};

/// What the camera is asked to follow.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTarget {
    pub subject: EntityId,
    /// World size in pixels, for clamping.
    pub world: Size,
}

pub trait CameraFollow: Send + Sync {
    /// Rebind to a new subject.
    fn follow(&mut self, target: CameraTarget);

    fn subject(&self) -> Option<&EntityId>;

    /// The pan to apply given the subject's current bounds and the surface
    /// size. `None` leaves the pan untouched.
    fn pan_for(&self, subject_bounds: Rect, surface: Size) -> Option<Point>;
}

/// Horizontal follow camera: keeps the subject centred, clamped so the view
/// never leaves the world. Vertical pan stays at zero.
#[derive(Debug, Clone, Default)]
pub struct FollowCamera {
    target: Option<CameraTarget>,
}

impl FollowCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraFollow for FollowCamera {
    fn follow(&mut self, target: CameraTarget) {
        self.target = Some(target);
    }

    fn subject(&self) -> Option<&EntityId> {
        self.target.as_ref().map(|t| &t.subject)
    }

    fn pan_for(&self, subject_bounds: Rect, surface: Size) -> Option<Point> {
        let target = self.target.as_ref()?;
        let max_view = (target.world.width - surface.width).max(0.0);
        let view_x = (subject_bounds.center().x - surface.width / 2.0).clamp(0.0, max_view);
        Some(Point::new(-view_x, 0.0))
    }
}
