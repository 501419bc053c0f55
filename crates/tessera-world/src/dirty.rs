//! Background-dirty bookkeeping.
//!
//! The static background is rendered into a cached layer and only redrawn
//! when something it depends on changed: world attributes, the static set, or
//! the pan. Any number of invalidations between two draws coalesce into one
//! redraw.

use crate::grid::Point;

#[derive(Debug, Clone, PartialEq)]
pub struct DirtyTracker {
    background: bool,
    last_pan: Option<Point>,
}

impl Default for DirtyTracker {
    /// A fresh tracker is dirty: nothing has been rendered yet.
    fn default() -> Self {
        Self {
            background: true,
            last_pan: None,
        }
    }
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_background(&mut self) {
        self.background = true;
    }

    pub fn is_background_dirty(&self) -> bool {
        self.background
    }

    /// Record this tick's pan. Marks the background dirty and returns `true`
    /// when it differs from the pan observed on the previous call.
    pub fn observe_pan(&mut self, pan: Point) -> bool {
        let changed = self.last_pan != Some(pan);
        if changed {
            self.last_pan = Some(pan);
            self.background = true;
        }
        changed
    }

    /// Consume the dirty flag. Returns whether the background must be
    /// redrawn now.
    pub fn take_background(&mut self) -> bool {
        std::mem::replace(&mut self.background, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_dirty_and_clears_once() {
        let mut dirty = DirtyTracker::new();
        assert!(dirty.take_background());
        assert!(!dirty.take_background());
    }

    #[test]
    fn invalidations_coalesce() {
        let mut dirty = DirtyTracker::new();
        dirty.take_background();
        dirty.mark_background();
        dirty.mark_background();
        assert!(dirty.is_background_dirty());
        assert!(dirty.take_background());
        assert!(!dirty.is_background_dirty());
    }

    #[test]
    fn pan_change_is_detected_against_previous_tick() {
        let mut dirty = DirtyTracker::new();
        assert!(dirty.observe_pan(Point::ZERO));
        dirty.take_background();

        assert!(!dirty.observe_pan(Point::ZERO));
        assert!(!dirty.is_background_dirty());

        assert!(dirty.observe_pan(Point::new(-32.0, 0.0)));
        assert!(dirty.take_background());
    }
}
