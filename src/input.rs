// input.rs - pointer drag tracking and wheel / pinch normalisation

/// Cursor shown over the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAffordance {
    Grab,
    Grabbing,
}

/// Pointer state between move events. Each move yields only the delta since the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragState {
    active: bool,
    last: (f64, f64),
}

impl DragState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn press(&mut self, x: f64, y: f64) {
        self.active = true;
        self.last = (x, y);
    }

    /// Delta from the last recorded position, or `None` when no drag is in progress.
    pub fn move_to(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !self.active {
            return None;
        }
        let delta = (x - self.last.0, y - self.last.1);
        self.last = (x, y);
        Some(delta)
    }

    pub fn release(&mut self) {
        self.active = false;
    }

    pub fn cursor(&self) -> CursorAffordance {
        if self.active {
            CursorAffordance::Grabbing
        } else {
            CursorAffordance::Grab
        }
    }
}

/// Map a scroll amount (positive = wheel away from the user) to a zoom step.
/// Zero scroll produces nothing.
pub fn zoom_from_scroll(scroll_y: f32) -> Option<crate::camera::ZoomDirection> {
    use crate::camera::ZoomDirection;
    if scroll_y > 0.0 {
        Some(ZoomDirection::In)
    } else if scroll_y < 0.0 {
        Some(ZoomDirection::Out)
    } else {
        None
    }
}

/// Accumulates touchpad magnification into whole zoom steps.
#[derive(Debug, Default)]
pub struct PinchAccumulator {
    pending: f64,
}

impl PinchAccumulator {
    /// Magnification that counts as one zoom step.
    pub const STEP: f64 = 0.05;

    /// Feed a magnify delta; returns how many steps to zoom in (positive) or out (negative),
    /// never more than `max_steps` either way. Non-finite deltas are dropped.
    pub fn feed(&mut self, delta: f64, max_steps: u32) -> i32 {
        if !delta.is_finite() {
            return 0;
        }
        self.pending += delta;
        let steps = (self.pending / Self::STEP).trunc();
        let limit = f64::from(max_steps);
        if steps.abs() > limit {
            // the FOV clamp swallows the rest of the gesture anyway
            self.pending = 0.0;
            return steps.clamp(-limit, limit) as i32;
        }
        self.pending -= steps * Self::STEP;
        steps as i32
    }

    pub fn reset(&mut self) {
        self.pending = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ZoomDirection;

    #[test]
    fn moves_report_incremental_deltas() {
        let mut drag = DragState::default();
        drag.press(100.0, 100.0);
        assert_eq!(drag.move_to(110.0, 108.0), Some((10.0, 8.0)));
        assert_eq!(drag.move_to(105.0, 120.0), Some((-5.0, 12.0)));
    }

    #[test]
    fn moves_without_press_are_ignored() {
        let mut drag = DragState::default();
        assert_eq!(drag.move_to(10.0, 10.0), None);
        drag.press(0.0, 0.0);
        drag.release();
        assert_eq!(drag.move_to(10.0, 10.0), None);
    }

    #[test]
    fn cursor_follows_drag() {
        let mut drag = DragState::default();
        assert_eq!(drag.cursor(), CursorAffordance::Grab);
        drag.press(1.0, 1.0);
        assert_eq!(drag.cursor(), CursorAffordance::Grabbing);
        drag.release();
        assert_eq!(drag.cursor(), CursorAffordance::Grab);
    }

    #[test]
    fn scroll_sign_picks_zoom_direction() {
        assert_eq!(zoom_from_scroll(1.0), Some(ZoomDirection::In));
        assert_eq!(zoom_from_scroll(-0.5), Some(ZoomDirection::Out));
        assert_eq!(zoom_from_scroll(0.0), None);
    }

    #[test]
    fn pinch_accumulates_small_deltas() {
        let mut pinch = PinchAccumulator::default();
        assert_eq!(pinch.feed(0.03, 35), 0);
        assert_eq!(pinch.feed(0.03, 35), 1);
        assert_eq!(pinch.feed(-0.12, 35), -2);
    }

    #[test]
    fn pinch_is_bounded_and_ignores_non_finite_deltas() {
        let mut pinch = PinchAccumulator::default();
        assert_eq!(pinch.feed(1e12, 35), 35);
        assert_eq!(pinch.feed(-1e300, 35), -35);
        assert_eq!(pinch.feed(f64::NAN, 35), 0);
        assert_eq!(pinch.feed(f64::INFINITY, 35), 0);
        // nothing left over from the clamped or dropped deltas
        assert_eq!(pinch.feed(0.03, 35), 0);
        assert_eq!(pinch.feed(0.03, 35), 1);
    }
}
