// frame_loop.rs - render loop driven by an explicit running flag instead of self-rescheduling callbacks

use crate::config::FrameTiming;
use std::time::{Duration, Instant};

/// Frame interval assumed by fixed timing (~60 fps).
pub const ASSUMED_FRAME_INTERVAL: f32 = 0.016;

/// Longest step measured timing will report, so a stalled window does not spin the sphere.
pub const MAX_MEASURED_INTERVAL: Duration = Duration::from_millis(100);

/// Host mechanism that delivers the next frame (a redraw request for a window).
pub trait FrameScheduler {
    /// Ask for one more frame.
    fn schedule(&mut self);
    /// Drop a frame that was asked for but has not been delivered.
    fn cancel(&mut self);
}

/// Scheduler for windowed hosts: every request goes to the window immediately, so a frame
/// asked for while a frame is being drawn still arrives once the event loop goes idle.
///
/// Window systems cannot withdraw a redraw request; one that lands after [`FrameLoop::cancel`]
/// finds the loop stopped and draws nothing.
pub struct RedrawScheduler<F: FnMut()> {
    request_redraw: F,
    requested: u64,
}

impl<F: FnMut()> RedrawScheduler<F> {
    pub fn new(request_redraw: F) -> Self {
        Self {
            request_redraw,
            requested: 0,
        }
    }

    /// Redraws requested so far.
    pub fn requested(&self) -> u64 {
        self.requested
    }
}

impl<F: FnMut()> FrameScheduler for RedrawScheduler<F> {
    fn schedule(&mut self) {
        self.requested += 1;
        (self.request_redraw)();
    }

    fn cancel(&mut self) {
        log::trace!("render loop cancelled after {} redraw requests", self.requested);
    }
}

#[derive(Debug)]
pub struct FrameLoop {
    running: bool,
    timing: FrameTiming,
    last_frame: Option<Instant>,
    frames: u64,
}

impl FrameLoop {
    pub fn new(timing: FrameTiming) -> Self {
        Self {
            running: false,
            timing,
            last_frame: None,
            frames: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Start the loop and request its first frame. No-op if already running.
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_frame = None;
        scheduler.schedule();
    }

    /// Begin a frame. Returns the time step to simulate, or `None` once cancelled.
    pub fn begin(&mut self, now: Instant) -> Option<f32> {
        if !self.running {
            return None;
        }
        let dt = match self.timing {
            FrameTiming::Fixed => ASSUMED_FRAME_INTERVAL,
            FrameTiming::Measured => match self.last_frame {
                Some(prev) => now
                    .saturating_duration_since(prev)
                    .min(MAX_MEASURED_INTERVAL)
                    .as_secs_f32(),
                None => ASSUMED_FRAME_INTERVAL,
            },
        };
        self.last_frame = Some(now);
        self.frames += 1;
        Some(dt)
    }

    /// Finish a frame, requesting the next one while still running.
    pub fn end(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.running {
            scheduler.schedule();
        }
    }

    /// Stop the loop and withdraw any pending frame request.
    pub fn cancel(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.running {
            self.running = false;
            scheduler.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct Counter {
        scheduled: u32,
        cancelled: u32,
    }

    impl FrameScheduler for Counter {
        fn schedule(&mut self) {
            self.scheduled += 1;
        }
        fn cancel(&mut self) {
            self.cancelled += 1;
        }
    }

    #[test]
    fn loop_reschedules_each_frame_until_cancelled() {
        let mut sched = Counter::default();
        let mut lp = FrameLoop::new(FrameTiming::Fixed);
        assert_eq!(lp.begin(Instant::now()), None);

        lp.start(&mut sched);
        lp.start(&mut sched);
        assert_eq!(sched.scheduled, 1);

        for _ in 0..3 {
            assert_eq!(lp.begin(Instant::now()), Some(ASSUMED_FRAME_INTERVAL));
            lp.end(&mut sched);
        }
        assert_eq!(sched.scheduled, 4);

        lp.cancel(&mut sched);
        lp.cancel(&mut sched);
        assert_eq!(sched.cancelled, 1);
        assert_eq!(lp.begin(Instant::now()), None);
        lp.end(&mut sched);
        assert_eq!(sched.scheduled, 4);
        assert_eq!(lp.frames(), 3);
    }

    #[test]
    fn redraw_scheduler_requests_without_waiting_for_the_next_iteration() {
        let mut redraws = 0;
        {
            let mut sched = RedrawScheduler::new(|| redraws += 1);
            let mut lp = FrameLoop::new(FrameTiming::Fixed);
            lp.start(&mut sched);
            for _ in 0..5 {
                lp.begin(Instant::now());
                lp.end(&mut sched);
            }
            assert_eq!(sched.requested(), 6);
            lp.cancel(&mut sched);
            lp.end(&mut sched);
            assert_eq!(sched.requested(), 6);
        }
        assert_eq!(redraws, 6);
    }

    #[test]
    fn measured_timing_uses_elapsed_time() {
        let mut sched = Counter::default();
        let mut lp = FrameLoop::new(FrameTiming::Measured);
        lp.start(&mut sched);
        let t0 = Instant::now();
        assert_eq!(lp.begin(t0), Some(ASSUMED_FRAME_INTERVAL));
        let dt = lp.begin(t0 + Duration::from_millis(33)).unwrap();
        assert_relative_eq!(dt, 0.033, epsilon = 1e-6);
        let dt = lp.begin(t0 + Duration::from_secs(5)).unwrap();
        assert_relative_eq!(dt, 0.1, epsilon = 1e-6);
    }
}
