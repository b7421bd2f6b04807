use std::time::{Duration, Instant};

use crate::config::EditorConfig;

pub const DEFAULT_PREVIEW_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_PREVIEW_FRAME: Duration = Duration::from_millis(16);

/// Decides when the host should re-render the preview.
///
/// Adjustment changes wait out a debounce window that restarts on every
/// change; every other change is drawn on the next frame. At most one
/// redraw is granted per frame interval.
#[derive(Debug, Clone)]
pub struct PreviewScheduler {
    debounce: Duration,
    frame: Duration,
    debounce_deadline: Option<Instant>,
    dirty: bool,
    last_redraw: Option<Instant>,
}

impl Default for PreviewScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_DEBOUNCE, DEFAULT_PREVIEW_FRAME)
    }
}

impl PreviewScheduler {
    pub fn new(debounce: Duration, frame: Duration) -> Self {
        Self {
            debounce,
            frame,
            debounce_deadline: None,
            dirty: false,
            last_redraw: None,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(
            Duration::from_millis(config.preview_debounce_ms),
            Duration::from_millis(config.preview_frame_ms),
        )
    }

    pub fn request_redraw(&mut self) {
        self.dirty = true;
    }

    pub fn request_debounced(&mut self, now: Instant) {
        self.debounce_deadline = Some(now + self.debounce);
    }

    pub fn is_pending(&self) -> bool {
        self.dirty || self.debounce_deadline.is_some()
    }

    /// Returns `true` when a redraw should happen at `now`, consuming the request.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.debounce_deadline {
            if now >= deadline {
                self.debounce_deadline = None;
                self.dirty = true;
            }
        }
        if !self.dirty {
            return false;
        }
        let frame_elapsed = self
            .last_redraw
            .map_or(true, |last| now.saturating_duration_since(last) >= self.frame);
        if !frame_elapsed {
            return false;
        }
        self.dirty = false;
        self.last_redraw = Some(now);
        true
    }

    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let frame_ready = self
            .last_redraw
            .map_or(now, |last| (last + self.frame).max(now));
        [
            self.dirty.then_some(frame_ready),
            self.debounce_deadline
                .map(|deadline| deadline.max(frame_ready)),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn cancel(&mut self) {
        self.dirty = false;
        self.debounce_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_requests_draw_on_first_poll() {
        let mut scheduler = PreviewScheduler::default();
        let now = Instant::now();
        assert!(!scheduler.poll(now));
        scheduler.request_redraw();
        assert!(scheduler.poll(now));
        assert!(!scheduler.poll(now));
    }

    #[test]
    fn redraws_are_throttled_to_one_per_frame() {
        let mut scheduler = PreviewScheduler::default();
        let start = Instant::now();
        scheduler.request_redraw();
        assert!(scheduler.poll(start));

        scheduler.request_redraw();
        assert!(!scheduler.poll(start + Duration::from_millis(10)));
        assert!(scheduler.is_pending());
        assert!(scheduler.poll(start + Duration::from_millis(16)));
    }

    #[test]
    fn adjustment_changes_wait_for_quiet_period() {
        let mut scheduler = PreviewScheduler::default();
        let start = Instant::now();
        scheduler.request_debounced(start);
        scheduler.request_debounced(start + Duration::from_millis(60));

        assert!(!scheduler.poll(start + Duration::from_millis(120)));
        assert_eq!(
            scheduler.next_deadline(start + Duration::from_millis(120)),
            Some(start + Duration::from_millis(160))
        );
        assert!(scheduler.poll(start + Duration::from_millis(160)));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn cancel_drops_pending_work() {
        let mut scheduler = PreviewScheduler::default();
        let now = Instant::now();
        scheduler.request_redraw();
        scheduler.request_debounced(now);
        scheduler.cancel();
        assert!(!scheduler.poll(now + Duration::from_secs(1)));
        assert_eq!(scheduler.next_deadline(now), None);
    }
}
