use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub worst_frame_ms: f32,
    pub dropped_backlog_ms: u64,
}

/// Counts frames and ticks over a fixed wall-clock window.
#[derive(Debug)]
pub(crate) struct StatsWindow {
    started: Instant,
    length: Duration,
    frames: u32,
    ticks: u32,
    frame_time_sum: Duration,
    worst_frame: Duration,
    dropped_backlog: Duration,
}

impl StatsWindow {
    pub(crate) fn new(length: Duration, now: Instant) -> Self {
        Self {
            started: now,
            length,
            frames: 0,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
            worst_frame: Duration::ZERO,
            dropped_backlog: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
        self.worst_frame = self.worst_frame.max(frame_dt);
    }

    pub(crate) fn record_ticks(&mut self, ticks: u32) {
        self.ticks = self.ticks.saturating_add(ticks);
    }

    pub(crate) fn record_dropped_backlog(&mut self, dropped: Duration) {
        self.dropped_backlog = self.dropped_backlog.saturating_add(dropped);
    }

    /// Closes the window once `length` has elapsed and starts the next one at `now`.
    pub(crate) fn roll(&mut self, now: Instant) -> Option<LoopStats> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.length {
            return None;
        }

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match self.frames {
            0 => 0.0,
            frames => self.frame_time_sum.as_secs_f32() * 1000.0 / frames as f32,
        };
        let stats = LoopStats {
            fps: self.frames as f32 / seconds,
            tps: self.ticks as f32 / seconds,
            frame_time_ms,
            worst_frame_ms: self.worst_frame.as_secs_f32() * 1000.0,
            dropped_backlog_ms: self.dropped_backlog.as_millis() as u64,
        };
        *self = Self::new(self.length, now);
        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_reports_rates_over_the_window() {
        let base = Instant::now();
        let mut window = StatsWindow::new(Duration::from_secs(1), base);
        window.record_frame(Duration::from_millis(30));
        window.record_frame(Duration::from_millis(40));
        window.record_ticks(3);
        window.record_dropped_backlog(Duration::from_millis(12));

        let stats = window
            .roll(base + Duration::from_secs(1))
            .expect("window elapsed");

        assert!((stats.fps - 2.0).abs() < 0.05);
        assert!((stats.tps - 3.0).abs() < 0.05);
        assert!((stats.frame_time_ms - 35.0).abs() < 0.01);
        assert!((stats.worst_frame_ms - 40.0).abs() < 0.01);
        assert_eq!(stats.dropped_backlog_ms, 12);
    }

    #[test]
    fn roll_waits_for_the_window_and_then_resets() {
        let base = Instant::now();
        let mut window = StatsWindow::new(Duration::from_secs(1), base);
        window.record_ticks(5);

        assert!(window.roll(base + Duration::from_millis(400)).is_none());
        assert!(window.roll(base + Duration::from_secs(1)).is_some());

        let next = window
            .roll(base + Duration::from_secs(2))
            .expect("second window");
        assert_eq!(next.tps, 0.0);
        assert_eq!(next.fps, 0.0);
    }
}
