//! Render duration tracking in frame units.
//!
//! Durations are normalized against the session's frame budget: 1.0 means
//! the frame took exactly one display period, anything above it is an
//! overrun. Normalizing keeps the numbers comparable across sessions with
//! different refresh rates.

use std::collections::VecDeque;
use std::time::Duration;

const WINDOW: usize = 240;

/// Rolling statistics over the most recent frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTimingStats {
    pub frames: usize,
    pub p50_units: f32,
    pub p95_units: f32,
    pub p99_units: f32,
    /// Frames in the window that exceeded their budget.
    pub overruns: usize,
}

/// Records normalized render durations over a rolling window.
pub struct RenderTiming {
    budget: Duration,
    samples: VecDeque<f32>,
    total_frames: u64,
    total_overruns: u64,
}

impl RenderTiming {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            samples: VecDeque::with_capacity(WINDOW),
            total_frames: 0,
            total_overruns: 0,
        }
    }

    /// Record one frame's render duration and return it in frame units.
    pub fn record(&mut self, elapsed: Duration) -> f32 {
        let units = if self.budget.is_zero() {
            0.0
        } else {
            elapsed.as_secs_f32() / self.budget.as_secs_f32()
        };

        if self.samples.len() == WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(units);
        self.total_frames += 1;
        if units > 1.0 {
            self.total_overruns += 1;
            tracing::debug!(units, "frame overran its budget");
        }
        units
    }

    pub fn stats(&self) -> Option<RenderTimingStats> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let percentile = |p: f64| {
            let rank = ((sorted.len() as f64 * p).ceil() as usize).clamp(1, sorted.len());
            sorted[rank - 1]
        };

        Some(RenderTimingStats {
            frames: sorted.len(),
            p50_units: percentile(0.50),
            p95_units: percentile(0.95),
            p99_units: percentile(0.99),
            overruns: self.samples.iter().filter(|&&u| u > 1.0).count(),
        })
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn total_overruns(&self) -> u64 {
        self.total_overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> Duration {
        // 90 Hz display period.
        Duration::from_secs_f64(1.0 / 90.0)
    }

    #[test]
    fn test_record_normalizes_against_budget() {
        let mut timing = RenderTiming::new(budget());
        let units = timing.record(Duration::from_secs_f64(1.0 / 180.0));
        assert!((units - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_overrun_counted_above_one_unit() {
        let mut timing = RenderTiming::new(budget());
        timing.record(Duration::from_secs_f64(1.0 / 90.0 * 0.8));
        timing.record(Duration::from_secs_f64(1.0 / 90.0 * 1.5));
        timing.record(Duration::from_secs_f64(1.0 / 90.0 * 1.1));
        assert_eq!(timing.total_overruns(), 2);
        assert_eq!(timing.total_frames(), 3);
    }

    #[test]
    fn test_percentiles_over_known_distribution() {
        let mut timing = RenderTiming::new(budget());
        // 100 frames: units 0.01 ..= 1.00.
        for i in 1..=100u32 {
            timing.record(budget().mul_f64(f64::from(i) / 100.0));
        }
        let stats = timing.stats().unwrap();
        assert_eq!(stats.frames, 100);
        assert!((stats.p50_units - 0.50).abs() < 1e-2);
        assert!((stats.p95_units - 0.95).abs() < 1e-2);
        assert!((stats.p99_units - 0.99).abs() < 1e-2);
        assert_eq!(stats.overruns, 0);
    }

    #[test]
    fn test_window_keeps_only_recent_frames() {
        let mut timing = RenderTiming::new(budget());
        for _ in 0..WINDOW {
            timing.record(budget().mul_f64(2.0)); // all overruns
        }
        for _ in 0..WINDOW {
            timing.record(budget().mul_f64(0.5));
        }
        let stats = timing.stats().unwrap();
        assert_eq!(stats.frames, WINDOW);
        assert_eq!(stats.overruns, 0);
        assert_eq!(timing.total_overruns(), WINDOW as u64);
    }

    #[test]
    fn test_empty_has_no_stats() {
        let timing = RenderTiming::new(budget());
        assert!(timing.stats().is_none());
    }

    #[test]
    fn test_zero_budget_records_zero_units() {
        let mut timing = RenderTiming::new(Duration::ZERO);
        assert_eq!(timing.record(Duration::from_millis(5)), 0.0);
    }
}
