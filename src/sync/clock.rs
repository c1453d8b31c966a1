use std::sync::Mutex;
use std::time::Instant;

use super::rate::{RateStats, RateWindow};
use crate::shared::constants;

/// Monotonic stopwatch measuring the gap between consecutive events.
#[derive(Debug, Default)]
pub struct IntervalTimer {
    last: Option<Instant>,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Milliseconds since the previous restart, `None` on the first call.
    pub fn restart_at(&mut self, now: Instant) -> Option<f64> {
        let elapsed = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f64() * 1000.0);
        self.last = Some(now);
        elapsed
    }
}

/// Timer plus the window its intervals land in.
#[derive(Debug)]
pub struct Cadence {
    timer: IntervalTimer,
    window: RateWindow,
}

impl Cadence {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timer: IntervalTimer::new(),
            window: RateWindow::new(capacity),
        }
    }

    pub fn record_event(&mut self) {
        self.record_event_at(Instant::now());
    }

    pub fn record_event_at(&mut self, now: Instant) {
        if let Some(elapsed) = self.timer.restart_at(now) {
            self.window.record_interval(elapsed);
        }
    }

    pub fn stats(&self) -> RateStats {
        self.window.stats()
    }

    #[cfg(test)]
    pub fn samples(&self) -> usize {
        self.window.len()
    }
}

/// Arrival and render cadence of the viewer.
///
/// Arrivals are recorded on the transport thread, renders on the UI thread,
/// so each side sits behind its own lock and never contends with the other.
#[derive(Debug)]
pub struct FrameClock {
    arrival: Mutex<Cadence>,
    render: Mutex<Cadence>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_capacity(constants::RATE_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arrival: Mutex::new(Cadence::with_capacity(capacity)),
            render: Mutex::new(Cadence::with_capacity(capacity)),
        }
    }

    pub fn record_arrival(&self) {
        lock(&self.arrival).record_event();
    }

    pub fn record_render(&self) {
        lock(&self.render).record_event();
    }

    pub fn arrival_stats(&self) -> RateStats {
        lock(&self.arrival).stats()
    }

    pub fn render_stats(&self) -> RateStats {
        lock(&self.render).stats()
    }
}

fn lock(cadence: &Mutex<Cadence>) -> std::sync::MutexGuard<'_, Cadence> {
    match cadence.lock() {
        Ok(c) => c,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_restart_has_no_interval() {
        let mut timer = IntervalTimer::new();
        let t0 = Instant::now();
        assert_eq!(timer.restart_at(t0), None);
        let elapsed = timer.restart_at(t0 + Duration::from_millis(25)).unwrap();
        assert!((elapsed - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_backwards_clock_reads_zero() {
        let mut timer = IntervalTimer::new();
        let t0 = Instant::now() + Duration::from_millis(50);
        timer.restart_at(t0);
        assert_eq!(timer.restart_at(t0 - Duration::from_millis(10)), Some(0.0));
    }

    #[test]
    fn test_cadence_skips_first_and_zero_intervals() {
        let mut cadence = Cadence::with_capacity(8);
        let t0 = Instant::now();
        cadence.record_event_at(t0);
        cadence.record_event_at(t0);
        assert_eq!(cadence.samples(), 0);

        cadence.record_event_at(t0 + Duration::from_millis(10));
        cadence.record_event_at(t0 + Duration::from_millis(30));
        assert_eq!(cadence.samples(), 2);
        let stats = cadence.stats();
        assert!((stats.max_rate - 100.0).abs() < 1e-6);
        assert!((stats.min_rate - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_arrival_and_render_are_independent() {
        let clock = FrameClock::with_capacity(8);
        clock.record_arrival();
        std::thread::sleep(Duration::from_millis(2));
        clock.record_arrival();

        assert!(clock.arrival_stats().avg_rate > 0.0);
        assert_eq!(clock.render_stats(), RateStats::default());
    }
}
