use std::collections::VecDeque;

use crate::shared::constants;

/// Rates derived from a window of intervals, in events per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateStats {
    pub avg_rate: f64,
    /// From the longest interval
    pub min_rate: f64,
    /// From the shortest interval
    pub max_rate: f64,
}

/// Bounded FIFO of inter-event intervals in milliseconds.
#[derive(Debug, Clone)]
pub struct RateWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RateWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one interval; non-positive (and NaN) samples are ignored.
    pub fn record_interval(&mut self, elapsed_ms: f64) {
        if !(elapsed_ms > 0.0) {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed_ms);
    }

    pub fn stats(&self) -> RateStats {
        if self.samples.is_empty() {
            return RateStats::default();
        }
        let sum: f64 = self.samples.iter().sum();
        let avg = sum / self.samples.len() as f64;
        let shortest = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let longest = self.samples.iter().copied().fold(0.0, f64::max);

        RateStats {
            avg_rate: rate_for(avg),
            min_rate: rate_for(longest),
            max_rate: rate_for(shortest),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(constants::RATE_WINDOW)
    }
}

fn rate_for(interval_ms: f64) -> f64 {
    if interval_ms > 0.0 && interval_ms.is_finite() {
        1000.0 / interval_ms
    } else {
        0.0
    }
}
