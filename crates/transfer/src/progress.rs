use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Sample {
    files: u32,
    timestamp: Instant,
}

/// Files-per-second estimate over a sliding window of settled chunks.
pub struct ThroughputMeter {
    inner: Mutex<MeterInner>,
}

struct MeterInner {
    started: Option<Instant>,
    samples: Vec<Sample>,
    max_samples: usize,
    window_size: Duration,
}

impl ThroughputMeter {
    /// Creates a meter.
    ///
    /// - `window_size`: time window for the estimate (default 60 s).
    /// - `max_samples`: maximum retained samples (default 50).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(MeterInner {
                started: None,
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(50),
                window_size: window_size.unwrap_or(Duration::from_secs(60)),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MeterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the instant work (re)started; the first sample is measured
    /// from here.
    pub fn start(&self) {
        let mut m = self.lock();
        m.started = Some(Instant::now());
        m.samples.clear();
    }

    /// Records `files` settled at the current instant.
    pub fn add_sample(&self, files: u32) {
        let mut m = self.lock();
        let now = Instant::now();
        if m.started.is_none() {
            m.started = Some(now);
        }
        m.samples.push(Sample {
            files,
            timestamp: now,
        });

        let cutoff = now.checked_sub(m.window_size).unwrap_or(now);
        m.samples.retain(|s| s.timestamp >= cutoff);

        if m.samples.len() > m.max_samples {
            let excess = m.samples.len() - m.max_samples;
            m.samples.drain(..excess);
        }
    }

    /// Average files/second within the window; 0.0 without samples.
    pub fn files_per_second(&self) -> f64 {
        let m = self.lock();
        let (Some(first), Some(last)) = (m.samples.first(), m.samples.last()) else {
            return 0.0;
        };

        // With a single sample, measure from the start mark.
        let (from, counted) = if m.samples.len() == 1 {
            match m.started {
                Some(start) => (start, first.files),
                None => return 0.0,
            }
        } else {
            let counted: u32 = m.samples.iter().skip(1).map(|s| s.files).sum();
            (first.timestamp, counted)
        };

        let elapsed = last.timestamp.duration_since(from);
        if elapsed.is_zero() {
            return 0.0;
        }
        f64::from(counted) / elapsed.as_secs_f64()
    }

    /// Estimated time to settle `remaining` files, `None` while unknown.
    pub fn eta(&self, remaining: usize) -> Option<Duration> {
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let rate = self.files_per_second();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }

    pub fn reset(&self) {
        let mut m = self.lock();
        m.started = None;
        m.samples.clear();
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn no_samples() {
        let meter = ThroughputMeter::default();
        assert_eq!(meter.files_per_second(), 0.0);
        assert!(meter.eta(5).is_none());
        assert_eq!(meter.eta(0), Some(Duration::ZERO));
    }

    #[test]
    fn single_sample_measured_from_start() {
        let meter = ThroughputMeter::default();
        meter.start();
        std::thread::sleep(Duration::from_millis(20));
        meter.add_sample(3);
        assert!(meter.files_per_second() > 0.0);
    }

    #[test]
    fn multiple_samples_give_eta() {
        let meter = ThroughputMeter::new(Some(Duration::from_secs(10)), None);
        meter.add_sample(3);
        std::thread::sleep(Duration::from_millis(30));
        meter.add_sample(3);

        assert!(meter.files_per_second() > 0.0);
        let eta = meter.eta(6).unwrap();
        assert!(eta.as_secs_f64() > 0.0);
    }

    #[test]
    fn reset_clears() {
        let meter = ThroughputMeter::default();
        meter.add_sample(1);
        meter.add_sample(1);
        meter.reset();
        assert_eq!(meter.files_per_second(), 0.0);
    }

    #[test]
    fn max_samples_bounded() {
        let meter = ThroughputMeter::new(Some(Duration::from_secs(60)), Some(5));
        for _ in 0..20 {
            meter.add_sample(1);
        }
        assert!(meter.lock().samples.len() <= 5);
    }

    #[test]
    fn concurrent_access() {
        let meter = Arc::new(ThroughputMeter::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&meter);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        m.add_sample(1);
                        let _ = m.eta(10);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let _ = meter.files_per_second();
    }
}
