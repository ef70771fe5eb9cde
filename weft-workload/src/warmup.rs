// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The per-terminal warm-up / saturation detector.
//!
//! Every `interval` delivered flits the detector samples the terminal's
//! enroute flit count into a cyclic window. Once the window is full it
//! remembers the first window's maximum; any later sample exceeding three
//! times that value is an immediate saturation verdict (fast fail).
//! Otherwise each new sample runs a least-squares regression of enroute
//! count against sample time over the window: a non-positive slope means
//! the terminal is warmed, and `max_attempts` positive slopes in a row mean
//! it is saturated.

/// The detector's terminal verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Enroute count has stopped growing; steady state reached.
    Warmed,
    /// Enroute count grows without bound; offered load exceeds capacity.
    Saturated,
}

/// Least-squares slope of `values` against `times`.
pub fn slope(times: &[u64], values: &[u32]) -> f64 {
    assert_eq!(times.len(), values.len());
    let n = times.len() as f64;
    let sum_t: f64 = times.iter().map(|&t| t as f64).sum();
    let sum_v: f64 = values.iter().map(|&v| f64::from(v)).sum();
    let sum_tv: f64 = times
        .iter()
        .zip(values.iter())
        .map(|(&t, &v)| t as f64 * f64::from(v))
        .sum();
    let sum_tt: f64 = times.iter().map(|&t| t as f64 * t as f64).sum();

    let denominator = n * sum_tt - sum_t * sum_t;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sum_tv - sum_t * sum_v) / denominator
}

/// Sliding-window warm-up / saturation detector for one terminal.
pub struct WarmupDetector {
    interval: u32,
    window: usize,
    max_attempts: u32,

    flits_seen: u32,
    attempts: u32,
    sample_times: Vec<u64>,
    sample_values: Vec<u32>,
    sample_pos: usize,
    fast_fail_sample: Option<u32>,
}

impl WarmupDetector {
    /// `interval == 0` disables sampling: the first delivery warms.
    #[must_use]
    pub fn new(interval: u32, window: usize, max_attempts: u32) -> Self {
        assert!(window >= 5, "warmup window must hold at least 5 samples");
        assert!(max_attempts > 0);
        Self {
            interval,
            window,
            max_attempts,
            flits_seen: 0,
            attempts: 0,
            sample_times: Vec::new(),
            sample_values: Vec::new(),
            sample_pos: 0,
            fast_fail_sample: None,
        }
    }

    /// Account `num_flits` delivered flits with the terminal currently
    /// holding `enroute_flits` in flight, at channel cycle `now_cycle`.
    pub fn delivered(
        &mut self,
        num_flits: u32,
        enroute_flits: u32,
        now_cycle: u64,
    ) -> Option<Verdict> {
        if self.interval == 0 {
            return Some(Verdict::Warmed);
        }
        debug_assert!(self.interval >= 2 * num_flits);

        self.flits_seen += num_flits;
        if self.flits_seen < self.interval {
            return None;
        }
        self.flits_seen %= self.interval;

        if self.sample_times.len() < self.window {
            self.sample_times.push(now_cycle);
            self.sample_values.push(enroute_flits);
        } else {
            self.sample_times[self.sample_pos] = now_cycle;
            self.sample_values[self.sample_pos] = enroute_flits;
            self.sample_pos = (self.sample_pos + 1) % self.window;
        }

        if self.sample_times.len() < self.window {
            return None;
        }

        let mut saturated = false;
        let mut warmed = false;

        // Fast fail for early saturation detection.
        match self.fast_fail_sample {
            None => {
                self.fast_fail_sample = Some(*self.sample_values.iter().max().unwrap());
            }
            Some(reference) => {
                if enroute_flits > reference * 3 {
                    saturated = true;
                }
            }
        }

        // Sliding-window regression.
        self.attempts += 1;
        let growth_rate = slope(&self.sample_times, &self.sample_values);
        if growth_rate <= 0.0 {
            warmed = true;
        } else if self.attempts == self.max_attempts {
            saturated = true;
        }

        if saturated {
            self.clear_samples();
            Some(Verdict::Saturated)
        } else if warmed {
            self.clear_samples();
            Some(Verdict::Warmed)
        } else {
            None
        }
    }

    fn clear_samples(&mut self) {
        self.sample_times.clear();
        self.sample_values.clear();
        self.sample_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_known_lines() {
        assert_eq!(slope(&[0, 1, 2, 3], &[0, 2, 4, 6]), 2.0);
        assert_eq!(slope(&[0, 1, 2, 3], &[6, 4, 2, 0]), -2.0);
        assert_eq!(slope(&[0, 1, 2, 3], &[5, 5, 5, 5]), 0.0);
    }

    #[test]
    fn interval_zero_warms_immediately() {
        let mut detector = WarmupDetector::new(0, 5, 10);
        assert_eq!(detector.delivered(1, 100, 0), Some(Verdict::Warmed));
    }

    #[test]
    fn flat_enroute_warms_when_the_window_fills() {
        let mut detector = WarmupDetector::new(10, 5, 20);
        for i in 0..4 {
            assert_eq!(detector.delivered(10, 50, i * 100), None);
        }
        // The fifth sample fills the window; slope is zero.
        assert_eq!(detector.delivered(10, 50, 400), Some(Verdict::Warmed));
    }

    #[test]
    fn sub_interval_deliveries_accumulate() {
        let mut detector = WarmupDetector::new(10, 5, 20);
        // 5 flits at a time: every second delivery takes a sample.
        for i in 0u64..9 {
            assert_eq!(detector.delivered(5, 40, u64::from(i)), None);
        }
        assert_eq!(detector.delivered(5, 40, 9), Some(Verdict::Warmed));
    }

    #[test]
    fn persistent_growth_saturates() {
        let mut detector = WarmupDetector::new(10, 5, 3);
        let mut verdict = None;
        let mut enroute = 10;
        for i in 0..20 {
            enroute += 2;
            verdict = detector.delivered(10, enroute, i * 100);
            if verdict.is_some() {
                break;
            }
        }
        // Window full at sample 5 (attempt 1); attempts 2 and 3 still grow.
        assert_eq!(verdict, Some(Verdict::Saturated));
    }

    #[test]
    fn fast_fail_trips_on_a_spike() {
        let mut detector = WarmupDetector::new(10, 5, 100);
        // Gentle growth: fills the window (max 18) without warming.
        for (i, enroute) in [10, 12, 14, 16, 18].iter().enumerate() {
            assert_eq!(detector.delivered(10, *enroute, i as u64 * 100), None);
        }
        assert_eq!(detector.delivered(10, 20, 500), None);
        // 60 > 3 * 18: immediate saturation regardless of attempts left.
        assert_eq!(detector.delivered(10, 60, 600), Some(Verdict::Saturated));
    }
}
