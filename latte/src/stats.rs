//! Descriptive statistics computed over a cleaned, sorted sample sequence.

use std::fmt;

/// Summary statistics for one measurement site's cleaned sample sequence.
///
/// All fields are in the same unit as the input samples handed to
/// [`Stats::compute`] — cycles or nanoseconds, depending on which the caller
/// requested from the Reporter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub samples: usize,
    pub avg: f64,
    pub median: f64,
    pub std_dev: f64,
    pub skew: f64,
    pub min: u64,
    pub max: u64,
    pub range: u64,
    pub bypass: usize,
}

impl Stats {
    /// Compute statistics over `sorted`, an already-cleaned, ascending
    /// sequence (as produced by [`crate::clean::clean`]), plus the bypass
    /// count the cleaner removed.
    ///
    /// Returns `None` for an empty sequence: there is nothing to report.
    pub fn compute(sorted: &[u64], bypass: usize) -> Option<Stats> {
        let n = sorted.len();
        if n == 0 {
            return None;
        }

        let sum: f64 = sorted.iter().map(|&v| v as f64).sum();
        let avg = sum / n as f64;

        let median = if n % 2 == 1 {
            sorted[n / 2] as f64
        } else {
            (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
        };

        let variance: f64 = sorted
            .iter()
            .map(|&v| {
                let d = v as f64 - avg;
                d * d
            })
            .sum::<f64>()
            / n as f64;
        let std_dev = variance.sqrt();

        let skew = if n > 1 && std_dev > 1e-9 {
            let third: f64 = sorted
                .iter()
                .map(|&v| {
                    let d = v as f64 - avg;
                    d * d * d
                })
                .sum::<f64>()
                / n as f64;
            third / (std_dev * std_dev * std_dev)
        } else {
            0.0
        };

        let min = sorted[0];
        let max = sorted[n - 1];

        Some(Stats {
            samples: n,
            avg,
            median,
            std_dev,
            skew,
            min,
            max,
            range: max - min,
            bypass,
        })
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} avg={:.2} median={:.2} std_dev={:.2} skew={:.2} min={} max={} range={} bypass={}",
            self.samples,
            self.avg,
            self.median,
            self.std_dev,
            self.skew,
            self.min,
            self.max,
            self.range,
            self.bypass
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_length_median_is_middle_element() {
        let s = Stats::compute(&[1, 2, 3, 4, 5], 0).unwrap();
        assert_eq!(s.median, 3.0);
        assert_eq!(s.avg, 3.0);
        assert_eq!(s.min, 1);
        assert_eq!(s.max, 5);
        assert_eq!(s.range, 4);
    }

    #[test]
    fn even_length_median_is_mean_of_middles() {
        let s = Stats::compute(&[1, 2, 3, 4], 0).unwrap();
        assert_eq!(s.median, 2.5);
    }

    #[test]
    fn single_sample_has_zero_skew_and_std_dev() {
        let s = Stats::compute(&[42], 3).unwrap();
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.skew, 0.0);
        assert_eq!(s.bypass, 3);
    }

    #[test]
    fn empty_input_is_none() {
        assert!(Stats::compute(&[], 0).is_none());
    }

    proptest::proptest! {
        #[test]
        fn avg_and_median_always_fall_within_min_and_max(
            mut samples in proptest::collection::vec(1u64..1_000_000, 1..500)
        ) {
            samples.sort_unstable();
            let s = Stats::compute(&samples, 0).unwrap();
            let min = samples[0] as f64;
            let max = samples[samples.len() - 1] as f64;
            proptest::prop_assert!(s.avg >= min && s.avg <= max);
            proptest::prop_assert!(s.median >= min && s.median <= max);
            proptest::prop_assert_eq!(s.min, samples[0]);
            proptest::prop_assert_eq!(s.max, samples[samples.len() - 1]);
            proptest::prop_assert!(s.std_dev >= 0.0);
        }
    }
}
