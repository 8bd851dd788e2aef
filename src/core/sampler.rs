use serde::{Deserialize, Serialize};

/// How frame indices are picked from a finished recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMethod {
    /// `count` indices spread uniformly over the whole video.
    EvenlySpaced,
    /// Every `stride`-th frame from 0, at most `count` of them.
    Interval,
}

impl std::fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplingMethod::EvenlySpaced => write!(f, "evenly_spaced"),
            SamplingMethod::Interval => write!(f, "interval"),
        }
    }
}

/// Frame indices to extract from a video of `total` frames.
///
/// Evenly spaced yields exactly `min(count, total)` strictly increasing
/// indices in `[0, total)`.
pub fn sample_indices(method: SamplingMethod, total: u64, count: usize, stride: usize) -> Vec<u64> {
    let count = count as u64;
    match method {
        SamplingMethod::EvenlySpaced => {
            if count >= total {
                (0..total).collect()
            } else {
                // u128 keeps i * total exact for any realistic frame count.
                (0..count)
                    .map(|i| (i as u128 * total as u128 / count as u128) as u64)
                    .collect()
            }
        }
        SamplingMethod::Interval => (0..total)
            .step_by(stride.max(1))
            .take(count as usize)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evenly_spaced_hundred_by_ten() {
        let indices = sample_indices(SamplingMethod::EvenlySpaced, 100, 10, 30);
        assert_eq!(indices, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[test]
    fn test_request_exceeds_available() {
        let indices = sample_indices(SamplingMethod::EvenlySpaced, 5, 10, 30);
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_evenly_spaced_properties() {
        for total in [0u64, 1, 2, 3, 7, 31, 100, 101, 997, 4650] {
            for count in [1usize, 2, 3, 10, 99, 100, 5000] {
                let indices = sample_indices(SamplingMethod::EvenlySpaced, total, count, 1);
                assert_eq!(indices.len() as u64, total.min(count as u64), "T={} N={}", total, count);
                assert!(indices.windows(2).all(|w| w[0] < w[1]), "T={} N={}", total, count);
                assert!(indices.iter().all(|&i| i < total), "T={} N={}", total, count);
                if !indices.is_empty() {
                    assert_eq!(indices[0], 0);
                }
            }
        }
    }

    #[test]
    fn test_zero_frames_yields_nothing() {
        assert!(sample_indices(SamplingMethod::EvenlySpaced, 0, 100, 30).is_empty());
        assert!(sample_indices(SamplingMethod::Interval, 0, 100, 30).is_empty());
    }

    #[test]
    fn test_interval_stride_and_cap() {
        assert_eq!(sample_indices(SamplingMethod::Interval, 100, 100, 30), vec![0, 30, 60, 90]);
        assert_eq!(sample_indices(SamplingMethod::Interval, 1000, 3, 30), vec![0, 30, 60]);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&SamplingMethod::EvenlySpaced).unwrap(), "\"evenly_spaced\"");
        let method: SamplingMethod = serde_json::from_str("\"interval\"").unwrap();
        assert_eq!(method, SamplingMethod::Interval);
    }
}
