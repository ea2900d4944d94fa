use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERIES_LENGTH: usize = 20;

/// One point of a synthetic trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub time_label: String,  // Cosmetic half-hour label derived from the index
    pub value: f64,
}

/// `HH:MM` label for the point at `index`, in half-hour steps from 00:00
pub fn time_label(index: usize) -> String {
    let minutes = index * 30;
    format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
}

/// Uniform offset in `[-variance/2, +variance/2]`
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, variance: f64) -> f64 {
    let half = variance.abs() / 2.0;
    rng.gen_range(-half..=half)
}

/// Fresh random series of `length` points scattered around `baseline`.
pub fn generate_series(baseline: f64, variance: f64, length: usize) -> Vec<TrendPoint> {
    generate_series_with(&mut rand::thread_rng(), baseline, variance, length)
}

pub fn generate_series_with<R: Rng + ?Sized>(
    rng: &mut R,
    baseline: f64,
    variance: f64,
    length: usize,
) -> Vec<TrendPoint> {
    (0..length)
        .map(|i| TrendPoint {
            time_label: time_label(i),
            value: baseline + jitter(rng, variance),
        })
        .collect()
}

/// Slide the window by one point: the oldest point is dropped and a new
/// one is appended at the previous endpoint plus a bounded random step.
///
/// Labels are recomputed from the index so the window always reads from
/// 00:00. An empty series stays empty.
pub fn advance_series(previous: &[TrendPoint], drift_variance: f64) -> Vec<TrendPoint> {
    advance_series_with(&mut rand::thread_rng(), previous, drift_variance)
}

pub fn advance_series_with<R: Rng + ?Sized>(
    rng: &mut R,
    previous: &[TrendPoint],
    drift_variance: f64,
) -> Vec<TrendPoint> {
    let Some(last) = previous.last() else {
        return Vec::new();
    };
    let next = last.value + jitter(rng, drift_variance);

    previous
        .iter()
        .skip(1)
        .map(|point| point.value)
        .chain(std::iter::once(next))
        .enumerate()
        .map(|(i, value)| TrendPoint {
            time_label: time_label(i),
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_time_labels() {
        assert_eq!(time_label(0), "00:00");
        assert_eq!(time_label(1), "00:30");
        assert_eq!(time_label(3), "01:30");
        assert_eq!(time_label(19), "09:30");
        assert_eq!(time_label(48), "00:00");
    }

    #[test]
    fn test_generate_series_bounds() {
        let series = generate_series(72.0, 15.0, 20);
        assert_eq!(series.len(), 20);
        for point in &series {
            assert!(point.value >= 64.5 && point.value <= 79.5, "{} out of range", point.value);
        }
        assert_eq!(series[0].time_label, "00:00");
        assert_eq!(series[19].time_label, "09:30");
    }

    #[test]
    fn test_generate_series_is_not_repeatable() {
        let a = generate_series(72.0, 15.0, DEFAULT_SERIES_LENGTH);
        let b = generate_series(72.0, 15.0, DEFAULT_SERIES_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_variance_is_flat() {
        let series = generate_series(16.0, 0.0, 5);
        assert!(series.iter().all(|p| p.value == 16.0));
    }

    #[test]
    fn test_advance_preserves_length() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut series = generate_series_with(&mut rng, 98.0, 3.0, 20);

        for _ in 0..100 {
            let next = advance_series_with(&mut rng, &series, 1.0);
            assert_eq!(next.len(), 20);
            // The window shifts left by one
            assert_eq!(next[0].value, series[1].value);
            let step = next[19].value - series[19].value;
            assert!(step.abs() <= 0.5);
            series = next;
        }
        assert_eq!(series[0].time_label, "00:00");
    }

    #[test]
    fn test_advance_empty_series() {
        assert!(advance_series(&[], 2.0).is_empty());
    }
}
