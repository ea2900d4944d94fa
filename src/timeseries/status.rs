use serde::{Deserialize, Serialize};

use crate::fhir::Channel;

/// Severity tier of a reading against its reference range.
///
/// The tiers are a percentage-of-bound simplification, not a clinically
/// validated early-warning score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Warning,
    Critical,
}

/// Inclusive clinical bounds for one measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub low: f64,
    pub high: f64,
}

impl ReferenceRange {
    pub const fn new(low: f64, high: f64) -> Self {
        ReferenceRange { low, high }
    }

    pub fn classify(&self, value: f64) -> Status {
        classify(value, self.low, self.high)
    }
}

pub const HEART_RATE_RANGE: ReferenceRange = ReferenceRange::new(60.0, 100.0);
pub const SPO2_RANGE: ReferenceRange = ReferenceRange::new(95.0, 100.0);
pub const TEMPERATURE_RANGE: ReferenceRange = ReferenceRange::new(36.1, 37.8);
pub const RESPIRATORY_RATE_RANGE: ReferenceRange = ReferenceRange::new(12.0, 20.0);
pub const SYSTOLIC_RANGE: ReferenceRange = ReferenceRange::new(90.0, 120.0);
pub const DIASTOLIC_RANGE: ReferenceRange = ReferenceRange::new(60.0, 80.0);

/// Reference range of a scalar channel. `Bp` has two ranges, see
/// [`SYSTOLIC_RANGE`] and [`DIASTOLIC_RANGE`].
pub fn reference_range(channel: Channel) -> Option<ReferenceRange> {
    match channel {
        Channel::Hr => Some(HEART_RATE_RANGE),
        Channel::Spo2 => Some(SPO2_RANGE),
        Channel::Temp => Some(TEMPERATURE_RANGE),
        Channel::Rr => Some(RESPIRATORY_RATE_RANGE),
        Channel::Bp => None,
    }
}

/// Normal inside `[low, high]`; critical more than 10% beyond a bound;
/// warning in between.
pub fn classify(value: f64, low: f64, high: f64) -> Status {
    if low <= value && value <= high {
        Status::Normal
    } else if value < low * 0.9 || value > high * 1.1 {
        Status::Critical
    } else {
        Status::Warning
    }
}

/// Worse tier of systolic and diastolic
pub fn classify_blood_pressure(systolic: f64, diastolic: f64) -> Status {
    SYSTOLIC_RANGE
        .classify(systolic)
        .max(DIASTOLIC_RANGE.classify(diastolic))
}
