use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::fhir::Channel;
use crate::timeseries::trend::{
    advance_series_with, generate_series_with, jitter, TrendPoint, DEFAULT_SERIES_LENGTH,
};

/// Where a channel's current value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Simulated,
    Server,
}

/// Fixed per-channel parameters for seeding, trend shape and drift
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelProfile {
    pub unit: &'static str,
    pub baseline: f64,
    pub trend_variance: f64,  // Spread of a regenerated series
    pub drift_variance: f64,  // Spread of one drift step
    pub floor: f64,           // Plausibility clamp for drifted values
    pub ceiling: f64,
    pub decimals: u32,
}

const HR_PROFILE: ChannelProfile = ChannelProfile {
    unit: "bpm",
    baseline: 72.0,
    trend_variance: 15.0,
    drift_variance: 4.0,
    floor: 30.0,
    ceiling: 200.0,
    decimals: 0,
};

const SPO2_PROFILE: ChannelProfile = ChannelProfile {
    unit: "%",
    baseline: 98.0,
    trend_variance: 3.0,
    drift_variance: 1.0,
    floor: 70.0,
    ceiling: 100.0,
    decimals: 0,
};

const TEMP_PROFILE: ChannelProfile = ChannelProfile {
    unit: "°C",
    baseline: 37.2,
    trend_variance: 0.8,
    drift_variance: 0.2,
    floor: 33.0,
    ceiling: 42.0,
    decimals: 1,
};

const RR_PROFILE: ChannelProfile = ChannelProfile {
    unit: "/min",
    baseline: 16.0,
    trend_variance: 4.0,
    drift_variance: 2.0,
    floor: 4.0,
    ceiling: 40.0,
    decimals: 0,
};

pub const BP_UNIT: &str = "mmHg";
pub const BASELINE_SYSTOLIC: u32 = 118;
pub const BASELINE_DIASTOLIC: u32 = 76;
const SYSTOLIC_STEP: i64 = 2;
const DIASTOLIC_STEP: i64 = 1;
const SYSTOLIC_BOUNDS: (i64, i64) = (70, 220);
const DIASTOLIC_BOUNDS: (i64, i64) = (40, 140);

/// Profile of a scalar channel; `Bp` has none
pub fn profile(channel: Channel) -> Option<&'static ChannelProfile> {
    match channel {
        Channel::Hr => Some(&HR_PROFILE),
        Channel::Spo2 => Some(&SPO2_PROFILE),
        Channel::Temp => Some(&TEMP_PROFILE),
        Channel::Rr => Some(&RR_PROFILE),
        Channel::Bp => None,
    }
}

impl ChannelProfile {
    /// Round to the channel's display precision
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.decimals as i32);
        (value * factor).round() / factor
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimals as usize, value)
    }

    fn bounded(&self, value: f64) -> f64 {
        self.round(value.clamp(self.floor, self.ceiling))
    }
}

/// A channel with one value and a sliding trend window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarChannel {
    pub value: f64,
    pub trend: Vec<TrendPoint>,
    pub provenance: Provenance,
}

impl ScalarChannel {
    fn seeded<R: Rng + ?Sized>(rng: &mut R, profile: &ChannelProfile) -> Self {
        ScalarChannel {
            value: profile.baseline,
            trend: anchored_trend(rng, profile, profile.baseline),
            provenance: Provenance::Simulated,
        }
    }

    /// Server value: new baseline, fresh trend ending on it
    fn reset_to<R: Rng + ?Sized>(&mut self, rng: &mut R, profile: &ChannelProfile, value: f64) {
        self.value = profile.round(value);
        self.trend = anchored_trend(rng, profile, self.value);
        self.provenance = Provenance::Server;
    }

    /// One random step from the current value. The newest trend point
    /// always equals `value` afterwards.
    fn drift<R: Rng + ?Sized>(&mut self, rng: &mut R, profile: &ChannelProfile) {
        if let Some(last) = self.trend.last_mut() {
            last.value = self.value;
        }
        self.trend = advance_series_with(rng, &self.trend, profile.drift_variance);
        let endpoint = match self.trend.last() {
            Some(point) => point.value,
            None => self.value + jitter(rng, profile.drift_variance),
        };
        self.value = profile.bounded(endpoint);
        if let Some(last) = self.trend.last_mut() {
            last.value = self.value;
        }
    }
}

/// Series around `value`, clamped to the channel band, whose last point is `value`
fn anchored_trend<R: Rng + ?Sized>(
    rng: &mut R,
    profile: &ChannelProfile,
    value: f64,
) -> Vec<TrendPoint> {
    let mut trend =
        generate_series_with(rng, value, profile.trend_variance, DEFAULT_SERIES_LENGTH);
    for point in trend.iter_mut() {
        point.value = point.value.clamp(profile.floor, profile.ceiling);
    }
    if let Some(last) = trend.last_mut() {
        last.value = value;
    }
    trend
}

/// Convert a server reading to the channel's display unit.
///
/// A missing unit is taken as already matching. Returns `None` for a unit
/// the channel cannot use.
pub fn to_channel_unit(channel: Channel, value: f64, unit: Option<&str>) -> Option<f64> {
    let Some(unit) = unit.map(|u| u.trim().to_ascii_lowercase()) else {
        return Some(value);
    };
    match channel {
        Channel::Hr | Channel::Rr => (unit == "bpm" || unit.contains("min")).then_some(value),
        Channel::Spo2 => (unit == "%" || unit == "percent").then_some(value),
        Channel::Temp => match unit.as_str() {
            "cel" | "°c" | "c" | "degc" | "celsius" => Some(value),
            "[degf]" | "degf" | "°f" | "f" | "fahrenheit" => Some((value - 32.0) * 5.0 / 9.0),
            _ => None,
        },
        Channel::Bp => (unit == "mm[hg]" || unit == "mmhg").then_some(value),
    }
}

/// Blood-pressure panel; no trend is kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelChannel {
    pub systolic: u32,
    pub diastolic: u32,
    pub provenance: Provenance,
}

impl PanelChannel {
    fn drift<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.systolic = nudge(rng, self.systolic, SYSTOLIC_STEP, SYSTOLIC_BOUNDS);
        self.diastolic = nudge(rng, self.diastolic, DIASTOLIC_STEP, DIASTOLIC_BOUNDS);
    }
}

fn nudge<R: Rng + ?Sized>(rng: &mut R, value: u32, step: i64, (low, high): (i64, i64)) -> u32 {
    let moved = (i64::from(value) + rng.gen_range(-step..=step)).clamp(low, high);
    u32::try_from(moved).unwrap_or(value)
}

pub(crate) fn to_pressure(value: f64) -> Option<u32> {
    let rounded = value.round();
    (rounded.is_finite() && rounded >= 0.0 && rounded <= f64::from(u32::MAX))
        .then(|| rounded as u32)
}

/// All five channels at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub hr: ScalarChannel,
    pub spo2: ScalarChannel,
    pub temp: ScalarChannel,
    pub rr: ScalarChannel,
    pub bp: PanelChannel,
}

impl VitalsSnapshot {
    /// Simulated, clinically normal starting point
    pub fn initial() -> Self {
        Self::initial_with(&mut rand::thread_rng())
    }

    pub fn initial_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        VitalsSnapshot {
            revision: 0,
            updated_at: Utc::now(),
            hr: ScalarChannel::seeded(rng, &HR_PROFILE),
            spo2: ScalarChannel::seeded(rng, &SPO2_PROFILE),
            temp: ScalarChannel::seeded(rng, &TEMP_PROFILE),
            rr: ScalarChannel::seeded(rng, &RR_PROFILE),
            bp: PanelChannel {
                systolic: BASELINE_SYSTOLIC,
                diastolic: BASELINE_DIASTOLIC,
                provenance: Provenance::Simulated,
            },
        }
    }

    pub fn scalar(&self, channel: Channel) -> Option<&ScalarChannel> {
        match channel {
            Channel::Hr => Some(&self.hr),
            Channel::Spo2 => Some(&self.spo2),
            Channel::Temp => Some(&self.temp),
            Channel::Rr => Some(&self.rr),
            Channel::Bp => None,
        }
    }

    fn scalar_mut(&mut self, channel: Channel) -> Option<&mut ScalarChannel> {
        match channel {
            Channel::Hr => Some(&mut self.hr),
            Channel::Spo2 => Some(&mut self.spo2),
            Channel::Temp => Some(&mut self.temp),
            Channel::Rr => Some(&mut self.rr),
            Channel::Bp => None,
        }
    }

    pub fn provenance(&self, channel: Channel) -> Provenance {
        match self.scalar(channel) {
            Some(scalar) => scalar.provenance,
            None => self.bp.provenance,
        }
    }

    /// Overwrite a scalar channel with a server value. Returns false for `Bp`.
    pub fn set_scalar<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        channel: Channel,
        value: f64,
    ) -> bool {
        match (self.scalar_mut(channel), profile(channel)) {
            (Some(scalar), Some(profile)) => {
                scalar.reset_to(rng, profile, value);
                true
            }
            _ => false,
        }
    }

    /// Overwrite whichever blood-pressure sides are present.
    /// Returns false when neither side was usable.
    pub fn set_blood_pressure(&mut self, systolic: Option<f64>, diastolic: Option<f64>) -> bool {
        let systolic = systolic.and_then(to_pressure);
        let diastolic = diastolic.and_then(to_pressure);
        if systolic.is_none() && diastolic.is_none() {
            return false;
        }
        if let Some(value) = systolic {
            self.bp.systolic = value;
        }
        if let Some(value) = diastolic {
            self.bp.diastolic = value;
        }
        self.bp.provenance = Provenance::Server;
        true
    }

    /// One drift tick over every channel. Provenance is left alone.
    pub fn drift<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for channel in Channel::SCALAR {
            if let (Some(scalar), Some(profile)) = (self.scalar_mut(channel), profile(channel)) {
                scalar.drift(rng, profile);
            }
        }
        self.bp.drift(rng);
    }

    /// Bump revision and timestamp after a completed update
    pub(crate) fn stamp(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_initial_snapshot() {
        let snapshot = VitalsSnapshot::initial_with(&mut rng());
        assert_eq!(snapshot.hr.value, 72.0);
        assert_eq!(snapshot.spo2.value, 98.0);
        assert_eq!(snapshot.temp.value, 37.2);
        assert_eq!(snapshot.rr.value, 16.0);
        assert_eq!((snapshot.bp.systolic, snapshot.bp.diastolic), (118, 76));
        for channel in Channel::ALL {
            assert_eq!(snapshot.provenance(channel), Provenance::Simulated);
        }
        assert_eq!(snapshot.hr.trend.len(), DEFAULT_SERIES_LENGTH);
    }

    #[test]
    fn test_rounding_and_format() {
        assert_eq!(HR_PROFILE.round(84.6), 85.0);
        assert_eq!(TEMP_PROFILE.round(37.26), 37.3);
        assert_eq!(HR_PROFILE.format(85.0), "85");
        assert_eq!(TEMP_PROFILE.format(37.0), "37.0");
    }

    #[test]
    fn test_set_scalar_marks_server() {
        let mut rng = rng();
        let mut snapshot = VitalsSnapshot::initial_with(&mut rng);

        assert!(snapshot.set_scalar(&mut rng, Channel::Temp, 38.44));
        assert_eq!(snapshot.temp.value, 38.4);
        assert_eq!(snapshot.temp.provenance, Provenance::Server);
        assert_eq!(snapshot.temp.trend.len(), DEFAULT_SERIES_LENGTH);
        assert!(snapshot.temp.trend.iter().all(|p| (p.value - 38.44).abs() <= 0.41));

        assert!(!snapshot.set_scalar(&mut rng, Channel::Bp, 120.0));
    }

    #[test]
    fn test_set_blood_pressure_one_side() {
        let mut snapshot = VitalsSnapshot::initial_with(&mut rng());

        assert!(!snapshot.set_blood_pressure(None, None));
        assert_eq!(snapshot.bp.provenance, Provenance::Simulated);

        assert!(snapshot.set_blood_pressure(None, Some(84.4)));
        assert_eq!((snapshot.bp.systolic, snapshot.bp.diastolic), (118, 84));
        assert_eq!(snapshot.bp.provenance, Provenance::Server);
    }

    #[test]
    fn test_drift_keeps_provenance_and_bounds() {
        let mut rng = rng();
        let mut snapshot = VitalsSnapshot::initial_with(&mut rng);
        snapshot.set_scalar(&mut rng, Channel::Hr, 85.0);

        for _ in 0..500 {
            snapshot.drift(&mut rng);
        }

        assert_eq!(snapshot.hr.provenance, Provenance::Server);
        assert_eq!(snapshot.spo2.provenance, Provenance::Simulated);
        assert_eq!(snapshot.bp.provenance, Provenance::Simulated);
        assert_eq!(snapshot.hr.trend.len(), DEFAULT_SERIES_LENGTH);
        assert!(snapshot.spo2.value >= 70.0 && snapshot.spo2.value <= 100.0);
        assert!(snapshot.bp.systolic >= 70 && snapshot.bp.systolic <= 220);
        assert_eq!(snapshot.hr.value, snapshot.hr.value.round());
    }

    #[test]
    fn test_first_drift_steps_from_server_value() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut snapshot = VitalsSnapshot::initial_with(&mut rng);
            snapshot.set_scalar(&mut rng, Channel::Hr, 85.0);
            assert_eq!(snapshot.hr.trend.last().map(|p| p.value), Some(85.0));

            snapshot.drift(&mut rng);

            let jump = (snapshot.hr.value - 85.0).abs();
            assert!(jump <= HR_PROFILE.drift_variance / 2.0, "seed {} jumped {}", seed, jump);
            assert_eq!(snapshot.hr.trend.last().map(|p| p.value), Some(snapshot.hr.value));
        }
    }

    #[test]
    fn test_seeded_trends_stay_in_band() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut snapshot = VitalsSnapshot::initial_with(&mut rng);
            assert_eq!(snapshot.temp.trend.last().map(|p| p.value), Some(37.2));

            snapshot.set_scalar(&mut rng, Channel::Spo2, 100.0);
            assert!(snapshot.spo2.trend.iter().all(|p| p.value <= 100.0));
        }
    }

    #[test]
    fn test_to_channel_unit() {
        assert_eq!(to_channel_unit(Channel::Hr, 85.0, Some("beats/minute")), Some(85.0));
        assert_eq!(to_channel_unit(Channel::Rr, 18.0, Some("/min")), Some(18.0));
        assert_eq!(to_channel_unit(Channel::Spo2, 97.0, Some("%")), Some(97.0));
        assert_eq!(to_channel_unit(Channel::Temp, 37.0, Some("Cel")), Some(37.0));
        assert_eq!(to_channel_unit(Channel::Temp, 212.0, Some("[degF]")), Some(100.0));
        assert_eq!(to_channel_unit(Channel::Bp, 120.0, Some("mm[Hg]")), Some(120.0));
        assert_eq!(to_channel_unit(Channel::Hr, 85.0, None), Some(85.0));
        assert_eq!(to_channel_unit(Channel::Temp, 310.0, Some("K")), None);
        assert_eq!(to_channel_unit(Channel::Spo2, 0.97, Some("1")), None);
    }

    #[test]
    fn test_to_pressure() {
        assert_eq!(to_pressure(119.6), Some(120));
        assert_eq!(to_pressure(-5.0), None);
        assert_eq!(to_pressure(f64::NAN), None);
    }
}
