//! LOINC registry
//!
//! Static mapping from the LOINC codes the dashboard displays to the
//! logical vital-sign channel each one feeds. Anything not listed here is
//! ignored by callers.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const HEART_RATE: &str = "8867-4";
pub const OXYGEN_SATURATION: &str = "2708-6";
pub const BODY_TEMPERATURE: &str = "8310-5";
pub const RESPIRATORY_RATE: &str = "9279-1";
pub const BLOOD_PRESSURE_PANEL: &str = "85354-9";
pub const SYSTOLIC_PRESSURE: &str = "8480-6";
pub const DIASTOLIC_PRESSURE: &str = "8462-4";

/// Logical vital-sign channel shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Hr,
    Spo2,
    Temp,
    Rr,
    Bp,
}

impl Channel {
    /// Channels that carry a single value and a trend series
    pub const SCALAR: [Channel; 4] = [Channel::Hr, Channel::Spo2, Channel::Temp, Channel::Rr];

    pub const ALL: [Channel; 5] = [
        Channel::Hr,
        Channel::Spo2,
        Channel::Temp,
        Channel::Rr,
        Channel::Bp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Hr => "hr",
            Channel::Spo2 => "spo2",
            Channel::Temp => "temp",
            Channel::Rr => "rr",
            Channel::Bp => "bp",
        }
    }

    pub fn is_panel(self) -> bool {
        matches!(self, Channel::Bp)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a LOINC code to the channel it feeds.
///
/// Unknown codes return `None`; a real FHIR feed carries many observation
/// kinds the dashboard does not display.
pub fn resolve_channel(code: &str) -> Option<Channel> {
    match code {
        HEART_RATE => Some(Channel::Hr),
        OXYGEN_SATURATION => Some(Channel::Spo2),
        BODY_TEMPERATURE => Some(Channel::Temp),
        RESPIRATORY_RATE => Some(Channel::Rr),
        BLOOD_PRESSURE_PANEL | SYSTOLIC_PRESSURE | DIASTOLIC_PRESSURE => Some(Channel::Bp),
        _ => None,
    }
}
