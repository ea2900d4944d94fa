use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::fhir::{Channel, Gender, PatientRecord};
use crate::storage::{profile, Connectivity, DashboardState, Provenance, VitalsSnapshot, BP_UNIT};
use crate::timeseries::status::{
    classify_blood_pressure, reference_range, ReferenceRange, DIASTOLIC_RANGE, SYSTOLIC_RANGE,
};
use crate::timeseries::{Status, TrendPoint};

/// What the browser dashboard renders
#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub connectivity: Connectivity,
    pub patient: Option<PatientView>,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub channels: Vec<ChannelReading>,
}

#[derive(Debug, Serialize)]
pub struct PatientView {
    pub id: String,
    pub name: String,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<u32>,
    pub mrn: Option<String>,
}

impl PatientView {
    pub fn new(patient: &PatientRecord, today: NaiveDate) -> Self {
        PatientView {
            id: patient.id.clone(),
            name: patient.display_label().to_string(),
            gender: patient.gender,
            birth_date: patient.birth_date,
            age: patient.age_on(today),
            mrn: patient.mrn.clone(),
        }
    }
}

/// One channel with its status, classified at query time
#[derive(Debug, Serialize)]
pub struct ChannelReading {
    pub channel: Channel,
    pub display: String,  // "72", "37.2", "118/76"
    pub unit: &'static str,
    pub provenance: Provenance,
    pub status: Status,
    pub ranges: Vec<ReferenceRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trend: Vec<TrendPoint>,
}

pub fn channel_readings(snapshot: &VitalsSnapshot) -> Vec<ChannelReading> {
    Channel::ALL
        .iter()
        .filter_map(|&channel| channel_reading(snapshot, channel))
        .collect()
}

fn channel_reading(snapshot: &VitalsSnapshot, channel: Channel) -> Option<ChannelReading> {
    if channel.is_panel() {
        let bp = &snapshot.bp;
        return Some(ChannelReading {
            channel,
            display: format!("{}/{}", bp.systolic, bp.diastolic),
            unit: BP_UNIT,
            provenance: bp.provenance,
            status: classify_blood_pressure(f64::from(bp.systolic), f64::from(bp.diastolic)),
            ranges: vec![SYSTOLIC_RANGE, DIASTOLIC_RANGE],
            trend: Vec::new(),
        });
    }

    let scalar = snapshot.scalar(channel)?;
    let profile = profile(channel)?;
    let range = reference_range(channel)?;
    Some(ChannelReading {
        channel,
        display: profile.format(scalar.value),
        unit: profile.unit,
        provenance: scalar.provenance,
        status: range.classify(scalar.value),
        ranges: vec![range],
        trend: scalar.trend.clone(),
    })
}

impl DashboardView {
    pub fn from_state(state: &DashboardState, today: NaiveDate) -> Self {
        DashboardView {
            connectivity: state.connectivity,
            patient: state
                .patient
                .as_deref()
                .map(|patient| PatientView::new(patient, today)),
            revision: state.snapshot.revision,
            updated_at: state.snapshot.updated_at,
            channels: channel_readings(&state.snapshot),
        }
    }
}
