use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::fhir::conversion::{
    codeable_display, first_coding_code, parse_date, parse_datetime, quantity_unit,
    quantity_value, resource_type, string_field, FromResource,
};
use crate::fhir::loinc::{DIASTOLIC_PRESSURE, SYSTOLIC_PRESSURE};

/// FHIR administrative gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

impl Gender {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            "unknown" => Some(Gender::Unknown),
            _ => None,
        }
    }
}

/// Canonical patient demographics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: String,                    // Resource id, empty when the server omitted it
    pub name: Option<String>,          // Given names then family name
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub mrn: Option<String>,           // MR identifier, else the resource id
}

impl PatientRecord {
    /// Name for display, with a placeholder when none is known
    pub fn display_label(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown patient")
    }

    /// Age in whole years on `today`
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

impl FromResource for PatientRecord {
    fn from_resource(resource: &Value) -> Self {
        let id = string_field(resource, "id").unwrap_or_default();

        let name = resource
            .get("name")
            .and_then(Value::as_array)
            .and_then(|names| names.first())
            .and_then(display_name);

        let gender = resource
            .get("gender")
            .and_then(Value::as_str)
            .and_then(Gender::from_code);

        let birth_date = resource
            .get("birthDate")
            .and_then(Value::as_str)
            .and_then(parse_date);

        let mrn = medical_record_number(resource)
            .or_else(|| (!id.is_empty()).then(|| id.clone()));

        PatientRecord {
            id,
            name,
            gender,
            birth_date,
            mrn,
        }
    }
}

fn display_name(human_name: &Value) -> Option<String> {
    let mut parts: Vec<String> = human_name
        .get("given")
        .and_then(Value::as_array)
        .map(|given| {
            given
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Some(family) = string_field(human_name, "family") {
        parts.push(family);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn medical_record_number(resource: &Value) -> Option<String> {
    resource
        .get("identifier")
        .and_then(Value::as_array)?
        .iter()
        .find(|identifier| {
            identifier
                .get("type")
                .and_then(first_coding_code)
                .map_or(false, |code| code == "MR")
        })
        .and_then(|identifier| string_field(identifier, "value"))
}

/// Payload of a normalized observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObservationValue {
    /// Direct quantity such as heart rate or temperature
    Scalar {
        value: f64,
        unit: Option<String>,
    },
    /// Blood-pressure panel; a side is `None` when its component is missing
    Panel {
        systolic: Option<f64>,
        diastolic: Option<f64>,
    },
    /// Neither a quantity nor a component list
    Unrecognized,
}

/// Canonical observation, consumed straight away by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub code: String,                      // LOINC code from code.coding[0]
    pub display: Option<String>,
    pub effective: Option<DateTime<Utc>>,
    pub value: ObservationValue,
}

impl FromResource for ObservationRecord {
    fn from_resource(resource: &Value) -> Self {
        let concept = resource.get("code");
        let code = concept.and_then(first_coding_code).unwrap_or_default();
        let display = concept.and_then(codeable_display);
        let effective = resource
            .get("effectiveDateTime")
            .and_then(Value::as_str)
            .and_then(parse_datetime);

        let value = if let Some(value) = quantity_value(resource) {
            ObservationValue::Scalar {
                value,
                unit: quantity_unit(resource),
            }
        } else if let Some(components) = resource.get("component").and_then(Value::as_array) {
            ObservationValue::Panel {
                systolic: component_value(components, SYSTOLIC_PRESSURE),
                diastolic: component_value(components, DIASTOLIC_PRESSURE),
            }
        } else {
            debug!(code = %code, "observation carries no quantity or components");
            ObservationValue::Unrecognized
        };

        ObservationRecord {
            code,
            display,
            effective,
            value,
        }
    }
}

fn component_value(components: &[Value], code: &str) -> Option<f64> {
    components
        .iter()
        .find(|component| {
            component
                .get("code")
                .and_then(first_coding_code)
                .map_or(false, |c| c == code)
        })
        .and_then(quantity_value)
}

pub fn normalize_patient(resource: &Value) -> PatientRecord {
    PatientRecord::from_resource(resource)
}

pub fn normalize_observation(resource: &Value) -> ObservationRecord {
    ObservationRecord::from_resource(resource)
}

/// Resources of the given type inside a search bundle.
///
/// A bundle without `entry` yields nothing. Entries of other types (such
/// as `OperationOutcome` search notes) are skipped.
pub fn bundle_resources<'a>(
    bundle: &'a Value,
    expected_type: &'a str,
) -> impl Iterator<Item = &'a Value> + 'a {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| entries.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| entry.get("resource"))
        .filter(move |resource| resource_type(resource) == Some(expected_type))
}
