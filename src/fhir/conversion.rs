use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// Builds a canonical record out of a raw FHIR resource.
///
/// Implementations never fail: every field that is missing or has the
/// wrong JSON type comes out as `None`.
pub trait FromResource {
    fn from_resource(resource: &Value) -> Self;
}

/// `resourceType` of a raw resource, if any
pub fn resource_type(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

pub fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `coding[0]` of a CodeableConcept
pub fn first_coding(concept: &Value) -> Option<&Value> {
    concept
        .get("coding")
        .and_then(Value::as_array)
        .and_then(|codings| codings.first())
}

/// `coding[0].code` of a CodeableConcept
pub fn first_coding_code(concept: &Value) -> Option<String> {
    first_coding(concept).and_then(|coding| string_field(coding, "code"))
}

/// `coding[0].display`, falling back to the concept's `text`
pub fn codeable_display(concept: &Value) -> Option<String> {
    first_coding(concept)
        .and_then(|coding| string_field(coding, "display"))
        .or_else(|| string_field(concept, "text"))
}

/// Numeric `valueQuantity.value` of an observation or component
pub fn quantity_value(holder: &Value) -> Option<f64> {
    holder
        .get("valueQuantity")
        .and_then(|quantity| quantity.get("value"))
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
}

pub fn quantity_unit(holder: &Value) -> Option<String> {
    holder
        .get("valueQuantity")
        .and_then(|quantity| string_field(quantity, "unit"))
}

/// Parses a FHIR `date` (`YYYY-MM-DD`). Partial dates are not accepted.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Parses a FHIR `dateTime`. A bare date is taken as midnight UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    parse_date(raw)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
