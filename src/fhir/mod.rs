//! FHIR-specific types and operations
//!
//! This module covers the read-only slice of FHIR R4 the dashboard uses:
//! - LOINC code to channel mapping
//! - Normalizing `Patient` and `Observation` resources
//! - The HTTP client for the three search/read requests

pub mod client;
pub mod conversion;
pub mod loinc;
pub mod resources;

pub use client::{FhirClient, FhirSource};
pub use loinc::{resolve_channel, Channel};
pub use resources::{
    normalize_observation, normalize_patient, Gender, ObservationRecord, ObservationValue,
    PatientRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected {expected} resource, received {received}")]
    UnexpectedResource { expected: String, received: String },

    #[error("Invalid URL: {0}")]
    Url(String),
}
