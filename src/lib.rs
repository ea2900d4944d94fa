//! Vitalboard: a FHIR vital-signs dashboard backend
//!
//! Vitalboard reads patient demographics and vital-sign observations from
//! a FHIR R4 server, normalizes them into a flat five-channel snapshot,
//! classifies each reading against reference ranges, and keeps the
//! display alive between fetches with a bounded random-walk simulation.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod fhir;
pub mod storage;
pub mod timeseries;

pub use aggregator::{Aggregator, DriftHandle, DriftTask, LoadOutcome};
pub use config::{load_config, Config};
pub use error::DashboardError;
pub use fhir::{Channel, FhirClient, FhirSource};
pub use storage::{Connectivity, Provenance, VitalsSnapshot};
pub use timeseries::Status;
