use crate::config::ConfigError;
use crate::fhir::FhirError;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fhir(#[from] FhirError),

    #[error("Invalid listen address: {0}")]
    Address(String),

    #[error("Failed to bind server: {0}")]
    Bind(#[from] warp::Error),

    #[error("Server task failed: {0}")]
    Server(#[from] tokio::task::JoinError),

    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}
