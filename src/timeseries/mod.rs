//! Time-series helpers
//!
//! - Synthetic trend windows and their live drift
//! - Status classification against reference ranges

pub mod status;
pub mod trend;

pub use status::{classify, ReferenceRange, Status};
pub use trend::{advance_series, generate_series, TrendPoint, DEFAULT_SERIES_LENGTH};
