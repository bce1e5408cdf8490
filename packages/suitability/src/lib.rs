#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Suitability index lookup and derivation.
//!
//! [`index::SuitabilityIndex`] is the immutable `(division, year, month)`
//! lookup the forecast engine reads from. [`derive`] turns monthly
//! meteorological aggregates into suitability samples using a rainfall
//! saturation curve and a temperature response curve.

pub mod derive;
pub mod index;

use thiserror::Error;
use vector_risk_suitability_models::InvalidPeriodError;

/// Errors that can occur while building or deriving suitability data.
#[derive(Debug, Error)]
pub enum SuitabilityError {
    /// A sample carried an invalid year/month.
    #[error("Invalid period for division {division}: {source}")]
    InvalidPeriod {
        /// Division the sample belongs to.
        division: String,
        /// The underlying period error.
        source: InvalidPeriodError,
    },

    /// Two samples share the same `(division, year, month)` key.
    #[error("Duplicate suitability sample for {division} {period}")]
    DuplicateSample {
        /// Division of the duplicated key.
        division: String,
        /// Period of the duplicated key (`YYYY-MM`).
        period: String,
    },

    /// The temperature response curve has no points.
    #[error("Temperature suitability curve is empty")]
    EmptyTemperatureCurve,
}
