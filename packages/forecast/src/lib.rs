#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Lead-time-aware risk forecasting, bias correction and alert evaluation.
//!
//! Data flows strictly forward:
//!
//! 1. [`calendar`] derives the months to forecast from the observed history
//! 2. [`risk`] builds a weighted estimate from suitability 30/60/90 days
//!    before each target and classifies its lead time
//! 3. [`bias`] optionally corrects partial-window estimates
//! 4. [`alert`] thresholds the corrected risk and converts it to cases
//!
//! [`pipeline`] drives all four across the `(division x month)` grid.

pub mod alert;
pub mod bias;
pub mod calendar;
pub mod pipeline;
pub mod progress;
pub mod risk;

use thiserror::Error;
use vector_risk_forecast_models::{FailureKind, LeadTimeClass};

/// Errors that can occur during forecasting.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// None of the three backward-looking samples existed for a target.
    #[error("Lead time unknown for {division} {period}: no suitability samples 30/60/90 days back")]
    UnknownLeadTime {
        /// Division of the target.
        division: String,
        /// Target period (`YYYY-MM`).
        period: String,
    },

    /// Bias correction is configured but the table has no row for the key.
    #[error("Missing bias correction for lead_time={lead_time} month={month} division={division}")]
    MissingCorrection {
        /// Lead time of the forecast.
        lead_time: LeadTimeClass,
        /// Calendar month of the forecast.
        month: u32,
        /// Division of the forecast.
        division: String,
    },

    /// The threshold table has no row for the key.
    #[error("Missing alert threshold for division={division} month={month}{}", lead_time_suffix(.lead_time))]
    MissingThreshold {
        /// Division of the forecast.
        division: String,
        /// Calendar month of the forecast.
        month: u32,
        /// Lead time, for lead-time keyed tables.
        lead_time: Option<LeadTimeClass>,
    },

    /// The demographic table has no row for the division.
    #[error("Missing demographic data for division={division}")]
    MissingDemographics {
        /// Division of the forecast.
        division: String,
    },

    /// A static table contains the same key twice.
    #[error("Duplicate {table} row for {key}")]
    DuplicateKey {
        /// Which table (`bias correction`, `alert threshold`, `demographic`).
        table: &'static str,
        /// The duplicated key.
        key: String,
    },

    /// The threshold table does not match the configured keying.
    #[error("Threshold table shape error: {message}")]
    ThresholdShape {
        /// Description of what went wrong.
        message: String,
    },
}

#[allow(clippy::ref_option)]
fn lead_time_suffix(lead_time: &Option<LeadTimeClass>) -> String {
    lead_time.map_or_else(String::new, |l| format!(" lead_time={l}"))
}

impl ForecastError {
    /// Per-target failure category, or `None` for table construction
    /// errors.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::UnknownLeadTime { .. } => Some(FailureKind::UnknownLeadTime),
            Self::MissingCorrection { .. } => Some(FailureKind::MissingCorrection),
            Self::MissingThreshold { .. } => Some(FailureKind::MissingThreshold),
            Self::MissingDemographics { .. } => Some(FailureKind::MissingDemographics),
            Self::DuplicateKey { .. } | Self::ThresholdShape { .. } => None,
        }
    }
}
