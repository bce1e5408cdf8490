#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forecast target, lead-time, static table and alert record types.
//!
//! The static tables (bias correction, alert thresholds, demographics) are
//! fitted outside this system and arrive as flat rows. Column names match
//! the tables the model has always been delivered with, so both
//! `division` and the older `adm_division` header are accepted.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use vector_risk_suitability_models::YearMonth;

/// How far a forecast sits ahead of the most complete data, derived from
/// how many of the three backward-looking samples existed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum LeadTimeClass {
    /// All three samples present.
    #[serde(rename = "0-month")]
    #[strum(serialize = "0-month")]
    ZeroMonth,
    /// Two samples present.
    #[serde(rename = "1-month")]
    #[strum(serialize = "1-month")]
    OneMonth,
    /// One sample present.
    #[serde(rename = "2-month")]
    #[strum(serialize = "2-month")]
    TwoMonth,
    /// No samples present; the forecast is undefined.
    #[serde(rename = "unknown")]
    #[strum(serialize = "unknown")]
    Unknown,
}

impl LeadTimeClass {
    /// Classifies a forecast by the number of samples that fed it.
    #[must_use]
    pub const fn from_samples_found(found: usize) -> Self {
        match found {
            3.. => Self::ZeroMonth,
            2 => Self::OneMonth,
            1 => Self::TwoMonth,
            0 => Self::Unknown,
        }
    }

    /// Returns `true` for forecasts built from the full sample window.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::ZeroMonth)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::ZeroMonth, Self::OneMonth, Self::TwoMonth, Self::Unknown]
    }
}

/// One `(division, month)` cell of the forecast grid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForecastTarget {
    /// Administrative division identifier.
    pub division: String,
    /// Month being forecast.
    pub period: YearMonth,
}

/// Risk estimate for one target, before or after bias correction.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskForecast {
    /// The forecast cell.
    pub target: ForecastTarget,
    /// Same-month suitability, if it has already been observed.
    pub suitability: Option<f64>,
    /// Weighted risk. `None` when no input samples existed.
    pub risk: Option<f64>,
    /// Lead-time class of the estimate.
    pub lead_time: LeadTimeClass,
}

/// Fitted bias correction for one `(lead_time, month, division)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasCorrectionEntry {
    /// Lead time the correction applies to.
    pub lead_time: LeadTimeClass,
    /// Calendar month (1-12).
    pub month: u32,
    /// Administrative division identifier.
    #[serde(alias = "adm_division")]
    pub division: String,
    /// Multiplicative rescaling of the raw risk.
    pub ratio_std: f64,
    /// Shift subtracted after rescaling.
    pub diff_mean: f64,
}

/// Calibrated alert thresholds and case-conversion coefficient.
///
/// `lead_time` is `None` in legacy tables keyed only by
/// `(division, month)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholdEntry {
    /// Administrative division identifier.
    #[serde(alias = "adm_division")]
    pub division: String,
    /// Calendar month (1-12).
    pub month: u32,
    /// Lead time the row applies to.
    #[serde(default)]
    pub lead_time: Option<LeadTimeClass>,
    /// Cases per person per unit of risk.
    pub coeff: f64,
    /// Threshold derived from the standard deviation of historical risk.
    pub alert_threshold_std: f64,
    /// Threshold derived from a quantile of historical risk.
    pub alert_threshold_qnt: f64,
}

impl AlertThresholdEntry {
    /// The larger of the two thresholds; risk must exceed it to alert.
    #[must_use]
    pub fn max_threshold(&self) -> f64 {
        self.alert_threshold_std.max(self.alert_threshold_qnt)
    }
}

/// Population figures for one division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicEntry {
    /// Administrative division identifier.
    #[serde(alias = "adm_division")]
    pub division: String,
    /// Total population.
    #[serde(rename = "Population")]
    pub population_total: u64,
    /// Population under 9 years old.
    #[serde(rename = "Population U9")]
    pub population_under9: u64,
    /// Population 65 and older.
    #[serde(rename = "Population 65+")]
    pub population_65plus: u64,
}

/// Alert decision and case estimates for one evaluated forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    /// Lead time of the evaluated forecast.
    pub lead_time: LeadTimeClass,
    /// Risk the decision was made on (bias-corrected when configured).
    pub risk: f64,
    /// Whether risk exceeded the combined threshold.
    pub alert: bool,
    /// Estimated cases in the total population.
    pub potential_cases: i64,
    /// Estimated cases among under-9s.
    pub potential_cases_u9: i64,
    /// Estimated cases among over-65s.
    pub potential_cases_65plus: i64,
    /// Estimated cases if risk sat exactly at the threshold.
    pub potential_cases_at_threshold: i64,
}

/// Why a target could not be evaluated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// None of the three input samples existed.
    UnknownLeadTime,
    /// Bias correction is configured but has no row for the key.
    MissingCorrection,
    /// The threshold table has no row for the key.
    MissingThreshold,
    /// The demographic table has no row for the division.
    MissingDemographics,
}

/// A recorded per-target failure with its diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable diagnostic naming the missing key.
    pub message: String,
}

/// Result of evaluating one target.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    /// The target was evaluated against its thresholds.
    Evaluated(AlertRecord),
    /// The target could not be evaluated.
    Failed(TargetFailure),
}

/// Accounting status of one output row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    /// Evaluated from the full sample window.
    Ok,
    /// Evaluated from a partial window.
    Degraded,
    /// Not evaluated.
    Failed,
}

/// One target's forecast together with its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    /// Raw (uncorrected) forecast.
    pub forecast: RiskForecast,
    /// Evaluation result.
    pub outcome: ForecastOutcome,
}

impl ForecastEntry {
    /// Accounting status of this entry.
    #[must_use]
    pub fn status(&self) -> RecordStatus {
        match &self.outcome {
            ForecastOutcome::Failed(_) => RecordStatus::Failed,
            ForecastOutcome::Evaluated(record) if record.lead_time.is_complete() => {
                RecordStatus::Ok
            }
            ForecastOutcome::Evaluated(_) => RecordStatus::Degraded,
        }
    }
}

/// A row of the predictions table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// Administrative division identifier.
    pub division: String,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
    /// Lead-time class.
    pub lead_time: LeadTimeClass,
    /// Same-month suitability, if observed.
    pub suitability: Option<f64>,
    /// Risk after bias correction, if evaluated.
    pub risk: Option<f64>,
    /// Alert flag, if evaluated.
    pub alert: Option<bool>,
    /// Estimated cases in the total population.
    pub potential_cases: Option<i64>,
    /// Estimated cases among under-9s.
    pub potential_cases_u9: Option<i64>,
    /// Estimated cases among over-65s.
    pub potential_cases_65plus: Option<i64>,
    /// Estimated cases at the threshold.
    pub potential_cases_threshold: Option<i64>,
    /// Accounting status.
    pub status: RecordStatus,
    /// Failure category, for failed rows.
    pub failure: Option<FailureKind>,
}

impl From<&ForecastEntry> for PredictionRow {
    fn from(entry: &ForecastEntry) -> Self {
        let forecast = &entry.forecast;
        let mut row = Self {
            division: forecast.target.division.clone(),
            year: forecast.target.period.year(),
            month: forecast.target.period.month(),
            lead_time: forecast.lead_time,
            suitability: forecast.suitability,
            risk: None,
            alert: None,
            potential_cases: None,
            potential_cases_u9: None,
            potential_cases_65plus: None,
            potential_cases_threshold: None,
            status: entry.status(),
            failure: None,
        };

        match &entry.outcome {
            ForecastOutcome::Evaluated(record) => {
                row.risk = Some(record.risk);
                row.alert = Some(record.alert);
                row.potential_cases = Some(record.potential_cases);
                row.potential_cases_u9 = Some(record.potential_cases_u9);
                row.potential_cases_65plus = Some(record.potential_cases_65plus);
                row.potential_cases_threshold = Some(record.potential_cases_at_threshold);
            }
            ForecastOutcome::Failed(failure) => {
                row.failure = Some(failure.kind);
            }
        }

        row
    }
}

/// Run-level accounting of which targets succeeded, were degraded, or
/// failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Total number of targets.
    pub total: u64,
    /// Targets that were evaluated (including degraded ones).
    pub succeeded: u64,
    /// Evaluated targets built from a partial sample window.
    pub degraded: u64,
    /// Targets that could not be evaluated.
    pub failed: u64,
    /// Number of alerts raised.
    pub alerts: u64,
    /// Failure counts by category.
    pub failures_by_kind: std::collections::BTreeMap<FailureKind, u64>,
}

impl RunSummary {
    /// Counts one entry.
    pub fn record(&mut self, entry: &ForecastEntry) {
        self.total += 1;
        match &entry.outcome {
            ForecastOutcome::Evaluated(record) => {
                self.succeeded += 1;
                if !record.lead_time.is_complete() {
                    self.degraded += 1;
                }
                if record.alert {
                    self.alerts += 1;
                }
            }
            ForecastOutcome::Failed(failure) => {
                self.failed += 1;
                *self.failures_by_kind.entry(failure.kind).or_default() += 1;
            }
        }
    }
}

/// What to do when a static-table lookup fails for a target.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Skip,
    /// Fail the whole run on the first missing key.
    Abort,
}

/// Shape of the alert threshold table.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ThresholdKeying {
    /// Detect from the rows: lead-time keyed if every row has a lead time,
    /// division/month keyed if none do.
    #[default]
    Auto,
    /// Legacy shape: one row per `(division, month)` shared by every lead
    /// time.
    DivisionMonth,
    /// One row per `(division, month, lead_time)`.
    LeadTime,
}

/// Default number of months forecast past the last observed month.
pub const DEFAULT_HORIZON: u32 = 3;

/// Run-wide forecast options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastOptions {
    /// Months past the last observed month to forecast.
    pub horizon: u32,
    /// Failure handling for missing static-table keys.
    pub failure_policy: FailurePolicy,
    /// Threshold table shape.
    pub threshold_keying: ThresholdKeying,
    /// Evaluate targets on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            failure_policy: FailurePolicy::default(),
            threshold_keying: ThresholdKeying::default(),
            parallel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn lead_time_follows_sample_count() {
        assert_eq!(LeadTimeClass::from_samples_found(3), LeadTimeClass::ZeroMonth);
        assert_eq!(LeadTimeClass::from_samples_found(2), LeadTimeClass::OneMonth);
        assert_eq!(LeadTimeClass::from_samples_found(1), LeadTimeClass::TwoMonth);
        assert_eq!(LeadTimeClass::from_samples_found(0), LeadTimeClass::Unknown);
    }

    #[test]
    fn lead_time_string_forms() {
        for lead_time in LeadTimeClass::all() {
            let parsed = LeadTimeClass::from_str(lead_time.as_ref()).unwrap();
            assert_eq!(parsed, *lead_time);
        }
        assert_eq!(LeadTimeClass::OneMonth.to_string(), "1-month");
    }

    #[test]
    fn max_threshold_picks_larger() {
        let entry = AlertThresholdEntry {
            division: "A".to_string(),
            month: 1,
            lead_time: None,
            coeff: 0.001,
            alert_threshold_std: 0.4,
            alert_threshold_qnt: 0.55,
        };
        assert!((entry.max_threshold() - 0.55).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_entries_flatten_to_empty_columns() {
        let entry = ForecastEntry {
            forecast: RiskForecast {
                target: ForecastTarget {
                    division: "A".to_string(),
                    period: YearMonth::new(2021, 4).unwrap(),
                },
                suitability: None,
                risk: None,
                lead_time: LeadTimeClass::Unknown,
            },
            outcome: ForecastOutcome::Failed(TargetFailure {
                kind: FailureKind::UnknownLeadTime,
                message: "no samples".to_string(),
            }),
        };

        let row = PredictionRow::from(&entry);
        assert_eq!(row.status, RecordStatus::Failed);
        assert_eq!(row.failure, Some(FailureKind::UnknownLeadTime));
        assert!(row.risk.is_none());
        assert!(row.alert.is_none());
        assert_eq!((row.year, row.month), (2021, 4));
    }

    #[test]
    fn degraded_status_for_partial_windows() {
        let record = AlertRecord {
            lead_time: LeadTimeClass::TwoMonth,
            risk: 0.3,
            alert: false,
            potential_cases: 1,
            potential_cases_u9: 0,
            potential_cases_65plus: 0,
            potential_cases_at_threshold: 2,
        };
        let entry = ForecastEntry {
            forecast: RiskForecast {
                target: ForecastTarget {
                    division: "A".to_string(),
                    period: YearMonth::new(2021, 4).unwrap(),
                },
                suitability: None,
                risk: Some(0.3),
                lead_time: LeadTimeClass::TwoMonth,
            },
            outcome: ForecastOutcome::Evaluated(record),
        };
        assert_eq!(entry.status(), RecordStatus::Degraded);
    }
}
