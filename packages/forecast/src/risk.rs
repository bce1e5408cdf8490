//! Lead-time-aware risk estimation.
//!
//! Risk for a target month is a weighted average of suitability sampled
//! 90, 60 and 30 days before the target's anchor date. The weights
//! approximate a discretized lag kernel. When some samples are missing
//! (always the case for months past the observed history) the weights of
//! the samples that do exist are renormalized to sum to one, and the number
//! of samples found decides the forecast's lead-time class.

use vector_risk_forecast_models::{ForecastTarget, LeadTimeClass};
use vector_risk_suitability::index::SuitabilityIndex;
use vector_risk_suitability_models::YearMonth;

use crate::ForecastError;

/// `(days before anchor, weight)` for each input sample, oldest first.
pub const INPUT_LAGS: [(u64, f64); 3] = [(90, 0.16), (60, 0.68), (30, 0.16)];

/// A defined risk estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskEstimate {
    /// Weighted, renormalized risk.
    pub risk: f64,
    /// Lead-time class derived from `samples_found`.
    pub lead_time: LeadTimeClass,
    /// How many of the three input samples existed.
    pub samples_found: usize,
}

/// Periods the three input samples are read from, oldest first.
#[must_use]
pub fn input_periods(period: YearMonth) -> [Option<YearMonth>; 3] {
    INPUT_LAGS.map(|(days, _)| period.days_before(days))
}

/// Estimates risk for `target` from the suitability index.
///
/// # Errors
///
/// Returns [`ForecastError::UnknownLeadTime`] if none of the input samples
/// exist, since the weighted average is then undefined.
pub fn estimate(
    index: &SuitabilityIndex,
    target: &ForecastTarget,
) -> Result<RiskEstimate, ForecastError> {
    let mut risk_total = 0.0;
    let mut weight_total = 0.0;
    let mut samples_found = 0;

    for ((_, weight), period) in INPUT_LAGS.iter().zip(input_periods(target.period)) {
        let Some(suitability) = period.and_then(|p| index.get(&target.division, p)) else {
            continue;
        };
        risk_total += weight * suitability;
        weight_total += weight;
        samples_found += 1;
    }

    let lead_time = LeadTimeClass::from_samples_found(samples_found);
    if samples_found == 0 {
        return Err(ForecastError::UnknownLeadTime {
            division: target.division.clone(),
            period: target.period.to_string(),
        });
    }

    if !lead_time.is_complete() {
        log::debug!(
            "{} {}: {samples_found}/3 samples, renormalized over weight {weight_total}",
            target.division,
            target.period,
        );
    }

    Ok(RiskEstimate {
        risk: risk_total / weight_total,
        lead_time,
        samples_found,
    })
}
