//! Lead-time bias correction.
//!
//! Partial-window estimates are systematically biased. The correction
//! table holds an empirically fitted `(ratio_std, diff_mean)` pair per
//! `(lead_time, month, division)` and is applied as
//! `ratio_std * risk - diff_mean`. Full-window (`0-month`) estimates pass
//! through unchanged.
//!
//! A missing row is an error. An uncorrected estimate must never pass as
//! corrected.

use std::collections::BTreeMap;

use vector_risk_forecast_models::{BiasCorrectionEntry, ForecastTarget, LeadTimeClass};

use crate::ForecastError;

type CorrectionKey = (LeadTimeClass, u32, String);

/// Bias corrections keyed by `(lead_time, month, division)`.
#[derive(Debug, Clone, Default)]
pub struct BiasCorrectionTable {
    entries: BTreeMap<CorrectionKey, BiasCorrectionEntry>,
}

impl BiasCorrectionTable {
    /// Builds the table from its rows.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::DuplicateKey`] if two rows share a key.
    pub fn from_entries(
        rows: impl IntoIterator<Item = BiasCorrectionEntry>,
    ) -> Result<Self, ForecastError> {
        let mut entries = BTreeMap::new();

        for row in rows {
            let key = (row.lead_time, row.month, row.division.clone());
            if entries.contains_key(&key) {
                return Err(ForecastError::DuplicateKey {
                    table: "bias correction",
                    key: format!(
                        "lead_time={} month={} division={}",
                        row.lead_time, row.month, row.division
                    ),
                });
            }
            entries.insert(key, row);
        }

        Ok(Self { entries })
    }

    /// Returns the correction for the key, if present.
    #[must_use]
    pub fn get(
        &self,
        lead_time: LeadTimeClass,
        month: u32,
        division: &str,
    ) -> Option<&BiasCorrectionEntry> {
        self.entries.get(&(lead_time, month, division.to_owned()))
    }
}

/// Run-wide bias correction mode.
#[derive(Debug, Clone, Default)]
pub enum BiasCorrector {
    /// No correction configured: raw risk passes through for every lead
    /// time.
    #[default]
    Disabled,
    /// Correct non-`0-month` estimates from the table.
    Table(BiasCorrectionTable),
}

impl BiasCorrector {
    /// Corrects `risk` for `target` at `lead_time`.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::MissingCorrection`] if a table is configured,
    /// the lead time is not `0-month`, and the table has no row for the key.
    #[allow(clippy::suboptimal_flops)]
    pub fn correct(
        &self,
        target: &ForecastTarget,
        lead_time: LeadTimeClass,
        risk: f64,
    ) -> Result<f64, ForecastError> {
        let Self::Table(table) = self else {
            return Ok(risk);
        };

        if lead_time.is_complete() {
            return Ok(risk);
        }

        let month = target.period.month();
        let entry = table.get(lead_time, month, &target.division).ok_or_else(|| {
            ForecastError::MissingCorrection {
                lead_time,
                month,
                division: target.division.clone(),
            }
        })?;

        Ok(entry.ratio_std * risk - entry.diff_mean)
    }
}
