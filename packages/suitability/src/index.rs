//! Immutable suitability lookup keyed by `(division, year, month)`.
//!
//! Built once from the suitability provider's output and shared read-only
//! for the lifetime of a forecast run. A missing key is an expected state
//! (history may have gaps), so lookups return `Option` rather than failing.

use std::collections::{BTreeMap, BTreeSet};

use vector_risk_suitability_models::{SuitabilitySample, YearMonth};

use crate::SuitabilityError;

/// Composite key for one division-month.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DivisionMonth {
    /// Administrative division identifier.
    pub division: String,
    /// Calendar month.
    pub period: YearMonth,
}

impl DivisionMonth {
    /// Creates a key for `division` in `period`.
    #[must_use]
    pub fn new(division: &str, period: YearMonth) -> Self {
        Self {
            division: division.to_owned(),
            period,
        }
    }
}

/// Suitability values keyed by [`DivisionMonth`].
#[derive(Debug, Clone, Default)]
pub struct SuitabilityIndex {
    values: BTreeMap<DivisionMonth, Option<f64>>,
    periods: BTreeSet<YearMonth>,
    divisions: Vec<String>,
}

impl SuitabilityIndex {
    /// Builds the index from provider samples.
    ///
    /// Rows with an empty or `NaN` suitability are kept: their period still
    /// counts as known history, but lookups for them return `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::InvalidPeriod`] for a sample with an
    /// invalid month and [`SuitabilityError::DuplicateSample`] if two samples
    /// share a key.
    pub fn from_samples<'a>(
        samples: impl IntoIterator<Item = &'a SuitabilitySample>,
    ) -> Result<Self, SuitabilityError> {
        let mut index = Self::default();
        let mut seen = BTreeSet::new();

        for sample in samples {
            let period = sample
                .period()
                .map_err(|source| SuitabilityError::InvalidPeriod {
                    division: sample.division.clone(),
                    source,
                })?;
            let key = DivisionMonth::new(&sample.division, period);

            if index.values.contains_key(&key) {
                return Err(SuitabilityError::DuplicateSample {
                    division: sample.division.clone(),
                    period: period.to_string(),
                });
            }

            if !seen.contains(sample.division.as_str()) {
                seen.insert(sample.division.clone());
                index.divisions.push(sample.division.clone());
            }
            index.periods.insert(period);
            index.values.insert(key, sample.value());
        }

        log::debug!(
            "Built suitability index: {} samples, {} divisions, {} periods",
            index.values.len(),
            index.divisions.len(),
            index.periods.len()
        );

        Ok(index)
    }

    /// Returns the suitability for `division` in `period`, or `None` if no
    /// value exists.
    #[must_use]
    pub fn get(&self, division: &str, period: YearMonth) -> Option<f64> {
        self.values
            .get(&DivisionMonth::new(division, period))
            .copied()
            .flatten()
    }

    /// All periods present in the source table, in calendar order.
    #[must_use]
    pub const fn periods(&self) -> &BTreeSet<YearMonth> {
        &self.periods
    }

    /// Divisions in first-seen order.
    #[must_use]
    pub fn divisions(&self) -> &[String] {
        &self.divisions
    }
}
