//! Alert thresholds and case estimation.
//!
//! A forecast raises an alert when its risk exceeds the larger of the two
//! calibrated thresholds for its key. Case estimates scale risk by the
//! table coefficient and the division's population, truncated to whole
//! cases.

use std::collections::BTreeMap;

use vector_risk_forecast_models::{
    AlertRecord, AlertThresholdEntry, DemographicEntry, ForecastTarget, LeadTimeClass,
    ThresholdKeying,
};

use crate::ForecastError;

type ThresholdKey = (String, u32, Option<LeadTimeClass>);

/// Alert thresholds keyed by `(division, month[, lead_time])`.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    keying: ThresholdKeying,
    entries: BTreeMap<ThresholdKey, AlertThresholdEntry>,
}

impl ThresholdTable {
    /// Builds the table, resolving [`ThresholdKeying::Auto`] from the rows.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::ThresholdShape`] if the rows do not fit the
    /// keying (a mix of rows with and without lead time, or a lead-time
    /// keyed table with a row lacking one) and
    /// [`ForecastError::DuplicateKey`] if two rows share a key.
    pub fn from_entries(
        rows: Vec<AlertThresholdEntry>,
        keying: ThresholdKeying,
    ) -> Result<Self, ForecastError> {
        let with_lead_time = rows.iter().filter(|r| r.lead_time.is_some()).count();

        let keying = match keying {
            ThresholdKeying::Auto if with_lead_time == 0 => ThresholdKeying::DivisionMonth,
            ThresholdKeying::Auto if with_lead_time == rows.len() => ThresholdKeying::LeadTime,
            ThresholdKeying::Auto => {
                return Err(ForecastError::ThresholdShape {
                    message: format!(
                        "{with_lead_time} of {} rows have a lead_time; expected all or none",
                        rows.len()
                    ),
                });
            }
            ThresholdKeying::LeadTime if with_lead_time < rows.len() => {
                return Err(ForecastError::ThresholdShape {
                    message: format!(
                        "lead-time keyed table has {} rows without a lead_time",
                        rows.len() - with_lead_time
                    ),
                });
            }
            keying => keying,
        };

        let mut entries = BTreeMap::new();
        for row in rows {
            let lead_time = match keying {
                ThresholdKeying::LeadTime => row.lead_time,
                _ => None,
            };
            let key = (row.division.clone(), row.month, lead_time);
            if entries.contains_key(&key) {
                return Err(ForecastError::DuplicateKey {
                    table: "alert threshold",
                    key: format!(
                        "division={} month={}{}",
                        row.division,
                        row.month,
                        lead_time.map_or_else(String::new, |l| format!(" lead_time={l}"))
                    ),
                });
            }
            entries.insert(key, row);
        }

        log::debug!(
            "Loaded {} alert thresholds ({keying} keyed)",
            entries.len()
        );

        Ok(Self { keying, entries })
    }

    /// The resolved keying (never [`ThresholdKeying::Auto`]).
    #[must_use]
    pub const fn keying(&self) -> ThresholdKeying {
        self.keying
    }

    /// Returns the thresholds for the key. `lead_time` is ignored for
    /// division/month keyed tables.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::MissingThreshold`] if no row matches.
    pub fn get(
        &self,
        division: &str,
        month: u32,
        lead_time: LeadTimeClass,
    ) -> Result<&AlertThresholdEntry, ForecastError> {
        let lead_time = match self.keying {
            ThresholdKeying::LeadTime => Some(lead_time),
            _ => None,
        };
        self.entries
            .get(&(division.to_owned(), month, lead_time))
            .ok_or_else(|| ForecastError::MissingThreshold {
                division: division.to_owned(),
                month,
                lead_time,
            })
    }
}

/// Population figures keyed by division, in register order.
#[derive(Debug, Clone, Default)]
pub struct DemographicTable {
    entries: BTreeMap<String, DemographicEntry>,
    divisions: Vec<String>,
}

impl DemographicTable {
    /// Builds the table from its rows.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::DuplicateKey`] if a division appears twice.
    pub fn from_entries(
        rows: impl IntoIterator<Item = DemographicEntry>,
    ) -> Result<Self, ForecastError> {
        let mut table = Self::default();

        for row in rows {
            if table.entries.contains_key(&row.division) {
                return Err(ForecastError::DuplicateKey {
                    table: "demographic",
                    key: format!("division={}", row.division),
                });
            }
            table.divisions.push(row.division.clone());
            table.entries.insert(row.division.clone(), row);
        }

        Ok(table)
    }

    /// Returns the row for `division`.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::MissingDemographics`] if no row matches.
    pub fn get(&self, division: &str) -> Result<&DemographicEntry, ForecastError> {
        self.entries
            .get(division)
            .ok_or_else(|| ForecastError::MissingDemographics {
                division: division.to_owned(),
            })
    }

    /// Divisions in the order they appear in the table.
    #[must_use]
    pub fn divisions(&self) -> &[String] {
        &self.divisions
    }
}

/// `coeff * risk * population`, truncated toward zero.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn potential_cases(coeff: f64, risk: f64, population: u64) -> i64 {
    (coeff * risk * population as f64).trunc() as i64
}

/// Evaluates one forecast against its thresholds and population.
///
/// # Errors
///
/// Returns [`ForecastError::MissingThreshold`] or
/// [`ForecastError::MissingDemographics`] if a lookup fails. There is no
/// default threshold.
pub fn evaluate(
    target: &ForecastTarget,
    lead_time: LeadTimeClass,
    risk: f64,
    thresholds: &ThresholdTable,
    demographics: &DemographicTable,
) -> Result<AlertRecord, ForecastError> {
    let threshold = thresholds.get(&target.division, target.period.month(), lead_time)?;
    let population = demographics.get(&target.division)?;
    let max_threshold = threshold.max_threshold();

    Ok(AlertRecord {
        lead_time,
        risk,
        alert: risk > max_threshold,
        potential_cases: potential_cases(threshold.coeff, risk, population.population_total),
        potential_cases_u9: potential_cases(threshold.coeff, risk, population.population_under9),
        potential_cases_65plus: potential_cases(
            threshold.coeff,
            risk,
            population.population_65plus,
        ),
        potential_cases_at_threshold: potential_cases(
            threshold.coeff,
            max_threshold,
            population.population_total,
        ),
    })
}

#[cfg(test)]
mod tests {
    use vector_risk_suitability_models::YearMonth;

    use super::*;

    fn threshold(lead_time: Option<LeadTimeClass>, std: f64, qnt: f64) -> AlertThresholdEntry {
        AlertThresholdEntry {
            division: "A".to_string(),
            month: 5,
            lead_time,
            coeff: 0.001,
            alert_threshold_std: std,
            alert_threshold_qnt: qnt,
        }
    }

    fn demographics() -> DemographicTable {
        DemographicTable::from_entries(vec![DemographicEntry {
            division: "A".to_string(),
            population_total: 12_499,
            population_under9: 2_000,
            population_65plus: 1_500,
        }])
        .unwrap()
    }

    fn target() -> ForecastTarget {
        ForecastTarget {
            division: "A".to_string(),
            period: YearMonth::new(2021, 5).unwrap(),
        }
    }

    #[test]
    fn cases_truncate_instead_of_rounding() {
        // 0.001 * 0.999 * 12499 = 12.486...
        assert_eq!(potential_cases(0.001, 0.999, 12_499), 12);
        assert_eq!(potential_cases(0.001, 0.9999, 1_000), 0);
    }

    #[test]
    fn alerts_only_above_the_larger_threshold() {
        let table =
            ThresholdTable::from_entries(vec![threshold(None, 0.5, 0.7)], ThresholdKeying::Auto)
                .unwrap();
        let demo = demographics();

        let below = evaluate(&target(), LeadTimeClass::ZeroMonth, 0.6, &table, &demo).unwrap();
        assert!(!below.alert);

        let at = evaluate(&target(), LeadTimeClass::ZeroMonth, 0.7, &table, &demo).unwrap();
        assert!(!at.alert);

        let above = evaluate(&target(), LeadTimeClass::ZeroMonth, 0.71, &table, &demo).unwrap();
        assert!(above.alert);
    }

    #[test]
    fn estimates_cases_for_each_population() {
        let table =
            ThresholdTable::from_entries(vec![threshold(None, 0.5, 0.7)], ThresholdKeying::Auto)
                .unwrap();
        let record =
            evaluate(&target(), LeadTimeClass::ZeroMonth, 0.999, &table, &demographics()).unwrap();

        assert_eq!(record.potential_cases, 12);
        assert_eq!(record.potential_cases_u9, 1);
        assert_eq!(record.potential_cases_65plus, 1);
        // 0.001 * 0.7 * 12499 = 8.749...
        assert_eq!(record.potential_cases_at_threshold, 8);
    }

    #[test]
    fn legacy_table_is_shared_across_lead_times() {
        let table =
            ThresholdTable::from_entries(vec![threshold(None, 0.5, 0.7)], ThresholdKeying::Auto)
                .unwrap();
        assert_eq!(table.keying(), ThresholdKeying::DivisionMonth);
        for lead_time in [LeadTimeClass::ZeroMonth, LeadTimeClass::OneMonth, LeadTimeClass::TwoMonth] {
            assert!(table.get("A", 5, lead_time).is_ok());
        }
    }

    #[test]
    fn lead_time_table_keys_on_lead_time() {
        let table = ThresholdTable::from_entries(
            vec![
                threshold(Some(LeadTimeClass::ZeroMonth), 0.5, 0.7),
                threshold(Some(LeadTimeClass::OneMonth), 0.2, 0.3),
            ],
            ThresholdKeying::Auto,
        )
        .unwrap();
        assert_eq!(table.keying(), ThresholdKeying::LeadTime);

        let one = table.get("A", 5, LeadTimeClass::OneMonth).unwrap();
        assert!((one.max_threshold() - 0.3).abs() < f64::EPSILON);

        let err = table.get("A", 5, LeadTimeClass::TwoMonth).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::MissingThreshold {
                lead_time: Some(LeadTimeClass::TwoMonth),
                ..
            }
        ));
    }

    #[test]
    fn forced_division_month_keying_ignores_lead_time_column() {
        let table = ThresholdTable::from_entries(
            vec![threshold(Some(LeadTimeClass::ZeroMonth), 0.5, 0.7)],
            ThresholdKeying::DivisionMonth,
        )
        .unwrap();
        assert!(table.get("A", 5, LeadTimeClass::TwoMonth).is_ok());
    }

    #[test]
    fn rejects_mixed_shapes() {
        let err = ThresholdTable::from_entries(
            vec![
                threshold(Some(LeadTimeClass::ZeroMonth), 0.5, 0.7),
                threshold(None, 0.5, 0.7),
            ],
            ThresholdKeying::Auto,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::ThresholdShape { .. }));

        let err = ThresholdTable::from_entries(
            vec![threshold(None, 0.5, 0.7)],
            ThresholdKeying::LeadTime,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::ThresholdShape { .. }));
    }

    #[test]
    fn missing_rows_are_named_errors() {
        let table =
            ThresholdTable::from_entries(vec![threshold(None, 0.5, 0.7)], ThresholdKeying::Auto)
                .unwrap();
        let other = ForecastTarget {
            division: "B".to_string(),
            period: YearMonth::new(2021, 5).unwrap(),
        };
        let err = evaluate(&other, LeadTimeClass::ZeroMonth, 0.5, &table, &demographics())
            .unwrap_err();
        assert!(matches!(err, ForecastError::MissingThreshold { .. }));

        let err = demographics().get("B").unwrap_err();
        assert!(matches!(err, ForecastError::MissingDemographics { .. }));
    }

    #[test]
    fn demographic_register_keeps_order() {
        let table = DemographicTable::from_entries(vec![
            DemographicEntry {
                division: "Z".to_string(),
                population_total: 1,
                population_under9: 0,
                population_65plus: 0,
            },
            DemographicEntry {
                division: "A".to_string(),
                population_total: 1,
                population_under9: 0,
                population_65plus: 0,
            },
        ])
        .unwrap();
        assert_eq!(table.divisions(), ["Z".to_string(), "A".to_string()]);
    }
}
