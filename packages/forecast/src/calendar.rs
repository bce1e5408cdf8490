//! Forecast calendar and acquisition windows.
//!
//! The forecast timeline is every month present in the suitability history
//! followed by `horizon` months past the last one. The first
//! [`WARMUP_MONTHS`] months of the timeline cannot have three backward
//! samples and are never forecast.

use std::collections::BTreeSet;

use chrono::{Datelike as _, Months, NaiveDate};
use vector_risk_forecast_models::ForecastTarget;
use vector_risk_suitability_models::YearMonth;

/// Leading timeline months excluded from the forecast targets.
pub const WARMUP_MONTHS: usize = 3;

/// Months of history needed before the first prediction month.
pub const ACQUISITION_LOOKBACK_MONTHS: u32 = 3;

/// Ordered forecast months derived from observed history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastCalendar {
    timeline: Vec<YearMonth>,
}

impl ForecastCalendar {
    /// Builds the calendar from the periods present in the history.
    ///
    /// Duplicates are collapsed and gaps are kept as gaps; only the months
    /// after the last known one are generated.
    #[must_use]
    pub fn new(known: impl IntoIterator<Item = YearMonth>, horizon: u32) -> Self {
        let mut timeline: Vec<YearMonth> = known
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if let Some(&last) = timeline.last() {
            timeline.extend((1..=horizon).filter_map(|n| last.checked_add_months(n)));
        }

        Self { timeline }
    }

    /// Historical plus extended months, in calendar order.
    #[must_use]
    pub fn timeline(&self) -> &[YearMonth] {
        &self.timeline
    }

    /// Months to forecast: the timeline without its warm-up months.
    #[must_use]
    pub fn targets(&self) -> &[YearMonth] {
        self.timeline.get(WARMUP_MONTHS..).unwrap_or(&[])
    }

    /// The full `(division x month)` grid, division-major.
    #[must_use]
    pub fn grid(&self, divisions: &[String]) -> Vec<ForecastTarget> {
        divisions
            .iter()
            .flat_map(|division| {
                self.targets().iter().map(move |&period| ForecastTarget {
                    division: division.clone(),
                    period,
                })
            })
            .collect()
    }
}

/// Returns the `(first, last)` day of every month that completes within
/// `[begin, end]`.
///
/// The first window starts at `begin` even mid-month. A trailing month that
/// is still incomplete at `end` is left out, since its aggregate would only
/// cover part of the month.
#[must_use]
pub fn month_windows(begin: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut start = begin;

    while let Some(month_end) = last_day_of_month(start) {
        if month_end > end {
            break;
        }
        windows.push((start, month_end));
        let Some(next) = month_end.succ_opt() else {
            break;
        };
        start = next;
    }

    windows
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// Date range of meteorological history to aggregate for a prediction
/// starting at `predict_start`.
///
/// Starts on the first of the month [`ACQUISITION_LOOKBACK_MONTHS`] before
/// `predict_start`. Ends one month before `predict_end` when given,
/// otherwise at `predict_start`.
#[must_use]
pub fn acquisition_range(
    predict_start: NaiveDate,
    predict_end: Option<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = predict_start
        .checked_sub_months(Months::new(ACQUISITION_LOOKBACK_MONTHS))?
        .with_day(1)?;
    let end = match predict_end {
        Some(end) => end.checked_sub_months(Months::new(1))?,
        None => predict_start,
    };
    Some((start, end))
}
