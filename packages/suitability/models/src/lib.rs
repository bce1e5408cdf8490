#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monthly period and suitability sample types.
//!
//! Every table in the vector-risk system is keyed by an administrative
//! division and a calendar month. [`YearMonth`] pins each month to its 15th
//! day so that fixed-day offsets (30/60/90 days back) always land inside a
//! single neighbouring month.

use chrono::{Datelike as _, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Day of the month every [`YearMonth`] is anchored to.
pub const ANCHOR_DAY: u32 = 15;

/// A calendar month, represented by its anchor date (the 15th).
///
/// Ordering follows the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    anchor: NaiveDate,
}

impl YearMonth {
    /// Creates the period for `year`/`month`.
    ///
    /// # Errors
    ///
    /// Returns an error if `month` is not in 1-12 or the year is outside
    /// the supported calendar range.
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidPeriodError> {
        NaiveDate::from_ymd_opt(year, month, ANCHOR_DAY)
            .map(|anchor| Self { anchor })
            .ok_or(InvalidPeriodError { year, month })
    }

    /// Returns the period containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Option<Self> {
        date.with_day(ANCHOR_DAY).map(|anchor| Self { anchor })
    }

    /// The 15th of this month.
    #[must_use]
    pub const fn anchor(self) -> NaiveDate {
        self.anchor
    }

    /// Calendar year.
    #[must_use]
    pub fn year(self) -> i32 {
        self.anchor.year()
    }

    /// Calendar month (1-12).
    #[must_use]
    pub fn month(self) -> u32 {
        self.anchor.month()
    }

    /// The period `months` months later, or `None` past the end of the
    /// calendar.
    #[must_use]
    pub fn checked_add_months(self, months: u32) -> Option<Self> {
        self.anchor
            .checked_add_months(Months::new(months))
            .map(|anchor| Self { anchor })
    }

    /// The period `months` months earlier.
    #[must_use]
    pub fn checked_sub_months(self, months: u32) -> Option<Self> {
        self.anchor
            .checked_sub_months(Months::new(months))
            .map(|anchor| Self { anchor })
    }

    /// The period containing the date `days` days before this period's
    /// anchor.
    #[must_use]
    pub fn days_before(self, days: u64) -> Option<Self> {
        self.anchor
            .checked_sub_days(Days::new(days))
            .and_then(Self::containing)
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// Error returned when a year/month pair does not name a valid calendar
/// month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPeriodError {
    /// The year that was provided.
    pub year: i32,
    /// The month that was provided.
    pub month: u32,
}

impl std::fmt::Display for InvalidPeriodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid period {}-{}: expected month 1-12 within the supported calendar",
            self.year, self.month
        )
    }
}

impl std::error::Error for InvalidPeriodError {}

/// One suitability value for a division and month, as produced by the
/// suitability provider.
///
/// Extra columns in the source table (rainfall, temperature intermediates)
/// are ignored when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuitabilitySample {
    /// Administrative division identifier.
    #[serde(alias = "adm_division")]
    pub division: String,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
    /// Suitability score in `[0, 1]`. `None` when the provider had no data.
    #[serde(default)]
    pub suitability: Option<f64>,
}

impl SuitabilitySample {
    /// Returns the period this sample belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if `year`/`month` is not a valid calendar month.
    pub fn period(&self) -> Result<YearMonth, InvalidPeriodError> {
        YearMonth::new(self.year, self.month)
    }

    /// Returns the suitability value, treating `NaN` as missing.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.suitability.filter(|v| !v.is_nan())
    }
}

/// Monthly meteorological aggregates for one division, as produced by the
/// zonal aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteorologicalSample {
    /// Administrative division identifier.
    #[serde(alias = "adm_division")]
    pub division: String,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
    /// Monthly precipitation from the calibrated satellite product (mm).
    #[serde(rename = "precipitationCal", default)]
    pub precipitation_cal: Option<f64>,
    /// Monthly precipitation from the hourly rate product (mm).
    #[serde(rename = "hourlyPrecipRate", default)]
    pub hourly_precip_rate: Option<f64>,
    /// Mean daytime land-surface temperature (°C).
    #[serde(rename = "LST_Day_1km", default)]
    pub lst_day: Option<f64>,
    /// Mean night-time land-surface temperature (°C).
    #[serde(rename = "LST_Night_1km", default)]
    pub lst_night: Option<f64>,
}

/// One point of the temperature-to-suitability response curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSuitabilityPoint {
    /// Temperature (°C).
    pub temperature: f64,
    /// Suitability at that temperature, in `[0, 1]`.
    pub temperature_suitability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_on_the_fifteenth() {
        let period = YearMonth::new(2021, 5).unwrap();
        assert_eq!(period.anchor(), NaiveDate::from_ymd_opt(2021, 5, 15).unwrap());
        assert_eq!(period.to_string(), "2021-05");
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(YearMonth::new(2021, 0).is_err());
        assert!(YearMonth::new(2021, 13).is_err());
    }

    #[test]
    fn offsets_land_in_neighbouring_months() {
        let may = YearMonth::new(2021, 5).unwrap();
        assert_eq!(may.days_before(30), Some(YearMonth::new(2021, 4).unwrap()));
        assert_eq!(may.days_before(60), Some(YearMonth::new(2021, 3).unwrap()));
        assert_eq!(may.days_before(90), Some(YearMonth::new(2021, 2).unwrap()));

        // March 15th minus 30 days is in February even in leap years.
        let march = YearMonth::new(2020, 3).unwrap();
        assert_eq!(march.days_before(30), Some(YearMonth::new(2020, 2).unwrap()));
    }

    #[test]
    fn month_arithmetic_crosses_years() {
        let nov = YearMonth::new(2020, 11).unwrap();
        assert_eq!(nov.checked_add_months(3), Some(YearMonth::new(2021, 2).unwrap()));
        assert_eq!(
            YearMonth::new(2021, 1).unwrap().checked_sub_months(1),
            Some(YearMonth::new(2020, 12).unwrap())
        );
    }

    #[test]
    fn nan_suitability_is_missing() {
        let sample = SuitabilitySample {
            division: "A".to_string(),
            year: 2021,
            month: 1,
            suitability: Some(f64::NAN),
        };
        assert!(sample.value().is_none());
    }
}
