//! Suitability derivation from monthly meteorological aggregates.
//!
//! Suitability is the mean of a rainfall term and a temperature term:
//!
//! * rainfall is the mean of the two precipitation products, scaled
//!   linearly up to a saturation point above which it scores `1.0`
//! * temperature is looked up in a response curve (nearest tabulated
//!   temperature) for both day and night land-surface temperature, and the
//!   lower of the two is used
//!
//! Any missing input makes the derived suitability missing.

use std::collections::BTreeMap;

use serde::Deserialize;
use vector_risk_suitability_models::{
    MeteorologicalSample, SuitabilitySample, TemperatureSuitabilityPoint,
};

use crate::SuitabilityError;

/// Monthly rainfall (mm) at and above which rainfall suitability is `1.0`.
pub const RAINFALL_SATURATION_MM: f64 = 300.0;

/// Tunables for [`derive_samples`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DerivationOptions {
    /// Rainfall saturation point (mm).
    pub rainfall_saturation_mm: f64,
    /// Per-division correction added to the daytime land-surface
    /// temperature before the curve lookup (e.g. `-4.0` for dense urban
    /// divisions where the satellite reading runs hot).
    pub day_temperature_offsets: BTreeMap<String, f64>,
}

impl Default for DerivationOptions {
    fn default() -> Self {
        Self {
            rainfall_saturation_mm: RAINFALL_SATURATION_MM,
            day_temperature_offsets: BTreeMap::new(),
        }
    }
}

/// Temperature-to-suitability response curve.
#[derive(Debug, Clone)]
pub struct TemperatureCurve {
    points: Vec<TemperatureSuitabilityPoint>,
}

impl TemperatureCurve {
    /// Wraps the tabulated curve points. Order is preserved; it decides
    /// which point wins when two are equally close.
    ///
    /// # Errors
    ///
    /// Returns [`SuitabilityError::EmptyTemperatureCurve`] if `points` is
    /// empty.
    pub fn new(points: Vec<TemperatureSuitabilityPoint>) -> Result<Self, SuitabilityError> {
        if points.is_empty() {
            return Err(SuitabilityError::EmptyTemperatureCurve);
        }
        Ok(Self { points })
    }

    /// Suitability of the tabulated temperature closest to `temperature`.
    #[must_use]
    pub fn suitability_at(&self, temperature: f64) -> f64 {
        let mut best = &self.points[0];
        let mut best_distance = (best.temperature - temperature).abs();

        for point in &self.points[1..] {
            let distance = (point.temperature - temperature).abs();
            if distance < best_distance {
                best = point;
                best_distance = distance;
            }
        }

        best.temperature_suitability
    }
}

/// Rainfall suitability for `rainfall` mm, saturating at `saturation_mm`.
#[must_use]
pub fn rain_suitability(rainfall: f64, saturation_mm: f64) -> f64 {
    if rainfall > saturation_mm {
        1.0
    } else {
        rainfall / saturation_mm
    }
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Derives the suitability sample for one meteorological record.
#[must_use]
pub fn derive_sample(
    sample: &MeteorologicalSample,
    curve: &TemperatureCurve,
    options: &DerivationOptions,
) -> SuitabilitySample {
    let rainfall = present(sample.hourly_precip_rate)
        .zip(present(sample.precipitation_cal))
        .map(|(hourly, calibrated)| f64::midpoint(hourly, calibrated));
    let rain = rainfall.map(|r| rain_suitability(r, options.rainfall_saturation_mm));

    let day_offset = options
        .day_temperature_offsets
        .get(&sample.division)
        .copied()
        .unwrap_or(0.0);
    let day = present(sample.lst_day).map(|t| curve.suitability_at(t + day_offset));
    let night = present(sample.lst_night).map(|t| curve.suitability_at(t));

    let temperature = match (day, night) {
        (Some(d), Some(n)) => Some(d.min(n)),
        (d, n) => d.or(n),
    };

    let suitability = temperature
        .zip(rain)
        .map(|(t, r)| f64::midpoint(t, r));

    SuitabilitySample {
        division: sample.division.clone(),
        year: sample.year,
        month: sample.month,
        suitability,
    }
}

/// Derives suitability samples for every meteorological record, preserving
/// input order.
#[must_use]
pub fn derive_samples(
    samples: &[MeteorologicalSample],
    curve: &TemperatureCurve,
    options: &DerivationOptions,
) -> Vec<SuitabilitySample> {
    let derived: Vec<SuitabilitySample> = samples
        .iter()
        .map(|s| derive_sample(s, curve, options))
        .collect();

    let missing = derived.iter().filter(|s| s.suitability.is_none()).count();
    if missing > 0 {
        log::warn!(
            "{missing} of {} division-months have incomplete meteorological data; suitability left empty",
            derived.len()
        );
    }

    derived
}
