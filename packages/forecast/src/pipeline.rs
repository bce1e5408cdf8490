//! Drives risk estimation, bias correction and alert evaluation over the
//! `(division x month)` grid.
//!
//! Targets are independent, so they are evaluated on the rayon pool once the
//! grid is large enough to pay for it. Results are collected in grid order
//! and failures are logged afterwards, so the output and the log are the
//! same however the work was scheduled.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use vector_risk_forecast_models::{
    FailureKind, FailurePolicy, ForecastEntry, ForecastOptions, ForecastOutcome, ForecastTarget,
    LeadTimeClass, PredictionRow, RiskForecast, RunSummary, TargetFailure,
};
use vector_risk_suitability::index::SuitabilityIndex;

use crate::{
    ForecastError,
    alert::{self, DemographicTable, ThresholdTable},
    bias::BiasCorrector,
    calendar::ForecastCalendar,
    progress::ProgressCallback,
    risk,
};

/// Grids smaller than this are evaluated on the calling thread.
pub const PARALLEL_MIN_TARGETS: usize = 256;

/// Everything a forecast run reads, loaded once up front.
#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    index: SuitabilityIndex,
    corrector: BiasCorrector,
    thresholds: ThresholdTable,
    demographics: DemographicTable,
    options: ForecastOptions,
}

/// One evaluated target plus the error behind a failed outcome, kept so the
/// abort policy can surface it.
#[derive(Debug)]
struct TargetEvaluation {
    entry: ForecastEntry,
    error: Option<ForecastError>,
}

/// Output of a forecast run: one entry per target, in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastReport {
    /// Entries in `(division, period)` grid order.
    pub entries: Vec<ForecastEntry>,
    /// Run-level accounting.
    pub summary: RunSummary,
}

impl ForecastReport {
    /// Flattens the entries into output rows.
    #[must_use]
    pub fn rows(&self) -> Vec<PredictionRow> {
        self.entries.iter().map(PredictionRow::from).collect()
    }

    /// Entries that raised an alert.
    pub fn alerts(&self) -> impl Iterator<Item = &ForecastEntry> {
        self.entries.iter().filter(|entry| {
            matches!(&entry.outcome, ForecastOutcome::Evaluated(record) if record.alert)
        })
    }
}

impl ForecastPipeline {
    /// Bundles the loaded tables and run options.
    #[must_use]
    pub const fn new(
        index: SuitabilityIndex,
        corrector: BiasCorrector,
        thresholds: ThresholdTable,
        demographics: DemographicTable,
        options: ForecastOptions,
    ) -> Self {
        Self {
            index,
            corrector,
            thresholds,
            demographics,
            options,
        }
    }

    /// Every known division: the demographic register in file order, then
    /// divisions that only appear in the suitability history, in first-seen
    /// order.
    ///
    /// The latter have no population, so their targets fail with
    /// [`FailureKind::MissingDemographics`] instead of vanishing from the
    /// run.
    #[must_use]
    pub fn divisions(&self) -> Vec<String> {
        let registered: BTreeSet<&str> = self
            .demographics
            .divisions()
            .iter()
            .map(String::as_str)
            .collect();

        self.demographics
            .divisions()
            .iter()
            .chain(
                self.index
                    .divisions()
                    .iter()
                    .filter(|division| !registered.contains(division.as_str())),
            )
            .cloned()
            .collect()
    }

    /// Calendar derived from the periods in the suitability history.
    #[must_use]
    pub fn calendar(&self) -> ForecastCalendar {
        ForecastCalendar::new(self.index.periods().iter().copied(), self.options.horizon)
    }

    /// Evaluates a single target.
    ///
    /// Lookup failures are recorded on the returned entry, never raised.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that have no per-target
    /// [`FailureKind`].
    pub fn evaluate_target(&self, target: &ForecastTarget) -> Result<ForecastEntry, ForecastError> {
        Ok(self.evaluate(target)?.entry)
    }

    fn evaluate(&self, target: &ForecastTarget) -> Result<TargetEvaluation, ForecastError> {
        let suitability = self.index.get(&target.division, target.period);

        let estimate = match risk::estimate(&self.index, target) {
            Ok(estimate) => estimate,
            Err(e) => {
                let forecast = RiskForecast {
                    target: target.clone(),
                    suitability,
                    risk: None,
                    lead_time: LeadTimeClass::Unknown,
                };
                return failed(forecast, e);
            }
        };

        let forecast = RiskForecast {
            target: target.clone(),
            suitability,
            risk: Some(estimate.risk),
            lead_time: estimate.lead_time,
        };

        let record = self
            .corrector
            .correct(target, estimate.lead_time, estimate.risk)
            .and_then(|risk| {
                alert::evaluate(
                    target,
                    estimate.lead_time,
                    risk,
                    &self.thresholds,
                    &self.demographics,
                )
            });

        match record {
            Ok(record) => Ok(TargetEvaluation {
                entry: ForecastEntry {
                    forecast,
                    outcome: ForecastOutcome::Evaluated(record),
                },
                error: None,
            }),
            Err(e) => failed(forecast, e),
        }
    }

    /// Runs the forecast for every division in `divisions` across the
    /// calendar's target months.
    ///
    /// Every target appears in the report, evaluated or failed.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Abort`], returns the first missing-key error in
    /// grid order. Unknown lead times never abort a run. Errors without a
    /// per-target [`FailureKind`] fail the run under either policy.
    pub fn run(
        &self,
        divisions: &[String],
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<ForecastReport, ForecastError> {
        let start = Instant::now();
        let calendar = self.calendar();
        let targets = calendar.grid(divisions);

        match (calendar.targets().first(), calendar.targets().last()) {
            (Some(first), Some(last)) => log::info!(
                "Forecasting {} targets ({} divisions x {} months, {first} to {last})",
                targets.len(),
                divisions.len(),
                calendar.targets().len(),
            ),
            _ => log::warn!(
                "Suitability history spans {} months; nothing to forecast",
                self.index.periods().len()
            ),
        }

        progress.start(targets.len() as u64, "Evaluating targets");

        let evaluate = |target: &ForecastTarget| {
            let evaluation = self.evaluate(target);
            progress.target_done();
            evaluation
        };

        let evaluations: Vec<TargetEvaluation> =
            if self.options.parallel && targets.len() >= PARALLEL_MIN_TARGETS {
                targets.par_iter().map(&evaluate).collect::<Result<_, _>>()?
            } else {
                targets.iter().map(&evaluate).collect::<Result<_, _>>()?
            };

        let mut entries = Vec::with_capacity(evaluations.len());
        let mut summary = RunSummary::default();

        for TargetEvaluation { entry, error } in evaluations {
            if let Some(error) = error {
                let aborts = self.options.failure_policy == FailurePolicy::Abort
                    && error.failure_kind() != Some(FailureKind::UnknownLeadTime);
                if aborts {
                    log::error!("Aborting forecast run: {error}");
                    progress.finish("Aborted");
                    return Err(error);
                }
                log::error!("{error}");
            }
            summary.record(&entry);
            entries.push(entry);
        }

        log::info!(
            "Forecast complete in {:.1}s: {} targets, {} evaluated ({} degraded), {} failed, {} alerts",
            start.elapsed().as_secs_f64(),
            summary.total,
            summary.succeeded,
            summary.degraded,
            summary.failed,
            summary.alerts,
        );
        for (kind, count) in &summary.failures_by_kind {
            log::info!("  {kind}: {count}");
        }

        progress.finish(&format!(
            "{} targets, {} alerts",
            summary.total, summary.alerts
        ));

        Ok(ForecastReport { entries, summary })
    }
}

/// Records `error` on the target, or hands it back if it has no per-target
/// kind.
fn failed(forecast: RiskForecast, error: ForecastError) -> Result<TargetEvaluation, ForecastError> {
    let Some(kind) = error.failure_kind() else {
        return Err(error);
    };

    Ok(TargetEvaluation {
        entry: ForecastEntry {
            forecast,
            outcome: ForecastOutcome::Failed(TargetFailure {
                kind,
                message: error.to_string(),
            }),
        },
        error: Some(error),
    })
}
