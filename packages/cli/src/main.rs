#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the vector risk forecast.
//!
//! Uses `indicatif-log-bridge` (via [`vector_risk_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the evaluation progress bar share the terminal cleanly.

mod config;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use vector_risk_cli_utils::{IndicatifProgress, MultiProgress};
use vector_risk_forecast::{
    alert::{DemographicTable, ThresholdTable},
    bias::{BiasCorrectionTable, BiasCorrector},
    calendar::{ForecastCalendar, acquisition_range, month_windows},
    pipeline::ForecastPipeline,
};
use vector_risk_forecast_models::{FailurePolicy, ThresholdKeying};
use vector_risk_suitability::{
    derive::{TemperatureCurve, derive_samples},
    index::SuitabilityIndex,
};
use vector_risk_tables as tables;

use crate::config::{Config, require_path};

#[derive(Parser)]
#[command(name = "vector_risk", about = "Vector-borne disease risk forecasting")]
struct Cli {
    /// Path to a TOML config file (defaults to `$VECTOR_RISK_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast risk and alerts for every division and target month
    Forecast {
        /// Suitability table (CSV)
        #[arg(long)]
        suitability: Option<PathBuf>,
        /// Alert threshold table (CSV)
        #[arg(long)]
        thresholds: Option<PathBuf>,
        /// Demographic register (CSV); its row order is the output order
        #[arg(long)]
        demographics: Option<PathBuf>,
        /// Bias correction table (CSV); correction is disabled without one
        #[arg(long)]
        bias_corrections: Option<PathBuf>,
        /// Predictions output (CSV); written to stdout when not configured
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run summary output (JSON)
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Months to forecast past the last observed month
        #[arg(long)]
        horizon: Option<u32>,
        /// `skip` records missing table keys and continues; `abort` fails
        /// the run on the first one
        #[arg(long, value_parser = parse_enum::<FailurePolicy>)]
        failure_policy: Option<FailurePolicy>,
        /// Threshold table shape: `auto`, `division-month` or `lead-time`
        #[arg(long, value_parser = parse_enum::<ThresholdKeying>)]
        threshold_keying: Option<ThresholdKeying>,
        /// Evaluate targets on the calling thread only
        #[arg(long)]
        sequential: bool,
    },
    /// List the forecast months derived from a suitability table
    Targets {
        /// Suitability table (CSV)
        #[arg(long)]
        suitability: Option<PathBuf>,
        /// Months to forecast past the last observed month
        #[arg(long)]
        horizon: Option<u32>,
    },
    /// Show the meteorological acquisition window for a prediction period
    Windows {
        /// First day of the prediction period (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the prediction period (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Derive a suitability table from meteorological aggregates
    Suitability {
        /// Monthly meteorological aggregates (CSV)
        #[arg(long)]
        meteorology: Option<PathBuf>,
        /// Temperature response curve (CSV)
        #[arg(long)]
        temperature_curve: Option<PathBuf>,
        /// Suitability output (CSV)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_enum<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value.parse().map_err(|_| format!("unrecognized value `{value}`"))
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = vector_risk_cli_utils::init_logger();
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Forecast {
            suitability,
            thresholds,
            demographics,
            bias_corrections,
            output,
            summary,
            horizon,
            failure_policy,
            threshold_keying,
            sequential,
        } => {
            if let Some(horizon) = horizon {
                config.forecast.horizon = horizon;
            }
            if let Some(policy) = failure_policy {
                config.forecast.failure_policy = policy;
            }
            if let Some(keying) = threshold_keying {
                config.forecast.threshold_keying = keying;
            }
            if sequential {
                config.forecast.parallel = false;
            }
            if bias_corrections.is_some() {
                config.inputs.bias_corrections = bias_corrections;
            }
            if output.is_some() {
                config.output.predictions = output;
            }
            if summary.is_some() {
                config.output.summary = summary;
            }

            let suitability = require_path(
                suitability,
                config.inputs.suitability.as_ref(),
                "inputs.suitability",
                "suitability",
            )?;
            let thresholds = require_path(
                thresholds,
                config.inputs.thresholds.as_ref(),
                "inputs.thresholds",
                "thresholds",
            )?;
            let demographics = require_path(
                demographics,
                config.inputs.demographics.as_ref(),
                "inputs.demographics",
                "demographics",
            )?;

            run_forecast(&config, &suitability, &thresholds, &demographics, &multi)?;
        }
        Commands::Targets {
            suitability,
            horizon,
        } => {
            let suitability = require_path(
                suitability,
                config.inputs.suitability.as_ref(),
                "inputs.suitability",
                "suitability",
            )?;
            let samples = tables::read_suitability(&suitability)?;
            let index = SuitabilityIndex::from_samples(&samples)?;
            let calendar = ForecastCalendar::new(
                index.periods().iter().copied(),
                horizon.unwrap_or(config.forecast.horizon),
            );

            println!("{:<10} SOURCE", "MONTH");
            println!("{}", "-".repeat(20));
            for period in calendar.targets() {
                let source = if index.periods().contains(period) {
                    "history"
                } else {
                    "extended"
                };
                println!("{:<10} {source}", period.to_string());
            }
            println!();
            println!(
                "{} target months x {} divisions",
                calendar.targets().len(),
                index.divisions().len()
            );
        }
        Commands::Windows { start, end } => {
            let Some((begin, finish)) = acquisition_range(start, end) else {
                return Err(format!("Acquisition range for {start} is out of the date range").into());
            };

            println!("Acquire {begin} to {finish}");
            println!();
            println!("{:<12} END", "START");
            println!("{}", "-".repeat(24));
            for (window_start, window_end) in month_windows(begin, finish) {
                println!("{:<12} {window_end}", window_start.to_string());
            }
        }
        Commands::Suitability {
            meteorology,
            temperature_curve,
            output,
        } => {
            let meteorology = require_path(
                meteorology,
                config.suitability.meteorology.as_ref(),
                "suitability.meteorology",
                "meteorology",
            )?;
            let temperature_curve = require_path(
                temperature_curve,
                config.suitability.temperature_curve.as_ref(),
                "suitability.temperature_curve",
                "temperature-curve",
            )?;
            let output = require_path(
                output,
                config.suitability.output.as_ref(),
                "suitability.output",
                "output",
            )?;

            let samples = tables::read_meteorology(&meteorology)?;
            let curve = TemperatureCurve::new(tables::read_temperature_curve(&temperature_curve)?)?;
            let derived = derive_samples(&samples, &curve, &config.suitability.derivation);
            tables::write_suitability(&output, &derived)?;
        }
    }

    Ok(())
}

fn run_forecast(
    config: &Config,
    suitability: &std::path::Path,
    thresholds: &std::path::Path,
    demographics: &std::path::Path,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let samples = tables::read_suitability(suitability)?;
    let index = SuitabilityIndex::from_samples(&samples)?;
    let thresholds = ThresholdTable::from_entries(
        tables::read_thresholds(thresholds)?,
        config.forecast.threshold_keying,
    )?;
    let demographics = DemographicTable::from_entries(tables::read_demographics(demographics)?)?;

    let corrector = match &config.inputs.bias_corrections {
        Some(path) => {
            BiasCorrector::Table(BiasCorrectionTable::from_entries(tables::read_bias_corrections(
                path,
            )?)?)
        }
        None => {
            log::warn!("No bias correction table configured; partial-window risk is uncorrected");
            BiasCorrector::Disabled
        }
    };

    let registered: BTreeSet<&str> = demographics.divisions().iter().map(String::as_str).collect();
    let unregistered: Vec<&str> = index
        .divisions()
        .iter()
        .map(String::as_str)
        .filter(|d| !registered.contains(d))
        .collect();
    if !unregistered.is_empty() {
        log::warn!(
            "{} divisions have suitability data but no demographic row; their targets will fail: {}",
            unregistered.len(),
            unregistered.join(", ")
        );
    }

    log::info!(
        "Loaded inputs in {:.1}s (failure policy: {}, thresholds: {} keyed)",
        start.elapsed().as_secs_f64(),
        config.forecast.failure_policy,
        thresholds.keying(),
    );

    let pipeline = ForecastPipeline::new(
        index,
        corrector,
        thresholds,
        demographics,
        config.forecast.clone(),
    );

    let progress = IndicatifProgress::targets_bar(multi, "Evaluating targets");
    let report = pipeline.run(&pipeline.divisions(), &progress)?;
    let rows = report.rows();

    match &config.output.predictions {
        Some(path) => tables::write_predictions(path, &rows)?,
        None => tables::write_csv(
            std::io::stdout().lock(),
            &rows,
            Some(tables::PREDICTION_COLUMNS.as_slice()),
            "<stdout>",
        )?,
    }

    if let Some(path) = &config.output.summary {
        tables::write_summary(path, &report.summary)?;
        log::info!("Wrote run summary to {}", path.display());
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}
