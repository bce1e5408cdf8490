#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Table I/O for the forecast.
//!
//! Every input is a headered CSV file read with the `csv` crate into the
//! row types from the models crates. Columns are matched by name, extra
//! columns are ignored and an empty cell reads as a missing value. A
//! malformed row is an error naming the file and record; rows are never
//! skipped.
//!
//! Outputs are written deterministically so identical inputs produce
//! byte-identical files.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use vector_risk_forecast_models::{
    AlertThresholdEntry, BiasCorrectionEntry, DemographicEntry, PredictionRow, RunSummary,
};
use vector_risk_suitability_models::{
    MeteorologicalSample, SuitabilitySample, TemperatureSuitabilityPoint,
};

/// Column order of the predictions table.
pub const PREDICTION_COLUMNS: [&str; 13] = [
    "division",
    "year",
    "month",
    "lead_time",
    "suitability",
    "risk",
    "alert",
    "potential_cases",
    "potential_cases_u9",
    "potential_cases_65plus",
    "potential_cases_threshold",
    "status",
    "failure",
];

/// Errors that can occur reading or writing tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The file could not be opened or created.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A CSV record could not be read, parsed or written.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path of the file.
        path: String,
        /// Underlying CSV error, including the record position.
        source: csv::Error,
    },

    /// The JSON report could not be written.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// Path of the file.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Deserializes every row of a headered CSV stream.
///
/// `path` is only used to label errors.
///
/// # Errors
///
/// Returns [`TableError::Csv`] on the first malformed record.
pub fn read_csv<T: DeserializeOwned>(reader: impl Read, path: &str) -> Result<Vec<T>, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    reader
        .deserialize::<T>()
        .map(|result| {
            result.map_err(|e| TableError::Csv {
                path: path.to_owned(),
                source: e,
            })
        })
        .collect()
}

/// Deserializes every row of a headered CSV file.
///
/// # Errors
///
/// Returns [`TableError::Io`] if the file cannot be opened and
/// [`TableError::Csv`] on the first malformed record.
pub fn read_csv_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, TableError> {
    let label = path.display().to_string();
    let file = File::open(path).map_err(|e| TableError::Io {
        path: label.clone(),
        source: e,
    })?;
    let rows = read_csv(file, &label)?;
    log::debug!("Read {} rows from {label}", rows.len());
    Ok(rows)
}

/// Serializes `rows` as CSV with a header row.
///
/// When `columns` is given the header is written up front, so an empty
/// table still carries its header. Otherwise it is derived from the first
/// row.
///
/// # Errors
///
/// Returns [`TableError::Csv`] if a row cannot be serialized or written.
pub fn write_csv<T: Serialize>(
    writer: impl Write,
    rows: &[T],
    columns: Option<&[&str]>,
    path: &str,
) -> Result<(), TableError> {
    let csv_error = |e| TableError::Csv {
        path: path.to_owned(),
        source: e,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(columns.is_none())
        .from_writer(writer);

    if let Some(columns) = columns {
        writer.write_record(columns).map_err(csv_error)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }

    writer.flush().map_err(|e| TableError::Io {
        path: path.to_owned(),
        source: e,
    })
}

fn create(path: &Path) -> Result<File, TableError> {
    File::create(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Reads a suitability table (`division`/`adm_division`, `year`, `month`,
/// `suitability`).
///
/// # Errors
///
/// See [`read_csv_file`].
pub fn read_suitability(path: &Path) -> Result<Vec<SuitabilitySample>, TableError> {
    let rows: Vec<SuitabilitySample> = read_csv_file(path)?;
    log::info!("Loaded {} suitability samples from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads monthly meteorological aggregates.
///
/// # Errors
///
/// See [`read_csv_file`].
pub fn read_meteorology(path: &Path) -> Result<Vec<MeteorologicalSample>, TableError> {
    let rows: Vec<MeteorologicalSample> = read_csv_file(path)?;
    log::info!(
        "Loaded {} meteorological samples from {}",
        rows.len(),
        path.display()
    );
    Ok(rows)
}

/// Reads the temperature response curve (`temperature`,
/// `temperature_suitability`).
///
/// # Errors
///
/// See [`read_csv_file`].
pub fn read_temperature_curve(
    path: &Path,
) -> Result<Vec<TemperatureSuitabilityPoint>, TableError> {
    read_csv_file(path)
}

/// Reads the bias correction table (`lead_time`, `month`, `division`,
/// `ratio_std`, `diff_mean`).
///
/// # Errors
///
/// See [`read_csv_file`].
pub fn read_bias_corrections(path: &Path) -> Result<Vec<BiasCorrectionEntry>, TableError> {
    let rows: Vec<BiasCorrectionEntry> = read_csv_file(path)?;
    log::info!("Loaded {} bias corrections from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads the alert threshold table (`division`, `month`, optional
/// `lead_time`, `coeff`, `alert_threshold_std`, `alert_threshold_qnt`).
///
/// # Errors
///
/// See [`read_csv_file`].
pub fn read_thresholds(path: &Path) -> Result<Vec<AlertThresholdEntry>, TableError> {
    let rows: Vec<AlertThresholdEntry> = read_csv_file(path)?;
    log::info!("Loaded {} alert thresholds from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads the demographic register (`division`, `Population`,
/// `Population U9`, `Population 65+`). Row order is the division order of
/// the forecast grid.
///
/// # Errors
///
/// See [`read_csv_file`].
pub fn read_demographics(path: &Path) -> Result<Vec<DemographicEntry>, TableError> {
    let rows: Vec<DemographicEntry> = read_csv_file(path)?;
    log::info!("Loaded {} divisions from {}", rows.len(), path.display());
    Ok(rows)
}

/// Writes the predictions table with a fixed header.
///
/// # Errors
///
/// Returns [`TableError::Io`] if the file cannot be created and
/// [`TableError::Csv`] if a row cannot be written.
pub fn write_predictions(path: &Path, rows: &[PredictionRow]) -> Result<(), TableError> {
    write_csv(
        create(path)?,
        rows,
        Some(PREDICTION_COLUMNS.as_slice()),
        &path.display().to_string(),
    )?;
    log::info!("Wrote {} predictions to {}", rows.len(), path.display());
    Ok(())
}

/// Writes a derived suitability table.
///
/// # Errors
///
/// Returns [`TableError::Io`] if the file cannot be created and
/// [`TableError::Csv`] if a row cannot be written.
pub fn write_suitability(path: &Path, rows: &[SuitabilitySample]) -> Result<(), TableError> {
    write_csv(
        create(path)?,
        rows,
        Some(["division", "year", "month", "suitability"].as_slice()),
        &path.display().to_string(),
    )?;
    log::info!("Wrote {} suitability samples to {}", rows.len(), path.display());
    Ok(())
}

/// Writes the run summary as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`TableError::Io`] if the file cannot be created or written and
/// [`TableError::Json`] if serialization fails.
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), TableError> {
    let label = path.display().to_string();
    let mut file = create(path)?;
    serde_json::to_writer_pretty(&mut file, summary).map_err(|e| TableError::Json {
        path: label.clone(),
        source: e,
    })?;
    file.write_all(b"\n").map_err(|e| TableError::Io {
        path: label,
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use vector_risk_forecast_models::{FailureKind, LeadTimeClass, RecordStatus};

    use super::*;

    #[test]
    fn reads_suitability_with_legacy_column_and_gaps() {
        let data = "\
adm_division,year,month,rainfall,suitability
PH01,2021,1,120.5,0.25
PH01,2021,2,80.0,
PH01, 2021 ,3,10.0,NaN
";
        let rows: Vec<SuitabilitySample> = read_csv(data.as_bytes(), "mem").unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].division, "PH01");
        assert_eq!(rows[0].value(), Some(0.25));
        assert_eq!(rows[1].suitability, None);
        assert_eq!(rows[2].year, 2021);
        assert_eq!(rows[2].value(), None);
    }

    #[test]
    fn reads_thresholds_with_and_without_lead_time() {
        let legacy = "\
division,month,coeff,alert_threshold_std,alert_threshold_qnt
PH01,5,0.001,0.5,0.6
";
        let rows: Vec<AlertThresholdEntry> = read_csv(legacy.as_bytes(), "mem").unwrap();
        assert_eq!(rows[0].lead_time, None);

        let keyed = "\
division,month,lead_time,coeff,alert_threshold_std,alert_threshold_qnt
PH01,5,1-month,0.001,0.5,0.6
";
        let rows: Vec<AlertThresholdEntry> = read_csv(keyed.as_bytes(), "mem").unwrap();
        assert_eq!(rows[0].lead_time, Some(LeadTimeClass::OneMonth));
    }

    #[test]
    fn reads_demographic_register_columns() {
        let data = "\
division,Population,Population U9,Population 65+
PH02,12499,2000,1500
PH01,500,50,40
";
        let rows: Vec<DemographicEntry> = read_csv(data.as_bytes(), "mem").unwrap();
        assert_eq!(rows[0].division, "PH02");
        assert_eq!(rows[0].population_total, 12_499);
        assert_eq!(rows[1].population_65plus, 40);
    }

    #[test]
    fn malformed_row_names_the_file() {
        let data = "\
lead_time,month,division,ratio_std,diff_mean
2-month,6,PH01,not-a-number,0.1
";
        let err = read_csv::<BiasCorrectionEntry>(data.as_bytes(), "bias.csv").unwrap_err();
        assert!(matches!(err, TableError::Csv { .. }));
        assert!(err.to_string().contains("bias.csv"));
    }

    #[test]
    fn unknown_lead_time_string_is_rejected() {
        let data = "\
lead_time,month,division,ratio_std,diff_mean
3-month,6,PH01,1.0,0.1
";
        assert!(read_csv::<BiasCorrectionEntry>(data.as_bytes(), "mem").is_err());
    }

    fn row(status: RecordStatus) -> PredictionRow {
        let failed = status == RecordStatus::Failed;
        PredictionRow {
            division: "PH01".to_string(),
            year: 2021,
            month: 5,
            lead_time: if failed {
                LeadTimeClass::Unknown
            } else {
                LeadTimeClass::ZeroMonth
            },
            suitability: None,
            risk: (!failed).then_some(0.6),
            alert: (!failed).then_some(true),
            potential_cases: (!failed).then_some(60),
            potential_cases_u9: (!failed).then_some(6),
            potential_cases_65plus: (!failed).then_some(12),
            potential_cases_threshold: (!failed).then_some(55),
            status,
            failure: failed.then_some(FailureKind::UnknownLeadTime),
        }
    }

    #[test]
    fn predictions_header_matches_row_fields() {
        let mut out = Vec::new();
        write_csv(&mut out, &[row(RecordStatus::Ok)], None, "mem").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next(), Some(PREDICTION_COLUMNS.join(",").as_str()));
    }

    #[test]
    fn failed_rows_leave_value_columns_empty() {
        let mut out = Vec::new();
        write_csv(
            &mut out,
            &[row(RecordStatus::Ok), row(RecordStatus::Failed)],
            Some(PREDICTION_COLUMNS.as_slice()),
            "mem",
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "PH01,2021,5,0-month,,0.6,true,60,6,12,55,ok,");
        assert_eq!(lines[2], "PH01,2021,5,unknown,,,,,,,,failed,unknown_lead_time");
    }

    #[test]
    fn empty_table_keeps_its_header() {
        let mut out = Vec::new();
        write_csv::<PredictionRow>(&mut out, &[], Some(PREDICTION_COLUMNS.as_slice()), "mem").unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn written_predictions_read_back() {
        let rows = vec![row(RecordStatus::Ok), row(RecordStatus::Failed)];
        let mut out = Vec::new();
        write_csv(&mut out, &rows, Some(PREDICTION_COLUMNS.as_slice()), "mem").unwrap();

        let back: Vec<PredictionRow> = read_csv(out.as_slice(), "mem").unwrap();
        assert_eq!(back, rows);
    }
}
