//! Trial results export.
//!
//! The CSV table has one row per ended trial: `trial_num`, `block_num`, then
//! every column of [`RESULT_COLUMNS`] in order.  A value a trial did not
//! record is an empty cell, so files from different sessions always line up.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use roomrecall_protocol::RESULT_COLUMNS;
use roomrecall_types::{ExperimentError, TrialResults};
use serde::Serialize;

use crate::session::{Session, Trial};

fn io_error(path: &str, e: impl std::fmt::Display) -> ExperimentError {
    ExperimentError::Io {
        path: path.to_string(),
        details: e.to_string(),
    }
}

/// Full header of the results table.
pub fn results_header() -> Vec<&'static str> {
    ["trial_num", "block_num"]
        .into_iter()
        .chain(RESULT_COLUMNS.iter().copied())
        .collect()
}

/// Write every ended trial of `session` as CSV.
///
/// # Errors
///
/// [`ExperimentError::Io`] on write failure.
pub fn write_results_csv<W: Write>(session: &Session, writer: W) -> Result<(), ExperimentError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(results_header())
        .map_err(|e| io_error("<results>", e))?;
    for trial in session.trials().filter(|t| t.is_ended()) {
        let mut row = vec![trial.number().to_string(), trial.block_number().to_string()];
        row.extend(RESULT_COLUMNS.iter().map(|column| {
            trial
                .results()
                .get(column)
                .map(ToString::to_string)
                .unwrap_or_default()
        }));
        wtr.write_record(&row).map_err(|e| io_error("<results>", e))?;
    }
    wtr.flush().map_err(|e| io_error("<results>", e))
}

/// [`write_results_csv`] into a new file at `path`.
///
/// # Errors
///
/// [`ExperimentError::Io`] if the file cannot be created or written.
pub fn save_results_csv(session: &Session, path: &Path) -> Result<(), ExperimentError> {
    let shown = path.display().to_string();
    let file = File::create(path).map_err(|e| io_error(&shown, e))?;
    write_results_csv(session, file)
}

#[derive(Serialize)]
struct TrialRecord<'a> {
    trial_num: usize,
    block_num: usize,
    results: &'a TrialResults,
}

/// One trial's results as pretty-printed JSON.
///
/// # Errors
///
/// [`ExperimentError::Config`] if serialisation fails.
pub fn trial_results_json(trial: &Trial) -> Result<String, ExperimentError> {
    serde_json::to_string_pretty(&TrialRecord {
        trial_num: trial.number(),
        block_num: trial.block_number(),
        results: trial.results(),
    })
    .map_err(|e| ExperimentError::Config(format!("cannot serialise trial results: {e}")))
}
