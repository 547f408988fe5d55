//! Cortical input activity, taken from the mass-model firing rates of a previous simulation.
use nalgebra::DMatrix;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;
use crate::fitness::MASS_MODEL_OVERSAMPLING;

/// Samples (after decimation) dropped at the beginning of the cortical series.
pub const CORTEX_SKIP: usize = 1000;
/// Number of repetitions of the cortical series.
pub const CORTEX_REPEATS: usize = 3;

/// Load mass-model firing rates from a JSON file holding one array per sample, with one entry per mass model.
pub fn load_mass_frs<P: AsRef<Path>>(path: P) -> Result<DMatrix<f64>, AnalysisError> {
    let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    let reader = BufReader::new(file);
    let rows: Vec<Vec<f64>> =
        serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))?;

    let ncols = rows.first().map_or(0, |row| row.len());
    if let Some(row) = rows.iter().find(|row| row.len() != ncols) {
        return Err(AnalysisError::IncompatibleShapes(format!(
            "Got a sample with {} mass models, expected {}.",
            row.len(),
            ncols
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

/// Path of the mass-model firing rates for the given dopamine depletion level, relative to the data root.
pub fn mass_frs_path<P: AsRef<Path>>(data_root: P, dopa_depl: f64) -> PathBuf {
    let dir = if dopa_depl == 0.0 {
        "complete_5500ms_sol17".to_string()
    } else {
        format!(
            "complete_3000ms_sol17_dopadepl_{}",
            (-dopa_depl * 10.0).trunc() as i64
        )
    };
    data_root.as_ref().join(dir).join("mass_frs")
}

/// Build the cortical input from mass-model firing rates: keep one sample every ten of the first mass model, drop the
/// first 1000 samples and repeat the rest three times.
pub fn extend_cortex_activity(mass_frs: &DMatrix<f64>) -> Result<Vec<f64>, AnalysisError> {
    if mass_frs.ncols() == 0 {
        return Err(AnalysisError::IncompatibleShapes(
            "The mass-model series has no column.".to_string(),
        ));
    }

    let ctx_frs: Vec<f64> = mass_frs
        .column(0)
        .iter()
        .step_by(MASS_MODEL_OVERSAMPLING)
        .skip(CORTEX_SKIP)
        .copied()
        .collect();
    if ctx_frs.is_empty() {
        return Err(AnalysisError::EmptyWindow(format!(
            "The mass-model series ({} samples) is too short for the cortical input.",
            mass_frs.nrows()
        )));
    }

    Ok(ctx_frs.repeat(CORTEX_REPEATS))
}

/// Load the cortical input for the given dopamine depletion level (0 for healthy, negative when depleted).
pub fn load_cortex_activity<P: AsRef<Path>>(
    data_root: P,
    dopa_depl: f64,
) -> Result<Vec<f64>, AnalysisError> {
    let path = mass_frs_path(data_root, dopa_depl);
    log::info!("Loading cortical activity from {}", path.display());
    extend_cortex_activity(&load_mass_frs(&path)?)
}
