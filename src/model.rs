//! Model description and trial schedule of a simulation.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::AnalysisError;
use crate::population::PopulationIds;

/// Description of a simulated model, stored next to the simulation results.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelDescription {
    #[serde(rename = "N_neurons")]
    pub num_neurons: usize,
    #[serde(rename = "pop_names_list")]
    pub pop_names: Vec<String>,
    pub pop_ids: PopulationIds,
    pub simulation_time: f64,
    pub sample_time: Option<f64>,
    pub settling_time: Option<f64>,
    pub trials: Option<usize>,
    /// Free-form parameters of the boundary conditions.
    #[serde(rename = "b_c_params")]
    pub boundary_params: Option<serde_json::Value>,
}

impl ModelDescription {
    /// Create a model description without the optional entries.
    pub fn new(
        num_neurons: usize,
        pop_names: Vec<String>,
        pop_ids: PopulationIds,
        simulation_time: f64,
    ) -> Self {
        ModelDescription {
            num_neurons,
            pop_names,
            pop_ids,
            simulation_time,
            sample_time: None,
            settling_time: None,
            trials: None,
            boundary_params: None,
        }
    }

    pub fn with_sample_time(mut self, sample_time: f64) -> Self {
        self.sample_time = Some(sample_time);
        self
    }

    /// Record the trial schedule (settling time and number of trials) in the description.
    pub fn with_trials(mut self, settling_time: f64, trials: usize) -> Self {
        self.settling_time = Some(settling_time);
        self.trials = Some(trials);
        self
    }

    pub fn with_boundary_params(mut self, params: serde_json::Value) -> Self {
        self.boundary_params = Some(params);
        self
    }

    /// Save the description to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), AnalysisError> {
        let file = File::create(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| AnalysisError::IOError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| AnalysisError::IOError(e.to_string()))
    }

    /// Load a description from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))
    }
}

/// A left-open time window (start, end].
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        time > self.start && time <= self.end
    }
}

/// The trials of a simulation: after a settling period, trials of identical duration follow each other.
/// Within every trial, the mossy fibers (MF) are stimulated first and the inferior olive (IO) later.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct TrialSchedule {
    /// Time before the first trial (in ms).
    pub settling_time: f64,
    /// Duration of one trial (in ms).
    pub trial_duration: f64,
    /// Number of trials.
    pub trials: usize,
    /// Onset of the mossy-fiber stimulus, relative to the trial start (in ms).
    pub mf_time: f64,
    /// Onset of the inferior-olive stimulus, relative to the trial start (in ms).
    pub io_time: f64,
}

impl TrialSchedule {
    /// Create a new trial schedule.
    /// Returns an error if the duration is not positive or if the stimuli don't happen in order within a trial.
    pub fn build(
        settling_time: f64,
        trial_duration: f64,
        trials: usize,
        mf_time: f64,
        io_time: f64,
    ) -> Result<Self, AnalysisError> {
        if trial_duration <= 0.0 {
            return Err(AnalysisError::InvalidParameter(
                "The trial duration must be positive.".to_string(),
            ));
        }
        if settling_time < 0.0 {
            return Err(AnalysisError::InvalidParameter(
                "The settling time must be non-negative.".to_string(),
            ));
        }
        if !(0.0 <= mf_time && mf_time <= io_time && io_time <= trial_duration) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Expected 0 <= MF time ({}) <= IO time ({}) <= trial duration ({}).",
                mf_time, io_time, trial_duration
            )));
        }
        Ok(TrialSchedule {
            settling_time,
            trial_duration,
            trials,
            mf_time,
            io_time,
        })
    }

    /// Absolute start time of the k-th trial.
    pub fn trial_start(&self, k: usize) -> f64 {
        self.settling_time + k as f64 * self.trial_duration
    }

    /// Absolute onset of the mossy-fiber stimulus in the k-th trial.
    pub fn mf_onset(&self, k: usize) -> f64 {
        self.trial_start(k) + self.mf_time
    }

    /// Absolute onset of the inferior-olive stimulus in the k-th trial.
    pub fn io_onset(&self, k: usize) -> f64 {
        self.trial_start(k) + self.io_time
    }

    /// Absolute end of the whole schedule.
    pub fn end(&self) -> f64 {
        self.trial_start(self.trials)
    }
}
