//! Configuration of the analysis pipeline, stored as JSON.
//! Every section falls back to its defaults when missing.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;
use crate::fitness::SpectralFitnessScorer;
use crate::model::TrialSchedule;
use crate::rate::PopulationGroup;
use crate::response::ResponseDetector;
use crate::window::WindowedRateEstimator;

/// Average firing rate section.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Spikes before this time (in ms) are ignored.
    pub t_start: f64,
    /// Spikes after this time (in ms) are ignored, if any.
    pub t_end: Option<f64>,
    /// Groups of populations reported as their size-weighted average.
    pub groups: Vec<PopulationGroup>,
}

impl Default for RateConfig {
    fn default() -> Self {
        RateConfig {
            t_start: 0.0,
            t_end: None,
            groups: PopulationGroup::basal_ganglia(),
        }
    }
}

/// Sliding-window section.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub sim_time: f64,
    pub window: f64,
    pub step: f64,
    pub start_time: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            sim_time: 1000.0,
            window: 10.0,
            step: 5.0,
            start_time: 0.0,
        }
    }
}

impl WindowConfig {
    pub fn estimator(&self) -> Result<WindowedRateEstimator, AnalysisError> {
        WindowedRateEstimator::build(self.sim_time, self.window, self.step, self.start_time)
    }
}

/// Fitness section.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    pub sample_time: f64,
    pub filter_range: (f64, f64),
    pub filter_sd: f64,
    pub t_start: f64,
    /// Target firing rates, in the order of the reported populations (groups included).
    pub fr_target: Vec<f64>,
    pub fr_weights: Option<Vec<f64>>,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        FitnessConfig {
            sample_time: 1.0,
            filter_range: (17.0, 30.0),
            filter_sd: 2.0,
            t_start: 0.0,
            fr_target: vec![],
            fr_weights: None,
        }
    }
}

impl FitnessConfig {
    pub fn scorer(&self) -> Result<SpectralFitnessScorer, AnalysisError> {
        SpectralFitnessScorer::build(self.sample_time, self.filter_range, self.filter_sd, self.t_start)
    }
}

/// Response detection section.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// The population whose rate reveals the responses.
    pub population: String,
    pub detector: ResponseDetector,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        ResponseConfig {
            population: "PC".to_string(),
            detector: ResponseDetector::default(),
        }
    }
}

/// Configuration of the analysis pipeline.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Root directory of previous simulation results, e.g., the mass-model firing rates.
    pub data_root: Option<PathBuf>,
    pub rate: RateConfig,
    pub window: WindowConfig,
    pub fitness: FitnessConfig,
    pub response: ResponseConfig,
    /// The trial structure of the simulation, if any.
    pub schedule: Option<TrialSchedule>,
}

impl AnalysisConfig {
    /// Save the configuration to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), AnalysisError> {
        let file = File::create(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| AnalysisError::IOError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| AnalysisError::IOError(e.to_string()))
    }

    /// Load a configuration from a file.
    /// Returns an error if a section holds invalid parameters.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let config: AnalysisConfig =
            serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the parameters of every section.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.window.estimator()?;
        self.fitness.scorer()?;
        self.response.detector.validate()?;
        if let Some(schedule) = &self.schedule {
            TrialSchedule::build(
                schedule.settling_time,
                schedule.trial_duration,
                schedule.trials,
                schedule.mf_time,
                schedule.io_time,
            )?;
        }
        Ok(())
    }

    /// Replace the data root, e.g., from the command line.
    pub fn with_data_root<P: AsRef<Path>>(mut self, data_root: Option<P>) -> Self {
        if let Some(data_root) = data_root {
            self.data_root = Some(data_root.as_ref().to_path_buf());
        }
        self
    }
}
