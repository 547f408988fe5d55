//! Fitness of a simulation for the external parameter optimizer.
//!
//! The fitness rewards firing rates close to their targets and mass-model activity concentrated in a frequency band:
//! `fitness = -sum(((fr - fr_target) * weight)^2) + band_power / 2`, where the band power is the wavelet power of the
//! mass-model firing rates, integrated against a Gaussian kernel spanning the band. Higher is better.
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::spectral::{band_indices, cwt_power, gaussian, linspace, morlet_width};
use crate::MS_PER_S;

/// The mass models are sampled this many times per sample time.
pub const MASS_MODEL_OVERSAMPLING: usize = 10;
/// Omega0 of the Morlet wavelet.
pub const MORLET_OMEGA: f64 = 15.0;
/// Lowest frequency (Hz) of the wavelet analysis.
pub const MIN_FREQUENCY: f64 = 17.0;
/// The Gaussian kernel is evaluated on `[-KERNEL_SPAN, KERNEL_SPAN]` over the band.
const KERNEL_SPAN: f64 = 10.0;

/// The two terms of the fitness and their sum.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct FitnessResult {
    /// Minus the (weighted) squared distance between the firing rates and their targets.
    pub firing_rate_term: f64,
    /// Half of the band power of the mass-model firing rates.
    pub spectral_term: f64,
    pub fitness: f64,
}

impl FitnessResult {
    pub fn new(firing_rate_term: f64, spectral_term: f64) -> Self {
        FitnessResult {
            firing_rate_term,
            spectral_term,
            fitness: firing_rate_term + spectral_term,
        }
    }
}

/// Returns minus the squared distance between the firing rates and their targets, optionally weighted.
pub fn firing_rate_term(
    fr: &[f64],
    fr_target: &[f64],
    fr_weights: Option<&[f64]>,
) -> Result<f64, AnalysisError> {
    if fr.len() != fr_target.len() {
        return Err(AnalysisError::IncompatibleShapes(format!(
            "Got {} firing rates for {} targets.",
            fr.len(),
            fr_target.len()
        )));
    }
    if let Some(weights) = fr_weights {
        if weights.len() != fr.len() {
            return Err(AnalysisError::IncompatibleShapes(format!(
                "Got {} weights for {} firing rates.",
                weights.len(),
                fr.len()
            )));
        }
    }

    let distance: f64 = fr
        .iter()
        .zip(fr_target.iter())
        .enumerate()
        .map(|(i, (rate, target))| {
            let weight = fr_weights.map_or(1.0, |weights| weights[i]);
            ((rate - target) * weight).powi(2)
        })
        .sum();
    Ok(-distance)
}

/// Scores simulations, given the frequency band of interest of the mass-model activity.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SpectralFitnessScorer {
    /// Sample time of the mass models (in ms), which are recorded with a resolution ten times finer.
    pub sample_time: f64,
    /// Frequency band of interest (in Hz).
    pub filter_range: (f64, f64),
    /// Standard deviation of the Gaussian kernel, on the [-10, 10] scale spanning the band.
    pub filter_sd: f64,
    /// Mass-model activity before this time (in ms) is ignored.
    pub t_start: f64,
}

impl SpectralFitnessScorer {
    /// Create a new scorer.
    /// Returns an error if the sampling frequency cannot resolve any frequency above 17 Hz.
    pub fn build(
        sample_time: f64,
        filter_range: (f64, f64),
        filter_sd: f64,
        t_start: f64,
    ) -> Result<Self, AnalysisError> {
        if !(sample_time > 0.0) {
            return Err(AnalysisError::InvalidParameter(
                "The sample time must be positive.".to_string(),
            ));
        }
        if MS_PER_S / sample_time / 2.0 < MIN_FREQUENCY {
            return Err(AnalysisError::InvalidParameter(format!(
                "A sample time of {} ms cannot resolve frequencies above {} Hz.",
                sample_time, MIN_FREQUENCY
            )));
        }
        if !(filter_sd > 0.0) {
            return Err(AnalysisError::InvalidParameter(
                "The filter standard deviation must be positive.".to_string(),
            ));
        }
        if !(t_start >= 0.0 && t_start.is_finite()) {
            return Err(AnalysisError::InvalidParameter(
                "The start time must be finite and non-negative.".to_string(),
            ));
        }
        Ok(SpectralFitnessScorer {
            sample_time,
            filter_range,
            filter_sd,
            t_start,
        })
    }

    /// Sampling frequency (Hz) of the analyzed series.
    pub fn sampling_frequency(&self) -> f64 {
        MS_PER_S / self.sample_time
    }

    /// The frequencies (Hz) of the wavelet analysis, from 17 Hz to the Nyquist frequency.
    pub fn frequencies(&self) -> Vec<f64> {
        let nyquist = self.sampling_frequency() / 2.0;
        let num = 2 * (nyquist - MIN_FREQUENCY + 1.0).floor() as usize;
        linspace(MIN_FREQUENCY, nyquist, num)
    }

    /// Returns the analyzed part of a mass-model series: samples after `t_start`, one every ten samples.
    /// The series has one row per sample and one column per mass model.
    fn resample(&self, mass_fr: &DMatrix<f64>) -> Result<DMatrix<f64>, AnalysisError> {
        let fine_step = self.sample_time / MASS_MODEL_OVERSAMPLING as f64;
        let skip = (self.t_start / fine_step).floor() as usize;
        if skip >= mass_fr.nrows() || mass_fr.ncols() == 0 {
            return Err(AnalysisError::EmptyWindow(format!(
                "No mass-model activity after {} ms in a {}x{} series.",
                self.t_start,
                mass_fr.nrows(),
                mass_fr.ncols()
            )));
        }

        let rows: Vec<usize> = (skip..mass_fr.nrows())
            .step_by(MASS_MODEL_OVERSAMPLING)
            .collect();
        Ok(DMatrix::from_fn(rows.len(), mass_fr.ncols(), |i, j| {
            mass_fr[(rows[i], j)]
        }))
    }

    /// Wavelet power (summed over time) of every mass model at every analysis frequency.
    /// Returns a matrix with one row per frequency and one column per mass model.
    pub fn wavelet_power(&self, mass_fr: &DMatrix<f64>) -> Result<DMatrix<f64>, AnalysisError> {
        let y = self.resample(mass_fr)?;
        let fs = self.sampling_frequency();
        let widths: Vec<f64> = self
            .frequencies()
            .iter()
            .map(|freq| morlet_width(*freq, fs, MORLET_OMEGA))
            .collect();

        let columns = y
            .column_iter()
            .map(|column| {
                let series: Vec<f64> = column.iter().copied().collect();
                cwt_power(&series, &widths, MORLET_OMEGA)
            })
            .collect::<Result<Vec<Vec<f64>>, AnalysisError>>()?;

        Ok(DMatrix::from_fn(widths.len(), columns.len(), |i, j| {
            columns[j][i]
        }))
    }

    /// Half of the band power of the mass models.
    pub fn spectral_term(&self, mass_fr: &DMatrix<f64>) -> Result<f64, AnalysisError> {
        let freqs = self.frequencies();
        let (lower, upper) = band_indices(&freqs, self.filter_range)?;
        log::info!(
            "In fitness: considering frequencies in the range [{:.2}, {:.2}]",
            freqs[lower],
            freqs[upper - 1]
        );

        let power = self.wavelet_power(mass_fr)?;
        let kernel = gaussian(
            &linspace(-KERNEL_SPAN, KERNEL_SPAN, upper - lower),
            0.0,
            self.filter_sd,
        )?;

        let band_power: f64 = power
            .column_iter()
            .map(|column| {
                (lower..upper)
                    .zip(kernel.iter())
                    .map(|(i, k)| column[i] * k)
                    .sum::<f64>()
            })
            .sum();
        Ok(band_power / 2.0)
    }

    /// Evaluate the fitness of a simulation.
    pub fn score(
        &self,
        fr: &[f64],
        fr_target: &[f64],
        mass_fr: &DMatrix<f64>,
        fr_weights: Option<&[f64]>,
    ) -> Result<FitnessResult, AnalysisError> {
        let firing_rate_term = firing_rate_term(fr, fr_target, fr_weights)?;
        let result = FitnessResult::new(firing_rate_term, self.spectral_term(mass_fr)?);
        log::info!(
            "fitness_firing_rate = {:.2}, fitness_fourier = {:.2}, fitness = {:.2}",
            result.firing_rate_term,
            result.spectral_term,
            result.fitness
        );
        Ok(result)
    }
}

/// Evaluate the fitness of a simulation.
///
/// - `fr`, `fr_target`, `fr_weights`: average firing rates, their targets and the weights of their distances;
/// - `mass_fr`: mass-model firing rates, one row per sample (every `sample_time / 10` ms) and one column per model;
/// - `filter_range`, `filter_sd`: frequency band of interest and standard deviation of its Gaussian kernel;
/// - `t_start`: mass-model activity before this time (in ms) is ignored.
#[allow(clippy::too_many_arguments)]
pub fn fitness_function(
    fr: &[f64],
    fr_target: &[f64],
    mass_fr: &DMatrix<f64>,
    sample_time: f64,
    filter_range: (f64, f64),
    filter_sd: f64,
    t_start: f64,
    fr_weights: Option<&[f64]>,
) -> Result<FitnessResult, AnalysisError> {
    SpectralFitnessScorer::build(sample_time, filter_range, filter_sd, t_start)?.score(
        fr,
        fr_target,
        mass_fr,
        fr_weights,
    )
}
