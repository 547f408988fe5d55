//! Instantaneous firing rates estimated with a sliding window.
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::AnalysisError;
use crate::population::PopulationIds;
use crate::raster::Raster;
use crate::MS_PER_S;

/// Relative tolerance under which a bin position is taken to lie on the grid.
const GRID_TOL: f64 = 1e-9;

/// Round `x` to the nearest integer if it is within the grid tolerance of it.
fn snap(x: f64) -> f64 {
    let nearest = x.round();
    if (x - nearest).abs() <= GRID_TOL * nearest.abs().max(1.0) {
        nearest
    } else {
        x
    }
}

/// Instantaneous firing rates (Hz) of every neuron of a population.
/// The rate matrix has one row per neuron and one column per window.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InstantaneousRate {
    name: String,
    /// The center of every window (in ms).
    times: Vec<f64>,
    #[serde(rename = "instant_fr")]
    rates: DMatrix<f64>,
}

impl InstantaneousRate {
    /// Create new instantaneous rates.
    /// Returns an error if the number of windows and the number of columns don't match.
    pub fn build(name: &str, times: Vec<f64>, rates: DMatrix<f64>) -> Result<Self, AnalysisError> {
        if times.len() != rates.ncols() {
            return Err(AnalysisError::IncompatibleShapes(format!(
                "Got {} window times for a rate matrix with {} columns.",
                times.len(),
                rates.ncols()
            )));
        }
        Ok(InstantaneousRate {
            name: name.to_string(),
            times,
            rates,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn rates(&self) -> &DMatrix<f64> {
        &self.rates
    }

    pub fn num_neurons(&self) -> usize {
        self.rates.nrows()
    }

    pub fn num_bins(&self) -> usize {
        self.rates.ncols()
    }

    /// Returns the population rate in every window, i.e., the average over all neurons.
    pub fn mean_rate(&self) -> Vec<f64> {
        if self.num_neurons() == 0 {
            return vec![0.0; self.num_bins()];
        }
        self.rates.column_iter().map(|column| column.mean()).collect()
    }
}

/// Sliding-window firing rate estimator.
///
/// The k-th window is centered at `start_time + k * step` and covers `[center - window / 2, center + window / 2)`.
/// The windows are centered between `start_time` and `sim_time`.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct WindowedRateEstimator {
    /// Total simulation time (in ms).
    pub sim_time: f64,
    /// Window length (in ms).
    pub window: f64,
    /// Step between consecutive windows (in ms).
    pub step: f64,
    /// Center of the first window (in ms).
    pub start_time: f64,
}

impl WindowedRateEstimator {
    /// Create a new estimator.
    /// Returns an error if the window or step is not positive, or if the simulation ends before the first window.
    pub fn build(sim_time: f64, window: f64, step: f64, start_time: f64) -> Result<Self, AnalysisError> {
        if !(window > 0.0) || !(step > 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "The window ({}) and step ({}) must be positive.",
                window, step
            )));
        }
        if !(sim_time >= start_time) {
            return Err(AnalysisError::InvalidParameter(format!(
                "The simulation time ({}) must not precede the start time ({}).",
                sim_time, start_time
            )));
        }
        Ok(WindowedRateEstimator {
            sim_time,
            window,
            step,
            start_time,
        })
    }

    /// The number of windows.
    pub fn num_bins(&self) -> usize {
        ((self.sim_time - self.start_time) / self.step).floor() as usize + 1
    }

    /// The center of every window.
    pub fn bin_times(&self) -> Vec<f64> {
        (0..self.num_bins())
            .map(|k| self.start_time + self.step * k as f64)
            .collect()
    }

    /// Returns the indices of the windows containing the given time, if any.
    pub fn bins_of(&self, time: f64) -> Option<RangeInclusive<usize>> {
        let offset = time - self.start_time;
        let last = snap((offset + self.window / 2.0) / self.step).floor() as i64;
        let ratio = snap(self.window / self.step);
        let first = if ratio.fract() == 0.0 {
            last + 1 - ratio as i64
        } else {
            snap((offset - self.window / 2.0) / self.step).floor() as i64 + 1
        };

        let first = first.max(0);
        let last = last.min(self.num_bins() as i64 - 1);
        if first > last {
            None
        } else {
            Some(first as usize..=last as usize)
        }
    }

    /// Estimate the instantaneous firing rate of every neuron of the recorded population.
    pub fn estimate(
        &self,
        raster: &Raster,
        pop_ids: &PopulationIds,
    ) -> Result<InstantaneousRate, AnalysisError> {
        let range = pop_ids.range(raster.name())?;
        let mut counts = DMatrix::<f64>::zeros(range.size(), self.num_bins());

        for event in raster.local_events(&range) {
            let (time, index) = event?;
            if let Some(bins) = self.bins_of(time) {
                for bin in bins {
                    counts[(index, bin)] += 1.0;
                }
            }
        }

        log::debug!(
            "Population {}: {} spikes binned in {} windows",
            raster.name(),
            raster.num_spikes(),
            self.num_bins()
        );

        InstantaneousRate::build(
            raster.name(),
            self.bin_times(),
            counts / (self.window / MS_PER_S),
        )
    }

    /// Estimate the instantaneous firing rates of every recorded population.
    pub fn estimate_all(
        &self,
        rasters: &[Raster],
        pop_ids: &PopulationIds,
    ) -> Result<Vec<InstantaneousRate>, AnalysisError> {
        rasters
            .par_iter()
            .map(|raster| self.estimate(raster, pop_ids))
            .collect()
    }
}

/// Compute the instantaneous firing rate of every neuron of every population, with windows of length `window` moved by `step`.
/// The first window is centered at `start_time`. All times are in ms.
pub fn fr_window_step(
    rasters: &[Raster],
    pop_ids: &PopulationIds,
    sim_time: f64,
    window: f64,
    step: f64,
    start_time: f64,
) -> Result<Vec<InstantaneousRate>, AnalysisError> {
    WindowedRateEstimator::build(sim_time, window, step, start_time)?.estimate_all(rasters, pop_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pop_ids() -> PopulationIds {
        let mut ids = PopulationIds::new();
        ids.insert("GrC", 1, 4).unwrap();
        ids.insert("PC", 5, 5).unwrap();
        ids
    }

    #[test]
    fn test_build() {
        assert!(WindowedRateEstimator::build(100.0, 0.0, 5.0, 0.0).is_err());
        assert!(WindowedRateEstimator::build(100.0, 10.0, -5.0, 0.0).is_err());
        assert!(WindowedRateEstimator::build(100.0, 10.0, 5.0, 200.0).is_err());
        assert!(WindowedRateEstimator::build(100.0, f64::NAN, 5.0, 0.0).is_err());

        let estimator = WindowedRateEstimator::build(100.0, 10.0, 5.0, 0.0).unwrap();
        assert_eq!(estimator.num_bins(), 21);
        assert_eq!(estimator.bin_times()[20], 100.0);

        let estimator = WindowedRateEstimator::build(103.0, 10.0, 5.0, 1.0).unwrap();
        assert_eq!(estimator.num_bins(), 21);
        assert_eq!(estimator.bin_times()[0], 1.0);
    }

    #[test]
    fn test_single_spike_contribution() {
        // integer window/step ratios: exactly ceil(window/step) windows, wherever the spike falls
        for (window, step) in [(10.0, 5.0), (15.0, 5.0), (5.0, 5.0), (20.0, 2.5), (8.0, 1.0)] {
            let estimator = WindowedRateEstimator::build(200.0, window, step, 0.0).unwrap();
            for time in [50.0, 52.5, 61.3, 77.77, 99.999] {
                let bins = estimator.bins_of(time).unwrap();
                assert_eq!(bins.clone().count(), (window / step).ceil() as usize);
                // every window of the range contains the spike
                for bin in bins {
                    let center = estimator.bin_times()[bin];
                    assert!(center - window / 2.0 <= time && time < center + window / 2.0);
                }
            }
        }

        // otherwise the floor or the ceil of the ratio
        let estimator = WindowedRateEstimator::build(200.0, 12.0, 5.0, 0.0).unwrap();
        for time in [50.0, 52.5, 61.3, 77.77, 99.999] {
            let count = estimator.bins_of(time).unwrap().count();
            assert!(count == 2 || count == 3);
        }
    }

    #[test]
    fn test_single_spike_contribution_on_time_grid() {
        // spikes on a 0.1 ms grid often fall on window edges when the step is a decimal number
        let pairs = [
            (0.2, 0.1),
            (0.5, 0.1),
            (1.0, 0.1),
            (0.6, 0.2),
            (0.9, 0.3),
            (1.2, 0.3),
            (2.0, 0.2),
            (0.7, 0.7),
        ];
        for start_time in [0.0, 1.0] {
            for (window, step) in pairs {
                let estimator = WindowedRateEstimator::build(200.0, window, step, start_time).unwrap();
                let expected = (window / step).round() as usize;
                for k in 20..900 {
                    let time = k as f64 * 0.1;
                    let count = estimator.bins_of(time).map_or(0, |bins| bins.count());
                    assert_eq!(count, expected, "window {}, step {}, time {}", window, step, time);
                }
            }
        }

        // a spike on the left edge of a window belongs to it, not to the previous one
        let estimator = WindowedRateEstimator::build(200.0, 0.2, 0.1, 0.0).unwrap();
        assert_eq!(estimator.bins_of(2.0), Some(20..=21));
        let estimator = WindowedRateEstimator::build(200.0, 0.9, 0.3, 0.0).unwrap();
        assert_eq!(estimator.bins_of(3.0), Some(9..=11));
    }

    #[test]
    fn test_edge_windows() {
        let estimator = WindowedRateEstimator::build(100.0, 10.0, 5.0, 0.0).unwrap();
        // windows centered before the start time are dropped
        assert_eq!(estimator.bins_of(1.0), Some(0..=1));
        // windows centered after the simulation end are dropped
        assert_eq!(estimator.bins_of(103.0), Some(20..=20));
        assert_eq!(estimator.bins_of(120.0), None);
        assert_eq!(estimator.bins_of(-10.0), None);
    }

    #[test]
    fn test_estimate() {
        let rasters = vec![
            Raster::build("GrC", vec![12.3, 12.5, 40.0], vec![1, 3, 1]).unwrap(),
            Raster::new_empty("PC"),
        ];
        let rates = fr_window_step(&rasters, &pop_ids(), 100.0, 10.0, 5.0, 0.0).unwrap();

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].name(), "GrC");
        assert_eq!(rates[0].num_neurons(), 4);
        assert_eq!(rates[0].num_bins(), 21);
        assert_eq!(rates[0].times().len(), 21);

        // one spike in a 10 ms window is 100 Hz
        assert_relative_eq!(rates[0].rates()[(0, 2)], 100.0);
        assert_relative_eq!(rates[0].rates()[(0, 3)], 100.0);
        assert_relative_eq!(rates[0].rates()[(0, 4)], 0.0);
        assert_relative_eq!(rates[0].rates()[(2, 2)], 100.0);
        assert_relative_eq!(rates[0].rates()[(1, 2)], 0.0);
        // 40.0 lies on the border between the windows centered at 35 and 40
        assert_relative_eq!(rates[0].rates()[(0, 7)], 0.0);
        assert_relative_eq!(rates[0].rates()[(0, 8)], 100.0);
        assert_relative_eq!(rates[0].rates()[(0, 9)], 100.0);

        // every spike contributes twice
        assert_relative_eq!(rates[0].rates().sum(), 600.0);
        assert_relative_eq!(rates[0].mean_rate()[2], 50.0);

        assert_eq!(rates[1].num_neurons(), 1);
        assert!(rates[1].rates().iter().all(|rate| *rate == 0.0));
    }

    #[test]
    fn test_estimate_invalid_sender() {
        let rasters = vec![Raster::build("PC", vec![10.0], vec![6]).unwrap()];
        assert!(matches!(
            fr_window_step(&rasters, &pop_ids(), 100.0, 10.0, 5.0, 0.0),
            Err(AnalysisError::InvalidRaster(_))
        ));

        let rasters = vec![Raster::build("DCN", vec![10.0], vec![6]).unwrap()];
        assert_eq!(
            fr_window_step(&rasters, &pop_ids(), 100.0, 10.0, 5.0, 0.0),
            Err(AnalysisError::PopulationNotFound("DCN".to_string()))
        );
    }

    #[test]
    fn test_instantaneous_rate_build() {
        assert!(matches!(
            InstantaneousRate::build("GrC", vec![0.0, 1.0], DMatrix::zeros(3, 3)),
            Err(AnalysisError::IncompatibleShapes(_))
        ));
        let rates = InstantaneousRate::build(
            "GrC",
            vec![0.0, 1.0],
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 6.0]),
        )
        .unwrap();
        assert_eq!(rates.mean_rate(), vec![2.0, 4.0]);
    }
}
