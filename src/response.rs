//! Trial-wise detection of behavioural responses from the instantaneous rate of a designated population.
//!
//! Every trial starts at `settling_time + k * trial_duration`. A response is detected when, after the mossy-fiber
//! stimulus and before the inferior-olive stimulus, the population rate rises above both a threshold (linear in the
//! baseline rate) and the running cumulative mean of the trial.
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::{TimeWindow, TrialSchedule};
use crate::window::InstantaneousRate;

/// Reaction time of a trial without response.
pub const NO_RESPONSE: f64 = -1.0;
/// The Gaussian smoothing kernel is truncated at this many standard deviations.
const TRUNCATE: f64 = 4.0;

/// Smooth values with a Gaussian kernel of standard deviation `sigma` (in samples).
/// The kernel is truncated at 4 standard deviations and the values are mirrored across the boundaries, i.e.,
/// `(d c b a | a b c d | d c b a)`.
pub fn gaussian_filter1d(values: &[f64], sigma: f64) -> Result<Vec<f64>, AnalysisError> {
    if !(sigma > 0.0 && sigma.is_finite()) {
        return Err(AnalysisError::InvalidParameter(format!(
            "The smoothing standard deviation must be finite and positive, got {}.",
            sigma
        )));
    }
    if values.is_empty() {
        return Ok(vec![]);
    }

    let radius = (TRUNCATE * sigma + 0.5) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    let n = values.len() as i64;
    let reflect = |i: i64| {
        let m = i.rem_euclid(2 * n);
        if m < n {
            m as usize
        } else {
            (2 * n - 1 - m) as usize
        }
    };

    Ok((0..n)
        .map(|i| {
            (-radius..=radius)
                .zip(weights.iter())
                .map(|(offset, w)| w * values[reflect(i + offset)])
                .sum::<f64>()
                / total
        })
        .collect())
}

/// Running mean of the values, scaled by `gain`.
pub fn cumulative_mean(values: &[f64], gain: f64) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |sum, value| {
            *sum += value;
            Some(*sum)
        })
        .enumerate()
        .map(|(i, sum)| sum / (i + 1) as f64 * gain)
        .collect()
}

fn select(times: &[f64], values: &[f64], window: &TimeWindow) -> (Vec<f64>, Vec<f64>) {
    times
        .iter()
        .zip(values.iter())
        .filter(|(time, _)| window.contains(**time))
        .map(|(time, value)| (*time, *value))
        .unzip()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Outcome of a single trial.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct TrialResponse {
    pub responded: bool,
    /// Time (in ms) between the mossy-fiber stimulus and the response, if any.
    pub reaction_time: Option<f64>,
}

impl TrialResponse {
    pub fn none() -> Self {
        TrialResponse {
            responded: false,
            reaction_time: None,
        }
    }

    pub fn at(reaction_time: f64) -> Self {
        TrialResponse {
            responded: true,
            reaction_time: Some(reaction_time),
        }
    }
}

/// Outcome of the threshold detection over all trials.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ResponseReport {
    /// The threshold of every trial.
    pub thresholds: Vec<f64>,
    pub trials: Vec<TrialResponse>,
}

impl ResponseReport {
    /// The threshold of the last trial.
    pub fn threshold(&self) -> Option<f64> {
        self.thresholds.last().copied()
    }

    pub fn responses(&self) -> Vec<bool> {
        self.trials.iter().map(|trial| trial.responded).collect()
    }

    /// The reaction time of every trial, with -1 for trials without response.
    pub fn reaction_times(&self) -> Vec<f64> {
        self.trials
            .iter()
            .map(|trial| trial.reaction_time.unwrap_or(NO_RESPONSE))
            .collect()
    }

    pub fn num_responses(&self) -> usize {
        self.trials.iter().filter(|trial| trial.responded).count()
    }
}

/// Outcome of the cumulative-mean detection over all trials.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CumulativeMeanReport {
    /// The scaled cumulative mean of the last trial.
    pub cum_mean: Vec<f64>,
    pub responses: Vec<bool>,
}

/// Response detector parameters.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseDetector {
    /// Slope of the threshold, w.r.t. the baseline rate.
    pub slope: f64,
    /// Intercept of the threshold (in Hz).
    pub intercept: f64,
    /// Gain applied to the cumulative mean.
    pub cum_gain: f64,
    /// Delay (in ms) after the mossy-fiber stimulus before which no response is looked for.
    pub response_delay: f64,
    /// Same as `response_delay`, for the cumulative-mean detection.
    pub cum_mean_delay: f64,
    /// Standard deviation (in bins) of the Gaussian smoothing of the rate.
    pub sigma: f64,
}

impl Default for ResponseDetector {
    fn default() -> Self {
        ResponseDetector {
            slope: 1.0,
            intercept: 0.0,
            cum_gain: 1.0,
            response_delay: 100.0,
            cum_mean_delay: 150.0,
            sigma: 4.0,
        }
    }
}

impl ResponseDetector {
    /// Create a new detector with the default delays and smoothing.
    /// Returns an error if a parameter is not finite.
    pub fn build(slope: f64, intercept: f64, cum_gain: f64) -> Result<Self, AnalysisError> {
        let detector = ResponseDetector {
            slope,
            intercept,
            cum_gain,
            ..Default::default()
        };
        detector.validate()?;
        Ok(detector)
    }

    /// Check the parameters: all finite, non-negative delays and a positive smoothing.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.slope.is_finite() && self.intercept.is_finite() && self.cum_gain.is_finite()) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Got slope = {}, intercept = {}, cumulative gain = {}.",
                self.slope, self.intercept, self.cum_gain
            )));
        }
        if !(self.response_delay >= 0.0
            && self.response_delay.is_finite()
            && self.cum_mean_delay >= 0.0
            && self.cum_mean_delay.is_finite())
        {
            return Err(AnalysisError::InvalidParameter(format!(
                "The response delays must be finite and non-negative, got {} and {}.",
                self.response_delay, self.cum_mean_delay
            )));
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(AnalysisError::InvalidParameter(format!(
                "The smoothing standard deviation must be finite and positive, got {}.",
                self.sigma
            )));
        }
        Ok(())
    }

    pub fn with_response_delay(mut self, response_delay: f64) -> Self {
        self.response_delay = response_delay;
        self
    }

    pub fn with_cum_mean_delay(mut self, cum_mean_delay: f64) -> Self {
        self.cum_mean_delay = cum_mean_delay;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Returns the smoothed population rate.
    pub fn trace(&self, rate: &InstantaneousRate) -> Result<Vec<f64>, AnalysisError> {
        gaussian_filter1d(&rate.mean_rate(), self.sigma)
    }

    /// Classify every trial and measure the reaction times, comparing the smoothed rate to a threshold and to its
    /// cumulative mean.
    pub fn detect(
        &self,
        rate: &InstantaneousRate,
        schedule: &TrialSchedule,
    ) -> Result<ResponseReport, AnalysisError> {
        let trace = self.trace(rate)?;
        let times = rate.times();

        let mut report = ResponseReport {
            thresholds: Vec::with_capacity(schedule.trials),
            trials: Vec::with_capacity(schedule.trials),
        };

        for k in 0..schedule.trials {
            let t0 = schedule.trial_start(k);
            let reference = schedule.mf_onset(k) + self.response_delay;
            let post = TimeWindow::new(reference, schedule.io_onset(k));

            let (_, baseline) = select(times, &trace, &TimeWindow::new(t0, reference));
            if baseline.is_empty() {
                return Err(AnalysisError::EmptyWindow(format!(
                    "No rate sample in the baseline window ({}, {}] of trial {}.",
                    t0, reference, k
                )));
            }
            let threshold = mean(&baseline) * self.slope + self.intercept;

            let (_, trial) = select(times, &trace, &TimeWindow::new(t0, schedule.io_onset(k)));
            let cum_mean = cumulative_mean(&trial, self.cum_gain);

            let (post_times, post_rates) = select(times, &trace, &post);
            let cum_tail = &cum_mean[cum_mean.len().saturating_sub(post_rates.len())..];

            let crossing = post_times
                .iter()
                .zip(post_rates.iter())
                .zip(cum_tail.iter())
                .find(|((_, rate), cum)| threshold - **rate < 0.0 && **cum - **rate < 0.0)
                .map(|((time, _), _)| *time);

            let response = match crossing {
                Some(time) => TrialResponse::at(time - schedule.mf_onset(k)),
                None => TrialResponse::none(),
            };
            log::debug!(
                "Trial {}: threshold = {:.2}, responded = {}",
                k,
                threshold,
                response.responded
            );

            report.thresholds.push(threshold);
            report.trials.push(response);
        }

        log::info!(
            "Detected {} responses in {} trials",
            report.num_responses(),
            schedule.trials
        );
        Ok(report)
    }

    /// Classify every trial, comparing the raw rate to its cumulative mean after `cum_mean_delay`.
    pub fn detect_cum_mean(
        &self,
        rate: &InstantaneousRate,
        schedule: &TrialSchedule,
    ) -> Result<CumulativeMeanReport, AnalysisError> {
        let trace = rate.mean_rate();
        let times = rate.times();

        let mut report = CumulativeMeanReport {
            cum_mean: vec![],
            responses: Vec::with_capacity(schedule.trials),
        };

        for k in 0..schedule.trials {
            let t0 = schedule.trial_start(k);
            let trial_window = TimeWindow::new(t0, schedule.io_onset(k));
            let (_, trial) = select(times, &trace, &trial_window);
            if trial.is_empty() {
                return Err(AnalysisError::EmptyWindow(format!(
                    "No rate sample in the window ({}, {}] of trial {}.",
                    trial_window.start, trial_window.end, k
                )));
            }
            let cum_mean = cumulative_mean(&trial, self.cum_gain);

            let post = TimeWindow::new(schedule.mf_onset(k) + self.cum_mean_delay, schedule.io_onset(k));
            let (_, post_rates) = select(times, &trace, &post);
            let cum_tail = &cum_mean[cum_mean.len().saturating_sub(post_rates.len())..];

            report.responses.push(
                cum_tail
                    .iter()
                    .zip(post_rates.iter())
                    .any(|(cum, rate)| cum - rate < 0.0),
            );
            report.cum_mean = cum_mean;
        }

        Ok(report)
    }
}

/// Detect the responses of every trial from the instantaneous rate of the designated population.
/// The threshold is `m1 * baseline + q` and the cumulative mean is scaled by `m2`.
pub fn calculate_threshold(
    rate: &InstantaneousRate,
    schedule: &TrialSchedule,
    m1: f64,
    q: f64,
    m2: f64,
) -> Result<ResponseReport, AnalysisError> {
    ResponseDetector::build(m1, q, m2)?.detect(rate, schedule)
}

/// Detect the responses of every trial by comparing the rate of the designated population to its cumulative mean,
/// scaled by `m`.
pub fn calculate_cum_mean(
    rate: &InstantaneousRate,
    schedule: &TrialSchedule,
    m: f64,
) -> Result<CumulativeMeanReport, AnalysisError> {
    ResponseDetector::build(1.0, 0.0, m)?.detect_cum_mean(rate, schedule)
}
