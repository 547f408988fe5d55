//! Average firing rates and coefficient of variation of the inter-spike intervals.
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::TrialSchedule;
use crate::population::{IdRange, PopulationIds};
use crate::raster::Raster;
use crate::MS_PER_S;

/// A group of populations summarized by their size-weighted average, e.g., MSN for MSND1 and MSND2.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationGroup {
    pub name: String,
    pub members: Vec<String>,
}

impl PopulationGroup {
    pub fn new(name: &str, members: &[&str]) -> Self {
        PopulationGroup {
            name: name.to_string(),
            members: members.iter().map(|member| member.to_string()).collect(),
        }
    }

    /// The striatal (MSN) and pallidal (GPe) groups of the basal ganglia model.
    pub fn basal_ganglia() -> Vec<Self> {
        vec![
            PopulationGroup::new("MSN", &["MSND1", "MSND2"]),
            PopulationGroup::new("GPe", &["GPeTA", "GPeTI"]),
        ]
    }
}

/// Firing rate (Hz) and CV of a population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationRate {
    pub name: String,
    pub fr: f64,
    #[serde(rename = "CV")]
    pub cv: f64,
}

/// Firing rates and CVs of several populations.
/// For statistics over several runs, the values are averages and the standard deviations are provided.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FiringRateStats {
    #[serde(rename = "name")]
    pub names: Vec<String>,
    pub fr: Vec<f64>,
    #[serde(rename = "CV")]
    pub cv: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fr_sd: Option<Vec<f64>>,
    #[serde(rename = "CV_sd", skip_serializing_if = "Option::is_none")]
    pub cv_sd: Option<Vec<f64>>,
}

impl FiringRateStats {
    /// Returns the firing rate of the population, if present.
    pub fn fr_of(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|other| other == name)
            .map(|pos| self.fr[pos])
    }

    /// Returns the CV of the population, if present.
    pub fn cv_of(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|other| other == name)
            .map(|pos| self.cv[pos])
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    let mu = mean(values);
    (values.iter().map(|value| (value - mu).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Returns the inter-spike intervals of every neuron of the population, for spikes in the open window (t_start, t_end).
/// Intervals of zero length are ignored.
fn inter_spike_intervals(
    raster: &Raster,
    range: &IdRange,
    t_start: f64,
    t_end: f64,
) -> Result<Vec<Vec<f64>>, AnalysisError> {
    let mut times = vec![vec![]; range.size()];
    for event in raster.local_events(range) {
        let (time, index) = event?;
        if time > t_start && time < t_end {
            times[index].push(time);
        }
    }

    Ok(times
        .into_iter()
        .map(|mut neuron_times| {
            neuron_times.sort_by(|a, b| a.total_cmp(b));
            neuron_times
                .iter()
                .tuple_windows()
                .map(|(t1, t2)| t2 - t1)
                .filter(|isi| *isi != 0.0)
                .collect()
        })
        .collect())
}

/// Compute the firing rate and CV of one population.
/// The firing rate of a neuron is the inverse of its mean ISI, or zero if it has less than two spikes.
/// Both values are averaged over all neurons of the population, silent ones included, and rounded to 2 decimals.
pub fn population_rate(
    raster: &Raster,
    pop_ids: &PopulationIds,
    t_start: f64,
    t_end: Option<f64>,
) -> Result<PopulationRate, AnalysisError> {
    let range = pop_ids.range(raster.name())?;
    let isis = inter_spike_intervals(raster, &range, t_start, t_end.unwrap_or(f64::INFINITY))?;

    let (fr, cv): (Vec<f64>, Vec<f64>) = isis
        .iter()
        .map(|neuron_isis| match neuron_isis.is_empty() {
            true => (0.0, 0.0),
            false => {
                let mean_isi = mean(neuron_isis);
                (MS_PER_S / mean_isi, std_dev(neuron_isis) / mean_isi)
            }
        })
        .unzip();

    Ok(PopulationRate {
        name: raster.name().to_string(),
        fr: round2(mean(&fr)),
        cv: round2(mean(&cv)),
    })
}

/// Compute the firing rate of every population in the window (t_start, t_end).
pub fn calculate_fr(
    rasters: &[Raster],
    pop_ids: &PopulationIds,
    t_start: f64,
    t_end: Option<f64>,
) -> Result<Vec<f64>, AnalysisError> {
    Ok(population_rates(rasters, pop_ids, t_start, t_end)?
        .into_iter()
        .map(|rate| rate.fr)
        .collect())
}

fn population_rates(
    rasters: &[Raster],
    pop_ids: &PopulationIds,
    t_start: f64,
    t_end: Option<f64>,
) -> Result<Vec<PopulationRate>, AnalysisError> {
    if let Some(t_end) = t_end {
        if t_end < t_start {
            return Err(AnalysisError::InvalidParameter(format!(
                "The window ({}, {}) ends before it starts.",
                t_start, t_end
            )));
        }
    }
    rasters
        .par_iter()
        .map(|raster| population_rate(raster, pop_ids, t_start, t_end))
        .collect()
}

/// Insert the size-weighted average of every group right after its last member.
/// Groups with a missing member are skipped.
fn extend_with_groups(
    rates: Vec<PopulationRate>,
    pop_ids: &PopulationIds,
    groups: &[PopulationGroup],
) -> Result<Vec<PopulationRate>, AnalysisError> {
    let mut extended = rates;

    for group in groups.iter() {
        let positions: Option<Vec<usize>> = group
            .members
            .iter()
            .map(|member| extended.iter().position(|rate| &rate.name == member))
            .collect();
        let positions = match positions {
            Some(positions) if !positions.is_empty() => positions,
            _ => continue,
        };

        let sizes = group
            .members
            .iter()
            .map(|member| pop_ids.size(member).map(|size| size as f64))
            .collect::<Result<Vec<f64>, AnalysisError>>()?;
        let total: f64 = sizes.iter().sum();
        let weighted = |value: fn(&PopulationRate) -> f64| {
            round2(
                positions
                    .iter()
                    .zip(sizes.iter())
                    .map(|(&pos, size)| value(&extended[pos]) * size)
                    .sum::<f64>()
                    / total,
            )
        };
        let average = PopulationRate {
            name: group.name.clone(),
            fr: weighted(|rate| rate.fr),
            cv: weighted(|rate| rate.cv),
        };

        let last = positions.iter().max().copied().unwrap_or_default();
        extended.insert(last + 1, average);
    }

    Ok(extended)
}

/// Compute the firing rate and the CV of the ISI of every population in the window (t_start, t_end).
/// The groups whose members are all present are appended as size-weighted averages.
pub fn calculate_fr_stats(
    rasters: &[Raster],
    pop_ids: &PopulationIds,
    t_start: f64,
    t_end: Option<f64>,
    groups: &[PopulationGroup],
) -> Result<FiringRateStats, AnalysisError> {
    let rates = extend_with_groups(
        population_rates(rasters, pop_ids, t_start, t_end)?,
        pop_ids,
        groups,
    )?;

    Ok(FiringRateStats {
        names: rates.iter().map(|rate| rate.name.clone()).collect(),
        fr: rates.iter().map(|rate| rate.fr).collect(),
        cv: rates.iter().map(|rate| rate.cv).collect(),
        fr_sd: None,
        cv_sd: None,
    })
}

/// Same as [`calculate_fr_stats`] over several runs (e.g., trials with different seeds) of the same model.
/// The firing rates and CVs are averaged over the runs, and their standard deviations reported.
pub fn calculate_fr_stats_trials(
    runs: &[Vec<Raster>],
    pop_ids: &PopulationIds,
    t_start: f64,
    t_end: Option<f64>,
    groups: &[PopulationGroup],
) -> Result<FiringRateStats, AnalysisError> {
    if runs.is_empty() {
        return Err(AnalysisError::InvalidParameter(
            "At least one run is required.".to_string(),
        ));
    }

    let stats = runs
        .iter()
        .map(|rasters| calculate_fr_stats(rasters, pop_ids, t_start, t_end, groups))
        .collect::<Result<Vec<FiringRateStats>, AnalysisError>>()?;

    let names = stats[0].names.clone();
    if let Some(other) = stats.iter().find(|other| other.names != names) {
        return Err(AnalysisError::IncompatibleShapes(format!(
            "All runs must record the same populations, got {:?} and {:?}.",
            names, other.names
        )));
    }

    let column = |pos: usize, value: fn(&FiringRateStats, usize) -> f64| -> Vec<f64> {
        stats.iter().map(|run| value(run, pos)).collect()
    };
    let fr_columns: Vec<Vec<f64>> = (0..names.len())
        .map(|pos| column(pos, |run, pos| run.fr[pos]))
        .collect();
    let cv_columns: Vec<Vec<f64>> = (0..names.len())
        .map(|pos| column(pos, |run, pos| run.cv[pos]))
        .collect();

    Ok(FiringRateStats {
        names,
        fr: fr_columns.iter().map(|values| mean(values)).collect(),
        cv: cv_columns.iter().map(|values| mean(values)).collect(),
        fr_sd: Some(fr_columns.iter().map(|values| std_dev(values)).collect()),
        cv_sd: Some(cv_columns.iter().map(|values| std_dev(values)).collect()),
    })
}

/// Firing rates of a population in every trial and run, indexed as `rates[trial][run]`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TrialRates {
    pub name: String,
    pub rates: Vec<Vec<f64>>,
}

/// Compute the firing rates of every population in each trial of each run.
/// In the k-th trial, the rates are computed in the window (t0 + t_start, t0 + t_end) with t0 the trial start.
pub fn average_fr_per_trial(
    runs: &[Vec<Raster>],
    pop_ids: &PopulationIds,
    schedule: &TrialSchedule,
    t_start: f64,
    t_end: f64,
    groups: &[PopulationGroup],
) -> Result<Vec<TrialRates>, AnalysisError> {
    let mut names: Option<Vec<String>> = None;
    let mut per_trial = Vec::with_capacity(schedule.trials);

    for k in 0..schedule.trials {
        let t0 = schedule.trial_start(k);
        let (ti, tf) = (t0 + t_start, t0 + t_end);
        log::debug!("Trial {}: averaging firing rates in ({}, {})", k, ti, tf);

        let mut per_run = Vec::with_capacity(runs.len());
        for rasters in runs.iter() {
            let stats = calculate_fr_stats(rasters, pop_ids, ti, Some(tf), groups)?;
            match &names {
                Some(names) if names != &stats.names => {
                    return Err(AnalysisError::IncompatibleShapes(format!(
                        "All runs must record the same populations, got {:?} and {:?}.",
                        names, stats.names
                    )));
                }
                Some(_) => {}
                None => names = Some(stats.names.clone()),
            }
            per_run.push(stats.fr);
        }
        per_trial.push(per_run);
    }

    Ok(names
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(pos, name)| TrialRates {
            name,
            rates: per_trial
                .iter()
                .map(|per_run| per_run.iter().map(|fr| fr[pos]).collect())
                .collect(),
        })
        .collect())
}
