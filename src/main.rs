use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use snn_analysis::config::AnalysisConfig;
use snn_analysis::cortex::{load_cortex_activity, load_mass_frs};
use snn_analysis::error::AnalysisError;
use snn_analysis::fitness::FitnessResult;
use snn_analysis::population::PopulationIds;
use snn_analysis::rate::{
    average_fr_per_trial, calculate_fr_stats, calculate_fr_stats_trials, FiringRateStats,
    TrialRates,
};
use snn_analysis::raster::{load_rasters, Raster};
use snn_analysis::response::ResponseReport;
use snn_analysis::window::InstantaneousRate;

#[derive(Parser, Debug)]
struct Args {
    /// The rasters of one run (JSON), repeat the flag for several runs
    #[arg(short = 'r', long, required = true)]
    rasters: Vec<PathBuf>,
    /// The global id ranges of the populations (JSON)
    #[arg(short = 'p', long)]
    populations: PathBuf,
    /// The analysis configuration (JSON), defaults are used if omitted
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
    /// Where to write the report
    #[arg(short = 'o', long, default_value = "report.json")]
    output: PathBuf,
    /// The root directory of previous simulation results, overrides the configuration
    #[arg(long)]
    data_root: Option<PathBuf>,
    /// The mass-model firing rates (JSON), required for the fitness
    #[arg(long)]
    mass_frs: Option<PathBuf>,
    /// The dopamine depletion level of the cortical input to load from the data root
    #[arg(long, allow_hyphen_values = true)]
    dopa_depl: Option<f64>,
    /// The log file
    #[arg(long, default_value = "log/snn-analysis.log")]
    log_file: PathBuf,
    /// The log level, must be one of: off, error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Serialize, Debug)]
struct Report {
    firing_rates: FiringRateStats,
    instant_rates: Vec<InstantaneousRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trial_rates: Option<Vec<TrialRates>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    responses: Option<ResponseReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reaction_times: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fitness: Option<FitnessResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cortex_activity: Option<Vec<f64>>,
}

fn init_logging(args: &Args) -> Result<(), AnalysisError> {
    let level = args
        .log_level
        .parse::<LevelFilter>()
        .map_err(|e| AnalysisError::InvalidParameter(e.to_string()))?;

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} {l} - {m}\n")))
        .build(&args.log_file)
        .map_err(|e| AnalysisError::IOError(e.to_string()))?;
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .target(log4rs::append::console::Target::Stderr)
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(
            Root::builder()
                .appender("logfile")
                .appender("stderr")
                .build(level),
        )
        .map_err(|e| AnalysisError::IOError(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    Ok(())
}

fn main() -> Result<(), AnalysisError> {
    let args = Args::parse();
    init_logging(&args)?;
    log::info!("{:?}", args);

    let config = match &args.config {
        Some(path) => AnalysisConfig::load_from(path)?,
        None => AnalysisConfig::default(),
    }
    .with_data_root(args.data_root.as_ref());

    let pop_ids = PopulationIds::load_from(&args.populations)?;
    let runs = args
        .rasters
        .iter()
        .map(load_rasters)
        .collect::<Result<Vec<Vec<Raster>>, AnalysisError>>()?;
    log::info!(
        "Loading: done! {} run(s) of {} population(s)",
        runs.len(),
        pop_ids.len()
    );

    // Average firing rates, over all runs
    let rate_config = &config.rate;
    let firing_rates = match runs.len() {
        1 => calculate_fr_stats(
            &runs[0],
            &pop_ids,
            rate_config.t_start,
            rate_config.t_end,
            &rate_config.groups,
        )?,
        _ => calculate_fr_stats_trials(
            &runs,
            &pop_ids,
            rate_config.t_start,
            rate_config.t_end,
            &rate_config.groups,
        )?,
    };
    for (name, fr) in firing_rates.names.iter().zip(firing_rates.fr.iter()) {
        log::info!("{}: {:.2} Hz", name, fr);
    }

    // Instantaneous firing rates of the first run
    let instant_rates = config.window.estimator()?.estimate_all(&runs[0], &pop_ids)?;
    log::info!("Instantaneous firing rates: done!");

    // Responses of the designated population, trial by trial
    let (trial_rates, responses) = match &config.schedule {
        Some(schedule) => {
            let trial_rates = average_fr_per_trial(
                &runs,
                &pop_ids,
                schedule,
                schedule.mf_time,
                schedule.io_time,
                &rate_config.groups,
            )?;

            let designated = instant_rates
                .iter()
                .find(|rate| rate.name() == config.response.population)
                .ok_or_else(|| {
                    AnalysisError::PopulationNotFound(config.response.population.clone())
                })?;
            let responses = config.response.detector.detect(designated, schedule)?;
            log::info!("Response detection: done! Reaction times: {:?}", responses.reaction_times());
            (Some(trial_rates), Some(responses))
        }
        None => (None, None),
    };

    // Fitness, if the mass-model activity is available
    let fitness = match &args.mass_frs {
        Some(path) => {
            let mass_frs = load_mass_frs(path)?;
            let weights = config.fitness.fr_weights.as_deref();
            Some(config.fitness.scorer()?.score(
                &firing_rates.fr,
                &config.fitness.fr_target,
                &mass_frs,
                weights,
            )?)
        }
        None => None,
    };

    let cortex_activity = match args.dopa_depl {
        Some(dopa_depl) => {
            let data_root = config.data_root.as_ref().ok_or_else(|| {
                AnalysisError::InvalidParameter(
                    "A data root is required to load the cortical activity.".to_string(),
                )
            })?;
            Some(load_cortex_activity(data_root, dopa_depl)?)
        }
        None => None,
    };

    let report = Report {
        firing_rates,
        instant_rates,
        trial_rates,
        reaction_times: responses.as_ref().map(|report| report.reaction_times()),
        responses,
        fitness,
        cortex_activity,
    };

    let file = File::create(&args.output).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &report)
        .map_err(|e| AnalysisError::IOError(e.to_string()))?;
    writer
        .flush()
        .map_err(|e| AnalysisError::IOError(e.to_string()))?;
    log::info!("Report saving: done! Saved to {}", args.output.display());

    Ok(())
}
