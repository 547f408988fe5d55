//! This crate provides tools for analyzing the activity of spiking neural network simulations.
//!
//! # Firing Rates
//!
//! ## Average Rates
//!
//! ```rust
//! use snn_analysis::population::PopulationIds;
//! use snn_analysis::raster::Raster;
//! use snn_analysis::rate::calculate_fr_stats;
//!
//! // Two populations, with global ids 1 to 4 and 5 to 6
//! let mut pop_ids = PopulationIds::new();
//! pop_ids.insert("GrC", 1, 4).unwrap();
//! pop_ids.insert("PC", 5, 6).unwrap();
//!
//! // Neuron 5 fires every 10 ms, neuron 6 is silent
//! let times: Vec<f64> = (1..=10).map(|k| 10.0 * k as f64).collect();
//! let rasters = vec![
//!     Raster::new_empty("GrC"),
//!     Raster::build("PC", times, vec![5; 10]).unwrap(),
//! ];
//!
//! let stats = calculate_fr_stats(&rasters, &pop_ids, 0.0, None, &[]).unwrap();
//! assert_eq!(stats.fr_of("GrC"), Some(0.0));
//! assert_eq!(stats.fr_of("PC"), Some(50.0));
//! ```
//!
//! ## Instantaneous Rates
//!
//! ```rust
//! use snn_analysis::population::PopulationIds;
//! use snn_analysis::raster::Raster;
//! use snn_analysis::window::fr_window_step;
//!
//! let mut pop_ids = PopulationIds::new();
//! pop_ids.insert("PC", 1, 2).unwrap();
//! let rasters = vec![Raster::build("PC", vec![12.0, 31.0], vec![1, 2]).unwrap()];
//!
//! // 10 ms windows every 5 ms, centered from 0 to 100 ms
//! let rates = fr_window_step(&rasters, &pop_ids, 100.0, 10.0, 5.0, 0.0).unwrap();
//! assert_eq!(rates[0].num_neurons(), 2);
//! assert_eq!(rates[0].num_bins(), 21);
//! assert!((rates[0].rates()[(0, 2)] - 100.0).abs() < 1e-9);
//! ```
//!
//! # Fitness
//!
//! The fitness of a simulation combines the distance of the firing rates to their targets and the power of the
//! mass-model activity in a frequency band, see [`fitness::fitness_function`].
//!
//! # Responses
//!
//! Trial-wise responses and reaction times are detected from the instantaneous rate of a designated population,
//! see [`response::calculate_threshold`].
pub mod config;
pub mod cortex;
pub mod error;
pub mod fitness;
pub mod model;
pub mod population;
pub mod rate;
pub mod raster;
pub mod recording;
pub mod response;
pub mod spectral;
pub mod trajectory;
pub mod window;

/// Number of milliseconds in one second.
pub const MS_PER_S: f64 = 1000.0;
