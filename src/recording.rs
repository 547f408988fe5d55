//! Recording devices attached to simulated populations.
//!
//! The simulator itself is an external collaborator, reached through the [`Simulator`] trait.
//! A population is identified by the list of global ids of its neurons.
use rand::Rng;

use crate::error::AnalysisError;
use crate::raster::{Raster, VoltageTrace, WeightTrace};

/// Events collected by a recording device.
/// Devices only fill the fields they record, e.g., a spike detector leaves `potentials` empty.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct DeviceEvents {
    pub times: Vec<f64>,
    pub senders: Vec<usize>,
    pub targets: Vec<usize>,
    pub potentials: Vec<f64>,
    pub weights: Vec<f64>,
}

/// The interface of the external simulator used to record populations.
pub trait Simulator {
    /// Handle of a device created in the simulator.
    type Device: Clone;

    /// Create a voltmeter recording the membrane potential `V_m` every `interval` ms.
    fn create_voltmeter(&mut self, interval: f64) -> Result<Self::Device, AnalysisError>;

    /// Create a spike detector.
    fn create_spike_detector(&mut self) -> Result<Self::Device, AnalysisError>;

    /// Connect a device with the provided neurons.
    fn connect(&mut self, device: &Self::Device, neurons: &[usize]) -> Result<(), AnalysisError>;

    /// Returns the events recorded by the device so far.
    fn events(&self, device: &Self::Device) -> Result<DeviceEvents, AnalysisError>;
}

/// Which neurons of a population a voltmeter records.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TargetNeurons {
    /// Every neuron of the population.
    All,
    /// One neuron picked uniformly at random.
    Random,
    /// The i-th neuron of the i-th population.
    OneByOne,
    /// The neuron at the given position in every population.
    Index(usize),
}

fn pick_neuron(population: &[usize], position: usize) -> Result<usize, AnalysisError> {
    population.get(position).copied().ok_or_else(|| {
        AnalysisError::InvalidParameter(format!(
            "Cannot record neuron {} of a population with {} neurons.",
            position,
            population.len()
        ))
    })
}

/// Attach a voltmeter to every population in the list.
/// Returns the voltmeters, in the same order as the populations.
pub fn attach_voltmeter<S: Simulator, R: Rng>(
    simulator: &mut S,
    populations: &[Vec<usize>],
    sampling_resolution: f64,
    target: TargetNeurons,
    rng: &mut R,
) -> Result<Vec<S::Device>, AnalysisError> {
    if sampling_resolution <= 0.0 {
        return Err(AnalysisError::InvalidParameter(
            "The sampling resolution must be positive.".to_string(),
        ));
    }

    populations
        .iter()
        .enumerate()
        .map(|(id, population)| {
            if population.is_empty() {
                return Err(AnalysisError::InvalidParameter(format!(
                    "Cannot attach a voltmeter to the empty population {}.",
                    id
                )));
            }
            let voltmeter = simulator.create_voltmeter(sampling_resolution)?;
            match target {
                TargetNeurons::All => simulator.connect(&voltmeter, population)?,
                TargetNeurons::Random => {
                    let position = rng.gen_range(0..population.len());
                    log::debug!(
                        "Population {}: recording neuron {} (ids from {:?} to {:?})",
                        id,
                        population[position],
                        population.iter().min(),
                        population.iter().max()
                    );
                    simulator.connect(&voltmeter, &[population[position]])?
                }
                TargetNeurons::OneByOne => {
                    simulator.connect(&voltmeter, &[pick_neuron(population, id)?])?
                }
                TargetNeurons::Index(position) => {
                    simulator.connect(&voltmeter, &[pick_neuron(population, position)?])?
                }
            }
            Ok(voltmeter)
        })
        .collect()
}

/// Attach a spike detector to every population in the list.
/// The `recorded` populations already have a detector: it is reused when they show up in the list, in the same order.
/// Returns the detectors, in the same order as the populations.
pub fn attach_spikedetector<S: Simulator>(
    simulator: &mut S,
    populations: &[Vec<usize>],
    recorded: &[(Vec<usize>, S::Device)],
) -> Result<Vec<S::Device>, AnalysisError> {
    let mut pointer = 0;
    let mut detectors = Vec::with_capacity(populations.len());

    for population in populations.iter() {
        match recorded.get(pointer) {
            Some((recorded_population, detector)) if recorded_population == population => {
                detectors.push(detector.clone());
                pointer += 1;
            }
            _ => {
                let detector = simulator.create_spike_detector()?;
                simulator.connect(&detector, population)?;
                detectors.push(detector);
            }
        }
    }

    if pointer < recorded.len() {
        log::debug!(
            "{} recorded populations were not matched and have been ignored",
            recorded.len() - pointer
        );
    }

    Ok(detectors)
}

fn check_names<D, S: AsRef<str>>(devices: &[D], names: &[S]) -> Result<(), AnalysisError> {
    if devices.len() != names.len() {
        return Err(AnalysisError::IncompatibleShapes(format!(
            "The number of devices ({}) and population names ({}) don't match.",
            devices.len(),
            names.len()
        )));
    }
    Ok(())
}

/// Collect the membrane potentials recorded by each voltmeter.
pub fn get_voltage_values<S: Simulator, N: AsRef<str>>(
    simulator: &S,
    voltmeters: &[S::Device],
    names: &[N],
) -> Result<Vec<VoltageTrace>, AnalysisError> {
    check_names(voltmeters, names)?;
    voltmeters
        .iter()
        .zip(names.iter())
        .map(|(voltmeter, name)| {
            let events = simulator.events(voltmeter)?;
            Ok(VoltageTrace {
                name: name.as_ref().to_string(),
                times: events.times,
                potentials: events.potentials,
            })
        })
        .collect()
}

/// Collect the spikes recorded by each detector as rasters.
pub fn get_spike_values<S: Simulator, N: AsRef<str>>(
    simulator: &S,
    detectors: &[S::Device],
    names: &[N],
) -> Result<Vec<Raster>, AnalysisError> {
    check_names(detectors, names)?;
    detectors
        .iter()
        .zip(names.iter())
        .map(|(detector, name)| {
            let events = simulator.events(detector)?;
            Raster::build(name.as_ref(), events.times, events.senders)
        })
        .collect()
}

/// Collect the weight evolution of the listed (sender, target) synapses from a weight recorder.
pub fn get_weights_values<S: Simulator>(
    simulator: &S,
    recorder: &S::Device,
    synapses: &[(usize, usize)],
) -> Result<Vec<WeightTrace>, AnalysisError> {
    let events = simulator.events(recorder)?;
    let num_events = events.times.len();
    if events.weights.len() != num_events
        || events.senders.len() != num_events
        || events.targets.len() != num_events
    {
        return Err(AnalysisError::DeviceError(
            "The weight recorder returned events of different lengths.".to_string(),
        ));
    }

    Ok(synapses
        .iter()
        .map(|&(sender, target)| {
            let (times, weights) = (0..num_events)
                .filter(|&i| events.senders[i] == sender && events.targets[i] == target)
                .map(|i| (events.times[i], events.weights[i]))
                .unzip();
            WeightTrace {
                label: format!("s = {}, t = {}", sender, target),
                times,
                weights,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    const SEED: u64 = 42;

    #[derive(Debug, PartialEq, Clone)]
    enum Kind {
        Voltmeter(f64),
        SpikeDetector,
    }

    #[derive(Default)]
    struct FakeSimulator {
        devices: Vec<Kind>,
        connections: HashMap<usize, Vec<usize>>,
        recorded: HashMap<usize, DeviceEvents>,
    }

    impl Simulator for FakeSimulator {
        type Device = usize;

        fn create_voltmeter(&mut self, interval: f64) -> Result<usize, AnalysisError> {
            self.devices.push(Kind::Voltmeter(interval));
            Ok(self.devices.len() - 1)
        }

        fn create_spike_detector(&mut self) -> Result<usize, AnalysisError> {
            self.devices.push(Kind::SpikeDetector);
            Ok(self.devices.len() - 1)
        }

        fn connect(&mut self, device: &usize, neurons: &[usize]) -> Result<(), AnalysisError> {
            if *device >= self.devices.len() {
                return Err(AnalysisError::DeviceError("unknown device".to_string()));
            }
            self.connections
                .entry(*device)
                .or_default()
                .extend_from_slice(neurons);
            Ok(())
        }

        fn events(&self, device: &usize) -> Result<DeviceEvents, AnalysisError> {
            Ok(self.recorded.get(device).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_attach_voltmeter() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let populations = vec![vec![1, 2, 3], vec![4, 5, 6, 7]];

        let mut simulator = FakeSimulator::default();
        let voltmeters =
            attach_voltmeter(&mut simulator, &populations, 1.0, TargetNeurons::All, &mut rng)
                .unwrap();
        assert_eq!(voltmeters, vec![0, 1]);
        assert_eq!(simulator.devices, vec![Kind::Voltmeter(1.0); 2]);
        assert_eq!(simulator.connections[&1], vec![4, 5, 6, 7]);

        let mut simulator = FakeSimulator::default();
        attach_voltmeter(&mut simulator, &populations, 0.5, TargetNeurons::OneByOne, &mut rng)
            .unwrap();
        assert_eq!(simulator.connections[&0], vec![1]);
        assert_eq!(simulator.connections[&1], vec![5]);

        let mut simulator = FakeSimulator::default();
        attach_voltmeter(&mut simulator, &populations, 0.5, TargetNeurons::Index(2), &mut rng)
            .unwrap();
        assert_eq!(simulator.connections[&0], vec![3]);
        assert_eq!(simulator.connections[&1], vec![6]);

        let mut simulator = FakeSimulator::default();
        attach_voltmeter(&mut simulator, &populations, 0.5, TargetNeurons::Random, &mut rng)
            .unwrap();
        assert_eq!(simulator.connections[&0].len(), 1);
        assert!(populations[0].contains(&simulator.connections[&0][0]));
        assert!(populations[1].contains(&simulator.connections[&1][0]));

        let mut simulator = FakeSimulator::default();
        assert!(matches!(
            attach_voltmeter(&mut simulator, &populations, 1.0, TargetNeurons::Index(3), &mut rng),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            attach_voltmeter(&mut simulator, &populations, 0.0, TargetNeurons::All, &mut rng),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_attach_spikedetector() {
        let populations = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let mut simulator = FakeSimulator::default();

        let detectors = attach_spikedetector(&mut simulator, &populations, &[]).unwrap();
        assert_eq!(detectors, vec![0, 1, 2]);
        assert_eq!(simulator.connections[&2], vec![5, 6]);

        // the second population is already recorded by device 42
        let mut simulator = FakeSimulator::default();
        let detectors =
            attach_spikedetector(&mut simulator, &populations, &[(vec![3, 4], 42)]).unwrap();
        assert_eq!(detectors, vec![0, 42, 1]);
        assert_eq!(simulator.devices.len(), 2);
    }

    #[test]
    fn test_get_values() {
        let mut simulator = FakeSimulator::default();
        simulator.recorded.insert(
            0,
            DeviceEvents {
                times: vec![1.0, 2.0],
                potentials: vec![-70.0, -65.0],
                ..Default::default()
            },
        );
        simulator.recorded.insert(
            1,
            DeviceEvents {
                times: vec![3.0, 4.0],
                senders: vec![12, 11],
                ..Default::default()
            },
        );

        let traces = get_voltage_values(&simulator, &[0], &["PC"]).unwrap();
        assert_eq!(traces[0].name, "PC");
        assert_eq!(traces[0].potentials, vec![-70.0, -65.0]);

        let rasters = get_spike_values(&simulator, &[1, 0], &["DCN", "PC"]).unwrap();
        assert_eq!(rasters[0].senders(), &[12, 11]);
        // the voltmeter recorded no sender
        assert!(matches!(
            get_spike_values(&simulator, &[0], &["PC"]),
            Err(AnalysisError::InvalidRaster(_))
        ));
        assert!(matches!(
            get_spike_values(&simulator, &[1], &["DCN", "PC"]),
            Err(AnalysisError::IncompatibleShapes(_))
        ));
    }

    #[test]
    fn test_get_weights_values() {
        let mut simulator = FakeSimulator::default();
        simulator.recorded.insert(
            0,
            DeviceEvents {
                times: vec![1.0, 2.0, 3.0, 4.0],
                senders: vec![7, 8, 7, 7],
                targets: vec![9, 9, 9, 10],
                weights: vec![0.1, 0.2, 0.3, 0.4],
                ..Default::default()
            },
        );

        let traces = get_weights_values(&simulator, &0, &[(7, 9), (8, 10)]).unwrap();
        assert_eq!(traces[0].label, "s = 7, t = 9");
        assert_eq!(traces[0].times, vec![1.0, 3.0]);
        assert_eq!(traces[0].weights, vec![0.1, 0.3]);
        assert!(traces[1].times.is_empty());

        assert!(matches!(
            get_weights_values(&simulator, &1, &[(7, 9)]),
            Ok(ref traces) if traces[0].times.is_empty()
        ));
    }
}
