//! Recorded events of a population: spike rasters, membrane potential traces and synaptic weight traces.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::AnalysisError;
use crate::population::IdRange;

/// Spike events of a population, i.e., a sequence of (time, sender) pairs.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Raster {
    /// The name of the recorded population.
    #[serde(rename = "compartment_name")]
    name: String,
    /// The spike times (in ms).
    times: Vec<f64>,
    /// The global id of the neuron emitting each spike.
    #[serde(rename = "neurons_idx")]
    senders: Vec<usize>,
}

impl Raster {
    /// Create a new raster.
    /// Returns an error if times and senders have different lengths or if a time is not finite.
    pub fn build(name: &str, times: Vec<f64>, senders: Vec<usize>) -> Result<Self, AnalysisError> {
        let raster = Raster {
            name: name.to_string(),
            times,
            senders,
        };
        raster.validate()?;
        Ok(raster)
    }

    /// Create an empty raster, i.e., a silent population.
    pub fn new_empty(name: &str) -> Self {
        Raster {
            name: name.to_string(),
            times: vec![],
            senders: vec![],
        }
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        if self.times.len() != self.senders.len() {
            return Err(AnalysisError::InvalidRaster(format!(
                "Population {} has {} spike times but {} senders.",
                self.name,
                self.times.len(),
                self.senders.len()
            )));
        }
        if let Some(time) = self.times.iter().find(|time| !time.is_finite()) {
            return Err(AnalysisError::InvalidRaster(format!(
                "Population {} has an invalid spike time {}.",
                self.name, time
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn senders(&self) -> &[usize] {
        &self.senders
    }

    pub fn num_spikes(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Iterate over the (time, sender) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, usize)> + '_ {
        self.times.iter().copied().zip(self.senders.iter().copied())
    }

    /// Iterate over the (time, local neuron index) pairs, where the local index is relative to the provided id range.
    /// Returns an error at the first sender outside the range.
    pub fn local_events(
        &self,
        range: &IdRange,
    ) -> impl Iterator<Item = Result<(f64, usize), AnalysisError>> + '_ {
        let range = *range;
        self.iter().map(move |(time, sender)| {
            range
                .local_index(sender)
                .map(|index| (time, index))
                .ok_or_else(|| {
                    AnalysisError::InvalidRaster(format!(
                        "Sender {} of population {} is outside the id range [{}, {}].",
                        sender, self.name, range.first, range.last
                    ))
                })
        })
    }

    /// Returns the spike times of the neuron with the lowest id in the raster.
    pub fn lowest_id_spike_times(&self) -> Vec<f64> {
        match self.senders.iter().min() {
            Some(min_id) => self
                .iter()
                .filter(|(_, sender)| sender == min_id)
                .map(|(time, _)| time)
                .collect(),
            None => vec![],
        }
    }
}

/// Membrane potential samples of a population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct VoltageTrace {
    #[serde(rename = "compartment_name")]
    pub name: String,
    pub times: Vec<f64>,
    pub potentials: Vec<f64>,
}

/// Synaptic weight samples of one sender/target pair.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WeightTrace {
    #[serde(rename = "sender_receiver")]
    pub label: String,
    pub times: Vec<f64>,
    pub weights: Vec<f64>,
}

/// Save a list of rasters to a JSON file.
pub fn save_rasters<P: AsRef<Path>>(rasters: &[Raster], path: P) -> Result<(), AnalysisError> {
    let file = File::create(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, rasters).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    writer
        .flush()
        .map_err(|e| AnalysisError::IOError(e.to_string()))
}

/// Load a list of rasters from a JSON file.
pub fn load_rasters<P: AsRef<Path>>(path: P) -> Result<Vec<Raster>, AnalysisError> {
    let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    let reader = BufReader::new(file);
    let rasters: Vec<Raster> =
        serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))?;
    for raster in rasters.iter() {
        raster.validate()?;
    }
    Ok(rasters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_build() {
        let raster = Raster::build("GrC", vec![1.0, 2.5, 3.0], vec![4, 2, 4]).unwrap();
        assert_eq!(raster.name(), "GrC");
        assert_eq!(raster.num_spikes(), 3);
        assert_eq!(raster.iter().collect::<Vec<_>>(), vec![(1.0, 4), (2.5, 2), (3.0, 4)]);

        assert!(matches!(
            Raster::build("GrC", vec![1.0, 2.0], vec![1]),
            Err(AnalysisError::InvalidRaster(_))
        ));
        assert!(matches!(
            Raster::build("GrC", vec![f64::NAN], vec![1]),
            Err(AnalysisError::InvalidRaster(_))
        ));
        assert!(Raster::new_empty("PC").is_empty());
    }

    #[test]
    fn test_local_events() {
        let raster = Raster::build("PC", vec![1.0, 2.0, 3.0], vec![10, 12, 13]).unwrap();
        let range = IdRange::build(10, 12).unwrap();
        let events: Vec<_> = raster.local_events(&range).collect();
        assert_eq!(events[0], Ok((1.0, 0)));
        assert_eq!(events[1], Ok((2.0, 2)));
        assert!(matches!(events[2], Err(AnalysisError::InvalidRaster(_))));
    }

    #[test]
    fn test_lowest_id_spike_times() {
        let raster = Raster::build("DCN", vec![1.0, 2.0, 3.0, 4.0], vec![7, 5, 6, 5]).unwrap();
        assert_eq!(raster.lowest_id_spike_times(), vec![2.0, 4.0]);
        assert!(Raster::new_empty("DCN").lowest_id_spike_times().is_empty());
    }

    #[test]
    fn test_rasters_file() {
        let rasters = vec![
            Raster::build("GrC", vec![1.0, 2.0], vec![1, 2]).unwrap(),
            Raster::new_empty("GoC"),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rasters.json");
        save_rasters(&rasters, &path).unwrap();
        assert_eq!(load_rasters(&path).unwrap(), rasters);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("compartment_name"));
        assert!(content.contains("neurons_idx"));

        std::fs::write(
            &path,
            r#"[{"compartment_name": "GrC", "times": [1.0], "neurons_idx": []}]"#,
        )
        .unwrap();
        assert!(matches!(
            load_rasters(&path),
            Err(AnalysisError::InvalidRaster(_))
        ));
        assert!(matches!(
            load_rasters(dir.path().join("missing.json")),
            Err(AnalysisError::IOError(_))
        ));
    }
}
