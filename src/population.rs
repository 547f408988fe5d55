//! Population identifiers, i.e., the global neuron id range of every population.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AnalysisError;

/// An inclusive range of global neuron ids, as assigned by the simulator.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct IdRange {
    pub first: usize,
    pub last: usize,
}

impl IdRange {
    /// Create a new id range. Returns an error if the range is empty.
    pub fn build(first: usize, last: usize) -> Result<Self, AnalysisError> {
        if last < first {
            return Err(AnalysisError::InvalidParameter(format!(
                "The id range [{}, {}] is empty.",
                first, last
            )));
        }
        Ok(IdRange { first, last })
    }

    /// The number of neurons in the range.
    pub fn size(&self) -> usize {
        self.last - self.first + 1
    }

    /// Returns the local index of the neuron with the given global id, if it belongs to the range.
    pub fn local_index(&self, global_id: usize) -> Option<usize> {
        if global_id < self.first || global_id > self.last {
            None
        } else {
            Some(global_id - self.first)
        }
    }
}

/// Mapping from population names to their global id range.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopulationIds {
    ranges: BTreeMap<String, IdRange>,
}

impl PopulationIds {
    pub fn new() -> Self {
        PopulationIds {
            ranges: BTreeMap::new(),
        }
    }

    /// Register (or replace) the id range of a population.
    pub fn insert(&mut self, name: &str, first: usize, last: usize) -> Result<(), AnalysisError> {
        let range = IdRange::build(first, last)?;
        self.ranges.insert(name.to_string(), range);
        Ok(())
    }

    /// Returns the id range of the population, or an error if it is unknown.
    pub fn range(&self, name: &str) -> Result<IdRange, AnalysisError> {
        self.ranges
            .get(name)
            .copied()
            .ok_or_else(|| AnalysisError::PopulationNotFound(name.to_string()))
    }

    /// Returns the number of neurons in the population.
    pub fn size(&self, name: &str) -> Result<usize, AnalysisError> {
        Ok(self.range(name)?.size())
    }

    /// Returns the sizes of the listed populations, in the same order.
    pub fn sizes<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, AnalysisError> {
        names.iter().map(|name| self.size(name.as_ref())).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ranges.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IdRange)> {
        self.ranges.iter()
    }

    /// Load population ids from a JSON file of the form `{"name": {"first": 1, "last": 10}, ...}`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let ids: PopulationIds =
            serde_json::from_reader(reader).map_err(|e| AnalysisError::IOError(e.to_string()))?;
        if let Some((name, range)) = ids.iter().find(|(_, range)| range.last < range.first) {
            return Err(AnalysisError::InvalidParameter(format!(
                "The id range [{}, {}] of population {} is empty.",
                range.first, range.last, name
            )));
        }
        Ok(ids)
    }
}

/// Returns the size of every population, each given as its list of neuron ids.
pub fn population_sizes(populations: &[Vec<usize>]) -> Vec<usize> {
    populations.iter().map(|population| population.len()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_range() {
        let range = IdRange::build(11, 20).unwrap();
        assert_eq!(range.size(), 10);
        assert_eq!(range.local_index(11), Some(0));
        assert_eq!(range.local_index(20), Some(9));
        assert_eq!(range.local_index(10), None);
        assert_eq!(range.local_index(21), None);

        assert!(matches!(
            IdRange::build(5, 4),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert_eq!(IdRange::build(4, 4).unwrap().size(), 1);
    }

    #[test]
    fn test_population_ids() {
        let mut ids = PopulationIds::new();
        ids.insert("FSN", 1, 10).unwrap();
        ids.insert("MSND1", 11, 110).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(ids.size("FSN").unwrap(), 10);
        assert_eq!(ids.sizes(&["MSND1", "FSN"]).unwrap(), vec![100, 10]);
        assert_eq!(
            ids.size("GPeTA"),
            Err(AnalysisError::PopulationNotFound("GPeTA".to_string()))
        );
    }

    #[test]
    fn test_population_ids_json() {
        let ids: PopulationIds =
            serde_json::from_str(r#"{"STN": {"first": 3, "last": 7}}"#).unwrap();
        assert_eq!(ids.range("STN").unwrap(), IdRange { first: 3, last: 7 });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, r#"{"STN": {"first": 9, "last": 7}}"#).unwrap();
        assert!(matches!(
            PopulationIds::load_from(&path),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_population_sizes() {
        let populations = vec![vec![1, 2, 3], vec![], vec![4]];
        assert_eq!(population_sizes(&populations), vec![3, 0, 1]);
    }
}
