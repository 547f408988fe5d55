//! Error module for the analysis library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq, Clone)]
pub enum AnalysisError {
    /// Error for invalid parameters, e.g., a non-positive window length.
    InvalidParameter(String),
    /// Error for inputs whose lengths or dimensions don't match.
    IncompatibleShapes(String),
    /// Error for a population name missing from the population ids.
    PopulationNotFound(String),
    /// Error for malformed rasters, e.g., a sender outside the population range.
    InvalidRaster(String),
    /// Error for a time window which selects no sample at all.
    EmptyWindow(String),
    /// Error reported by the simulator while handling a recording device.
    DeviceError(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            AnalysisError::IncompatibleShapes(e) => write!(f, "Incompatible shapes: {}", e),
            AnalysisError::PopulationNotFound(name) => {
                write!(f, "Population not found: {}", name)
            }
            AnalysisError::InvalidRaster(e) => write!(f, "Invalid raster: {}", e),
            AnalysisError::EmptyWindow(e) => write!(f, "Empty time window: {}", e),
            AnalysisError::DeviceError(e) => write!(f, "Recording device error: {}", e),
            AnalysisError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for AnalysisError {}
