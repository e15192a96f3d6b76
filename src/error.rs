use thiserror::Error;

use crate::observation::ObservationId;

/// Errors from operations on a loaded survey
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown observation: {0}")]
    UnknownObservation(ObservationId),

    #[error("Invalid ray length: {0} km (must be a positive number)")]
    InvalidRayLength(f64),

    #[error("Invalid timestamp format: {0}")]
    InvalidDatetimeFormat(String),
}

#[derive(Error, Debug)]
pub enum RadiotrackError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Header structure error: {}", .0.join("; "))]
    InvalidHeader(Vec<String>),

    #[error("Unable to load the file: empty file")]
    EmptyFile,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),
}
