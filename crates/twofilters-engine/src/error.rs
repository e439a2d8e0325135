use thiserror::Error;
use twofilters_rt::NameError;

use crate::filter::FilterSetup;

/// Rejected filter model/sub-configuration requests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown {field} encoding {value}")]
    UnknownEncoding { field: &'static str, value: u32 },
    #[error("{setup:?} is not an available configuration")]
    Unsupported { setup: FilterSetup },
    #[error("filter slot {0} does not exist")]
    InvalidSlot(u32),
}

/// Malformed inbound messages. Never fatal; the audio thread logs and skips.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("unknown message action {0}")]
    UnknownAction(u32),
    #[error("{action} message carries no name")]
    MissingName { action: &'static str },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid patch state: {0}")]
    Json(#[from] serde_json::Error),
    #[error("patch version {found} is newer than supported version {supported}")]
    FutureVersion { found: u32, supported: u32 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio message queue is full")]
    QueueFull,
    #[error("unknown parameter id {0}")]
    UnknownParam(u32),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Name(#[from] NameError),
}
