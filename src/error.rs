use std::path::PathBuf;

use thiserror::Error;

/// Why a vehicle could not be spawned. The previous vehicle (if any) stays
/// active when this is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("vehicle template has no part named `{name}`")]
    MissingPart { name: String },

    #[error("vehicle template declares part `{name}` more than once")]
    DuplicatePart { name: String },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read vehicle template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid vehicle template {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("accelerometer is not available on this device")]
    Unavailable,

    #[error("accelerometer update failed: {0}")]
    Callback(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    #[error("malformed client message: {0}")]
    Message(#[from] serde_json::Error),
}
