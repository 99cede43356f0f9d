//! Error types for the aggregation pipeline.
//!
//! `SourceError` covers one external invocation and is recoverable per
//! profile; `StatsError` covers a whole refresh round. `color-eyre` handles
//! errors at the binary boundary in `main`.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single external-tool invocation.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("reporting tool I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("reporting tool exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("no JSON line in reporting tool output")]
    NoJson,

    #[error("JSON decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("reporting tool timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failure of a refresh round.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("listing profiles under {root}: {source}")]
    Discovery {
        root: PathBuf,
        source: std::io::Error,
    },

    #[error("refresh round aborted: {0}")]
    RoundAborted(String),
}
