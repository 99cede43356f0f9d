//! The external-collaborator capability: one invocation of the reporting
//! tool per (profile, query mode), yielding the single JSON line embedded
//! in its line-oriented output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

use crate::error::SourceError;

/// The statistical views the reporting tool can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    RestoreSize,
    RawData,
    Snapshots,
    LatestSnapshot,
}

impl QueryMode {
    fn args(self) -> &'static [&'static str] {
        match self {
            QueryMode::RestoreSize => &["stats", "--mode", "restore-size", "--json"],
            QueryMode::RawData => &["stats", "--mode", "raw-data", "--json"],
            QueryMode::Snapshots => &["snapshots", "--json"],
            QueryMode::LatestSnapshot => &["snapshots", "--latest", "1", "--json"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryMode::RestoreSize => "restore-size",
            QueryMode::RawData => "raw-data",
            QueryMode::Snapshots => "snapshots",
            QueryMode::LatestSnapshot => "latest-snapshot",
        }
    }
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Runs one query against one profile directory and returns the parsed
    /// JSON payload.
    async fn run(&self, profile_dir: &Path, mode: QueryMode) -> Result<Value, SourceError>;
}

/// Production source: spawns the configured binary with the profile
/// directory as working directory.
pub struct CommandSource {
    binary: String,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(binary: String, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    async fn invoke(&self, profile_dir: &Path, mode: QueryMode) -> Result<Value, SourceError> {
        let mut child = Command::new(&self.binary)
            .args(mode.args())
            .current_dir(profile_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not captured"))?;

        // Exactly one line is the payload; everything else is progress
        // output to be forwarded. Keep draining after the payload so the
        // child never blocks on a full pipe.
        let mut lines = BufReader::new(stdout).lines();
        let mut payload: Option<Value> = None;
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim_start();
            if payload.is_none() && (trimmed.starts_with('{') || trimmed.starts_with('[')) {
                payload = Some(serde_json::from_str(trimmed)?);
            } else if !line.is_empty() {
                info!(mode = mode.as_str(), "{line}");
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(SourceError::ExitStatus(status));
        }

        payload.ok_or(SourceError::NoJson)
    }
}

#[async_trait]
impl TelemetrySource for CommandSource {
    async fn run(&self, profile_dir: &Path, mode: QueryMode) -> Result<Value, SourceError> {
        match tokio::time::timeout(self.timeout, self.invoke(profile_dir, mode)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        }
    }
}
