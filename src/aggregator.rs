//! Per-profile aggregation pipeline: three source queries merged into one
//! enriched record, with failure isolated to the profile it occurred in.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::discover::{discover_profiles, Profile};
use crate::error::{SourceError, StatsError};
use crate::metrics::Metrics;
use crate::source::{QueryMode, TelemetrySource};
use crate::stats::{self, ProfileStats, RawTotals, RestoreTotals, SnapshotEntry};

/// Seam between the coalescing cache and whatever computes a full result.
#[async_trait]
pub trait StatsProducer: Send + Sync {
    async fn collect(&self) -> Result<Vec<ProfileStats>, StatsError>;
}

pub struct Aggregator {
    source: Box<dyn TelemetrySource>,
    data_root: PathBuf,
    reduced: bool,
    metrics: Arc<Metrics>,
}

impl Aggregator {
    pub fn new(
        source: Box<dyn TelemetrySource>,
        data_root: PathBuf,
        reduced: bool,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            data_root,
            reduced,
            metrics,
        }
    }

    async fn query(&self, profile: &Profile, mode: QueryMode) -> Result<Value, SourceError> {
        self.metrics.source_invocations.fetch_add(1, Ordering::Relaxed);
        self.source.run(&profile.dir, mode).await
    }

    async fn profile_stats(&self, profile: &Profile) -> Result<ProfileStats, SourceError> {
        if self.reduced {
            let entries: Vec<SnapshotEntry> =
                serde_json::from_value(self.query(profile, QueryMode::LatestSnapshot).await?)?;
            let summary = stats::summarize_snapshots(&entries, Utc::now());
            return Ok(stats::reduced(profile.name.clone(), summary));
        }

        let restore: RestoreTotals =
            serde_json::from_value(self.query(profile, QueryMode::RestoreSize).await?)?;
        let raw: RawTotals =
            serde_json::from_value(self.query(profile, QueryMode::RawData).await?)?;
        let entries: Vec<SnapshotEntry> =
            serde_json::from_value(self.query(profile, QueryMode::Snapshots).await?)?;

        let summary = stats::summarize_snapshots(&entries, Utc::now());
        Ok(stats::merge(profile.name.clone(), &restore, &raw, summary))
    }
}

#[async_trait]
impl StatsProducer for Aggregator {
    /// One full aggregation pass. A failing profile is logged and omitted;
    /// only an unreadable data root fails the pass itself.
    async fn collect(&self) -> Result<Vec<ProfileStats>, StatsError> {
        let profiles = discover_profiles(&self.data_root).await?;

        let mut collected = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            match self.profile_stats(profile).await {
                Ok(record) => {
                    self.metrics
                        .profiles_aggregated
                        .fetch_add(1, Ordering::Relaxed);
                    collected.push(record);
                }
                Err(err) => {
                    self.metrics.profiles_skipped.fetch_add(1, Ordering::Relaxed);
                    warn!(profile = %profile.name, %err, "skipping profile");
                }
            }
        }

        Ok(collected)
    }
}
