//! Wire-level data model and the merge of the three raw query results into
//! one enriched per-profile record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::humanize;

/// One enriched record per profile, built once per refresh round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    pub name: String,

    // Restore-size view
    pub restore_bytes: u64,
    pub restore_human: String,
    pub restore_files: u64,

    // Raw-data view
    pub raw_bytes: u64,
    pub raw_human: String,
    pub uncompressed_bytes: u64,
    pub uncompressed_human: String,
    pub compression_ratio: f64,
    pub compression_ratio_human: String,
    pub compression_space_saving: f64,
    pub compression_space_saving_human: String,
    pub compression_progress: u64,
    pub raw_blob_count: u64,

    // Snapshot view
    pub snapshots: u64,
    pub last_snapshot: String,
    pub paths: Vec<PathSnapshot>,
}

/// Recency of the most recent snapshot referencing one source path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSnapshot {
    pub path: String,
    pub last_snapshot: String,
}

/// `stats --mode restore-size` totals as emitted by the reporting tool.
#[derive(Debug, Default, Deserialize)]
pub struct RestoreTotals {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub total_file_count: u64,
    #[serde(default)]
    pub snapshots_count: u64,
}

/// `stats --mode raw-data` totals and compression figures.
#[derive(Debug, Default, Deserialize)]
pub struct RawTotals {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub total_uncompressed_size: u64,
    #[serde(default)]
    pub compression_ratio: f64,
    #[serde(default)]
    pub compression_progress: u64,
    #[serde(default)]
    pub compression_space_saving: f64,
    #[serde(default)]
    pub total_blob_count: u64,
    #[serde(default)]
    pub snapshots_count: u64,
}

/// One element of the `snapshots` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotEntry {
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Recency strings derived from a profile's snapshot listing.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSummary {
    pub last_snapshot: String,
    pub paths: Vec<PathSnapshot>,
}

/// Reduces a snapshot listing to the overall recency plus one recency per
/// distinct path (latest snapshot that references the path wins). An empty
/// listing summarizes from the epoch.
pub fn summarize_snapshots(entries: &[SnapshotEntry], now: DateTime<Utc>) -> SnapshotSummary {
    let latest = entries
        .iter()
        .map(|e| e.time)
        .max()
        .unwrap_or(DateTime::UNIX_EPOCH);

    let mut per_path: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for entry in entries {
        for path in &entry.paths {
            per_path
                .entry(path.as_str())
                .and_modify(|t| *t = (*t).max(entry.time))
                .or_insert(entry.time);
        }
    }

    let mut paths: Vec<PathSnapshot> = per_path
        .into_iter()
        .map(|(path, time)| PathSnapshot {
            path: path.to_owned(),
            last_snapshot: humanize::human_age(time, now),
        })
        .collect();
    paths.sort_by(|a, b| a.path.cmp(&b.path));

    SnapshotSummary {
        last_snapshot: humanize::human_age(latest, now),
        paths,
    }
}

/// Merges the three raw query results into the enriched record. The
/// restore-size view supplies the canonical snapshot count.
pub fn merge(
    name: String,
    restore: &RestoreTotals,
    raw: &RawTotals,
    summary: SnapshotSummary,
) -> ProfileStats {
    ProfileStats {
        name,
        restore_bytes: restore.total_size,
        restore_human: humanize::human_bytes(restore.total_size),
        restore_files: restore.total_file_count,
        raw_bytes: raw.total_size,
        raw_human: humanize::human_bytes(raw.total_size),
        uncompressed_bytes: raw.total_uncompressed_size,
        uncompressed_human: humanize::human_bytes(raw.total_uncompressed_size),
        compression_ratio: raw.compression_ratio,
        compression_ratio_human: humanize::human_ratio(raw.compression_ratio),
        compression_space_saving: raw.compression_space_saving,
        compression_space_saving_human: humanize::human_percent(raw.compression_space_saving),
        compression_progress: raw.compression_progress,
        raw_blob_count: raw.total_blob_count,
        snapshots: restore.snapshots_count,
        last_snapshot: summary.last_snapshot,
        paths: summary.paths,
    }
}

/// Reduced-mode record: recency fields populated, everything else zero.
pub fn reduced(name: String, summary: SnapshotSummary) -> ProfileStats {
    merge(name, &RestoreTotals::default(), &RawTotals::default(), summary)
}
