use std::path::{Path, PathBuf};

use crate::error::StatsError;

/// One backup profile, named after its subdirectory of the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub dir: PathBuf,
}

/// Lists the immediate subdirectories of `root` as profiles, sorted by
/// name. Non-directory entries are skipped. An unreadable root fails the
/// whole refresh round.
pub async fn discover_profiles(root: &Path) -> Result<Vec<Profile>, StatsError> {
    let discovery_err = |source| StatsError::Discovery {
        root: root.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(root).await.map_err(discovery_err)?;

    let mut profiles = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(discovery_err)? {
        let is_dir = entry.file_type().await.map_or(false, |t| t.is_dir());
        if !is_dir {
            continue;
        }

        profiles.push(Profile {
            name: entry.file_name().to_string_lossy().to_string(),
            dir: entry.path(),
        });
    }

    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(profiles)
}
