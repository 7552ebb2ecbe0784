use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::error::{HubError, Result};

use super::now_millis;

/// Move `live_dir` into `quarantine_dir` as `<identifier>.<millis>`.
///
/// The quarantine directory is created when missing. Names already taken
/// (two removals within the same millisecond) get a `-<n>` suffix.
pub async fn quarantine(live_dir: &Path, quarantine_dir: &Path, identifier: &str) -> Result<PathBuf> {
    fs::create_dir_all(quarantine_dir)
        .await
        .map_err(|e| HubError::io("create quarantine", quarantine_dir, e))?;

    let stem = format!("{}.{}", identifier, now_millis());
    let mut destination = quarantine_dir.join(&stem);
    let mut attempt = 0;
    while fs::try_exists(&destination)
        .await
        .map_err(|e| HubError::io("inspect", &destination, e))?
    {
        attempt += 1;
        destination = quarantine_dir.join(format!("{}-{}", stem, attempt));
    }

    fs::rename(live_dir, &destination)
        .await
        .map_err(|e| HubError::io("quarantine", live_dir, e))?;

    info!(
        "moved {} to {}",
        live_dir.display(),
        destination.display()
    );
    Ok(destination)
}
