use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::WriteError;

/// `<pod>-<YYYY-MM-DDTHH:MM:SS>.log`
pub fn snapshot_file_name(pod_name: &str, taken_at: DateTime<Local>) -> String {
    format!("{pod_name}-{}.log", taken_at.format("%Y-%m-%dT%H:%M:%S"))
}

/// Writes `log` verbatim, replacing a snapshot taken in the same second.
pub async fn write_snapshot(
    dir: &Path,
    pod_name: &str,
    log: &str,
    taken_at: DateTime<Local>,
) -> Result<PathBuf, WriteError> {
    let path = dir.join(snapshot_file_name(pod_name, taken_at));
    tokio::fs::write(&path, log)
        .await
        .map_err(|source| WriteError {
            path: path.clone(),
            source,
        })?;
    info!(path = %path.display(), bytes = log.len(), "log snapshot written");
    Ok(path)
}
