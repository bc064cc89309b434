//! Scheduled store backup.
//!
//! A background task dumps the whole database to a timestamped file once a
//! day. Best effort: failures are logged and the next tick tries again; the
//! task never touches conversation handling.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::CatalogStore;

pub const BACKUP_INTERVAL: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("backup dump: {0}")]
    Db(#[from] sqlx::Error),
}

/// Dump the store to `dir/backup_YYYYmmdd_HHMM.db`, creating `dir` if needed.
pub async fn run_backup(store: &CatalogStore, dir: &Path) -> Result<PathBuf, BackupError> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!("backup_{}.db", Utc::now().format("%Y%m%d_%H%M"));
    let path = dir.join(name);
    store.backup_to(&path).await?;
    info!(path = %path.display(), "store backup written");
    Ok(path)
}

/// Spawn the daily backup loop. The first dump happens one interval from now.
pub fn spawn(store: Arc<CatalogStore>, dir: PathBuf) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(BACKUP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately on the first tick; skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = run_backup(&store, &dir).await {
                error!(error = %e, "scheduled backup failed");
            }
        }
    })
}
