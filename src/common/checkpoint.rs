use std::{path::Path, thread, time::Duration};

use tracing::debug;

use super::errors::{EnvError, EnvResult};

/// Remote storage that model checkpoints are synchronised from.
pub trait DataStore {
    /// Pulls whatever the store holds into the local checkpoint directory.
    fn load_from_store(&mut self) -> EnvResult<()>;
}

/// Whether `dir` is a non-empty directory containing a `checkpoint` file.
pub fn has_checkpoint(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }

    let non_empty = std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);

    non_empty && dir.join("checkpoint").is_file()
}

/// Blocks until a checkpoint shows up in `dir`, syncing from `store`
/// before each look.
pub fn wait_for_checkpoint(
    dir: &Path,
    mut store: Option<&mut dyn DataStore>,
    retries: usize,
    interval: Duration,
) -> EnvResult<()> {
    for attempt in 0..retries {
        if let Some(store) = store.as_deref_mut() {
            store.load_from_store()?;
        }

        if has_checkpoint(dir) {
            return Ok(());
        }

        debug!(attempt, ?dir, "no checkpoint yet");
        thread::sleep(interval);
    }

    Err(EnvError::CheckpointNotFound {
        retries,
        dir: dir.to_path_buf(),
    })
}
