//! Background retention sweep for archived files.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::sync::mpsc;
use tracing::debug;

/// The extension of a file name: the suffix beginning at the final dot, or
/// the empty string when the name has none.
pub(crate) fn name_ext(name: &str) -> &str {
    name.rfind('.').map_or("", |idx| &name[idx..])
}

/// Deletes expired archives from the target's directory.
///
/// One sweeper task runs per rotating file. It wakes on a coalesced signal
/// (the rotating file sends one on every open and rotation), never takes the
/// writer lock, and treats every failure as best-effort: a delete that fails
/// is simply retried on the next triggered sweep.
pub(crate) struct Sweeper {
    dir: PathBuf,
    live_name: String,
    extension: String,
    max_age_secs: u64,
}

impl Sweeper {
    /// Spawns the sweeper task and returns its signal sender. The channel
    /// holds a single slot so bursts of rotations coalesce into at most one
    /// pending sweep; dropping the sender terminates the task.
    pub(crate) fn spawn(
        dir: PathBuf,
        live_name: String,
        extension: String,
        max_age_secs: u64,
    ) -> mpsc::Sender<()> {
        let (signal_tx, signal_rx) = mpsc::channel(1);
        let sweeper = Self {
            dir,
            live_name,
            extension,
            max_age_secs,
        };
        tokio::spawn(sweeper.run(signal_rx));
        signal_tx
    }

    async fn run(self, mut signal: mpsc::Receiver<()>) {
        if self.max_age_secs == 0 {
            // Retention disabled. Returning drops the receiver, so every
            // later signal becomes a silent no-op on the sender side.
            return;
        }

        while signal.recv().await.is_some() {
            self.sweep().await;
        }
    }

    /// One best-effort pass over the directory. Deletes regular files whose
    /// extension matches the target's, whose name is not the live target's,
    /// and whose modification time is older than the retention window.
    async fn sweep(&self) {
        let Some(cutoff) = SystemTime::now().checked_sub(Duration::from_secs(self.max_age_secs))
        else {
            return;
        };
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name == self.live_name || name_ext(name) != self.extension {
                continue;
            }

            if metadata.modified().is_ok_and(|modified| modified < cutoff) {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    debug!("failed to remove expired archive {}: {}", name, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_ext_takes_the_final_dot() {
        assert_eq!(name_ext("test.log"), ".log");
        assert_eq!(name_ext("archive.2024.log"), ".log");
        assert_eq!(name_ext("noext"), "");
        assert_eq!(name_ext(".hidden"), ".hidden");
    }
}
