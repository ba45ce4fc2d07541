use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::queue::QueueSnapshot;

/// Status file listing the pending tracks, one title line followed by one
/// duration line (milliseconds) per entry.
///
/// The contents are written to a hidden staging file next to the target and
/// renamed over it, so readers only ever see a complete file. Clones share a
/// writer lock so two writers never interleave on the staging file.
#[derive(Debug, Clone)]
pub struct QueueFile {
    path: PathBuf,
    staging: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl QueueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "queue.txt".to_string());
        let staging = path.with_file_name(format!(".{}", file_name));
        QueueFile {
            path,
            staging,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Sibling file for one key: `queue.txt` becomes `queue-<key>.txt`.
    /// Each gets its own writer lock.
    pub fn for_guild(&self, key: impl fmt::Display) -> Self {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "queue".to_string());
        let name = match self.path.extension() {
            Some(ext) => format!("{}-{}.{}", stem, key, ext.to_string_lossy()),
            None => format!("{}-{}", stem, key),
        };
        QueueFile::new(self.path.with_file_name(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(snapshot: &QueueSnapshot) -> String {
        let mut out = String::new();
        for track in snapshot {
            out.push_str(&track.title.replace('\n', " "));
            out.push('\n');
            out.push_str(&track.duration_ms.to_string());
            out.push('\n');
        }
        out
    }

    /// Writes `snapshot`. Take the snapshot first; no queue lock is held here.
    pub async fn write(&self, snapshot: &QueueSnapshot) -> io::Result<()> {
        let _writer = self.writer.lock().await;
        fs::write(&self.staging, Self::render(snapshot)).await?;
        fs::rename(&self.staging, &self.path).await?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "queue file updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TrackQueue;
    use crate::track::Track;

    #[tokio::test]
    async fn writes_titles_and_durations() {
        let dir = tempfile::tempdir().unwrap();
        let file = QueueFile::new(dir.path().join("queue.txt"));

        let queue = TrackQueue::new();
        queue.enqueue(Track::new("First", "uri", 30_000));
        queue.enqueue(Track::new("Second\nLine", "uri", 45_000));

        file.write(&queue.snapshot()).await.unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents, "First\n30000\nSecond Line\n45000\n");
        assert!(!dir.path().join(".queue.txt").exists());
    }

    #[test]
    fn guild_files_sit_next_to_the_base_path() {
        let base = QueueFile::new("/srv/bot/queue.txt");
        assert_eq!(base.for_guild(42).path(), Path::new("/srv/bot/queue-42.txt"));

        let bare = QueueFile::new("/srv/bot/status");
        assert_eq!(bare.for_guild(7).path(), Path::new("/srv/bot/status-7"));
    }

    #[tokio::test]
    async fn rewrite_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file = QueueFile::new(dir.path().join("queue.txt"));
        let queue = TrackQueue::new();
        queue.enqueue(Track::new("First", "uri", 1_000));
        file.write(&queue.snapshot()).await.unwrap();

        queue.clear();
        file.write(&queue.snapshot()).await.unwrap();

        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "");
    }
}
