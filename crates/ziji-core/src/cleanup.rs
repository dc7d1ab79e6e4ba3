//! Daily cleanup: purge generated images and forget every conversation.
//!
//! The purge itself is a plain function so it can run without the scheduler.

use std::{path::Path, sync::Arc, time::Duration};

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{errors::Error, imaging::ImageStore, store::ConversationStore, Result};

/// Remove every regular file directly under `dir`.
///
/// Subdirectories and the directory itself are left in place. A missing
/// directory counts as already clean. Files that vanish mid-listing are
/// skipped.
pub fn purge_directory(dir: &Path) -> Result<usize> {
    let rd = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut removed = 0usize;
    for ent in rd.flatten() {
        let path = ent.path();
        if !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(removed)
}

/// Parse a `HH:MM` time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("invalid time of day {s:?}: {e}")))
}

/// Next local occurrence of `at` strictly after `now`.
pub fn next_run_after(now: DateTime<Local>, at: NaiveTime) -> Option<DateTime<Local>> {
    let mut day = now.date_naive();
    // Stepping up to two extra days covers a DST gap that swallows `at`.
    for _ in 0..3 {
        if let Some(candidate) = Local.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > now {
                return Some(candidate);
            }
        }
        day = day.checked_add_signed(ChronoDuration::days(1))?;
    }
    None
}

/// Time-of-day trigger for the daily cleanup.
#[derive(Clone)]
pub struct DailyCleanup {
    at: NaiveTime,
    images: Arc<ImageStore>,
    conversations: Arc<ConversationStore>,
}

impl DailyCleanup {
    pub fn new(
        at: NaiveTime,
        images: Arc<ImageStore>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self {
            at,
            images,
            conversations,
        }
    }

    /// Purge images and clear conversations once.
    ///
    /// Conversations are cleared even when the purge fails; the purge error
    /// is returned afterwards.
    pub async fn run_once(&self) -> Result<usize> {
        let purged = self.images.purge().await;
        self.conversations.clear_all().await;
        let removed = purged?;
        tracing::info!(removed, dir = %self.images.dir().display(), "daily cleanup done");
        Ok(removed)
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_loop(cancel).await })
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        tracing::info!(at = %self.at.format("%H:%M"), "daily cleanup scheduled");
        loop {
            let now = Local::now();
            let Some(next) = next_run_after(now, self.at) else {
                tracing::error!("daily cleanup has no next run (stopping)");
                break;
            };
            let dur = (next - now).to_std().unwrap_or(Duration::from_secs(0));

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(dur) => {
                if let Err(e) = self.run_once().await {
                  tracing::error!("daily cleanup failed: {e}");
                }
              }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;
    use crate::{domain::UserId, store::ChatModel};

    #[test]
    fn purge_removes_files_and_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.jpg"), b"c").unwrap();

        assert_eq!(purge_directory(dir.path()).unwrap(), 2);
        assert!(dir.path().is_dir());
        assert!(!dir.path().join("a.jpg").exists());
        assert!(dir.path().join("nested/c.jpg").exists());

        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().is_file())
            .collect();
        assert!(left.is_empty());
    }

    #[test]
    fn purge_of_missing_directory_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(purge_directory(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn parses_time_of_day() {
        let t = parse_time_of_day("00:00").unwrap();
        assert_eq!((t.hour(), t.minute()), (0, 0));
        assert_eq!(parse_time_of_day(" 23:15 ").unwrap().hour(), 23);
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("midnight").is_err());
    }

    #[test]
    fn next_run_is_strictly_in_the_future_and_within_a_day() {
        let at = parse_time_of_day("00:00").unwrap();
        let now = Local::now();
        let next = next_run_after(now, at).unwrap();
        assert!(next > now);
        assert!(next - now <= ChronoDuration::hours(25));
        assert_eq!((next.hour(), next.minute()), (0, 0));
    }

    #[tokio::test]
    async fn run_once_purges_images_and_clears_conversations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.jpg"), b"x").unwrap();

        let images = Arc::new(ImageStore::new(dir.path()));
        let conversations = Arc::new(ConversationStore::default());
        conversations.push_user(UserId(1), "hi").await;
        conversations.cycle_model(UserId(2)).await;

        let job = DailyCleanup::new(
            parse_time_of_day("00:00").unwrap(),
            images,
            conversations.clone(),
        );
        assert_eq!(job.run_once().await.unwrap(), 1);
        assert!(dir.path().is_dir());
        assert!(conversations.history(UserId(1)).await.is_empty());
        assert_eq!(conversations.model_of(UserId(2)).await, ChatModel::DeepSeekChat);
    }

    #[tokio::test]
    async fn failed_purge_still_clears_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("pic");
        std::fs::write(&not_a_dir, b"file, not a directory").unwrap();

        let conversations = Arc::new(ConversationStore::default());
        conversations.push_user(UserId(1), "hi").await;

        let job = DailyCleanup::new(
            parse_time_of_day("00:00").unwrap(),
            Arc::new(ImageStore::new(&not_a_dir)),
            conversations.clone(),
        );
        assert!(matches!(job.run_once().await, Err(Error::Io(_))));
        assert!(conversations.history(UserId(1)).await.is_empty());
    }
}
