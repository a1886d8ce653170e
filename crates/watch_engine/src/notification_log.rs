use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use watch_core::{ChangeEvent, Episode};

use crate::persist::{read_json, AtomicFileWriter, PersistError};
use crate::types::Clock;

/// How far back an identical notification id counts as a duplicate.
pub const DEDUP_LOOKBACK: Duration = Duration::from_secs(60 * 60);
/// Entries older than this are dropped on every write.
pub const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
/// A pending entry older than this is flagged for retry.
pub const PENDING_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    RetryNeeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    /// Composite dedup key, see [`watch_core::notification_id`].
    pub id: String,
    #[serde(rename = "manga_id")]
    pub item_id: String,
    pub title: String,
    #[serde(default)]
    pub episode: Episode,
    #[serde(default)]
    pub prev_episode: Episode,
    /// Epoch seconds at detection.
    pub timestamp: f64,
    pub status: NotificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_timestamp: Option<f64>,
}

/// Rolling log of notification attempts, used for dedup and for spotting
/// notifications that were detected but never confirmed as delivered.
///
/// Every operation reads the file, mutates and writes it back atomically, so
/// the on-disk log is the only state.
#[derive(Clone)]
pub struct NotificationLog {
    writer: AtomicFileWriter,
    clock: Clock,
}

impl NotificationLog {
    pub fn open(path: impl Into<PathBuf>, clock: Clock) -> Self {
        let writer = AtomicFileWriter::new(path.into());
        writer.sweep_stale_temps();
        Self { writer, clock }
    }

    pub fn path(&self) -> &Path {
        self.writer.target()
    }

    /// Current window of entries. A corrupt log is reported and read as empty.
    pub fn entries(&self) -> Vec<NotificationLogEntry> {
        match read_json::<Vec<NotificationLogEntry>>(self.path()) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(err) => {
                engine_warn!("Notification log unreadable, starting fresh: {}", err);
                Vec::new()
            }
        }
    }

    /// Entries flagged by [`NotificationLog::reconcile`] and not yet pruned.
    pub fn retry_needed(&self) -> Vec<NotificationLogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.status == NotificationStatus::RetryNeeded)
            .collect()
    }

    /// Returns `true` if the candidate's notification id was already logged
    /// within `lookback`. Otherwise records a pending entry and returns `false`.
    ///
    /// Call exactly once per candidate: a `false` result has the side effect of
    /// claiming the id. If the claim cannot be written the error is returned and
    /// the candidate must not be emitted.
    pub fn is_duplicate(
        &self,
        candidate: &ChangeEvent,
        lookback: Duration,
    ) -> Result<bool, PersistError> {
        let id = candidate.notification_id();
        let now = (self.clock)();
        let mut entries = self.entries();

        if entries
            .iter()
            .any(|e| e.id == id && now - e.timestamp < lookback.as_secs_f64())
        {
            engine_debug!("Duplicate notification {} for {}", id, candidate.title);
            return Ok(true);
        }

        entries.push(NotificationLogEntry {
            id,
            item_id: candidate.id.clone(),
            title: candidate.title.clone(),
            episode: candidate.episode.clone(),
            prev_episode: candidate.prev_episode.clone(),
            timestamp: now,
            status: NotificationStatus::Pending,
            sent_timestamp: None,
            retry_timestamp: None,
        });
        self.save(entries, now)?;
        Ok(false)
    }

    /// Mark the latest pending entry for this event as sent. Returns whether an
    /// entry was found; nothing is written otherwise.
    pub fn mark_sent(&self, event: &ChangeEvent) -> Result<bool, PersistError> {
        let id = event.notification_id();
        let now = (self.clock)();
        let mut entries = self.entries();

        let Some(entry) = entries
            .iter_mut()
            .rev()
            .find(|e| e.id == id && e.status == NotificationStatus::Pending)
        else {
            engine_debug!("No pending notification {} to mark as sent", id);
            return Ok(false);
        };
        entry.status = NotificationStatus::Sent;
        entry.sent_timestamp = Some(now);

        self.save(entries, now)?;
        Ok(true)
    }

    /// Flag pending entries older than `timeout` as needing a retry and return
    /// them. Delivery itself is left to whoever consumes the flag.
    pub fn reconcile(&self, timeout: Duration) -> Result<Vec<NotificationLogEntry>, PersistError> {
        let now = (self.clock)();
        let mut entries = self.entries();

        let mut flagged = Vec::new();
        for entry in entries.iter_mut().filter(|e| {
            e.status == NotificationStatus::Pending && now - e.timestamp > timeout.as_secs_f64()
        }) {
            entry.status = NotificationStatus::RetryNeeded;
            entry.retry_timestamp = Some(now);
            engine_warn!(
                "Notification {} for {} was never confirmed, marking for retry",
                entry.id,
                entry.title
            );
            flagged.push(entry.clone());
        }

        if !flagged.is_empty() {
            self.save(entries, now)?;
            engine_info!("{} notification(s) marked for retry", flagged.len());
        }
        Ok(flagged)
    }

    fn save(&self, mut entries: Vec<NotificationLogEntry>, now: f64) -> Result<(), PersistError> {
        let retention = RETENTION.as_secs_f64();
        entries.retain(|e| now - e.timestamp < retention);
        self.writer.write_json(&entries)
    }
}
