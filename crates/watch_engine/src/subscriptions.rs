use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};

use crate::persist::{read_json, AtomicFileWriter, PersistError};

pub type SubscriberId = u64;

/// Persisted map of subscriber id to followed titles.
///
/// On disk the keys are strings (`{"123": ["Title A", "Title B"]}`); keys that
/// do not parse as ids are skipped with a warning.
#[derive(Debug, Clone)]
pub struct SubscriptionStore {
    writer: AtomicFileWriter,
}

type SubscriptionMap = BTreeMap<String, Vec<String>>;

impl SubscriptionStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let writer = AtomicFileWriter::new(path.into());
        writer.sweep_stale_temps();
        Self { writer }
    }

    pub fn path(&self) -> &Path {
        self.writer.target()
    }

    fn load(&self) -> SubscriptionMap {
        match read_json::<SubscriptionMap>(self.path()) {
            Ok(map) => map.unwrap_or_default(),
            Err(err) => {
                engine_warn!("Subscriptions unreadable: {}", err);
                SubscriptionMap::new()
            }
        }
    }

    /// Everyone following `title`, in ascending id order.
    pub fn subscribers(&self, title: &str) -> Vec<SubscriberId> {
        let mut ids: Vec<SubscriberId> = self
            .load()
            .into_iter()
            .filter(|(_, titles)| titles.iter().any(|t| t == title))
            .filter_map(|(key, _)| match key.parse::<SubscriberId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    engine_warn!("Skipping malformed subscriber id {:?}", key);
                    None
                }
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn titles_for(&self, subscriber: SubscriberId) -> Vec<String> {
        self.load()
            .remove(&subscriber.to_string())
            .unwrap_or_default()
    }

    /// Returns `false` if the subscription already existed.
    pub fn subscribe(&self, subscriber: SubscriberId, title: &str) -> Result<bool, PersistError> {
        let mut map = self.load();
        let titles = map.entry(subscriber.to_string()).or_default();
        if titles.iter().any(|t| t == title) {
            return Ok(false);
        }
        titles.push(title.to_string());
        self.writer.write_json(&map)?;
        engine_info!("Subscriber {} now follows {:?}", subscriber, title);
        Ok(true)
    }

    /// Returns `false` if there was nothing to remove.
    pub fn unsubscribe(&self, subscriber: SubscriberId, title: &str) -> Result<bool, PersistError> {
        let mut map = self.load();
        let Some(titles) = map.get_mut(&subscriber.to_string()) else {
            return Ok(false);
        };
        let before = titles.len();
        titles.retain(|t| t != title);
        if titles.len() == before {
            return Ok(false);
        }
        self.writer.write_json(&map)?;
        engine_info!("Subscriber {} no longer follows {:?}", subscriber, title);
        Ok(true)
    }
}
