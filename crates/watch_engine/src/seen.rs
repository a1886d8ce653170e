use std::path::{Path, PathBuf};

use engine_logging::{engine_error, engine_info, engine_warn};
use serde::Deserialize;
use watch_core::Item;

use crate::persist::{read_json, AtomicFileWriter, PersistError};

/// Shapes the seen-pointer file has had over time. Only `Current` is written.
///
/// Variant order matters: serde also accepts a struct written as a sequence,
/// so a list of three strings would otherwise parse as an `Item`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredPointer {
    /// Oldest files kept bare identifiers.
    BareIds(Vec<String>),
    /// Older files kept a list of records; the first one is the pointer.
    Records(Vec<Item>),
    Current(Item),
}

impl StoredPointer {
    fn is_legacy(&self) -> bool {
        !matches!(self, StoredPointer::Current(_))
    }

    fn into_item(self) -> Option<Item> {
        match self {
            StoredPointer::Current(item) => Some(item),
            StoredPointer::Records(items) => items.into_iter().next(),
            StoredPointer::BareIds(ids) => ids.into_iter().next().map(Item::from_legacy_id),
        }
    }
}

/// The item that topped the recent view at the end of the last cycle.
#[derive(Debug, Clone)]
pub struct SeenPointerStore {
    writer: AtomicFileWriter,
}

impl SeenPointerStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let writer = AtomicFileWriter::new(path.into());
        writer.sweep_stale_temps();
        Self { writer }
    }

    pub fn path(&self) -> &Path {
        self.writer.target()
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Load the pointer. Legacy shapes are rewritten in the current format on
    /// first load. Unreadable content is logged and treated as no pointer.
    pub fn load(&self) -> Option<Item> {
        let stored = match read_json::<StoredPointer>(self.path()) {
            Ok(stored) => stored?,
            Err(err) => {
                engine_warn!("Ignoring seen pointer: {}", err);
                return None;
            }
        };

        let legacy = stored.is_legacy();
        let item = stored.into_item()?;
        if legacy {
            match self.save(&item) {
                Ok(()) => engine_info!("Migrated legacy seen pointer {:?}", self.path()),
                Err(err) => engine_error!("Failed to migrate legacy seen pointer: {}", err),
            }
        }
        Some(item)
    }

    pub fn save(&self, item: &Item) -> Result<(), PersistError> {
        self.writer.write_json(item)
    }
}
