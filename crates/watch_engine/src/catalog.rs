use std::collections::HashMap;
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use watch_core::{CatalogEntry, Item};

use crate::persist::{read_json, AtomicFileWriter, PersistError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertSummary {
    pub added: usize,
    pub updated: usize,
}

impl UpsertSummary {
    pub fn changed(&self) -> bool {
        self.added + self.updated > 0
    }
}

/// The full list of known items, keyed by URL, with the last settled episode
/// of each. Entries are appended or have their episode moved forward; nothing
/// is ever removed.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    writer: AtomicFileWriter,
}

impl CatalogStore {
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

    /// All entries in insertion order. A missing file is an empty catalog;
    /// unreadable or corrupt content is an error.
    pub fn load(&self) -> Result<Vec<CatalogEntry>, PersistError> {
        Ok(read_json::<Vec<CatalogEntry>>(self.path())?.unwrap_or_default())
    }

    pub fn load_map(&self) -> Result<HashMap<String, CatalogEntry>, PersistError> {
        Ok(self
            .load()?
            .into_iter()
            .map(|entry| (entry.url.clone(), entry))
            .collect())
    }

    /// Merge observed items into the catalog.
    ///
    /// Unknown URLs are appended. A known URL takes the observed episode only
    /// when it is present, differs and moves forward; regressions are refused.
    /// The file is rewritten only when something changed.
    pub fn upsert(&self, items: &[Item]) -> Result<UpsertSummary, PersistError> {
        let mut entries = self.load()?;
        let mut index: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.url.clone(), i))
            .collect();

        let mut summary = UpsertSummary::default();
        for item in items {
            match index.get(&item.url) {
                Some(&i) => {
                    let stored = &mut entries[i];
                    if item.episode.is_absent() || item.episode == stored.episode {
                        continue;
                    }
                    if item.episode.supersedes(&stored.episode) {
                        stored.episode = item.episode.clone();
                        summary.updated += 1;
                    } else {
                        engine_warn!(
                            "Keeping stored episode {} for {} (observed {})",
                            stored.episode,
                            stored.title,
                            item.episode
                        );
                    }
                }
                None => {
                    index.insert(item.url.clone(), entries.len());
                    entries.push(item.clone());
                    summary.added += 1;
                }
            }
        }

        if summary.changed() {
            self.writer.write_json(&entries)?;
            engine_info!(
                "Catalog {:?} updated: {} new, {} episode updates",
                self.path(),
                summary.added,
                summary.updated
            );
        }
        Ok(summary)
    }
}
