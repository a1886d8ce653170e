use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use futures_util::future::join;
use thiserror::Error;
use watch_core::{
    apply_resolved_episodes, observed_items, plan_cycle, urls_needing_episode, Anomaly,
    CatalogEntry, CycleChanges, CycleSnapshot, Episode, EpisodeTransition, Item,
};

use crate::catalog::{CatalogStore, UpsertSummary};
use crate::dispatch::Dispatcher;
use crate::fetch::CatalogSource;
use crate::notification_log::{
    NotificationLog, NotificationLogEntry, DEDUP_LOOKBACK, PENDING_TIMEOUT,
};
use crate::persist::PersistError;
use crate::seen::SeenPointerStore;

/// Leading items whose episode is looked up during a backfill.
pub const BACKFILL_EPISODE_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Listing ordered by most recent update.
    pub updates_url: String,
    /// Listing ordered by most recently added title.
    pub latest_url: String,
    pub dedup_lookback: Duration,
    pub pending_timeout: Duration,
    pub backfill_episode_limit: usize,
}

impl CheckerConfig {
    pub fn new(updates_url: impl Into<String>, latest_url: impl Into<String>) -> Self {
        Self {
            updates_url: updates_url.into(),
            latest_url: latest_url.into(),
            dedup_lookback: DEDUP_LOOKBACK,
            pending_timeout: PENDING_TIMEOUT,
            backfill_episode_limit: BACKFILL_EPISODE_LIMIT,
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("both listings came back empty")]
    NoListings,
    #[error("catalog unavailable: {0}")]
    Catalog(#[source] PersistError),
    #[error("seen pointer not saved: {0}")]
    SeenPointer(#[source] PersistError),
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub changes: CycleChanges,
    pub catalog: UpsertSummary,
    pub position_changed: bool,
    pub anomalies: usize,
    /// Pending notifications that timed out during this cycle.
    pub retry_flagged: Vec<NotificationLogEntry>,
    pub seen_saved: bool,
    /// The dispatcher accepted this cycle's changes.
    pub delivered: bool,
}

#[derive(Debug, Clone)]
pub struct BackfillReport {
    pub items: usize,
    pub catalog: UpsertSummary,
    pub pointer: Item,
}

/// Stores the checker reads and writes.
#[derive(Clone)]
pub struct CheckerStores {
    pub catalog: CatalogStore,
    pub seen: SeenPointerStore,
    pub log: NotificationLog,
}

/// Runs detection cycles against the two listing views.
pub struct Checker {
    config: CheckerConfig,
    source: Arc<dyn CatalogSource>,
    stores: CheckerStores,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Checker {
    pub fn new(
        config: CheckerConfig,
        source: Arc<dyn CatalogSource>,
        stores: CheckerStores,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            config,
            source,
            stores,
            dispatcher,
        }
    }

    pub fn stores(&self) -> &CheckerStores {
        &self.stores
    }

    /// One detection cycle: fetch, diff, dedup, persist, dispatch, reconcile.
    ///
    /// Nothing is written when both listings are empty or the catalog cannot
    /// be read. If the catalog cannot be updated the detected changes are not
    /// dispatched; their pending log entries are later flagged by
    /// reconciliation. The seen pointer is saved last.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let (mut recent, mut latest) = self.fetch_views().await;
        if recent.is_empty() && latest.is_empty() {
            engine_warn!("No items fetched from either listing, skipping cycle");
            return Err(CycleError::NoListings);
        }

        let catalog = self.stores.catalog.load_map().map_err(CycleError::Catalog)?;
        let seen = self.stores.seen.load();

        self.resolve_missing_episodes(&mut recent, &mut latest, &catalog)
            .await;

        let plan = plan_cycle(&CycleSnapshot {
            recent: &recent,
            latest: &latest,
            catalog: &catalog,
            seen: seen.as_ref(),
        });

        if let Some(change) = &plan.position_change {
            engine_info!(
                "Position change: {} ({}) now tops the updates listing, was {}",
                change.current_title,
                change.current_id,
                change.previous_id
            );
        }
        for anomaly in &plan.anomalies {
            log_anomaly(anomaly);
        }

        let mut changes = CycleChanges::default();
        for candidate in plan.candidates {
            if matches!(candidate.event.episode, Episode::Label(_))
                || matches!(candidate.event.prev_episode, Episode::Label(_))
            {
                engine_debug!(
                    "Non-numeric episode move for {} ({} -> {}) compared as text",
                    candidate.event.title,
                    candidate.event.prev_episode,
                    candidate.event.episode
                );
            }
            match self
                .stores
                .log
                .is_duplicate(&candidate.event, self.config.dedup_lookback)
            {
                Ok(true) => {}
                Ok(false) => changes.push(candidate.bucket, candidate.event),
                Err(err) => engine_error!(
                    "Dropping change for {}: notification log not writable: {}",
                    candidate.event.title,
                    err
                ),
            }
        }

        let observed = observed_items(&recent, &latest);
        let catalog_summary = self
            .stores
            .catalog
            .upsert(&observed)
            .map_err(CycleError::Catalog)?;

        let delivered = !changes.is_empty() && self.deliver(&changes);

        let seen_saved = match recent.first() {
            Some(top) => match self.stores.seen.save(top) {
                Ok(()) => true,
                Err(err) => {
                    engine_error!("Failed to save seen pointer: {}", err);
                    false
                }
            },
            None => false,
        };

        let retry_flagged = self
            .stores
            .log
            .reconcile(self.config.pending_timeout)
            .unwrap_or_else(|err| {
                engine_error!("Notification reconciliation failed: {}", err);
                Vec::new()
            });

        if changes.is_empty() {
            engine_info!("No new titles or episode updates detected");
        } else {
            engine_info!(
                "Detected {} episode update(s) and {} new title(s)",
                changes.updates.len(),
                changes.new_titles.len()
            );
        }

        Ok(CycleReport {
            changes,
            catalog: catalog_summary,
            position_changed: plan.position_change.is_some(),
            anomalies: plan.anomalies.len(),
            retry_flagged,
            seen_saved,
            delivered,
        })
    }

    /// Dispatch and mark as sent. Undelivered changes keep their pending log
    /// entries so reconciliation flags them.
    fn deliver(&self, changes: &CycleChanges) -> bool {
        if let Err(err) = self.dispatcher.dispatch(changes) {
            engine_error!(
                "Dispatch of {} change(s) failed, leaving them pending: {}",
                changes.len(),
                err
            );
            return false;
        }
        for event in changes.iter() {
            if let Err(err) = self.stores.log.mark_sent(event) {
                engine_error!(
                    "Could not mark {} as sent: {}",
                    event.notification_id(),
                    err
                );
            }
        }
        true
    }

    /// Seed the catalog and seen pointer without emitting any change.
    ///
    /// Episodes are looked up for the pointer item and for up to
    /// `backfill_episode_limit` leading items lacking an inline marker.
    pub async fn backfill(&self) -> Result<BackfillReport, CycleError> {
        engine_info!("Backfill: seeding catalog and seen pointer");
        let (recent, latest) = self.fetch_views().await;
        let mut observed = observed_items(&recent, &latest);
        let Some(first) = observed.first() else {
            engine_warn!("Backfill found no items in either listing");
            return Err(CycleError::NoListings);
        };

        let pointer_url = first.url.clone();
        let mut urls: Vec<String> = observed
            .iter()
            .take(self.config.backfill_episode_limit)
            .filter(|item| item.episode.is_absent())
            .map(|item| item.url.clone())
            .collect();
        if first.episode.is_absent() && !urls.contains(&pointer_url) {
            urls.insert(0, pointer_url);
        }
        let resolved = self.resolve_episodes(urls).await;
        apply_resolved_episodes(&mut observed, &resolved);

        let catalog = self
            .stores
            .catalog
            .upsert(&observed)
            .map_err(CycleError::Catalog)?;
        let pointer = observed[0].clone();
        self.stores
            .seen
            .save(&pointer)
            .map_err(CycleError::SeenPointer)?;

        engine_info!(
            "Backfill stored {} items; pointer is {} (episode {})",
            observed.len(),
            pointer.title,
            pointer.episode
        );
        Ok(BackfillReport {
            items: observed.len(),
            catalog,
            pointer,
        })
    }

    async fn fetch_views(&self) -> (Vec<Item>, Vec<Item>) {
        join(
            self.fetch_view(&self.config.updates_url),
            self.fetch_view(&self.config.latest_url),
        )
        .await
    }

    async fn fetch_view(&self, url: &str) -> Vec<Item> {
        match self.source.fetch_listing(url).await {
            Ok(items) => items,
            Err(err) => {
                engine_warn!("Listing {} unavailable this cycle: {}", url, err);
                Vec::new()
            }
        }
    }

    async fn resolve_missing_episodes(
        &self,
        recent: &mut [Item],
        latest: &mut [Item],
        catalog: &HashMap<String, CatalogEntry>,
    ) {
        let urls = urls_needing_episode(recent, latest, catalog);
        if urls.is_empty() {
            return;
        }
        let resolved = self.resolve_episodes(urls).await;
        apply_resolved_episodes(recent, &resolved);
        apply_resolved_episodes(latest, &resolved);
    }

    /// Detail lookups run one at a time to stay polite to the source.
    async fn resolve_episodes(&self, urls: Vec<String>) -> HashMap<String, Episode> {
        let mut resolved = HashMap::with_capacity(urls.len());
        for url in urls {
            let episode = match self.source.fetch_episode(&url).await {
                Ok(episode) => episode,
                Err(err) => {
                    engine_warn!("Episode lookup failed for {}: {}", url, err);
                    Episode::Absent
                }
            };
            resolved.insert(url, episode);
        }
        resolved
    }
}

fn log_anomaly(anomaly: &Anomaly) {
    match anomaly.transition {
        EpisodeTransition::Regressed => engine_warn!(
            "Episode for {} went backwards ({} -> {}), possible data error",
            anomaly.title,
            anomaly.stored,
            anomaly.observed
        ),
        EpisodeTransition::Lost => engine_warn!(
            "Lost episode information for {}, previous was {}",
            anomaly.title,
            anomaly.stored
        ),
        EpisodeTransition::BecameUnknown => engine_warn!(
            "Episode for {} turned unknown, previous was {}",
            anomaly.title,
            anomaly.stored
        ),
        other => engine_warn!("Unexpected episode move {:?} for {}", other, anomaly.url),
    }
}
