//! Chapter watch engine: fetching, persisted state and the detection cycle.
mod catalog;
mod checker;
mod decode;
mod dispatch;
mod fetch;
mod listing;
mod notification_log;
mod persist;
mod seen;
mod subscriptions;
mod types;

pub use catalog::{CatalogStore, UpsertSummary};
pub use checker::{
    BackfillReport, Checker, CheckerConfig, CheckerStores, CycleError, CycleReport,
    BACKFILL_EPISODE_LIMIT,
};
pub use dispatch::{ChannelDispatcher, DispatchError, Dispatcher};
pub use fetch::{CatalogSource, FetchSettings, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use listing::{parse_detail_episode, parse_listing};
pub use notification_log::{
    NotificationLog, NotificationLogEntry, NotificationStatus, DEDUP_LOOKBACK, PENDING_TIMEOUT,
    RETENTION,
};
pub use persist::{ensure_state_dir, read_json, AtomicFileWriter, PersistError};
pub use seen::SeenPointerStore;
pub use subscriptions::{SubscriberId, SubscriptionStore};
pub use types::{system_clock, Clock, FailureKind, FetchError};
