//! Chapter watch core: catalog types and the pure per-cycle diff.
mod change;
mod episode;
mod item;
mod plan;

pub use change::{notification_id, ChangeBucket, ChangeEvent, ChangeKind, CycleChanges};
pub use episode::{Episode, EpisodeTransition, UNKNOWN_MARKER};
pub use item::{slug_from_url, CatalogEntry, Item};
pub use plan::{
    apply_resolved_episodes, observed_items, plan_cycle, urls_needing_episode, Anomaly, Candidate,
    CyclePlan, CycleSnapshot, PositionChange,
};
