use serde::{Deserialize, Serialize};

use crate::{Episode, Item};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// URL never seen before.
    NewItem,
    /// Known item that had no episode info and now has one.
    EpisodeAppeared,
    /// Known item moved to a later episode.
    EpisodeAdvanced,
}

/// Which result list a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeBucket {
    Updates,
    NewTitles,
}

/// One detected change, handed to the delivery side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub title: String,
    pub url: String,
    pub episode: Episode,
    pub prev_episode: Episode,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(item: &Item, prev_episode: Episode, kind: ChangeKind) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            episode: item.episode.clone(),
            prev_episode,
            kind,
        }
    }

    pub fn notification_id(&self) -> String {
        notification_id(&self.id, &self.episode, &self.prev_episode)
    }
}

/// Composite dedup key: `"{id}:{episode}"`, or `"{id}:{prev}->{episode}"` when a
/// transition between two different known values is involved.
pub fn notification_id(item_id: &str, episode: &Episode, prev_episode: &Episode) -> String {
    if prev_episode.is_present() && prev_episode != episode {
        format!("{item_id}:{prev_episode}->{episode}")
    } else {
        format!("{item_id}:{episode}")
    }
}

/// Result of one cycle as seen by the delivery side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleChanges {
    pub updates: Vec<ChangeEvent>,
    pub new_titles: Vec<ChangeEvent>,
}

impl CycleChanges {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.new_titles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len() + self.new_titles.len()
    }

    pub fn push(&mut self, bucket: ChangeBucket, event: ChangeEvent) {
        match bucket {
            ChangeBucket::Updates => self.updates.push(event),
            ChangeBucket::NewTitles => self.new_titles.push(event),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.updates.iter().chain(self.new_titles.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::notification_id;
    use crate::Episode;

    #[test]
    fn distinct_transitions_get_distinct_ids() {
        let first = notification_id("a", &Episode::Number(6), &Episode::Number(5));
        let second = notification_id("a", &Episode::Number(7), &Episode::Number(6));
        assert_eq!(first, "a:5->6");
        assert_eq!(second, "a:6->7");
    }

    #[test]
    fn missing_or_equal_prev_collapses_to_plain_id() {
        assert_eq!(notification_id("a", &Episode::Number(3), &Episode::Absent), "a:3");
        assert_eq!(notification_id("a", &Episode::Number(3), &Episode::Number(3)), "a:3");
        assert_eq!(
            notification_id("a", &Episode::Number(1), &Episode::Unknown),
            "a:unknown->1"
        );
        assert_eq!(notification_id("a", &Episode::Absent, &Episode::Absent), "a:none");
    }
}
