use std::collections::{HashMap, HashSet};

use crate::{CatalogEntry, ChangeBucket, ChangeEvent, ChangeKind, Episode, EpisodeTransition, Item};

/// Everything the diff needs for one cycle. Listing episodes must already be
/// resolved (see [`urls_needing_episode`]).
#[derive(Debug, Clone, Copy)]
pub struct CycleSnapshot<'a> {
    pub recent: &'a [Item],
    pub latest: &'a [Item],
    /// Catalog rows keyed by URL.
    pub catalog: &'a HashMap<String, CatalogEntry>,
    pub seen: Option<&'a Item>,
}

/// A change that still has to pass the notification log before it is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub bucket: ChangeBucket,
    pub event: ChangeEvent,
}

/// A suspicious episode move that is reported but never turned into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub title: String,
    pub url: String,
    pub stored: Episode,
    pub observed: Episode,
    pub transition: EpisodeTransition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionChange {
    pub previous_id: String,
    pub current_id: String,
    pub current_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CyclePlan {
    /// Top of the recent view is a different item than last cycle.
    pub position_change: Option<PositionChange>,
    /// Candidates in discovery order.
    pub candidates: Vec<Candidate>,
    pub anomalies: Vec<Anomaly>,
}

/// Compare a cycle's listings against the stored state.
///
/// Candidates are produced in the order the log must see them: the pointer
/// check first, then the recent sweep, then the new-title sweep. The same
/// change may show up twice (pointer check and recent sweep); the notification
/// log collapses those.
pub fn plan_cycle(snapshot: &CycleSnapshot<'_>) -> CyclePlan {
    let mut plan = CyclePlan::default();

    if let (Some(top), Some(seen)) = (snapshot.recent.first(), snapshot.seen) {
        if top.id != seen.id {
            plan.position_change = Some(PositionChange {
                previous_id: seen.id.clone(),
                current_id: top.id.clone(),
                current_title: top.title.clone(),
            });
        } else if seen.episode.is_present() && top.episode.is_present() {
            let transition = top.episode.transition_from(&seen.episode);
            // The pointer may hold a glitched value; only a move past the
            // settled catalog episode counts.
            let settled_forward = snapshot
                .catalog
                .get(&top.url)
                .map_or(true, |stored| top.episode.supersedes(&stored.episode));
            if transition.is_forward() && settled_forward {
                plan.candidates.push(Candidate {
                    bucket: ChangeBucket::Updates,
                    event: ChangeEvent::new(top, seen.episode.clone(), ChangeKind::EpisodeAdvanced),
                });
            }
        }
    }

    let latest_urls: HashSet<&str> = snapshot.latest.iter().map(|i| i.url.as_str()).collect();

    for item in snapshot.recent {
        let Some(stored) = snapshot.catalog.get(&item.url) else {
            // Brand-new titles listed in both views are reported once, by the latest sweep.
            if !latest_urls.contains(item.url.as_str()) {
                plan.candidates.push(Candidate {
                    bucket: ChangeBucket::Updates,
                    event: ChangeEvent::new(item, Episode::Absent, ChangeKind::NewItem),
                });
            }
            continue;
        };

        let transition = item.episode.transition_from(&stored.episode);
        match transition {
            EpisodeTransition::Unchanged => {}
            EpisodeTransition::Appeared => plan.candidates.push(Candidate {
                bucket: ChangeBucket::Updates,
                event: ChangeEvent::new(item, Episode::Absent, ChangeKind::EpisodeAppeared),
            }),
            EpisodeTransition::Advanced | EpisodeTransition::Relabeled => {
                plan.candidates.push(Candidate {
                    bucket: ChangeBucket::Updates,
                    event: ChangeEvent::new(
                        item,
                        stored.episode.clone(),
                        ChangeKind::EpisodeAdvanced,
                    ),
                })
            }
            EpisodeTransition::Regressed
            | EpisodeTransition::Lost
            | EpisodeTransition::BecameUnknown => plan.anomalies.push(Anomaly {
                title: item.title.clone(),
                url: item.url.clone(),
                stored: stored.episode.clone(),
                observed: item.episode.clone(),
                transition,
            }),
        }
    }

    for item in snapshot.latest {
        if !snapshot.catalog.contains_key(&item.url) {
            plan.candidates.push(Candidate {
                bucket: ChangeBucket::NewTitles,
                event: ChangeEvent::new(item, Episode::Absent, ChangeKind::NewItem),
            });
        }
    }

    plan
}

/// URLs whose episode must come from a detail page before planning: recent
/// items without an inline marker and brand-new latest items without one.
/// Each URL is listed once.
pub fn urls_needing_episode(
    recent: &[Item],
    latest: &[Item],
    catalog: &HashMap<String, CatalogEntry>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    recent
        .iter()
        .chain(latest.iter().filter(|i| !catalog.contains_key(&i.url)))
        .filter(|item| item.episode.is_absent())
        .filter(|item| seen.insert(item.url.as_str()))
        .map(|item| item.url.clone())
        .collect()
}

/// Apply resolved episodes to every listed item that still lacks one.
pub fn apply_resolved_episodes(items: &mut [Item], resolved: &HashMap<String, Episode>) {
    for item in items.iter_mut().filter(|i| i.episode.is_absent()) {
        if let Some(episode) = resolved.get(&item.url) {
            item.episode = episode.clone();
        }
    }
}

/// Items observed this cycle: all of `recent`, plus `latest` entries whose URL
/// is not already in `recent`. Slugs may collide across URLs, so ids are not
/// used here.
pub fn observed_items(recent: &[Item], latest: &[Item]) -> Vec<Item> {
    let recent_urls: HashSet<&str> = recent.iter().map(|i| i.url.as_str()).collect();
    recent
        .iter()
        .chain(latest.iter().filter(|i| !recent_urls.contains(i.url.as_str())))
        .cloned()
        .collect()
}
