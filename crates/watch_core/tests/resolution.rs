use std::collections::HashMap;

use pretty_assertions::assert_eq;
use watch_core::{apply_resolved_episodes, observed_items, urls_needing_episode, Episode, Item};

fn item(id: &str, episode: Episode) -> Item {
    Item::new(id, id, format!("/{id}/"), episode)
}

#[test]
fn only_missing_episodes_are_fetched_once_each() {
    let recent = vec![item("a", Episode::Absent), item("b", Episode::Number(2))];
    let latest = vec![
        item("a", Episode::Absent),
        item("c", Episode::Absent),
        item("known", Episode::Absent),
    ];
    let catalog: HashMap<String, Item> = [item("known", Episode::Number(1))]
        .into_iter()
        .map(|i| (i.url.clone(), i))
        .collect();

    let urls = urls_needing_episode(&recent, &latest, &catalog);
    assert_eq!(urls, vec!["/a/".to_string(), "/c/".to_string()]);
}

#[test]
fn resolved_episodes_fill_gaps_only() {
    let mut items = vec![item("a", Episode::Absent), item("b", Episode::Number(2))];
    let resolved: HashMap<String, Episode> = [
        ("/a/".to_string(), Episode::Unknown),
        ("/b/".to_string(), Episode::Number(99)),
    ]
    .into_iter()
    .collect();

    apply_resolved_episodes(&mut items, &resolved);

    assert_eq!(items[0].episode, Episode::Unknown);
    assert_eq!(items[1].episode, Episode::Number(2));
}

#[test]
fn observed_items_prefer_recent_copy() {
    let recent = vec![item("a", Episode::Number(5))];
    let latest = vec![item("a", Episode::Number(4)), item("z", Episode::Absent)];

    let observed = observed_items(&recent, &latest);

    assert_eq!(observed, vec![item("a", Episode::Number(5)), item("z", Episode::Absent)]);
}

#[test]
fn observed_items_keep_distinct_urls_sharing_a_slug() {
    let recent = vec![Item::new("solo", "Solo", "/manga/solo/", Episode::Number(3))];
    let latest = vec![Item::new("solo", "Solo (novel)", "/novel/solo/", Episode::Number(1))];

    let observed = observed_items(&recent, &latest);

    let urls: Vec<&str> = observed.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["/manga/solo/", "/novel/solo/"]);
}
