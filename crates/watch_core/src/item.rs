use serde::{Deserialize, Serialize};

use crate::Episode;

/// A catalog item as seen on a listing page.
///
/// `url` is the identity. `id` is the slug derived from it and is only used for
/// display and notification ids, since unrelated sources may share a slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub episode: Episode,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        episode: Episode,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            episode,
        }
    }

    /// Build an item from a bare identifier, as stored by older versions of the
    /// seen-pointer file.
    pub fn from_legacy_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            url: String::new(),
            episode: Episode::Absent,
        }
    }
}

/// Catalog rows carry exactly the item fields; `episode` is the last value known
/// when the row was settled.
pub type CatalogEntry = Item;

/// Derive the slug of an item URL: the last non-empty path segment.
pub fn slug_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::slug_from_url;

    #[test]
    fn slug_is_last_path_segment() {
        assert_eq!(slug_from_url("https://example.com/manga/solo-leveling/"), "solo-leveling");
        assert_eq!(slug_from_url("https://example.com/manga/x?ref=1"), "x");
        assert_eq!(slug_from_url("/a/"), "a");
    }
}
