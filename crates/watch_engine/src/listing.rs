use scraper::{ElementRef, Html, Selector};
use url::Url;
use watch_core::{slug_from_url, Episode, Item};

const ITEM_SELECTOR: &str = ".listupd .bsx";
const TITLE_SELECTOR: &str = ".tt";
const MARKER_SELECTOR: &str = ".epxs";

/// Detail-page selectors, most specific first.
const DETAIL_SELECTORS: [&str; 3] = [".bigor .adds .epxs", ".adds .epxs", ".epxs"];
const SCRIPT_EPISODE_KEY: &str = "episodeNumber";

/// Parse a listing page into items in display order.
///
/// Each `.listupd .bsx` block contributes one item: the first link gives the
/// URL (resolved against `base`), `.tt` the title (falling back to the link's
/// `title` attribute, then its text) and `.epxs` the inline episode marker.
/// Blocks without a link are skipped.
pub fn parse_listing(html: &str, base: Option<&Url>) -> Vec<Item> {
    let doc = Html::parse_document(html);
    let (Some(item_sel), Some(link_sel), Some(title_sel), Some(marker_sel)) = (
        Selector::parse(ITEM_SELECTOR).ok(),
        Selector::parse("a").ok(),
        Selector::parse(TITLE_SELECTOR).ok(),
        Selector::parse(MARKER_SELECTOR).ok(),
    ) else {
        return Vec::new();
    };

    doc.select(&item_sel)
        .filter_map(|block| {
            let link = block.select(&link_sel).next()?;
            let href = link.value().attr("href").map(str::trim)?;
            if href.is_empty() {
                return None;
            }
            let url = resolve(href, base);
            let title = block
                .select(&title_sel)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
                .or_else(|| link.value().attr("title").map(|t| t.trim().to_string()))
                .unwrap_or_else(|| element_text(link));
            let episode = block
                .select(&marker_sel)
                .next()
                .map(|marker| Episode::from_marker_text(&element_text(marker)))
                .unwrap_or_default();
            Some(Item::new(slug_from_url(&url), title, url, episode))
        })
        .collect()
}

/// Find the episode marker on an item's detail page.
///
/// Tries the marker selectors in order, then inline scripts carrying an
/// `episodeNumber` field. Returns `Absent` when nothing matches.
pub fn parse_detail_episode(html: &str) -> Episode {
    let doc = Html::parse_document(html);

    for css in DETAIL_SELECTORS {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        let found = doc
            .select(&sel)
            .map(|marker| Episode::from_marker_text(&element_text(marker)))
            .find(Episode::is_present);
        if let Some(episode) = found {
            return episode;
        }
    }

    let Ok(script_sel) = Selector::parse("script") else {
        return Episode::Absent;
    };
    doc.select(&script_sel)
        .find_map(|script| script_episode(&script.text().collect::<String>()))
        .map(Episode::Number)
        .unwrap_or_default()
}

/// Extract `N` from `episodeNumber: N`, tolerating quotes around key and value.
fn script_episode(script: &str) -> Option<u64> {
    let mut rest = script;
    while let Some(pos) = rest.find(SCRIPT_EPISODE_KEY) {
        rest = &rest[pos + SCRIPT_EPISODE_KEY.len()..];
        let after_key = rest.trim_start_matches(['"', '\'']).trim_start();
        let Some(value) = after_key.strip_prefix(':') else {
            continue;
        };
        let value = value.trim_start().trim_start_matches(['"', '\'']);
        let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(n) = digits.parse() {
            return Some(n);
        }
    }
    None
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn resolve(href: &str, base: Option<&Url>) -> String {
    if let Ok(url) = Url::parse(href) {
        return url.into();
    }
    base.and_then(|b| b.join(href).ok())
        .map(String::from)
        .unwrap_or_else(|| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::script_episode;

    #[test]
    fn script_episode_handles_quoted_forms() {
        assert_eq!(script_episode(r#"var d = {"episodeNumber": "57"};"#), Some(57));
        assert_eq!(script_episode("episodeNumber:12,"), Some(12));
        assert_eq!(script_episode("episodeNumber = 3; episodeNumber: 4"), Some(4));
        assert_eq!(script_episode("nothing here"), None);
    }
}
