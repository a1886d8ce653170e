use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Text used for the `Unknown` sentinel, both on disk and inside notification ids.
pub const UNKNOWN_MARKER: &str = "unknown";

/// Episode marker of a catalog item.
///
/// Persisted as a nullable string: `null` is `Absent`, `"unknown"` is `Unknown`,
/// decimal digits are `Number`, anything else is kept verbatim as `Label`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Episode {
    #[default]
    Absent,
    Unknown,
    Number(u64),
    Label(String),
}

/// How an episode moved between two observations of the same item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeTransition {
    /// Nothing worth reporting (equal, or both absent/unknown).
    Unchanged,
    /// Episode info showed up where there was none.
    Appeared,
    /// Forward progress, including unknown -> number.
    Advanced,
    /// Non-numeric labels differ; compared as plain strings.
    Relabeled,
    /// Numeric episode went down.
    Regressed,
    /// Episode info vanished.
    Lost,
    /// A known episode turned back into the unknown sentinel.
    BecameUnknown,
}

impl EpisodeTransition {
    /// True when the transition should produce a change event.
    pub fn is_forward(self) -> bool {
        matches!(
            self,
            EpisodeTransition::Appeared | EpisodeTransition::Advanced | EpisodeTransition::Relabeled
        )
    }

    /// True for transitions that are detected but must be suppressed.
    pub fn is_anomaly(self) -> bool {
        matches!(
            self,
            EpisodeTransition::Regressed | EpisodeTransition::Lost | EpisodeTransition::BecameUnknown
        )
    }
}

impl Episode {
    /// Parse a stored or scraped value. Empty strings count as absent.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Episode::Absent;
        }
        if trimmed.eq_ignore_ascii_case(UNKNOWN_MARKER) {
            return Episode::Unknown;
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<u64>() {
                return Episode::Number(n);
            }
        }
        Episode::Label(trimmed.to_string())
    }

    /// Interpret the text of a listing marker such as `"Chapter 42"` or `"Chapter ?"`.
    ///
    /// A `?` anywhere wins over digits and yields `Unknown`; otherwise the first
    /// run of ASCII digits is the episode number.
    pub fn from_marker_text(text: &str) -> Self {
        if text.contains('?') {
            return Episode::Unknown;
        }
        match first_digit_run(text) {
            Some(digits) => Episode::parse(digits),
            None => Episode::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Episode::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// Classify the move from `prev` to `self`.
    pub fn transition_from(&self, prev: &Episode) -> EpisodeTransition {
        use Episode::*;
        match (prev, self) {
            (Absent, Absent) | (Unknown, Unknown) => EpisodeTransition::Unchanged,
            (Absent, _) => EpisodeTransition::Appeared,
            (_, Absent) => EpisodeTransition::Lost,
            (Number(_) | Label(_), Unknown) => EpisodeTransition::BecameUnknown,
            (Unknown, Number(_)) => EpisodeTransition::Advanced,
            (Number(old), Number(new)) => match new.cmp(old) {
                Ordering::Greater => EpisodeTransition::Advanced,
                Ordering::Less => EpisodeTransition::Regressed,
                Ordering::Equal => EpisodeTransition::Unchanged,
            },
            // Labels only come from hand-edited or legacy data; plain string inequality.
            (Unknown | Number(_) | Label(_), Label(_)) | (Label(_), Number(_)) => {
                if prev.to_string() == self.to_string() {
                    EpisodeTransition::Unchanged
                } else {
                    EpisodeTransition::Relabeled
                }
            }
        }
    }

    /// Whether `self` may overwrite `stored` in the catalog.
    pub fn supersedes(&self, stored: &Episode) -> bool {
        self.transition_from(stored).is_forward()
    }
}

fn first_digit_run(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..len])
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Episode::Absent => write!(f, "none"),
            Episode::Unknown => write!(f, "{UNKNOWN_MARKER}"),
            Episode::Number(n) => write!(f, "{n}"),
            Episode::Label(label) => write!(f, "{label}"),
        }
    }
}

impl From<Option<String>> for Episode {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Episode::parse).unwrap_or_default()
    }
}

impl From<Episode> for Option<String> {
    fn from(value: Episode) -> Self {
        match value {
            Episode::Absent => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Episode, EpisodeTransition};

    #[test]
    fn marker_text_prefers_question_mark() {
        assert_eq!(Episode::from_marker_text("Chapter ?"), Episode::Unknown);
        assert_eq!(Episode::from_marker_text("Chapter 12?"), Episode::Unknown);
        assert_eq!(Episode::from_marker_text("Ch. 042 end"), Episode::Number(42));
        assert_eq!(Episode::from_marker_text("no digits"), Episode::Absent);
    }

    #[test]
    fn parse_keeps_non_numeric_labels() {
        assert_eq!(Episode::parse(" 7 "), Episode::Number(7));
        assert_eq!(Episode::parse("UNKNOWN"), Episode::Unknown);
        assert_eq!(Episode::parse("12.5"), Episode::Label("12.5".into()));
        assert_eq!(Episode::parse(""), Episode::Absent);
    }

    #[test]
    fn unknown_to_number_is_forward_but_reverse_is_not() {
        let unknown = Episode::Unknown;
        let one = Episode::Number(1);
        assert_eq!(one.transition_from(&unknown), EpisodeTransition::Advanced);
        assert_eq!(unknown.transition_from(&one), EpisodeTransition::BecameUnknown);
        assert!(!unknown.supersedes(&one));
    }

    #[test]
    fn label_fallback_uses_string_inequality() {
        let a = Episode::Label("12.5".into());
        let b = Episode::Label("12.5".into());
        assert_eq!(a.transition_from(&b), EpisodeTransition::Unchanged);
        assert_eq!(
            Episode::Number(13).transition_from(&a),
            EpisodeTransition::Relabeled
        );
    }

    #[test]
    fn serde_uses_nullable_string() {
        let json = serde_json::to_string(&vec![
            Episode::Absent,
            Episode::Unknown,
            Episode::Number(3),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,"unknown","3"]"#);
        let back: Vec<Episode> = serde_json::from_str(r#"[null,"unknown","3","x"]"#).unwrap();
        assert_eq!(back[3], Episode::Label("x".into()));
    }
}
