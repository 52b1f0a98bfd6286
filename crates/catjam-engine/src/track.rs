//! Track identity from rendered title/artist text.

use std::sync::OnceLock;

use regex::Regex;

use crate::host::UiTree;
use crate::locator::{locate_text, Css};

const TITLE_SELECTORS: &[Css] = &[
    Css::deep(r#"[data-test-id="PLAYER_TITLE"]"#),
    Css::deep(r#"[data-test-id="TRACK_TITLE"]"#),
    Css::deep(".player-track__title"),
    Css::deep(".track-title"),
    Css::deep(".d-track__title"),
];

const ARTIST_SELECTORS: &[Css] = &[
    Css::deep(r#"[data-test-id="PLAYER_ARTIST"]"#),
    Css::deep(r#"[data-test-id="TRACK_ARTIST"]"#),
    Css::deep(".player-track__artists"),
    Css::deep(".track-artists"),
    Css::deep(".d-track__artists"),
];

const KEY_SEPARATOR: &str = "__";

static PARENTHESIZED: OnceLock<Option<Regex>> = OnceLock::new();
static BRACKETED: OnceLock<Option<Regex>> = OnceLock::new();
static FEATURING: OnceLock<Option<Regex>> = OnceLock::new();
static NON_WORD: OnceLock<Option<Regex>> = OnceLock::new();

/// Replace matches of a cached pattern with a single space.  A pattern that
/// fails to compile leaves the text untouched.
fn blank_out(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str, all: bool) -> String {
    match cell.get_or_init(|| Regex::new(pattern).ok()) {
        Some(re) if all => re.replace_all(text, " ").into_owned(),
        Some(re) => re.replace(text, " ").into_owned(),
        None => text.to_string(),
    }
}

/// Lowercase, drop `(...)` / `[...]` segments and any trailing
/// "feat."/"ft." clause, collapse everything that is not a letter or digit
/// to single spaces.
pub fn normalize(text: &str) -> String {
    let text = text.to_lowercase();
    let text = blank_out(&PARENTHESIZED, r"\([^)]*\)", &text, true);
    let text = blank_out(&BRACKETED, r"\[[^\]]*\]", &text, true);
    let text = blank_out(
        &FEATURING,
        r"(?s)(?:^|[^\p{L}\p{N}])(?:feat|ft)\.?(?:[^\p{L}\p{N}]|$).*$",
        &text,
        false,
    );
    let text = blank_out(&NON_WORD, r"[^\p{L}\p{N}]+", &text, true);
    text.trim().to_string()
}

/// `title__artist` over normalized text; empty when both parts are blank.
pub fn track_key(title: &str, artist: &str) -> String {
    let title = normalize(title);
    let artist = normalize(artist);
    if title.is_empty() && artist.is_empty() {
        return String::new();
    }
    format!("{title}{KEY_SEPARATOR}{artist}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub key: String,
}

pub fn read_track_info(tree: &dyn UiTree) -> TrackInfo {
    let title = locate_text(tree, TITLE_SELECTORS);
    let artist = locate_text(tree, ARTIST_SELECTORS);
    let key = track_key(&title, &artist);
    TrackInfo { title, artist, key }
}

/// Last seen track key.
#[derive(Debug, Clone, Default)]
pub struct TrackState {
    current: Option<String>,
}

impl TrackState {
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Record `key`; true when it is a transition (including the first
    /// non-empty read).  Empty keys never count.
    pub fn observe(&mut self, key: &str) -> bool {
        if key.is_empty() || self.current.as_deref() == Some(key) {
            return false;
        }
        self.current = Some(key.to_string());
        true
    }
}
