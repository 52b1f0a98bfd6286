//! "Is the host playing audio?" inferred from whatever the page exposes.
//!
//! Signals are consulted in a fixed priority order and the first definitive
//! answer wins: the page's media session, then the play/pause control, then
//! a raw media element.  With no signal at all the answer is "not playing".

use tracing::debug;

use crate::host::{EventKind, EventSource, HostEvent, NodeId, SubscriptionId, UiTree};
use crate::locator::{deep_query_all, locate, Css};

const PLAY_PAUSE_CONTROLS: &[Css] = &[
    Css::deep(r#"[data-test-id="PLAYER_PLAY_PAUSE_BUTTON"]"#),
    Css::deep(r#"[data-test-id="PLAYER_PLAY_BUTTON"]"#),
    Css::deep(r#"[data-test-id="PLAYER_PAUSE_BUTTON"]"#),
    Css::deep(r#"[data-test-id="play-pause"]"#),
    Css::deep(r#"[data-test-id*="PLAY_PAUSE"]"#),
    Css::deep(r#"button[aria-label*="Пауза"]"#),
    Css::deep(r#"button[aria-label*="Воспроизвести"]"#),
    Css::deep(r#"button[aria-label*="Pause"]"#),
    Css::deep(r#"button[aria-label*="Play"]"#),
];

/// Label vocabulary, lowercase, per locale (ru, en).
const PLAY_WORDS: &[&str] = &["воспроизвести", "play"];
const PAUSE_WORDS: &[&str] = &["пауза", "pause"];

const INNER_PLAY_ICON: &str = r#"[data-test-id*="PLAY"], [class*="play"], [aria-label*="Play"], [aria-label*="Воспроизвести"]"#;
const INNER_PAUSE_ICON: &str = r#"[data-test-id*="PAUSE"], [class*="pause"], [aria-label*="Pause"], [aria-label*="Пауза"]"#;

/// Which signal settled the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSource {
    MediaSession,
    Controls,
    MediaElement,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub playing: bool,
    pub source: PlaybackSource,
}

/// Infer playback state.  `own_visual` is the overlay's own media node,
/// which must never be mistaken for the host's player.
pub fn infer(tree: &dyn UiTree, own_visual: Option<NodeId>) -> Inference {
    if let Some(playing) = from_media_session(tree) {
        return Inference {
            playing,
            source: PlaybackSource::MediaSession,
        };
    }
    if let Some(playing) = from_controls(tree) {
        return Inference {
            playing,
            source: PlaybackSource::Controls,
        };
    }
    if let Some(media) = find_media_element(tree, own_visual) {
        if let Some(status) = tree.media_status(media) {
            return Inference {
                playing: !status.paused && !status.ended,
                source: PlaybackSource::MediaElement,
            };
        }
    }
    Inference {
        playing: false,
        source: PlaybackSource::Default,
    }
}

pub fn is_audio_playing(tree: &dyn UiTree, own_visual: Option<NodeId>) -> bool {
    infer(tree, own_visual).playing
}

fn from_media_session(tree: &dyn UiTree) -> Option<bool> {
    match tree.media_session_state()?.as_str() {
        "playing" => Some(true),
        "paused" => Some(false),
        _ => None,
    }
}

pub fn find_play_pause_control(tree: &dyn UiTree) -> Option<NodeId> {
    locate(tree, PLAY_PAUSE_CONTROLS)
}

fn from_controls(tree: &dyn UiTree) -> Option<bool> {
    let button = find_play_pause_control(tree)?;
    control_state(tree, button)
}

/// Read a play/pause control.  A control offering "play" means playback is
/// stopped; one offering "pause" means it is running.
pub fn control_state(tree: &dyn UiTree, button: NodeId) -> Option<bool> {
    let label = format!(
        "{} {}",
        tree.attribute(button, "aria-label").unwrap_or_default(),
        tree.attribute(button, "title").unwrap_or_default()
    )
    .to_lowercase();
    if PLAY_WORDS.iter().any(|w| label.contains(w)) {
        return Some(false);
    }
    if PAUSE_WORDS.iter().any(|w| label.contains(w)) {
        return Some(true);
    }

    let test_id = tree
        .attribute(button, "data-test-id")
        .unwrap_or_default()
        .to_uppercase();
    if test_id.contains("PLAY_BUTTON") {
        return Some(false);
    }
    if test_id.contains("PAUSE_BUTTON") {
        return Some(true);
    }

    let inner = |selector: &str| match tree.query_selector(button, selector) {
        Ok(found) => found.is_some(),
        Err(e) => {
            debug!("playback: icon query rejected: {}", e);
            false
        }
    };
    match (inner(INNER_PLAY_ICON), inner(INNER_PAUSE_ICON)) {
        (false, true) => return Some(true),
        (true, false) => return Some(false),
        _ => {}
    }

    let text = tree.text_content(button);
    let text = text.trim();
    if text.contains('▶') {
        return Some(false);
    }
    if text.contains("❚❚") || text.contains('⏸') {
        return Some(true);
    }
    None
}

/// The host's raw media element: audio first, then video, skipping the
/// overlay's own visual.
pub fn find_media_element(tree: &dyn UiTree, own_visual: Option<NodeId>) -> Option<NodeId> {
    for tag in ["audio", "video"] {
        match deep_query_all(tree, tree.document(), tag) {
            Ok(found) => {
                if let Some(node) = found.into_iter().find(|n| Some(*n) != own_visual) {
                    return Some(node);
                }
            }
            Err(e) => debug!("playback: media lookup `{}` rejected: {}", tag, e),
        }
    }
    None
}

/// Listeners on the host's media element.
#[derive(Debug, Clone, Default)]
pub struct MediaBinding {
    node: Option<NodeId>,
    subscriptions: Vec<(SubscriptionId, EventKind)>,
}

const MEDIA_EVENTS: [EventKind; 3] = [EventKind::Play, EventKind::Pause, EventKind::Seeking];

impl MediaBinding {
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Listen on `found` once; a swapped-out element loses its listeners.
    pub fn bind(&mut self, events: &mut dyn EventSource, found: Option<NodeId>) {
        let Some(found) = found else {
            return;
        };
        if self.node == Some(found) {
            return;
        }
        self.release(events);
        self.subscriptions = MEDIA_EVENTS
            .iter()
            .map(|kind| (events.subscribe(found, *kind), *kind))
            .collect();
        self.node = Some(found);
        debug!("playback: listening on media element {:?}", found);
    }

    pub fn release(&mut self, events: &mut dyn EventSource) {
        for (subscription, _) in self.subscriptions.drain(..) {
            events.unsubscribe(subscription);
        }
        self.node = None;
    }

    /// The media event kind when `event` came from one of our listeners.
    pub fn classify(&self, event: &HostEvent) -> Option<EventKind> {
        self.subscriptions
            .iter()
            .find(|(subscription, _)| *subscription == event.subscription)
            .map(|(_, kind)| *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryHost, NodeSpec};

    fn page(children: Vec<NodeSpec>) -> MemoryHost {
        MemoryHost::from_spec(&NodeSpec::tag("body").children(children))
    }

    fn button(spec: NodeSpec) -> Option<bool> {
        let host = page(vec![spec.id("ctl")]);
        let node = host.find("#ctl").unwrap();
        control_state(&host, node)
    }

    #[test]
    fn test_media_session_wins() {
        let mut host = page(vec![NodeSpec::tag("button").attr("aria-label", "Play")]);
        host.set_media_session(Some("playing"));
        let inference = infer(&host, None);
        assert!(inference.playing);
        assert_eq!(inference.source, PlaybackSource::MediaSession);

        host.set_media_session(Some("paused"));
        assert!(!is_audio_playing(&host, None));

        // unrecognized values fall through to the controls
        host.set_media_session(Some("none"));
        assert_eq!(infer(&host, None).source, PlaybackSource::Controls);
    }

    #[test]
    fn test_label_vocabulary_in_two_locales() {
        assert_eq!(button(NodeSpec::tag("button").attr("aria-label", "Play")), Some(false));
        assert_eq!(button(NodeSpec::tag("button").attr("aria-label", "Pause")), Some(true));
        assert_eq!(
            button(NodeSpec::tag("button").attr("aria-label", "Воспроизвести")),
            Some(false)
        );
        assert_eq!(button(NodeSpec::tag("button").attr("title", "Пауза")), Some(true));
    }

    #[test]
    fn test_test_id_then_icon_then_glyph() {
        assert_eq!(
            button(NodeSpec::tag("button").attr("data-test-id", "PLAYER_PAUSE_BUTTON")),
            Some(true)
        );
        assert_eq!(
            button(NodeSpec::tag("button").attr("data-test-id", "player_play_button")),
            Some(false)
        );
        assert_eq!(
            button(
                NodeSpec::tag("button")
                    .children(vec![NodeSpec::tag("svg").class("icon-pause")])
            ),
            Some(true)
        );
        assert_eq!(
            button(NodeSpec::tag("button").children(vec![NodeSpec::tag("svg").class("icon-play")])),
            Some(false)
        );
        // both icons present: inconclusive, glyph decides
        assert_eq!(
            button(NodeSpec::tag("button").text("⏸").children(vec![
                NodeSpec::tag("i").class("play"),
                NodeSpec::tag("i").class("pause"),
            ])),
            Some(true)
        );
        assert_eq!(button(NodeSpec::tag("button").text(" ▶ ")), Some(false));
        assert_eq!(button(NodeSpec::tag("button").text("❚❚")), Some(true));
        assert_eq!(button(NodeSpec::tag("button").text("?")), None);
    }

    #[test]
    fn test_media_element_fallback() {
        let host = page(vec![NodeSpec::tag("audio").media(false, false)]);
        let inference = infer(&host, None);
        assert!(inference.playing);
        assert_eq!(inference.source, PlaybackSource::MediaElement);

        let host = page(vec![NodeSpec::tag("audio").media(false, true)]);
        assert!(!is_audio_playing(&host, None));

        let host = page(vec![]);
        assert_eq!(
            infer(&host, None),
            Inference {
                playing: false,
                source: PlaybackSource::Default
            }
        );
    }

    #[test]
    fn test_own_visual_is_not_the_player() {
        let host = page(vec![
            NodeSpec::tag("video").id("mine").media(false, false),
            NodeSpec::tag("x-player").shadow(vec![NodeSpec::tag("video").id("theirs").media(true, false)]),
        ]);
        let mine = host.find("#mine").unwrap();
        let theirs = host.find("#theirs").unwrap();
        assert_eq!(find_media_element(&host, Some(mine)), Some(theirs));
        assert!(!is_audio_playing(&host, Some(mine)));
        assert!(is_audio_playing(&host, None));
    }

    #[test]
    fn test_ranked_control_lookup() {
        let host = page(vec![
            NodeSpec::tag("button").id("generic").attr("aria-label", "Play"),
            NodeSpec::tag("div")
                .id("primary")
                .attr("data-test-id", "PLAYER_PLAY_PAUSE_BUTTON")
                .attr("aria-label", "Pause"),
        ]);
        assert_eq!(find_play_pause_control(&host), host.find("#primary"));
        assert!(is_audio_playing(&host, None));
    }

    #[test]
    fn test_media_binding_follows_element_swaps() {
        let mut host = page(vec![NodeSpec::tag("audio").id("one")]);
        let one = host.find("#one").unwrap();
        let mut binding = MediaBinding::default();
        let found = find_media_element(&host, None);
        binding.bind(&mut host, found);
        binding.bind(&mut host, found);
        assert_eq!(host.subscriptions_on(one).len(), 3);

        let seek = host.fire(one, EventKind::Seeking)[0];
        assert_eq!(binding.classify(&seek), Some(EventKind::Seeking));

        host.render(&NodeSpec::tag("body").children(vec![NodeSpec::tag("audio").id("two")]));
        let two = host.find("#two").unwrap();
        let found = find_media_element(&host, None);
        binding.bind(&mut host, found);
        assert!(host.subscriptions_on(one).is_empty());
        assert_eq!(host.subscriptions_on(two).len(), 3);
        assert_eq!(binding.classify(&seek), None);

        // losing the element keeps the old binding until a new one shows up
        host.render(&NodeSpec::tag("body"));
        let found = find_media_element(&host, None);
        binding.bind(&mut host, found);
        assert_eq!(binding.node(), Some(two));
    }
}
