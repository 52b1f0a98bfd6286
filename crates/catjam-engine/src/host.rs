//! Capabilities the engine needs from the host page.
//!
//! Nodes are never owned: a [`NodeId`] is an opaque identity that may go
//! stale whenever the host re-renders.  Every caller re-checks
//! [`UiTree::is_connected`] before acting on a node it stored earlier.

use serde::{Deserialize, Serialize};

/// Opaque, non-owning reference to a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Handle returned by [`EventSource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    AnimationIteration,
    Play,
    Pause,
    Seeking,
    /// Asset failed to load on a media node.
    Error,
    /// Asset finished loading on a media node.
    LoadedData,
}

/// An edge-triggered callback delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEvent {
    pub kind: EventKind,
    /// The node the listener was attached to.
    pub current_target: NodeId,
    pub subscription: SubscriptionId,
}

/// The subset of computed style the engine reads.  Values are kept as the
/// host reports them (`"0.6s"`, `"infinite"`, `"none"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputedStyle {
    pub animation_name: String,
    pub animation_duration: String,
    pub animation_iteration_count: String,
    pub display: String,
    pub visibility: String,
    pub opacity: String,
    pub position: String,
}

impl ComputedStyle {
    /// Hidden by `display`, `visibility` or a zero opacity.  An empty
    /// opacity counts as fully opaque; one that does not parse as a number
    /// counts as hidden.
    pub fn is_visible(&self) -> bool {
        let opacity = self.opacity.trim();
        let opaque = opacity.is_empty() || opacity.parse::<f64>().is_ok_and(|o| o > 0.0);
        self.display != "none" && self.visibility != "hidden" && opaque
    }

    pub fn has_infinite_iterations(&self) -> bool {
        is_infinite(&self.animation_iteration_count)
    }
}

pub fn is_infinite(iteration_count: &str) -> bool {
    matches!(iteration_count, "infinite" | "Infinity")
}

/// Viewport-relative bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStatus {
    pub paused: bool,
    pub ended: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HostError {
    #[error("unsupported selector `{0}`")]
    UnsupportedSelector(String),
    #[error("node {0:?} is not attached")]
    Detached(NodeId),
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),
}

/// Read access to the host's node tree.
pub trait UiTree {
    /// Root scope of the page.
    fn document(&self) -> NodeId;
    /// First descendant of `scope` matching `selector`, without entering
    /// encapsulated subtrees.
    fn query_selector(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>, HostError>;
    /// Descendant elements of `scope` in tree order, without entering
    /// encapsulated subtrees.
    fn elements(&self, scope: NodeId) -> Vec<NodeId>;
    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, HostError>;
    fn shadow_root(&self, node: NodeId) -> Option<NodeId>;
    /// `node` itself or its nearest ancestor matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, HostError>;
    fn is_connected(&self, node: NodeId) -> bool;
    fn first_child(&self, node: NodeId) -> Option<NodeId>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn element_by_id(&self, id: &str) -> Option<NodeId>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn class_name(&self, node: NodeId) -> String;
    fn text_content(&self, node: NodeId) -> String;
    fn computed_style(&self, node: NodeId) -> Option<ComputedStyle>;
    fn inline_style(&self, node: NodeId, property: &str) -> Option<String>;
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;
    /// Page-level media session state (`"playing"`, `"paused"`, `"none"`),
    /// when the host exposes one.
    fn media_session_state(&self) -> Option<String>;
    /// Status of an audio/video node; `None` for other nodes.
    fn media_status(&self, node: NodeId) -> Option<MediaStatus>;
}

/// Structural and style mutation.
pub trait UiMut {
    /// Create a detached element.
    fn create_element(&mut self, tag: &str, id: &str) -> NodeId;
    fn append_to_body(&mut self, node: NodeId);
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    /// Make `child` the only child of `parent`.
    fn replace_children(&mut self, parent: NodeId, child: NodeId);
    /// Take `node` off the page for good.  Hosts may free it with its
    /// subtree, so the id must not be appended again.
    fn remove(&mut self, node: NodeId);
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn set_text(&mut self, node: NodeId, text: &str);
    fn set_inline_style(&mut self, node: NodeId, property: &str, value: &str);
    /// Drop every inline declaration, like assigning `style.cssText`.
    fn clear_inline_style(&mut self, node: NodeId);
    fn add_class(&mut self, node: NodeId, class: &str);
    fn remove_class(&mut self, node: NodeId, class: &str);
}

/// Control over media nodes the engine created.
pub trait MediaControl {
    fn set_source(&mut self, node: NodeId, url: Option<&str>);
    fn source(&self, node: NodeId) -> Option<String>;
    fn set_playback_rate(&mut self, node: NodeId, rate: f64);
    fn playback_rate(&self, node: NodeId) -> Option<f64>;
    fn set_current_time(&mut self, node: NodeId, seconds: f64);
    /// Start playback.  Hosts may refuse (autoplay policy).
    fn play(&mut self, node: NodeId) -> Result<(), HostError>;
    fn pause(&mut self, node: NodeId);
}

/// Subscribe/unsubscribe handles for host-driven callbacks.
pub trait EventSource {
    fn subscribe(&mut self, node: NodeId, kind: EventKind) -> SubscriptionId;
    fn unsubscribe(&mut self, subscription: SubscriptionId);
}

/// Everything the engine needs from a page.
pub trait Host: UiTree + UiMut + MediaControl + EventSource {}

impl<T: UiTree + UiMut + MediaControl + EventSource> Host for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_rules() {
        let visible = ComputedStyle::default();
        assert!(visible.is_visible());

        let faded = ComputedStyle {
            opacity: "0".into(),
            ..Default::default()
        };
        assert!(!faded.is_visible());

        let hidden = ComputedStyle {
            visibility: "hidden".into(),
            ..Default::default()
        };
        assert!(!hidden.is_visible());

        let gone = ComputedStyle {
            display: "none".into(),
            opacity: "1".into(),
            ..Default::default()
        };
        assert!(!gone.is_visible());

        let half = ComputedStyle {
            opacity: "0.5".into(),
            ..Default::default()
        };
        assert!(half.is_visible());

        let garbled = ComputedStyle {
            opacity: "abc".into(),
            ..Default::default()
        };
        assert!(!garbled.is_visible());

        let padded = ComputedStyle {
            opacity: " 0.8 ".into(),
            ..Default::default()
        };
        assert!(padded.is_visible());
    }

    #[test]
    fn test_subscription_ids_order_by_issue() {
        let mut ids = vec![SubscriptionId(7), SubscriptionId(2), SubscriptionId(5)];
        ids.sort();
        assert_eq!(ids, vec![SubscriptionId(2), SubscriptionId(5), SubscriptionId(7)]);

        let keyed: std::collections::BTreeMap<SubscriptionId, EventKind> =
            [(SubscriptionId(3), EventKind::Play), (SubscriptionId(1), EventKind::Pause)]
                .into_iter()
                .collect();
        assert_eq!(keyed.keys().next(), Some(&SubscriptionId(1)));
    }

    #[test]
    fn test_infinite_spellings() {
        assert!(is_infinite("infinite"));
        assert!(is_infinite("Infinity"));
        assert!(!is_infinite("3"));
        assert!(!is_infinite(""));
    }
}
