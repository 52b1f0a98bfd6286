//! Discovery of the host's beat-like animation and the single live
//! subscription to its iteration events.

use tracing::debug;

use crate::host::{is_infinite, EventKind, EventSource, HostEvent, NodeId, SubscriptionId, UiTree};
use crate::locator::{collect_animated, parse_animation_duration_ms, AnimatedNode, Css, Matcher};

const PULSE_SELECTORS: &[Css] = &[
    Css::deep(r#"div[data-test-id="VIBE_ANIMATION"]"#),
    Css::deep(r#"[data-test-id="VIBE_ANIMATION"]"#),
    Css::deep(r#"[data-test-id*="VIBE"]"#),
    Css::deep(r#"[data-test-id*="PULSE"]"#),
    Css::deep(r#"[class*="vibe"]"#),
    Css::deep(r#"[class*="pulse"]"#),
];

/// Regions whose animations belong to the favorite control, never the beat.
const LIKE_REGION: &str = r#"[data-test-id="LIKE_BUTTON"], [data-test-id*="LIKE"]"#;
const PLAYER_REGION: &str = r#".main-nowPlayingBar-right, [data-test-id*="PLAYER"]"#;

/// Accepted loop lengths for the scan pass, in milliseconds.
pub const MIN_SCAN_DURATION_MS: f64 = 250.0;
pub const MAX_SCAN_DURATION_MS: f64 = 1500.0;

const SIGNATURE_WORDS: &[&str] = &["vibe", "pulse"];

/// Find the pulse node: ranked selectors first, then a scan of every
/// animated node on the page.
pub fn find_pulse(tree: &dyn UiTree) -> Option<NodeId> {
    let root = tree.document();
    for criterion in PULSE_SELECTORS {
        let node = match criterion.attempt(tree, root) {
            Ok(Some(node)) => node,
            Ok(None) => continue,
            Err(e) => {
                debug!("pulse: skipping `{}`: {}", criterion.describe(), e);
                continue;
            }
        };
        if has_perpetual_animation(tree, node) {
            return Some(node);
        }
    }
    scan_for_pulse(tree)
}

fn has_perpetual_animation(tree: &dyn UiTree, node: NodeId) -> bool {
    let Some(style) = tree.computed_style(node) else {
        return false;
    };
    let name = style.animation_name.trim();
    !name.is_empty()
        && name != "none"
        && parse_animation_duration_ms(&style.animation_duration) > 0.0
        && style.has_infinite_iterations()
}

/// Tight infinite loops, fastest first, outside the like region.  A node
/// carrying vibe/pulse hints wins; otherwise the fastest one inside the
/// player controls.
fn scan_for_pulse(tree: &dyn UiTree) -> Option<NodeId> {
    let mut candidates: Vec<AnimatedNode> = collect_animated(tree, tree.document())
        .into_iter()
        .filter(|a| (MIN_SCAN_DURATION_MS..=MAX_SCAN_DURATION_MS).contains(&a.duration_ms))
        .filter(|a| is_infinite(&a.iteration_count))
        .filter(|a| !inside(tree, a.node, LIKE_REGION))
        .collect();
    candidates.sort_by(|a, b| a.duration_ms.total_cmp(&b.duration_ms));

    if let Some(hinted) = candidates.iter().find(|a| has_signature(tree, a.node)) {
        return Some(hinted.node);
    }
    candidates
        .iter()
        .find(|a| inside(tree, a.node, PLAYER_REGION))
        .map(|a| a.node)
}

fn has_signature(tree: &dyn UiTree, node: NodeId) -> bool {
    let test_id = tree
        .attribute(node, "data-test-id")
        .unwrap_or_default()
        .to_lowercase();
    let class = tree.class_name(node).to_lowercase();
    SIGNATURE_WORDS
        .iter()
        .any(|w| test_id.contains(w) || class.contains(w))
}

fn inside(tree: &dyn UiTree, node: NodeId, region: &str) -> bool {
    match tree.closest(node, region) {
        Ok(found) => found.is_some(),
        Err(e) => {
            debug!("pulse: region query rejected: {}", e);
            false
        }
    }
}

/// The currently bound pulse node and its iteration listener.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PulseBinding {
    node: Option<NodeId>,
    subscription: Option<SubscriptionId>,
}

impl PulseBinding {
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }

    /// Point the binding at `found`.  A listener on a different node is
    /// released before the new node gets one, so at most one is ever live.
    pub fn rebind(&mut self, events: &mut dyn EventSource, found: Option<NodeId>) {
        if self.node.is_some() && self.node != found {
            if let Some(subscription) = self.subscription.take() {
                events.unsubscribe(subscription);
                debug!("pulse: released listener on {:?}", self.node);
            }
        }
        self.node = found;
        if let Some(node) = found {
            if self.subscription.is_none() {
                self.subscription = Some(events.subscribe(node, EventKind::AnimationIteration));
                debug!("pulse: bound {:?}", node);
            }
        }
    }

    /// Drop the node and its listener; the next discovery binds afresh.
    pub fn invalidate(&mut self, events: &mut dyn EventSource) {
        if let Some(subscription) = self.subscription.take() {
            events.unsubscribe(subscription);
        }
        self.node = None;
    }

    /// Whether an iteration event comes from the live binding.  Events from
    /// released listeners, other nodes or a detached node are rejected.
    pub fn accepts(&self, tree: &dyn UiTree, event: &HostEvent) -> bool {
        let Some(node) = self.node else {
            return false;
        };
        event.kind == EventKind::AnimationIteration
            && self.subscription == Some(event.subscription)
            && event.current_target == node
            && tree.is_connected(node)
    }

    /// Current loop length of the bound node, when it is still attached.
    pub fn duration_ms(&self, tree: &dyn UiTree) -> Option<f64> {
        let node = self.node.filter(|n| tree.is_connected(*n))?;
        let style = tree.computed_style(node)?;
        Some(parse_animation_duration_ms(&style.animation_duration))
    }
}
