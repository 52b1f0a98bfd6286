//! In-memory page used by tests and by the daemon's fixture harness.
//!
//! Pages are described with [`NodeSpec`] trees (builder methods or JSON).
//! [`MemoryHost::render`] swaps the whole page out the way a host re-render
//! does: the previous page is freed and ids are never handed out twice, so
//! stored [`NodeId`]s go stale instead of aliasing new nodes.
//!
//! Selectors are matched with `scraper`: the tree a query runs in is written
//! out as markup tagged with arena ids, parsed, and the matches mapped back.
//! Shadow trees and detached subtrees are parsed inside an implied `<body>`.

use std::collections::{BTreeMap, HashMap, HashSet};

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::host::{
    is_infinite, ComputedStyle, EventKind, EventSource, HostError, HostEvent, MediaControl,
    MediaStatus, NodeId, Rect, SubscriptionId, UiMut, UiTree,
};
use crate::locator::{deep_query_first, parse_animation_duration_ms};

/// Attribute carrying the arena id through rendered markup.
const NODE_ATTR: &str = "data-memory-node";

/// Declarative description of a node and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeSpec {
    pub tag: String,
    pub id: Option<String>,
    pub class: Option<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub style: ComputedStyle,
    pub rect: Option<Rect>,
    pub media: Option<MediaStatus>,
    pub children: Vec<NodeSpec>,
    /// Encapsulated subtree attached to this node.
    pub shadow: Option<Vec<NodeSpec>>,
}

impl NodeSpec {
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn animation(mut self, name: &str, duration: &str, iterations: &str) -> Self {
        self.style.animation_name = name.to_string();
        self.style.animation_duration = duration.to_string();
        self.style.animation_iteration_count = iterations.to_string();
        self
    }

    pub fn rect(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect {
            left,
            top,
            width,
            height,
        });
        self
    }

    pub fn media(mut self, paused: bool, ended: bool) -> Self {
        self.media = Some(MediaStatus { paused, ended });
        self
    }

    pub fn children(mut self, children: Vec<NodeSpec>) -> Self {
        self.children = children;
        self
    }

    pub fn shadow(mut self, children: Vec<NodeSpec>) -> Self {
        self.shadow = Some(children);
        self
    }
}

/// A page fixture as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageFixture {
    pub media_session: Option<String>,
    pub autoplay_blocked: bool,
    pub root: NodeSpec,
}

/// Playback state of an audio/video node.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaState {
    pub paused: bool,
    pub ended: bool,
    pub source: Option<String>,
    pub playback_rate: f64,
    pub current_time: f64,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            paused: true,
            ended: false,
            source: None,
            playback_rate: 1.0,
            current_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Document,
    ShadowRoot,
    Element,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    style: ComputedStyle,
    inline: BTreeMap<String, String>,
    rect: Option<Rect>,
    media: Option<MediaState>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    shadow: Option<NodeId>,
    /// For shadow roots: the element they are attached to.
    shadow_host: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, tag: &str) -> Self {
        Self {
            kind,
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            style: ComputedStyle::default(),
            inline: BTreeMap::new(),
            rect: None,
            media: None,
            parent: None,
            children: Vec::new(),
            shadow: None,
            shadow_host: None,
        }
    }

    fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }
}

pub struct MemoryHost {
    nodes: HashMap<NodeId, Node>,
    next_node: u64,
    media_session: Option<String>,
    autoplay_blocked: bool,
    subscriptions: BTreeMap<SubscriptionId, (NodeId, EventKind)>,
    next_subscription: u64,
    /// Elapsed time into the current animation cycle, per node.
    animation_phase: HashMap<NodeId, f64>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::from([(NodeId(0), Node::new(NodeKind::Document, "#document"))]),
            next_node: 1,
            media_session: None,
            autoplay_blocked: false,
            subscriptions: BTreeMap::new(),
            next_subscription: 1,
            animation_phase: HashMap::new(),
        }
    }

    pub fn from_spec(root: &NodeSpec) -> Self {
        let mut host = Self::new();
        host.render(root);
        host
    }

    pub fn from_fixture(fixture: &PageFixture) -> Self {
        let mut host = Self::new();
        host.apply_fixture(fixture);
        host
    }

    pub fn apply_fixture(&mut self, fixture: &PageFixture) {
        self.media_session = fixture.media_session.clone();
        self.autoplay_blocked = fixture.autoplay_blocked;
        self.render(&fixture.root);
    }

    /// Replace the whole page.  Everything previously mounted, including
    /// nodes other code appended, is freed along with its listeners.
    pub fn render(&mut self, root: &NodeSpec) {
        let doc = self.document();
        for child in self.children_of(doc) {
            self.discard(child);
        }
        let root = self.build(root);
        self.attach(doc, root);
    }

    fn build(&mut self, spec: &NodeSpec) -> NodeId {
        let mut node = Node::new(NodeKind::Element, &spec.tag);
        node.attrs = spec
            .attrs
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();
        if let Some(id) = &spec.id {
            node.attrs.insert("id".to_string(), id.clone());
        }
        if let Some(class) = &spec.class {
            node.attrs.insert("class".to_string(), class.clone());
        }
        node.text = spec.text.clone().unwrap_or_default();
        node.style = spec.style.clone();
        node.rect = spec.rect;
        node.media = spec
            .media
            .map(|m| MediaState {
                paused: m.paused,
                ended: m.ended,
                ..MediaState::default()
            })
            .or_else(|| is_media_tag(&node.tag).then(MediaState::default));
        let id = self.push(node);

        for child in &spec.children {
            let child = self.build(child);
            self.attach(id, child);
        }
        if let Some(shadow) = &spec.shadow {
            let mut root = Node::new(NodeKind::ShadowRoot, "#shadow-root");
            root.shadow_host = Some(id);
            let root = self.push(root);
            if let Some(node) = self.node_mut(id) {
                node.shadow = Some(root);
            }
            for child in shadow {
                let child = self.build(child);
                self.attach(root, child);
            }
        }
        id
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, node);
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn valid(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn media_mut(&mut self, id: NodeId) -> Option<&mut MediaState> {
        self.node_mut(id)?.media.as_mut()
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node_mut(id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.retain(|c| *c != id);
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Detach `id` and free it with its whole subtree, shadow trees
    /// included.  Listeners and animation state on freed nodes go too.
    fn discard(&mut self, id: NodeId) {
        if id == self.document() {
            return;
        }
        self.detach(id);
        let mut freed = HashSet::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.remove(&current) else {
                continue;
            };
            pending.extend(node.children);
            pending.extend(node.shadow);
            self.animation_phase.remove(&current);
            freed.insert(current);
        }
        self.subscriptions
            .retain(|_, (target, _)| !freed.contains(&*target));
    }

    /// Parent within the same tree: stops at document and shadow roots.
    fn element_parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent?;
        self.node(parent)?.is_element().then_some(parent)
    }

    fn descendants(&self, scope: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(scope) else {
            return;
        };
        for child in &node.children {
            if self.node(*child).map(Node::is_element).unwrap_or(false) {
                out.push(*child);
                self.descendants(*child, out);
            }
        }
    }

    /// Top of the tree `id` lives in: the document, a shadow root, or the
    /// root of a detached subtree.
    fn tree_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.node(current).and_then(|n| n.parent) {
            current = parent;
        }
        current
    }

    /// Whether `id` sits strictly below `scope`.
    fn is_below(&self, scope: NodeId, id: NodeId) -> bool {
        let mut current = self.node(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            if parent == scope {
                return true;
            }
            current = self.node(parent).and_then(|n| n.parent);
        }
        false
    }

    /// Elements of the tree rooted at `root` matching `selector`, in tree
    /// order.  Shadow trees are not entered.
    fn select_in_tree(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        let Some(node) = self.node(root) else {
            return Vec::new();
        };
        let mut markup = String::from("<!DOCTYPE html>");
        if node.is_element() {
            self.write_markup(root, &mut markup);
        } else {
            for child in &node.children {
                self.write_markup(*child, &mut markup);
            }
        }
        let page = Html::parse_document(&markup);
        page.select(selector)
            .filter_map(|element| element.value().attr(NODE_ATTR))
            .filter_map(|id| id.parse().ok())
            .map(NodeId)
            .collect()
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id).filter(|n| n.is_element()) else {
            return;
        };
        out.push_str(&format!("<{} {}=\"{}\"", node.tag, NODE_ATTR, id.0));
        for (name, value) in node.attrs.iter().filter(|(name, _)| *name != NODE_ATTR) {
            out.push_str(&format!(" {}=\"{}\"", name, escape_markup(value)));
        }
        out.push('>');
        out.push_str(&escape_markup(&node.text));
        for child in &node.children {
            self.write_markup(*child, out);
        }
        out.push_str(&format!("</{}>", node.tag));
    }

    // ── Test & harness helpers ───────────────────────────────────────────────

    /// The `<body>` element, or the document when the page has none.
    pub fn body(&self) -> NodeId {
        let doc = self.document();
        let mut all = Vec::new();
        self.descendants(doc, &mut all);
        all.into_iter()
            .find(|id| self.node(*id).map(|n| n.tag == "body").unwrap_or(false))
            .unwrap_or(doc)
    }

    /// Deep lookup convenience; `None` for unknown or unsupported selectors.
    pub fn find(&self, selector: &str) -> Option<NodeId> {
        deep_query_first(self, self.document(), selector).ok().flatten()
    }

    pub fn set_media_session(&mut self, state: Option<&str>) {
        self.media_session = state.map(str::to_string);
    }

    pub fn set_autoplay_blocked(&mut self, blocked: bool) {
        self.autoplay_blocked = blocked;
    }

    pub fn media(&self, node: NodeId) -> Option<&MediaState> {
        self.node(node)?.media.as_ref()
    }

    pub fn set_media_status(&mut self, node: NodeId, paused: bool, ended: bool) {
        if let Some(media) = self.media_mut(node) {
            media.paused = paused;
            media.ended = ended;
        }
    }

    pub fn update_style(&mut self, node: NodeId, update: impl FnOnce(&mut ComputedStyle)) {
        if let Some(n) = self.node_mut(node) {
            update(&mut n.style);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_name(node).split_whitespace().any(|c| c == class)
    }

    /// Event kinds currently subscribed on `node`.
    pub fn subscriptions_on(&self, node: NodeId) -> Vec<EventKind> {
        self.subscriptions
            .values()
            .filter(|(n, _)| *n == node)
            .map(|(_, kind)| *kind)
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Nodes currently allocated, the document included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes with a running animation cycle.
    pub fn animation_count(&self) -> usize {
        self.animation_phase.len()
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Detach a node but keep it allocated, as a host moving it would.
    pub fn detach_node(&mut self, node: NodeId) {
        if self.valid(node) {
            self.detach(node);
        }
    }

    /// Dispatch `kind` on `node`: one event per matching listener.
    pub fn fire(&self, node: NodeId, kind: EventKind) -> Vec<HostEvent> {
        self.subscriptions
            .iter()
            .filter(|(_, (n, k))| *n == node && *k == kind)
            .map(|(id, _)| HostEvent {
                kind,
                current_target: node,
                subscription: *id,
            })
            .collect()
    }

    /// Advance infinite animations by `elapsed_ms` and return the iteration
    /// events due for subscribed, attached nodes.
    pub fn advance_animations(&mut self, elapsed_ms: f64) -> Vec<HostEvent> {
        let listeners: Vec<(SubscriptionId, NodeId)> = self
            .subscriptions
            .iter()
            .filter(|(_, (_, kind))| *kind == EventKind::AnimationIteration)
            .map(|(id, (node, _))| (*id, *node))
            .collect();

        let mut due: HashMap<NodeId, usize> = HashMap::new();
        for (_, node) in &listeners {
            if due.contains_key(node) || !self.is_connected(*node) {
                continue;
            }
            let Some(style) = self.computed_style(*node) else {
                continue;
            };
            let period = parse_animation_duration_ms(&style.animation_duration);
            if period <= 0.0 || !is_infinite(&style.animation_iteration_count) {
                continue;
            }
            let phase = self.animation_phase.entry(*node).or_insert(0.0);
            *phase += elapsed_ms;
            let cycles = (*phase / period).floor();
            *phase -= cycles * period;
            due.insert(*node, cycles as usize);
        }

        self.animation_phase.retain(|node, _| due.contains_key(node));

        let mut events = Vec::new();
        for (subscription, node) in listeners {
            for _ in 0..due.get(&node).copied().unwrap_or(0) {
                events.push(HostEvent {
                    kind: EventKind::AnimationIteration,
                    current_target: node,
                    subscription,
                });
            }
        }
        events
    }
}

fn is_media_tag(tag: &str) -> bool {
    matches!(tag, "audio" | "video")
}

fn parse_selector(selector: &str) -> Result<Selector, HostError> {
    Selector::parse(selector).map_err(|_| HostError::UnsupportedSelector(selector.to_string()))
}

fn escape_markup(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl UiTree for MemoryHost {
    fn document(&self) -> NodeId {
        NodeId(0)
    }

    fn query_selector(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>, HostError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .select_in_tree(self.tree_root(scope), &selector)
            .into_iter()
            .find(|id| self.is_below(scope, *id)))
    }

    fn elements(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.descendants(scope, &mut out);
        out
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, HostError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .select_in_tree(self.tree_root(node), &selector)
            .contains(&node))
    }

    fn shadow_root(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.shadow
    }

    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, HostError> {
        let selector = parse_selector(selector)?;
        let matched = self.select_in_tree(self.tree_root(node), &selector);
        let mut current = self.node(node).filter(|n| n.is_element()).map(|_| node);
        while let Some(id) = current {
            if matched.contains(&id) {
                return Ok(Some(id));
            }
            current = self.element_parent(id);
        }
        Ok(None)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            let Some(n) = self.node(current) else {
                return false;
            };
            match n.kind {
                NodeKind::Document => return true,
                NodeKind::ShadowRoot => match n.shadow_host {
                    Some(host) => current = host,
                    None => return false,
                },
                NodeKind::Element => match n.parent {
                    Some(parent) => current = parent,
                    None => return false,
                },
            }
        }
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.children.first().copied()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.elements(self.document())
            .into_iter()
            .find(|n| self.attribute(*n, "id").as_deref() == Some(id))
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.node(node)?.attrs.get(&name.to_ascii_lowercase()).cloned()
    }

    fn class_name(&self, node: NodeId) -> String {
        self.attribute(node, "class").unwrap_or_default()
    }

    fn text_content(&self, node: NodeId) -> String {
        let Some(n) = self.node(node) else {
            return String::new();
        };
        let mut text = n.text.clone();
        for child in &n.children {
            text.push_str(&self.text_content(*child));
        }
        text
    }

    fn computed_style(&self, node: NodeId) -> Option<ComputedStyle> {
        let n = self.node(node).filter(|n| n.is_element())?;
        let mut style = n.style.clone();
        for (property, value) in &n.inline {
            match property.as_str() {
                "display" => style.display = value.clone(),
                "visibility" => style.visibility = value.clone(),
                "opacity" => style.opacity = value.clone(),
                "position" => style.position = value.clone(),
                _ => {}
            }
        }
        Some(style)
    }

    fn inline_style(&self, node: NodeId, property: &str) -> Option<String> {
        self.node(node)?.inline.get(property).cloned()
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        if !self.is_connected(node) {
            return None;
        }
        Some(self.node(node)?.rect.unwrap_or_default())
    }

    fn media_session_state(&self) -> Option<String> {
        self.media_session.clone()
    }

    fn media_status(&self, node: NodeId) -> Option<MediaStatus> {
        self.node(node)?.media.as_ref().map(|m| MediaStatus {
            paused: m.paused,
            ended: m.ended,
        })
    }
}

impl UiMut for MemoryHost {
    fn create_element(&mut self, tag: &str, id: &str) -> NodeId {
        let mut node = Node::new(NodeKind::Element, tag);
        node.attrs.insert("id".to_string(), id.to_string());
        if is_media_tag(&node.tag) {
            node.media = Some(MediaState::default());
        }
        self.push(node)
    }

    fn append_to_body(&mut self, node: NodeId) {
        let body = self.body();
        if self.valid(node) {
            self.attach(body, node);
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.valid(parent) && self.valid(child) {
            self.attach(parent, child);
        }
    }

    fn replace_children(&mut self, parent: NodeId, child: NodeId) {
        if !self.valid(parent) || !self.valid(child) {
            return;
        }
        self.detach(child);
        for old in self.children_of(parent) {
            self.detach(old);
        }
        self.attach(parent, child);
    }

    fn remove(&mut self, node: NodeId) {
        self.discard(node);
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.node_mut(node) {
            n.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.node_mut(node) {
            n.text = text.to_string();
        }
    }

    fn set_inline_style(&mut self, node: NodeId, property: &str, value: &str) {
        let Some(n) = self.node_mut(node) else {
            return;
        };
        let inline = &mut n.inline;
        if value.is_empty() {
            inline.remove(property);
        } else {
            inline.insert(property.to_string(), value.to_string());
        }
    }

    fn clear_inline_style(&mut self, node: NodeId) {
        if let Some(n) = self.node_mut(node) {
            n.inline.clear();
        }
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let Some(n) = self.node_mut(node) else {
            return;
        };
        let classes = n.attrs.entry("class".to_string()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(classes) = self.node_mut(node).and_then(|n| n.attrs.get_mut("class")) {
            *classes = classes
                .split_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }
}

impl MediaControl for MemoryHost {
    fn set_source(&mut self, node: NodeId, url: Option<&str>) {
        if let Some(media) = self.media_mut(node) {
            media.source = url.map(str::to_string);
        }
    }

    fn source(&self, node: NodeId) -> Option<String> {
        self.media(node)?.source.clone()
    }

    fn set_playback_rate(&mut self, node: NodeId, rate: f64) {
        if let Some(media) = self.media_mut(node) {
            media.playback_rate = rate;
        }
    }

    fn playback_rate(&self, node: NodeId) -> Option<f64> {
        Some(self.media(node)?.playback_rate)
    }

    fn set_current_time(&mut self, node: NodeId, seconds: f64) {
        if let Some(media) = self.media_mut(node) {
            media.current_time = seconds;
        }
    }

    fn play(&mut self, node: NodeId) -> Result<(), HostError> {
        if self.autoplay_blocked {
            return Err(HostError::PlaybackRejected(
                "autoplay blocked by host policy".to_string(),
            ));
        }
        let media = self.media_mut(node).ok_or(HostError::Detached(node))?;
        media.paused = false;
        media.ended = false;
        Ok(())
    }

    fn pause(&mut self, node: NodeId) {
        if let Some(media) = self.media_mut(node) {
            media.paused = true;
        }
    }
}

impl EventSource for MemoryHost {
    fn subscribe(&mut self, node: NodeId, kind: EventKind) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.insert(id, (node, kind));
        id
    }

    fn unsubscribe(&mut self, subscription: SubscriptionId) {
        self.subscriptions.remove(&subscription);
    }
}
