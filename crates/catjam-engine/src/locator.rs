//! Deep node lookup by ranked criteria.
//!
//! Host pages nest parts of their UI inside encapsulated (shadow) subtrees,
//! and not every selector dialect is understood by every host.  Lookups
//! therefore walk into encapsulated subtrees transparently and skip any
//! criterion the host rejects instead of failing.

use tracing::debug;

use crate::host::{HostError, NodeId, UiTree};

/// One ranked lookup strategy.
pub trait Matcher {
    fn attempt(&self, tree: &dyn UiTree, scope: NodeId) -> Result<Option<NodeId>, HostError>;
    fn describe(&self) -> &str;
}

impl<M: Matcher + ?Sized> Matcher for &M {
    fn attempt(&self, tree: &dyn UiTree, scope: NodeId) -> Result<Option<NodeId>, HostError> {
        (**self).attempt(tree, scope)
    }

    fn describe(&self) -> &str {
        (**self).describe()
    }
}

/// Selector criterion.  `deep` matchers also search encapsulated subtrees;
/// `light` ones only look at the scope's own tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Css {
    selector: &'static str,
    deep: bool,
}

impl Css {
    pub const fn deep(selector: &'static str) -> Self {
        Self {
            selector,
            deep: true,
        }
    }

    pub const fn light(selector: &'static str) -> Self {
        Self {
            selector,
            deep: false,
        }
    }

    pub fn selector(&self) -> &'static str {
        self.selector
    }
}

impl Matcher for Css {
    fn attempt(&self, tree: &dyn UiTree, scope: NodeId) -> Result<Option<NodeId>, HostError> {
        if self.deep {
            deep_query_first(tree, scope, self.selector)
        } else {
            tree.query_selector(scope, self.selector)
        }
    }

    fn describe(&self) -> &str {
        self.selector
    }
}

/// First match for `selector` under `scope`: the scope's own tree wins,
/// then encapsulated subtrees in tree order.  An error is only reported
/// when nothing matched and the host rejected the selector somewhere.
pub fn deep_query_first(
    tree: &dyn UiTree,
    scope: NodeId,
    selector: &str,
) -> Result<Option<NodeId>, HostError> {
    let mut rejected = None;
    match tree.query_selector(scope, selector) {
        Ok(Some(found)) => return Ok(Some(found)),
        Ok(None) => {}
        Err(e) => rejected = Some(e),
    }

    for node in tree.elements(scope) {
        let Some(shadow) = tree.shadow_root(node) else {
            continue;
        };
        match deep_query_first(tree, shadow, selector) {
            Ok(Some(found)) => return Ok(Some(found)),
            Ok(None) => {}
            Err(e) => rejected = rejected.or(Some(e)),
        }
    }

    match rejected {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

/// Every match for `selector` under `scope`, ordered like
/// [`deep_query_first`]: the scope's own tree, then encapsulated subtrees.
pub fn deep_query_all(
    tree: &dyn UiTree,
    scope: NodeId,
    selector: &str,
) -> Result<Vec<NodeId>, HostError> {
    let elements = tree.elements(scope);
    let mut out = Vec::new();
    for node in &elements {
        if tree.matches(*node, selector)? {
            out.push(*node);
        }
    }
    for node in elements {
        if let Some(shadow) = tree.shadow_root(node) {
            out.extend(deep_query_all(tree, shadow, selector)?);
        }
    }
    Ok(out)
}

/// Try each criterion in order against the whole page; first match wins.
pub fn locate<M: Matcher>(tree: &dyn UiTree, criteria: &[M]) -> Option<NodeId> {
    let root = tree.document();
    for criterion in criteria {
        match criterion.attempt(tree, root) {
            Ok(Some(node)) => return Some(node),
            Ok(None) => {}
            Err(e) => debug!("locator: skipping `{}`: {}", criterion.describe(), e),
        }
    }
    None
}

/// Trimmed text of the first located node that has any; later criteria are
/// tried when a match renders empty.
pub fn locate_text<M: Matcher>(tree: &dyn UiTree, criteria: &[M]) -> String {
    let root = tree.document();
    for criterion in criteria {
        let node = match criterion.attempt(tree, root) {
            Ok(Some(node)) => node,
            Ok(None) => continue,
            Err(e) => {
                debug!("locator: skipping `{}`: {}", criterion.describe(), e);
                continue;
            }
        };
        let text = tree.text_content(node);
        let text = text.trim();
        if !text.is_empty() {
            return text.to_string();
        }
    }
    String::new()
}

/// A node with a running named animation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedNode {
    pub node: NodeId,
    pub duration_ms: f64,
    pub iteration_count: String,
    pub animation_name: String,
}

/// Every node under `root` (encapsulated subtrees included) whose computed
/// style has a named animation with a positive duration, in tree order.
pub fn collect_animated(tree: &dyn UiTree, root: NodeId) -> Vec<AnimatedNode> {
    let mut out = Vec::new();
    collect_into(tree, root, &mut out);
    out
}

fn collect_into(tree: &dyn UiTree, root: NodeId, out: &mut Vec<AnimatedNode>) {
    for node in tree.elements(root) {
        if let Some(style) = tree.computed_style(node) {
            let duration_ms = parse_animation_duration_ms(&style.animation_duration);
            let name = style.animation_name.trim();
            if !name.is_empty() && name != "none" && duration_ms > 0.0 {
                out.push(AnimatedNode {
                    node,
                    duration_ms,
                    iteration_count: style.animation_iteration_count.clone(),
                    animation_name: style.animation_name.clone(),
                });
            }
        }
        if let Some(shadow) = tree.shadow_root(node) {
            collect_into(tree, shadow, out);
        }
    }
}

/// Duration of the first animation in a CSS duration list, in milliseconds.
/// Anything that is not `<n>ms` or `<n>s` reads as zero.
pub fn parse_animation_duration_ms(value: &str) -> f64 {
    let first = value.split(',').next().unwrap_or("").trim();
    let parsed = if let Some(ms) = first.strip_suffix("ms") {
        parse_number(ms)
    } else if let Some(secs) = first.strip_suffix('s') {
        parse_number(secs) * 1000.0
    } else {
        0.0
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

fn parse_number(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    raw.parse::<f64>().unwrap_or(0.0)
}
