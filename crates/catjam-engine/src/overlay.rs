//! The overlay visual: a small looping video pinned next to the host's
//! favorite control, with a static glyph standing in when the asset cannot
//! be loaded.

use catjam_proto::settings::Settings;
use tracing::{debug, info};

use crate::host::{EventKind, Host, HostEvent, NodeId, SubscriptionId, UiTree};
use crate::locator::{locate, Css, Matcher};
use crate::playback;

pub const VISUAL_ID: &str = "catjam-webm";
pub const MOUNT_ID: &str = "catjam-like-host";
/// Standalone host left behind by older versions.
pub const LEGACY_HOST_ID: &str = "catjam-fallback-host";
pub const FALLBACK_ID: &str = "catjam-fallback-image";
pub const VISUAL_CLASS: &str = "catjam-video";
pub const FALLBACK_CLASS: &str = "catjam-fallback-cat";
/// One-shot animation class retriggered on every pulse.
pub const PULSE_CLASS: &str = "catjam-pulse";
const FALLBACK_GLYPH: &str = "🐱";

pub const OVERLAY_SIZE_PX: f64 = 66.0;
pub const ANCHOR_GAP_PX: f64 = 10.0;

pub const MIN_PLAYBACK_RATE: f64 = 0.25;
pub const MAX_PLAYBACK_RATE: f64 = 3.0;

const ANCHOR_SELECTORS: &[Css] = &[
    Css::deep(r#"[data-test-id="LIKE_BUTTON"]"#),
    Css::deep(r#"button[aria-label*="Нрав"]"#),
    Css::deep(r#"button[aria-label*="Лайк"]"#),
    Css::deep(r#"button[aria-label*="Like"]"#),
    Css::deep(r#"button[title*="Нрав"]"#),
    Css::deep(r#"button[title*="Лайк"]"#),
    Css::deep(r#"button[title*="Like"]"#),
    Css::deep(r#"[data-test-id*="like"]"#),
    Css::deep(r#"[class*="like"] button"#),
    Css::deep(r#"button:has(svg path[d*="M"])"#),
];

const MODAL_SELECTORS: &[Css] = &[
    Css::light(r#"[role="dialog"]"#),
    Css::light(r#"[aria-modal="true"]"#),
    Css::light(r#"[data-test-id*="MODAL"]"#),
    Css::light(r#"[data-test-id*="POPUP"]"#),
    Css::light(".Modal"),
    Css::light(".modal"),
    Css::light(".popup"),
    Css::light(".dialog"),
    Css::light(".overlay"),
];

/// Sidebar containers that need a positioned ancestor for the host's own
/// absolutely placed children.
const LIBRARY_CONTAINERS: &[&str] = &[
    ".main-yourLibraryX-libraryItemContainer",
    ".main-yourLibraryX-library",
];

/// `fallback_rate` percent to a media playback rate.
pub fn playback_rate(settings: &Settings) -> f64 {
    (settings.fallback_rate / 100.0).clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

/// Custom URL when set, otherwise the built-in asset.
pub fn resolve_asset_url<'a>(settings: &'a Settings, default_url: &'a str) -> &'a str {
    let custom = settings.custom_url.trim();
    if custom.is_empty() {
        default_url.trim()
    } else {
        custom
    }
}

pub fn find_anchor(tree: &dyn UiTree) -> Option<NodeId> {
    locate(tree, ANCHOR_SELECTORS)
}

/// Whether any dialog-like node on the top-level page is visible.
pub fn is_modal_open(tree: &dyn UiTree) -> bool {
    let root = tree.document();
    for criterion in MODAL_SELECTORS {
        let node = match criterion.attempt(tree, root) {
            Ok(Some(node)) => node,
            Ok(None) => continue,
            Err(e) => {
                debug!("overlay: skipping `{}`: {}", criterion.describe(), e);
                continue;
            }
        };
        if tree
            .computed_style(node)
            .map(|style| style.is_visible())
            .unwrap_or(false)
        {
            return true;
        }
    }
    false
}

pub fn ensure_container_positioning<H: Host>(host: &mut H) {
    let root = host.document();
    for selector in LIBRARY_CONTAINERS {
        let Ok(Some(container)) = host.query_selector(root, selector) else {
            continue;
        };
        let is_static = host
            .computed_style(container)
            .map(|style| style.position == "static")
            .unwrap_or(false);
        if is_static {
            host.set_inline_style(container, "position", "relative");
        }
    }
}

pub fn apply_playback_rate<H: Host>(host: &mut H, visual: NodeId, settings: &Settings) {
    let rate = playback_rate(settings);
    if rate.is_finite() {
        host.set_playback_rate(visual, rate);
    }
}

/// Start playback, ignoring a host refusal; the next tick tries again.
pub fn start_playback<H: Host>(host: &mut H, visual: NodeId) {
    if let Err(e) = host.play(visual) {
        debug!("overlay: play refused: {}", e);
    }
}

/// Nodes the overlay owns on the page.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    visual: Option<NodeId>,
    asset_subscriptions: Vec<SubscriptionId>,
    fallback: Option<NodeId>,
    mount: Option<NodeId>,
    /// Asset URL that reported a load error.
    failed_asset: Option<String>,
}

impl OverlayState {
    /// The visual, when it is on the page.
    pub fn visual(&self, tree: &dyn UiTree) -> Option<NodeId> {
        self.visual.filter(|v| tree.is_connected(*v))
    }

    /// The visual node regardless of attachment.
    pub fn visual_node(&self) -> Option<NodeId> {
        self.visual
    }

    pub fn mount(&self, tree: &dyn UiTree) -> Option<NodeId> {
        self.mount.filter(|m| tree.is_connected(*m))
    }

    pub fn fallback(&self, tree: &dyn UiTree) -> Option<NodeId> {
        self.fallback.filter(|f| tree.is_connected(*f))
    }

    pub fn is_mounted(&self, tree: &dyn UiTree) -> bool {
        self.visual(tree).is_some()
    }

    pub fn fallback_shown(&self, tree: &dyn UiTree) -> bool {
        self.fallback(tree).is_some()
    }

    pub fn failed_asset(&self) -> Option<&str> {
        self.failed_asset.as_deref()
    }

    fn visual_shown(&self, tree: &dyn UiTree) -> Option<NodeId> {
        self.visual(tree)
            .filter(|v| tree.inline_style(*v, "display").as_deref() != Some("none"))
    }

    /// Take every overlay node off the page, including ones found by id
    /// that this state no longer tracks.
    pub fn remove<H: Host>(&mut self, host: &mut H) {
        let was_mounted = self.is_mounted(host);
        self.release_visual(host);
        for node in [self.fallback.take(), self.mount.take()].into_iter().flatten() {
            host.remove(node);
        }
        for id in [VISUAL_ID, LEGACY_HOST_ID, MOUNT_ID, FALLBACK_ID] {
            if let Some(node) = host.element_by_id(id) {
                host.remove(node);
            }
        }
        if was_mounted {
            info!("overlay: removed");
        }
    }

    fn release_visual<H: Host>(&mut self, host: &mut H) {
        for subscription in self.asset_subscriptions.drain(..) {
            host.unsubscribe(subscription);
        }
        if let Some(visual) = self.visual.take() {
            host.remove(visual);
        }
        self.failed_asset = None;
    }

    /// Forget nodes a host re-render took off the page.
    fn forget_detached<H: Host>(&mut self, host: &mut H) {
        if self.visual.is_some() && self.visual(host).is_none() {
            debug!("overlay: visual detached by host");
            self.release_visual(host);
        }
        if self.mount.is_some() && self.mount(host).is_none() {
            self.mount = None;
        }
        if let Some(fallback) = self.fallback.filter(|f| !host.is_connected(*f)) {
            host.remove(fallback);
            self.fallback = None;
        }
    }

    fn ensure_visual<H: Host>(&mut self, host: &mut H) -> NodeId {
        if let Some(visual) = self.visual {
            return visual;
        }
        let visual = host.create_element("video", VISUAL_ID);
        host.add_class(visual, VISUAL_CLASS);
        for flag in ["muted", "loop", "autoplay", "playsinline"] {
            host.set_attribute(visual, flag, "");
        }
        self.asset_subscriptions = vec![
            host.subscribe(visual, EventKind::Error),
            host.subscribe(visual, EventKind::LoadedData),
        ];
        self.visual = Some(visual);
        visual
    }

    fn ensure_mount<H: Host>(&mut self, host: &mut H) -> NodeId {
        if let Some(mount) = self.mount(host) {
            return mount;
        }
        let mount = host.create_element("div", MOUNT_ID);
        host.append_to_body(mount);
        self.mount = Some(mount);
        mount
    }

    fn show_fallback<H: Host>(&mut self, host: &mut H, mount: NodeId) {
        let fallback = match self.fallback {
            Some(node) => node,
            None => {
                let node = host.create_element("div", FALLBACK_ID);
                host.add_class(node, FALLBACK_CLASS);
                host.set_text(node, FALLBACK_GLYPH);
                self.fallback = Some(node);
                node
            }
        };
        if host.parent(fallback) != Some(mount) {
            host.append_child(mount, fallback);
        }
    }

    fn hide_fallback<H: Host>(&mut self, host: &mut H) {
        if let Some(fallback) = self.fallback.take() {
            host.remove(fallback);
        }
    }

    /// Pin the mount next to `anchor` and make the visual its only child.
    pub fn attach_to_anchor<H: Host>(&mut self, host: &mut H, visual: NodeId, anchor: NodeId) {
        let mount = self.ensure_mount(host);
        if let Some(rect) = host.bounding_rect(anchor) {
            let left = (rect.right() + ANCHOR_GAP_PX).round();
            let top = (rect.top + (rect.height - OVERLAY_SIZE_PX) / 2.0).round();
            host.set_inline_style(mount, "position", "fixed");
            host.set_inline_style(mount, "left", &format!("{left}px"));
            host.set_inline_style(mount, "top", &format!("{top}px"));
            host.set_inline_style(mount, "width", &format!("{OVERLAY_SIZE_PX}px"));
            host.set_inline_style(mount, "height", &format!("{OVERLAY_SIZE_PX}px"));
            host.set_inline_style(mount, "pointer-events", "none");
            host.set_inline_style(mount, "z-index", "9999");
        }
        if host.first_child(mount) != Some(visual) {
            host.replace_children(mount, visual);
        }
    }

    /// Full mount/update pass.  Returns the mounted visual, or `None` when
    /// gating removed the overlay.
    pub fn ensure<H: Host>(
        &mut self,
        host: &mut H,
        settings: &Settings,
        default_asset_url: &str,
    ) -> Option<NodeId> {
        ensure_container_positioning(host);

        if !settings.enabled || is_modal_open(host) {
            self.remove(host);
            return None;
        }
        let Some(anchor) = find_anchor(host) else {
            self.remove(host);
            return None;
        };

        self.forget_detached(host);
        let created = self.visual.is_none();
        let visual = self.ensure_visual(host);
        if let Some(legacy) = host.element_by_id(LEGACY_HOST_ID) {
            host.remove(legacy);
        }
        self.attach_to_anchor(host, visual, anchor);
        let mount = self.mount?;
        if created {
            info!("overlay: mounted next to {:?}", anchor);
        }

        apply_playback_rate(host, visual, settings);
        host.clear_inline_style(visual);
        host.set_inline_style(visual, "width", &format!("{OVERLAY_SIZE_PX}px"));
        host.set_inline_style(visual, "height", &format!("{OVERLAY_SIZE_PX}px"));
        host.set_inline_style(visual, "pointer-events", "none");
        host.set_inline_style(visual, "z-index", "9999");

        let url = resolve_asset_url(settings, default_asset_url).to_string();
        if url.is_empty() {
            self.show_fallback(host, mount);
            host.set_source(visual, None);
            host.set_inline_style(visual, "display", "none");
            return Some(visual);
        }

        if self.failed_asset.as_deref() == Some(url.as_str()) {
            self.show_fallback(host, mount);
            host.set_inline_style(visual, "display", "none");
        } else {
            self.failed_asset = None;
            self.hide_fallback(host);
        }
        if host.source(visual).as_deref() != Some(url.as_str()) {
            debug!("overlay: asset -> {}", url);
            host.set_source(visual, Some(&url));
        }

        if playback::is_audio_playing(host, Some(visual)) {
            start_playback(host, visual);
        } else {
            host.pause(visual);
        }
        Some(visual)
    }

    /// React to the visual's own load events.  Returns whether the event
    /// belonged to the overlay.
    pub fn handle_asset_event<H: Host>(&mut self, host: &mut H, event: &HostEvent) -> bool {
        if !self.asset_subscriptions.contains(&event.subscription) {
            return false;
        }
        let Some(visual) = self.visual(host) else {
            return true;
        };
        match event.kind {
            EventKind::Error => {
                let failed = host.source(visual);
                info!("overlay: asset failed to load: {:?}", failed);
                self.failed_asset = failed;
                if let Some(mount) = host.parent(visual) {
                    self.show_fallback(host, mount);
                }
                host.set_inline_style(visual, "display", "none");
            }
            EventKind::LoadedData => {
                self.failed_asset = None;
                self.hide_fallback(host);
                host.set_inline_style(visual, "display", "");
            }
            _ => {}
        }
        true
    }

    /// Reapply rate and keep playing without rewinding; retrigger the
    /// fallback's pulse animation.
    pub fn resync<H: Host>(&mut self, host: &mut H, settings: &Settings) {
        if !playback::is_audio_playing(host, self.visual) {
            return;
        }
        if let Some(visual) = self.visual_shown(host) {
            apply_playback_rate(host, visual, settings);
            start_playback(host, visual);
        }
        if let Some(fallback) = self.fallback(host) {
            host.remove_class(fallback, PULSE_CLASS);
            host.add_class(fallback, PULSE_CLASS);
        }
    }

    /// Mirror the host's play/pause state on the visual.
    pub fn sync_play_pause<H: Host>(&mut self, host: &mut H, settings: &Settings) {
        let Some(visual) = self.visual(host) else {
            return;
        };
        if playback::is_audio_playing(host, Some(visual)) {
            apply_playback_rate(host, visual, settings);
            start_playback(host, visual);
        } else {
            host.pause(visual);
        }
    }

    /// Rewind to the first frame, as on a new track.
    pub fn restart<H: Host>(&mut self, host: &mut H, settings: &Settings) {
        let Some(visual) = self.visual(host) else {
            return;
        };
        host.set_current_time(visual, 0.0);
        apply_playback_rate(host, visual, settings);
        if playback::is_audio_playing(host, Some(visual)) {
            start_playback(host, visual);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ComputedStyle, MediaControl};
    use crate::memory::{MemoryHost, NodeSpec};

    fn settings() -> Settings {
        Settings::default()
    }

    fn page(extra: Vec<NodeSpec>) -> MemoryHost {
        let mut children = vec![NodeSpec::tag("button")
            .id("like")
            .attr("data-test-id", "LIKE_BUTTON")
            .rect(100.0, 500.0, 40.0, 40.0)];
        children.extend(extra);
        MemoryHost::from_spec(&NodeSpec::tag("body").children(children))
    }

    #[test]
    fn test_rate_mapping() {
        let rate = |percent: f64| {
            playback_rate(&Settings {
                fallback_rate: percent,
                ..settings()
            })
        };
        assert_eq!(rate(10.0), 0.25);
        assert_eq!(rate(500.0), 3.0);
        assert_eq!(rate(150.0), 1.5);
        assert_eq!(rate(100.0), 1.0);
    }

    #[test]
    fn test_asset_url_resolution() {
        let mut s = settings();
        assert_eq!(resolve_asset_url(&s, "catjam.webm"), "catjam.webm");
        s.custom_url = "  https://cdn/x.webm ".into();
        assert_eq!(resolve_asset_url(&s, "catjam.webm"), "https://cdn/x.webm");
        s.custom_url = "   ".into();
        assert_eq!(resolve_asset_url(&s, "catjam.webm"), "catjam.webm");
    }

    #[test]
    fn test_mount_geometry() {
        let mut host = page(vec![]);
        let mut overlay = OverlayState::default();
        let visual = overlay.ensure(&mut host, &settings(), "catjam.webm").unwrap();

        let mount = host.element_by_id(MOUNT_ID).unwrap();
        assert_eq!(host.parent(visual), Some(mount));
        assert_eq!(host.children_of(mount), vec![visual]);
        let style = |p: &str| host.inline_style(mount, p);
        assert_eq!(style("position").as_deref(), Some("fixed"));
        assert_eq!(style("left").as_deref(), Some("150px"));
        assert_eq!(style("top").as_deref(), Some("487px"));
        assert_eq!(style("width").as_deref(), Some("66px"));
        assert_eq!(style("pointer-events").as_deref(), Some("none"));
        assert_eq!(style("z-index").as_deref(), Some("9999"));
        assert_eq!(host.source(visual).as_deref(), Some("catjam.webm"));
        assert_eq!(host.playback_rate(visual), Some(1.0));
        assert_eq!(host.subscriptions_on(visual).len(), 2);
    }

    #[test]
    fn test_second_pass_reuses_nodes() {
        let mut host = page(vec![]);
        let mut overlay = OverlayState::default();
        let first = overlay.ensure(&mut host, &settings(), "catjam.webm").unwrap();
        let second = overlay.ensure(&mut host, &settings(), "catjam.webm").unwrap();
        assert_eq!(first, second);
        assert_eq!(host.subscription_count(), 2);
        let mounts: Vec<_> = host
            .children_of(host.body())
            .into_iter()
            .filter(|n| host.attribute(*n, "id").as_deref() == Some(MOUNT_ID))
            .collect();
        assert_eq!(mounts.len(), 1);
    }

    #[test]
    fn test_gating_removes_everything() {
        let mut host = page(vec![NodeSpec::tag("div").id("legacy-free")]);
        let mut overlay = OverlayState::default();
        overlay.ensure(&mut host, &settings(), "catjam.webm").unwrap();

        let disabled = Settings {
            enabled: false,
            ..settings()
        };
        assert!(overlay.ensure(&mut host, &disabled, "catjam.webm").is_none());
        assert!(host.element_by_id(VISUAL_ID).is_none());
        assert!(host.element_by_id(MOUNT_ID).is_none());
        assert_eq!(host.subscription_count(), 0);
    }

    #[test]
    fn test_modal_visibility_rules() {
        let hidden_modal = NodeSpec::tag("div").attr("role", "dialog").style(
            ComputedStyle {
                display: "none".into(),
                ..Default::default()
            },
        );
        let host = page(vec![hidden_modal]);
        assert!(!is_modal_open(&host));

        let host = page(vec![NodeSpec::tag("div").class("popup")]);
        assert!(is_modal_open(&host));

        // only the top-level page counts
        let host = page(vec![NodeSpec::tag("x-app").shadow(vec![NodeSpec::tag("div").class("modal")])]);
        assert!(!is_modal_open(&host));
    }

    #[test]
    fn test_anchor_missing_removes_overlay() {
        let mut host = page(vec![]);
        let mut overlay = OverlayState::default();
        overlay.ensure(&mut host, &settings(), "catjam.webm").unwrap();
        let like = host.find("#like").unwrap();
        host.detach_node(like);
        assert!(overlay.ensure(&mut host, &settings(), "catjam.webm").is_none());
        assert!(!overlay.is_mounted(&host));
    }

    #[test]
    fn test_load_failure_switches_to_fallback_until_url_changes() {
        let mut host = page(vec![]);
        let mut overlay = OverlayState::default();
        let visual = overlay.ensure(&mut host, &settings(), "broken.webm").unwrap();

        let error = host.fire(visual, EventKind::Error)[0];
        assert!(overlay.handle_asset_event(&mut host, &error));
        let fallback = host.element_by_id(FALLBACK_ID).unwrap();
        assert_eq!(host.parent(fallback), host.element_by_id(MOUNT_ID));
        assert_eq!(host.text_content(fallback), "🐱");
        assert_eq!(host.inline_style(visual, "display").as_deref(), Some("none"));

        // the next pass keeps the fallback for the same URL
        overlay.ensure(&mut host, &settings(), "broken.webm").unwrap();
        assert!(overlay.fallback_shown(&host));
        assert_eq!(host.inline_style(visual, "display").as_deref(), Some("none"));

        let fixed = Settings {
            custom_url: "fixed.webm".into(),
            ..settings()
        };
        overlay.ensure(&mut host, &fixed, "broken.webm").unwrap();
        assert!(!overlay.fallback_shown(&host));
        assert_eq!(host.inline_style(visual, "display"), None);
        assert_eq!(host.source(visual).as_deref(), Some("fixed.webm"));
    }

    #[test]
    fn test_loaded_data_restores_visual() {
        let mut host = page(vec![]);
        let mut overlay = OverlayState::default();
        let visual = overlay.ensure(&mut host, &settings(), "slow.webm").unwrap();
        let error = host.fire(visual, EventKind::Error)[0];
        overlay.handle_asset_event(&mut host, &error);

        let loaded = host.fire(visual, EventKind::LoadedData)[0];
        assert!(overlay.handle_asset_event(&mut host, &loaded));
        assert!(!overlay.fallback_shown(&host));
        assert_eq!(overlay.failed_asset(), None);
        assert_eq!(host.inline_style(visual, "display"), None);
    }

    #[test]
    fn test_empty_url_shows_fallback() {
        let mut host = page(vec![]);
        let mut overlay = OverlayState::default();
        let visual = overlay.ensure(&mut host, &settings(), "  ").unwrap();
        assert!(overlay.fallback_shown(&host));
        assert_eq!(host.source(visual), None);
        assert_eq!(host.inline_style(visual, "display").as_deref(), Some("none"));
    }

    #[test]
    fn test_fallback_rebuilt_after_host_rerender() {
        let mut host = page(vec![]);
        let mut overlay = OverlayState::default();
        overlay.ensure(&mut host, &settings(), "").unwrap();
        let before = host.node_count();

        host.render(&NodeSpec::tag("body").children(vec![NodeSpec::tag("button")
            .attr("data-test-id", "LIKE_BUTTON")
            .rect(100.0, 500.0, 40.0, 40.0)]));
        assert!(!overlay.fallback_shown(&host));

        overlay.ensure(&mut host, &settings(), "").unwrap();
        assert!(overlay.fallback_shown(&host));
        let fallback = host.element_by_id(FALLBACK_ID).unwrap();
        assert_eq!(host.parent(fallback), host.element_by_id(MOUNT_ID));
        assert_eq!(host.node_count(), before);
    }

    #[test]
    fn test_play_state_mirrors_host() {
        let mut host = page(vec![]);
        host.set_media_session(Some("playing"));
        let mut overlay = OverlayState::default();
        let visual = overlay.ensure(&mut host, &settings(), "catjam.webm").unwrap();
        assert!(!host.media(visual).unwrap().paused);

        host.set_media_session(Some("paused"));
        overlay.sync_play_pause(&mut host, &settings());
        assert!(host.media(visual).unwrap().paused);

        // refusal is swallowed
        host.set_media_session(Some("playing"));
        host.set_autoplay_blocked(true);
        overlay.sync_play_pause(&mut host, &settings());
        assert!(host.media(visual).unwrap().paused);
    }

    #[test]
    fn test_legacy_host_and_library_positioning() {
        let mut host = page(vec![
            NodeSpec::tag("div").id(LEGACY_HOST_ID),
            NodeSpec::tag("div")
                .class("main-yourLibraryX-library")
                .style(ComputedStyle {
                    position: "static".into(),
                    ..Default::default()
                }),
        ]);
        let mut overlay = OverlayState::default();
        overlay.ensure(&mut host, &settings(), "catjam.webm").unwrap();
        assert!(host.element_by_id(LEGACY_HOST_ID).is_none());
        let library = host.find(".main-yourLibraryX-library").unwrap();
        assert_eq!(host.inline_style(library, "position").as_deref(), Some("relative"));
    }

    #[test]
    fn test_resync_retriggers_fallback_pulse() {
        let mut host = page(vec![]);
        host.set_media_session(Some("playing"));
        let mut overlay = OverlayState::default();
        overlay.ensure(&mut host, &settings(), "").unwrap();
        let fallback = host.element_by_id(FALLBACK_ID).unwrap();
        overlay.resync(&mut host, &settings());
        assert!(host.has_class(fallback, PULSE_CLASS));
        assert!(host.has_class(fallback, FALLBACK_CLASS));
    }
}
