//! Tick compositions for the two polling cadences and the host event
//! handler.  All three run to completion on the caller's thread against a
//! [`SyncContext`] it owns exclusively.

use std::fmt;
use std::time::{Duration, Instant};

use catjam_proto::settings::{self, SettingsMap};
use tracing::{debug, info};

use crate::context::SyncContext;
use crate::host::{EventKind, Host, HostEvent};
use crate::overlay;
use crate::playback;
use crate::pulse;
use crate::track;

pub const SLOW_PERIOD: Duration = Duration::from_millis(2000);
pub const FAST_PERIOD: Duration = Duration::from_millis(250);
pub const DEBUG_LOG_INTERVAL: Duration = Duration::from_millis(2000);

/// Lets an action through at most once per `interval`.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

#[derive(Debug, Clone)]
pub struct PollState {
    pub last_track_change: Option<Instant>,
    pub track_changes: u64,
    debug_log: Throttle,
}

impl PollState {
    pub fn new(debug_log_interval: Duration) -> Self {
        Self {
            last_track_change: None,
            track_changes: 0,
            debug_log: Throttle::new(debug_log_interval),
        }
    }
}

impl Default for PollState {
    fn default() -> Self {
        Self::new(DEBUG_LOG_INTERVAL)
    }
}

/// One diagnostic sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugLine {
    pub playing: bool,
    pub rate: Option<f64>,
    pub pulse_found: bool,
    pub pulse_duration_ms: Option<f64>,
}

impl fmt::Display for DebugLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playing={} rate=", self.playing)?;
        match self.rate {
            Some(rate) => write!(f, "{rate:.3}")?,
            None => write!(f, "n/a")?,
        }
        write!(f, " pulse_found={} pulse_dur_ms=", self.pulse_found)?;
        match self.pulse_duration_ms {
            Some(ms) => write!(f, "{ms:.0}"),
            None => write!(f, "n/a"),
        }
    }
}

/// Replace the settings snapshot with `fresh`, normalized against the
/// current one.
pub fn apply_settings(ctx: &mut SyncContext, fresh: &SettingsMap) {
    let next = settings::normalize(fresh, &ctx.settings);
    if next != ctx.settings {
        info!(
            "settings: enabled={} follow_pulse={} rate={} custom_url={:?}",
            next.enabled, next.follow_pulse, next.fallback_rate, next.custom_url
        );
    }
    ctx.settings = next;
}

/// Settings refresh result applied, then a full overlay pass.
pub fn slow_tick<H: Host>(
    ctx: &mut SyncContext,
    host: &mut H,
    fresh: Option<&SettingsMap>,
    now: Instant,
) {
    if let Some(fresh) = fresh {
        apply_settings(ctx, fresh);
    }
    check_track_change(ctx, host, now);
    ctx.overlay
        .ensure(host, &ctx.settings, &ctx.options.default_asset_url);
    bind_pulse(ctx, host);
    bind_media(ctx, host);
    ctx.overlay.sync_play_pause(host, &ctx.settings);
}

/// Cheap upkeep between slow ticks.  Never mounts the overlay, only keeps
/// an existing one placed and in step.  Returns the diagnostic line when
/// one was emitted.
pub fn fast_tick<H: Host>(ctx: &mut SyncContext, host: &mut H, now: Instant) -> Option<DebugLine> {
    if !ctx.settings.enabled || overlay::is_modal_open(host) {
        ctx.overlay.remove(host);
        return None;
    }
    check_track_change(ctx, host, now);
    bind_pulse(ctx, host);

    let visual = ctx.overlay.visual(host)?;
    let Some(anchor) = overlay::find_anchor(host) else {
        ctx.overlay.remove(host);
        return None;
    };
    ctx.overlay.attach_to_anchor(host, visual, anchor);
    overlay::apply_playback_rate(host, visual, &ctx.settings);
    ctx.overlay.sync_play_pause(host, &ctx.settings);
    maybe_debug_log(ctx, host, now)
}

/// Dispatch a host callback.  Events from released listeners or detached
/// nodes fall through without effect.
pub fn handle_event<H: Host>(ctx: &mut SyncContext, host: &mut H, event: &HostEvent) {
    if ctx.overlay.handle_asset_event(host, event) {
        return;
    }
    if event.kind == EventKind::AnimationIteration {
        if ctx.settings.follow_pulse && ctx.pulse.accepts(host, event) {
            ctx.overlay.resync(host, &ctx.settings);
        }
        return;
    }
    match ctx.media.classify(event) {
        Some(EventKind::Play) | Some(EventKind::Pause) => {
            ctx.overlay.sync_play_pause(host, &ctx.settings)
        }
        Some(EventKind::Seeking) => ctx.overlay.resync(host, &ctx.settings),
        _ => debug!("scheduler: ignoring {:?} from {:?}", event.kind, event.current_target),
    }
}

/// Compare the rendered track against the last one; returns whether a
/// change was handled.
pub fn check_track_change<H: Host>(ctx: &mut SyncContext, host: &mut H, now: Instant) -> bool {
    let info = track::read_track_info(host);
    if !ctx.track.observe(&info.key) {
        return false;
    }
    info!("track: {} - {} ({})", info.artist, info.title, info.key);
    on_track_changed(ctx, host, now);
    true
}

fn on_track_changed<H: Host>(ctx: &mut SyncContext, host: &mut H, now: Instant) {
    ctx.poll.last_track_change = Some(now);
    ctx.poll.track_changes += 1;
    // controls and the pulse node are usually re-rendered with the track
    ctx.pulse.invalidate(host);
    ctx.overlay.restart(host, &ctx.settings);
}

pub fn bind_pulse<H: Host>(ctx: &mut SyncContext, host: &mut H) {
    let found = pulse::find_pulse(host);
    ctx.pulse.rebind(host, found);
}

pub fn bind_media<H: Host>(ctx: &mut SyncContext, host: &mut H) {
    let found = playback::find_media_element(host, ctx.overlay.visual_node());
    ctx.media.bind(host, found);
}

/// Emit the diagnostic line if enabled and the throttle allows it.
pub fn maybe_debug_log<H: Host>(ctx: &mut SyncContext, host: &H, now: Instant) -> Option<DebugLine> {
    if !ctx.options.debug_log || !ctx.poll.debug_log.ready(now) {
        return None;
    }
    let line = DebugLine {
        playing: playback::is_audio_playing(host, ctx.overlay.visual_node()),
        rate: ctx
            .overlay
            .visual(host)
            .and_then(|visual| host.playback_rate(visual)),
        pulse_found: ctx.pulse.node().is_some(),
        pulse_duration_ms: ctx.pulse.duration_ms(host),
    };
    debug!("{}", line);
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineOptions;
    use crate::memory::{MemoryHost, NodeSpec};
    use crate::host::{MediaControl, UiMut, UiTree};
    use crate::overlay::{MOUNT_ID, VISUAL_ID};

    fn player_page(title: &str) -> NodeSpec {
        NodeSpec::tag("body").children(vec![NodeSpec::tag("div")
            .attr("data-test-id", "PLAYER_BAR")
            .children(vec![
                NodeSpec::tag("span")
                    .attr("data-test-id", "PLAYER_TITLE")
                    .text(title),
                NodeSpec::tag("span")
                    .attr("data-test-id", "PLAYER_ARTIST")
                    .text("Artist"),
                NodeSpec::tag("button")
                    .attr("data-test-id", "PLAYER_PLAY_PAUSE_BUTTON")
                    .attr("aria-label", "Pause"),
                NodeSpec::tag("button")
                    .attr("data-test-id", "LIKE_BUTTON")
                    .rect(200.0, 600.0, 32.0, 32.0),
                NodeSpec::tag("div")
                    .attr("data-test-id", "VIBE_ANIMATION")
                    .animation("vibe", "600ms", "infinite"),
                NodeSpec::tag("audio").media(false, false),
            ])])
    }

    fn setup() -> (SyncContext, MemoryHost, Instant) {
        let ctx = SyncContext::new(EngineOptions::default());
        let host = MemoryHost::from_spec(&player_page("First Song"));
        (ctx, host, Instant::now())
    }

    fn pulse_node(host: &MemoryHost) -> crate::host::NodeId {
        host.find(r#"[data-test-id="VIBE_ANIMATION"]"#).unwrap()
    }

    #[test]
    fn test_throttle() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(2000));
        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(1999)));
        assert!(throttle.ready(start + Duration::from_millis(2000)));
        assert!(!throttle.ready(start + Duration::from_millis(2250)));
    }

    #[test]
    fn test_debug_line_format() {
        let line = DebugLine {
            playing: true,
            rate: Some(1.5),
            pulse_found: true,
            pulse_duration_ms: Some(600.4),
        };
        assert_eq!(
            line.to_string(),
            "playing=true rate=1.500 pulse_found=true pulse_dur_ms=600"
        );
        let empty = DebugLine {
            playing: false,
            rate: None,
            pulse_found: false,
            pulse_duration_ms: None,
        };
        assert_eq!(
            empty.to_string(),
            "playing=false rate=n/a pulse_found=false pulse_dur_ms=n/a"
        );
    }

    #[test]
    fn test_slow_tick_mounts_and_binds() {
        let (mut ctx, mut host, now) = setup();
        slow_tick(&mut ctx, &mut host, None, now);

        let visual = ctx.overlay.visual(&host).unwrap();
        assert_eq!(host.element_by_id(VISUAL_ID), Some(visual));
        assert!(!host.media(visual).unwrap().paused);
        assert_eq!(ctx.pulse.node(), Some(pulse_node(&host)));
        assert!(ctx.pulse.is_bound());
        assert_eq!(ctx.media.node(), host.find("audio"));
        assert_eq!(ctx.poll.track_changes, 1);
        assert_eq!(ctx.track.current(), Some("first song__artist"));
    }

    #[test]
    fn test_fresh_settings_are_normalized_against_previous() {
        let (mut ctx, mut host, now) = setup();
        let payload = serde_json::json!({ "data": { "sections": [ { "items": [
            { "id": "fallbackRate", "type": "slider", "value": 200 }
        ] } ] } });
        let map = settings::parse_handle_payload(&payload).unwrap();
        ctx.settings.follow_pulse = false;
        slow_tick(&mut ctx, &mut host, Some(&map), now);

        assert_eq!(ctx.settings.fallback_rate, 200.0);
        assert!(!ctx.settings.follow_pulse);
        let visual = ctx.overlay.visual(&host).unwrap();
        assert_eq!(host.playback_rate(visual), Some(2.0));
    }

    #[test]
    fn test_track_transition_fires_once() {
        let (mut ctx, mut host, mut now) = setup();
        slow_tick(&mut ctx, &mut host, None, now);
        let visual = ctx.overlay.visual(&host).unwrap();
        let first_pulse_sub = host.subscriptions_on(pulse_node(&host));
        assert_eq!(first_pulse_sub.len(), 1);

        host.set_current_time(visual, 12.0);
        for _ in 0..4 {
            now += FAST_PERIOD;
            fast_tick(&mut ctx, &mut host, now);
        }
        assert_eq!(ctx.poll.track_changes, 1);
        assert_eq!(host.media(visual).unwrap().current_time, 12.0);

        let title = host.find(r#"[data-test-id="PLAYER_TITLE"]"#).unwrap();
        host.set_text(title, "Second Song (Live)");
        now += FAST_PERIOD;
        fast_tick(&mut ctx, &mut host, now);
        assert_eq!(ctx.poll.track_changes, 2);
        assert_eq!(ctx.poll.last_track_change, Some(now));
        assert_eq!(host.media(visual).unwrap().current_time, 0.0);
        // rebound in the same tick, still a single listener
        assert_eq!(host.subscriptions_on(pulse_node(&host)).len(), 1);

        host.set_current_time(visual, 3.0);
        for _ in 0..4 {
            now += FAST_PERIOD;
            fast_tick(&mut ctx, &mut host, now);
        }
        assert_eq!(ctx.poll.track_changes, 2);
        assert_eq!(host.media(visual).unwrap().current_time, 3.0);
    }

    #[test]
    fn test_overlay_gating_and_reappearance() {
        let (mut ctx, mut host, mut now) = setup();
        slow_tick(&mut ctx, &mut host, None, now);
        assert!(ctx.overlay.is_mounted(&host));

        let modal = host.create_element("div", "settings-dialog");
        host.set_attribute(modal, "role", "dialog");
        host.append_to_body(modal);
        now += FAST_PERIOD;
        fast_tick(&mut ctx, &mut host, now);
        assert!(!ctx.overlay.is_mounted(&host));
        assert!(host.element_by_id(VISUAL_ID).is_none());
        assert!(host.element_by_id(MOUNT_ID).is_none());

        host.remove(modal);
        now += FAST_PERIOD;
        fast_tick(&mut ctx, &mut host, now);
        assert!(!ctx.overlay.is_mounted(&host));
        now += SLOW_PERIOD;
        slow_tick(&mut ctx, &mut host, None, now);
        assert!(ctx.overlay.is_mounted(&host));

        ctx.settings.enabled = false;
        now += FAST_PERIOD;
        fast_tick(&mut ctx, &mut host, now);
        assert!(!ctx.overlay.is_mounted(&host));
        now += SLOW_PERIOD;
        slow_tick(&mut ctx, &mut host, None, now);
        assert!(!ctx.overlay.is_mounted(&host));

        ctx.settings.enabled = true;
        now += SLOW_PERIOD;
        slow_tick(&mut ctx, &mut host, None, now);
        assert!(ctx.overlay.is_mounted(&host));
    }

    #[test]
    fn test_fast_tick_drops_overlay_without_anchor() {
        let (mut ctx, mut host, now) = setup();
        slow_tick(&mut ctx, &mut host, None, now);
        let mount = host.element_by_id(MOUNT_ID).unwrap();
        assert_eq!(host.inline_style(mount, "left").as_deref(), Some("242px"));

        let like = host.find(r#"[data-test-id="LIKE_BUTTON"]"#).unwrap();
        host.detach_node(like);
        fast_tick(&mut ctx, &mut host, now + FAST_PERIOD);
        assert!(!ctx.overlay.is_mounted(&host));
    }

    #[test]
    fn test_debug_log_throttled_at_fast_cadence() {
        let (mut ctx, mut host, start) = setup();
        slow_tick(&mut ctx, &mut host, None, start);

        let mut emitted = Vec::new();
        for i in 0..40u32 {
            let now = start + FAST_PERIOD * i;
            if let Some(line) = fast_tick(&mut ctx, &mut host, now) {
                emitted.push((now, line));
            }
        }
        assert_eq!(emitted.len(), 5);
        for pair in emitted.windows(2) {
            assert!(pair[1].0.duration_since(pair[0].0) >= DEBUG_LOG_INTERVAL);
        }
        let (_, line) = &emitted[0];
        assert!(line.playing);
        assert_eq!(line.rate, Some(1.0));
        assert_eq!(line.pulse_duration_ms, Some(600.0));

        ctx.options.debug_log = false;
        assert!(fast_tick(&mut ctx, &mut host, start + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_pulse_events_resync_only_from_live_binding() {
        let (mut ctx, mut host, now) = setup();
        slow_tick(&mut ctx, &mut host, None, now);
        let visual = ctx.overlay.visual(&host).unwrap();
        let pulse = pulse_node(&host);

        host.set_playback_rate(visual, 2.0);
        host.pause(visual);
        let events = host.fire(pulse, EventKind::AnimationIteration);
        assert_eq!(events.len(), 1);

        ctx.settings.follow_pulse = false;
        handle_event(&mut ctx, &mut host, &events[0]);
        assert!(host.media(visual).unwrap().paused);

        ctx.settings.follow_pulse = true;
        host.detach_node(pulse);
        handle_event(&mut ctx, &mut host, &events[0]);
        assert!(host.media(visual).unwrap().paused);
        assert_eq!(host.playback_rate(visual), Some(2.0));

        let bar = host.find(r#"[data-test-id="PLAYER_BAR"]"#).unwrap();
        host.append_child(bar, pulse);
        handle_event(&mut ctx, &mut host, &events[0]);
        assert!(!host.media(visual).unwrap().paused);
        assert_eq!(host.playback_rate(visual), Some(1.0));
    }

    #[test]
    fn test_media_events_drive_play_state() {
        let (mut ctx, mut host, now) = setup();
        slow_tick(&mut ctx, &mut host, None, now);
        let visual = ctx.overlay.visual(&host).unwrap();
        let audio = host.find("audio").unwrap();
        let button = host
            .find(r#"[data-test-id="PLAYER_PLAY_PAUSE_BUTTON"]"#)
            .unwrap();

        host.set_attribute(button, "aria-label", "Play");
        host.set_media_status(audio, true, false);
        for event in host.fire(audio, EventKind::Pause) {
            handle_event(&mut ctx, &mut host, &event);
        }
        assert!(host.media(visual).unwrap().paused);

        host.set_attribute(button, "aria-label", "Pause");
        for event in host.fire(audio, EventKind::Seeking) {
            handle_event(&mut ctx, &mut host, &event);
        }
        assert!(!host.media(visual).unwrap().paused);
    }
}
