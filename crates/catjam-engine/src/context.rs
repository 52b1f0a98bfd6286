//! All mutable engine state, owned by whoever runs the scheduler.

use std::time::Duration;

use catjam_proto::config::Config;
use catjam_proto::settings::Settings;
use serde::Serialize;

use crate::host::Host;
use crate::overlay::{self, OverlayState};
use crate::playback::{self, MediaBinding};
use crate::pulse::PulseBinding;
use crate::scheduler::PollState;
use crate::track::TrackState;

/// Static knobs taken from the daemon config.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub default_asset_url: String,
    pub debug_log: bool,
    pub debug_log_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_asset_url: "catjam.webm".to_string(),
            debug_log: true,
            debug_log_interval: crate::scheduler::DEBUG_LOG_INTERVAL,
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_asset_url: config.overlay.default_asset_url.clone(),
            debug_log: config.scheduler.debug_log,
            debug_log_interval: Duration::from_millis(config.scheduler.debug_log_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    pub settings: Settings,
    pub pulse: PulseBinding,
    pub media: MediaBinding,
    pub track: TrackState,
    pub overlay: OverlayState,
    pub poll: PollState,
    pub options: EngineOptions,
}

/// Point-in-time view for the status API.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStatus {
    pub settings: Settings,
    pub playing: bool,
    pub playback_rate: Option<f64>,
    pub pulse_found: bool,
    pub pulse_duration_ms: Option<f64>,
    pub track_key: Option<String>,
    pub track_changes: u64,
    pub overlay_mounted: bool,
    pub fallback_shown: bool,
    pub failed_asset: Option<String>,
}

impl SyncContext {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            poll: PollState::new(options.debug_log_interval),
            options,
            ..Default::default()
        }
    }

    pub fn status<H: Host>(&self, host: &H) -> EngineStatus {
        let visual = self.overlay.visual(host);
        EngineStatus {
            settings: self.settings.clone(),
            playing: playback::is_audio_playing(host, self.overlay.visual_node()),
            playback_rate: visual.and_then(|v| host.playback_rate(v)),
            pulse_found: self.pulse.node().is_some(),
            pulse_duration_ms: self.pulse.duration_ms(host),
            track_key: self.track.current().map(str::to_string),
            track_changes: self.poll.track_changes,
            overlay_mounted: visual.is_some(),
            fallback_shown: self.overlay.fallback_shown(host),
            failed_asset: self.overlay.failed_asset().map(str::to_string),
        }
    }

    /// Rate the visual should play at under the current settings.
    pub fn target_rate(&self) -> f64 {
        overlay::playback_rate(&self.settings)
    }
}
