/// SchedulerCore: single-owner event loop for the sync engine.
///
/// Two ticker tasks feed `SchedulerEvent`s into this loop.  The slow tick
/// only starts a settings fetch; the overlay pass runs when the fetch result
/// comes back as `SettingsFetched`, so a slow handle delays that pass without
/// blocking the fast cadence.  Fetches are not deduplicated: results are
/// applied in arrival order.
///
/// The host is the in-memory page.  With a fixture configured, the page is
/// re-read whenever the file changes and its infinite animations are stepped
/// in real time so bound pulse nodes emit iteration events.
///
/// After every event the core publishes a `StatusSnapshot` on a watch
/// channel for the status API.
use std::time::Duration;

use catjam_engine::memory::MemoryHost;
use catjam_engine::scheduler::{fast_tick, handle_event, slow_tick};
use catjam_engine::{EngineOptions, SyncContext};
use catjam_proto::config::{Config, SettingsSourceConfig};
use catjam_proto::settings::SettingsMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::fixture::FixtureWatcher;
use crate::settings_client;
use crate::status::{StatusSnapshot, WarningLog};

// ── SchedulerEvent ────────────────────────────────────────────────────────────

/// All inputs into the SchedulerCore loop.
#[derive(Debug)]
pub enum SchedulerEvent {
    /// Slow cadence: start a settings fetch.
    SlowTick,
    /// Fast cadence: gating, placement and play/pause upkeep.
    FastTick,
    /// A settings fetch finished; `None` when it failed.
    SettingsFetched(Option<SettingsMap>),
    /// Shutdown requested.
    Shutdown,
}

// ── SchedulerCore ─────────────────────────────────────────────────────────────

pub struct SchedulerCore {
    ctx: SyncContext,
    host: MemoryHost,
    fixture: Option<FixtureWatcher>,
    /// Set while the fixture cannot be read, so the warning is logged once.
    fixture_failing: bool,
    source: SettingsSourceConfig,
    client: reqwest::Client,
    slow_period: Duration,
    fast_period: Duration,
    /// When animations were last stepped.
    last_frame: Option<Instant>,
    event_tx: mpsc::Sender<SchedulerEvent>,
    status_tx: watch::Sender<StatusSnapshot>,
    warnings: WarningLog,
}

impl SchedulerCore {
    pub fn new(
        config: &Config,
        event_tx: mpsc::Sender<SchedulerEvent>,
        status_tx: watch::Sender<StatusSnapshot>,
        warnings: WarningLog,
    ) -> Self {
        let mut core = Self {
            ctx: SyncContext::new(EngineOptions::from_config(config)),
            host: MemoryHost::new(),
            fixture: config.host.fixture.clone().map(FixtureWatcher::new),
            fixture_failing: false,
            source: config.settings.clone(),
            client: reqwest::Client::new(),
            slow_period: Duration::from_millis(config.scheduler.slow_interval_ms.max(1)),
            fast_period: Duration::from_millis(config.scheduler.fast_interval_ms.max(1)),
            last_frame: None,
            event_tx,
            status_tx,
            warnings,
        };
        core.reload_fixture();
        core
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or the event channel is closed.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<SchedulerEvent>) -> anyhow::Result<()> {
        info!(
            "SchedulerCore: starting (slow {:?}, fast {:?})",
            self.slow_period, self.fast_period
        );

        let tickers = [
            spawn_ticker(self.event_tx.clone(), self.slow_period, || SchedulerEvent::SlowTick),
            spawn_ticker(self.event_tx.clone(), self.fast_period, || SchedulerEvent::FastTick),
        ];

        loop {
            match event_rx.recv().await {
                None => {
                    info!("SchedulerCore: event channel closed, shutting down");
                    break;
                }
                Some(SchedulerEvent::Shutdown) => {
                    info!("SchedulerCore: shutdown requested");
                    break;
                }
                Some(evt) => self.handle(evt),
            }
        }

        for ticker in tickers {
            ticker.abort();
        }
        self.ctx.overlay.remove(&mut self.host);
        self.publish();
        Ok(())
    }

    pub fn handle(&mut self, evt: SchedulerEvent) {
        match evt {
            SchedulerEvent::SlowTick => self.spawn_fetch(),
            SchedulerEvent::SettingsFetched(fresh) => {
                self.reload_fixture();
                slow_tick(&mut self.ctx, &mut self.host, fresh.as_ref(), now());
            }
            SchedulerEvent::FastTick => {
                self.reload_fixture();
                self.step_animations();
                fast_tick(&mut self.ctx, &mut self.host, now());
            }
            SchedulerEvent::Shutdown => {}
        }
        self.publish();
    }

    fn spawn_fetch(&self) {
        let client = self.client.clone();
        let source = self.source.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let fresh = settings_client::fetch_or_keep(&client, &source).await;
            if tx.send(SchedulerEvent::SettingsFetched(fresh)).await.is_err() {
                debug!("SchedulerCore: loop gone, dropping settings result");
            }
        });
    }

    fn reload_fixture(&mut self) {
        let Some(watcher) = self.fixture.as_mut() else {
            return;
        };
        match watcher.poll() {
            Ok(Some(fixture)) => {
                info!("fixture: loaded {:?}", watcher.path());
                self.host.apply_fixture(&fixture);
                self.fixture_failing = false;
            }
            Ok(None) => {}
            Err(e) => {
                if !self.fixture_failing {
                    warn!("fixture: {:#}", e);
                }
                self.fixture_failing = true;
            }
        }
    }

    /// Step the page's animations by the wall time since the last step and
    /// dispatch the iteration events that became due.
    fn step_animations(&mut self) {
        let now = Instant::now();
        let elapsed = self
            .last_frame
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        if elapsed.is_zero() {
            return;
        }
        for event in self.host.advance_animations(elapsed.as_secs_f64() * 1000.0) {
            handle_event(&mut self.ctx, &mut self.host, &event);
        }
    }

    fn publish(&self) {
        self.status_tx
            .send_replace(StatusSnapshot::capture(self.ctx.status(&self.host), &self.warnings));
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

fn spawn_ticker(
    tx: mpsc::Sender<SchedulerEvent>,
    period: Duration,
    make: fn() -> SchedulerEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tx.send(make()).await.is_err() {
                break;
            }
        }
    })
}
