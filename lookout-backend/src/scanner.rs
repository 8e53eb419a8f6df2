//! Roster polling loop.
//!
//! Each tick fetches the dynmap world, feeds the roster to the presence
//! tracker, records sessions for the resulting transitions and refreshes the
//! status message.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::DateTime;
use chrono_tz::Tz;
use lookout_db::KeyValueStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::dynmap::{DynmapClient, WorldSnapshot};
use crate::error::Result;
use crate::helpers::{format_duration, format_game_time, local_now};
use crate::predict::{predict_disconnection, predict_next_connection};
use crate::presence::{PresenceTracker, Transition};
use crate::report::{OfflineEntry, OnlineEntry, StatusReport, status_embed, transition_embed};
use crate::sessions::SessionRecorder;
use crate::webhook::{StatusBoard, WebhookClient, dispatch_alert};

pub const STATUS_MESSAGE_KEY: &str = "message:status";

pub struct Scanner<S> {
    dynmap: DynmapClient,
    webhook: Arc<WebhookClient>,
    store: Arc<S>,
    board: StatusBoard<S>,
    tracker: PresenceTracker,
    recorder: SessionRecorder,
    timezone: Tz,
    refresh_label: String,
    alerts: bool,
    flush_interval: Duration,
    last_flush: Instant,
}

impl<S: KeyValueStore> Scanner<S> {
    /// Build a scanner, restoring session histories and the status message id
    /// from `store`.
    pub async fn new(
        config: &Config,
        dynmap: DynmapClient,
        webhook: Arc<WebhookClient>,
        store: Arc<S>,
    ) -> Self {
        let recorder = SessionRecorder::load(store.as_ref(), &config.watch_list).await;
        let board = StatusBoard::load(webhook.clone(), store.clone(), STATUS_MESSAGE_KEY).await;

        Self {
            dynmap,
            webhook,
            store,
            board,
            tracker: PresenceTracker::new(config.watch_list.clone()),
            recorder,
            timezone: config.timezone,
            refresh_label: format_duration(config.check_interval.as_millis() as i64),
            alerts: true,
            flush_interval: config.history_flush_interval,
            last_flush: Instant::now(),
        }
    }

    /// Disable per-transition alert messages.
    pub fn without_alerts(mut self) -> Self {
        self.alerts = false;
        self
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn board(&self) -> &StatusBoard<S> {
        &self.board
    }

    /// Run one full scan: fetch, detect, record, publish.
    pub async fn tick(&mut self, now: DateTime<Tz>) -> Result<Vec<Transition>> {
        let world = self.dynmap.fetch_world().await?;
        let transitions = self.apply(&world, &now).await;

        let embed = status_embed(&self.report(&world, now));
        if let Err(e) = self.board.publish(&embed).await {
            tracing::error!(error = %e, "failed to publish status");
        }

        if self.last_flush.elapsed() >= self.flush_interval {
            self.recorder.save_all(self.store.as_ref()).await;
            self.last_flush = Instant::now();
            tracing::debug!("session histories flushed");
        }

        tracing::info!(
            online = self.tracker.online().len(),
            watched = self.tracker.watched().len(),
            transitions = transitions.len(),
            "scan complete"
        );
        Ok(transitions)
    }

    /// Feed a roster to the tracker and recorder. Closed sessions are persisted
    /// immediately.
    pub async fn apply(&mut self, world: &WorldSnapshot, now: &DateTime<Tz>) -> Vec<Transition> {
        let transitions = self.tracker.observe(&world.roster());

        for transition in &transitions {
            let closed = self
                .recorder
                .on_transition(transition.player, transition.became_online, now);

            if transition.became_online {
                tracing::info!(player = %transition.player, "player connected");
            } else {
                tracing::info!(player = %transition.player, "player disconnected");
            }

            if let Some(session) = &closed {
                self.recorder.save(self.store.as_ref(), &transition.player).await;
                tracing::info!(
                    player = %transition.player,
                    duration = %format_duration(session.duration_ms),
                    "session recorded"
                );
            }

            if self.alerts {
                let embed = transition_embed(
                    &transition.player,
                    transition.became_online,
                    closed.as_ref().map(|s| s.duration_ms),
                    now,
                );
                dispatch_alert(self.webhook.clone(), embed);
            }
        }

        transitions
    }

    /// Status summary annotated with session lengths and predictions.
    pub fn report(&self, world: &WorldSnapshot, now: DateTime<Tz>) -> StatusReport {
        let now_ms = now.timestamp_millis();

        let online = self
            .tracker
            .online()
            .into_iter()
            .map(|player| {
                let history = self.recorder.history(&player);
                OnlineEntry {
                    player,
                    session_ms: self
                        .recorder
                        .open_session(&player)
                        .map(|s| now_ms - s.start),
                    disconnection: history.and_then(|h| predict_disconnection(h, &now)),
                }
            })
            .collect();

        let offline = self
            .tracker
            .offline()
            .into_iter()
            .map(|player| OfflineEntry {
                player,
                next_connection: self
                    .recorder
                    .history(&player)
                    .and_then(|h| predict_next_connection(h, &now)),
            })
            .collect();

        StatusReport {
            total_online: world.total_online(),
            game_time: format_game_time(world.servertime),
            scanned_at: now,
            refresh_label: self.refresh_label.clone(),
            online,
            offline,
        }
    }

    /// Persist every history, used on shutdown.
    pub async fn flush(&self) {
        self.recorder.save_all(self.store.as_ref()).await;
    }

    /// Poll until `shutdown` fires. A tick runs to completion before the next
    /// one starts; failed ticks are logged and retried at the next interval.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(local_now(self.timezone)).await {
                        tracing::error!(error = %e, "scan failed");
                    }
                }
                _ = shutdown.changed() => {
                    self.flush().await;
                    tracing::info!("scanner stopped, session histories flushed");
                    return;
                }
            }
        }
    }
}
