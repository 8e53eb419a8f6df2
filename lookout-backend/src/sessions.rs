//! Session bookkeeping for watched players.
//!
//! A session opens when a player is seen coming online and closes when they are
//! seen leaving. Closed sessions are kept per player, most recent last, and
//! persisted as JSON through a [`KeyValueStore`].

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;
use lookout_db::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::config::PlayerName;

/// Maximum number of closed sessions kept per player.
pub const HISTORY_CAP: usize = 100;

/// One contiguous online interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unix timestamp (ms) of the connection
    pub start: i64,
    /// Unix timestamp (ms) of the disconnection, `None` while open
    pub end: Option<i64>,
    /// Local hour of the connection (0-23)
    pub start_hour: u32,
    /// Local weekday of the connection, Sunday = 0
    pub start_day: u32,
    pub duration_ms: i64,
}

impl Session {
    fn open_at(now: &DateTime<Tz>) -> Self {
        Self {
            start: now.timestamp_millis(),
            end: None,
            start_hour: now.hour(),
            start_day: now.weekday().num_days_from_sunday(),
            duration_ms: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Closed sessions of one player plus the session in progress, if any.
///
/// Only closed sessions are persisted: an open session restored after a
/// restart would span the downtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub closed: VecDeque<Session>,
    #[serde(skip)]
    pub open: Option<Session>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_closed(&mut self, session: Session) {
        self.closed.push_back(session);
        while self.closed.len() > HISTORY_CAP {
            self.closed.pop_front();
        }
    }

    /// Decode a persisted history. Corrupt data yields an empty history.
    pub fn decode(player: &str, raw: &str) -> Self {
        match serde_json::from_str::<SessionHistory>(raw) {
            Ok(mut history) => {
                history.closed.retain(|s| !s.is_open());
                while history.closed.len() > HISTORY_CAP {
                    history.closed.pop_front();
                }
                history
            }
            Err(e) => {
                tracing::warn!(player = %player, error = %e, "discarding corrupt session history");
                Self::new()
            }
        }
    }
}

pub const HISTORY_KEY_PREFIX: &str = "sessions:";

pub fn history_key(player: &str) -> String {
    format!("{}{}", HISTORY_KEY_PREFIX, player)
}

/// Players with a stored history who are no longer on the watch list.
pub fn unwatched_histories<'a>(keys: &'a [String], watched: &[PlayerName]) -> Vec<&'a str> {
    keys.iter()
        .filter_map(|key| key.strip_prefix(HISTORY_KEY_PREFIX))
        .filter(|player| !watched.iter().any(|w| w.as_str() == *player))
        .collect()
}

/// Per-player session histories.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    histories: HashMap<PlayerName, SessionHistory>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transition. Returns the session that was just closed, if any.
    ///
    /// Coming online while a session is open, or going offline without one,
    /// changes nothing.
    pub fn on_transition(
        &mut self,
        player: PlayerName,
        became_online: bool,
        now: &DateTime<Tz>,
    ) -> Option<Session> {
        let history = self.histories.entry(player).or_default();

        if became_online {
            if history.open.is_none() {
                history.open = Some(Session::open_at(now));
                tracing::debug!(player = %player, "session opened");
            }
            return None;
        }

        let mut session = history.open.take()?;
        let end = now.timestamp_millis();
        session.end = Some(end);
        session.duration_ms = end - session.start;
        history.push_closed(session.clone());
        tracing::debug!(player = %player, duration_ms = session.duration_ms, "session closed");
        Some(session)
    }

    pub fn history(&self, player: &PlayerName) -> Option<&SessionHistory> {
        self.histories.get(player)
    }

    /// Session in progress for `player`.
    pub fn open_session(&self, player: &PlayerName) -> Option<&Session> {
        self.histories.get(player).and_then(|h| h.open.as_ref())
    }

    /// Load persisted histories for `players`. Read failures leave the player
    /// with an empty history.
    pub async fn load<S: KeyValueStore>(store: &S, players: &[PlayerName]) -> Self {
        let mut recorder = Self::new();
        for player in players {
            let history = match store.get(&history_key(player)).await {
                Ok(Some(raw)) => SessionHistory::decode(player, &raw),
                Ok(None) => SessionHistory::new(),
                Err(e) => {
                    tracing::error!(player = %player, error = %e, "failed to read session history");
                    SessionHistory::new()
                }
            };
            recorder.histories.insert(*player, history);
        }
        recorder
    }

    /// Persist one player's history. Errors are logged, never returned.
    pub async fn save<S: KeyValueStore>(&self, store: &S, player: &PlayerName) {
        let Some(history) = self.histories.get(player) else {
            return;
        };
        let raw = match serde_json::to_string(history) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(player = %player, error = %e, "failed to encode session history");
                return;
            }
        };
        if let Err(e) = store.set(&history_key(player), raw).await {
            tracing::error!(player = %player, error = %e, "failed to persist session history");
        }
    }

    /// Persist every history.
    pub async fn save_all<S: KeyValueStore>(&self, store: &S) {
        for player in self.histories.keys() {
            self.save(store, player).await;
        }
    }
}
