//! Online/offline change detection for watched players.

use std::collections::{HashMap, HashSet};

use crate::config::PlayerName;

/// A change of online state for one watched player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub player: PlayerName,
    pub became_online: bool,
}

/// Last-known online state of every watched player.
///
/// The first observation of a player only records a baseline: a process that
/// just started has no way to tell whether a player already online "became"
/// online.
#[derive(Debug)]
pub struct PresenceTracker {
    watched: Vec<PlayerName>,
    state: HashMap<PlayerName, bool>,
}

impl PresenceTracker {
    pub fn new(watched: Vec<PlayerName>) -> Self {
        Self {
            watched,
            state: HashMap::new(),
        }
    }

    pub fn watched(&self) -> &[PlayerName] {
        &self.watched
    }

    /// Compare a fresh roster against the stored state and return the
    /// transitions, in watch-list order.
    pub fn observe(&mut self, roster: &HashSet<String>) -> Vec<Transition> {
        let mut transitions = Vec::new();

        for player in &self.watched {
            let is_online = roster.contains(player.as_str());
            match self.state.insert(*player, is_online) {
                Some(was_online) if was_online != is_online => transitions.push(Transition {
                    player: *player,
                    became_online: is_online,
                }),
                _ => {}
            }
        }

        transitions
    }

    /// Last observed state, `None` before the first observation.
    pub fn is_online(&self, player: &PlayerName) -> Option<bool> {
        self.state.get(player).copied()
    }

    /// Watched players seen online at the last observation.
    pub fn online(&self) -> Vec<PlayerName> {
        self.partition(true)
    }

    /// Watched players seen offline (or not yet observed).
    pub fn offline(&self) -> Vec<PlayerName> {
        self.partition(false)
    }

    fn partition(&self, online: bool) -> Vec<PlayerName> {
        self.watched
            .iter()
            .filter(|p| self.state.get(*p).copied().unwrap_or(false) == online)
            .copied()
            .collect()
    }
}
