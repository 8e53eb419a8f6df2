//! Short-lived cache of player grades.
//!
//! Grades change rarely but the lookup goes over the network, so each one is
//! reused for a freshness window. When the lookup fails the last known grade is
//! served, however old.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Grade shown when a player was never successfully looked up.
pub const UNKNOWN_GRADE: &str = "Unknown";

/// Something that can look up a player's grade.
pub trait GradeSource: Send + Sync {
    fn fetch_grade(&self, player: &str) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeCacheEntry {
    pub rank: String,
    /// Unix timestamp (ms) of the successful lookup
    pub fetched_at: i64,
}

#[derive(Debug)]
pub struct GradeCache {
    entries: HashMap<String, GradeCacheEntry>,
    freshness_ms: i64,
}

impl GradeCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            freshness_ms: freshness.as_millis() as i64,
        }
    }

    /// Grade of `player` at `now` (ms). Never fails: falls back to the stale
    /// entry, then to [`UNKNOWN_GRADE`].
    pub async fn get_grade<S: GradeSource>(&mut self, source: &S, player: &str, now: i64) -> String {
        if let Some(entry) = self.entries.get(player) {
            if now - entry.fetched_at < self.freshness_ms {
                return entry.rank.clone();
            }
        }

        match source.fetch_grade(player).await {
            Ok(rank) => {
                self.entries.insert(
                    player.to_string(),
                    GradeCacheEntry {
                        rank: rank.clone(),
                        fetched_at: now,
                    },
                );
                rank
            }
            Err(e) => match self.entries.get(player) {
                Some(entry) => {
                    tracing::warn!(player = %player, error = %e, "grade lookup failed, serving stale grade");
                    entry.rank.clone()
                }
                None => {
                    tracing::warn!(player = %player, error = %e, "grade lookup failed");
                    UNKNOWN_GRADE.to_string()
                }
            },
        }
    }

    /// Drop entries older than twice the freshness window. Returns how many
    /// were removed.
    pub fn sweep(&mut self, now: i64) -> usize {
        let max_age = self.freshness_ms * 2;
        let before = self.entries.len();
        self.entries.retain(|_, entry| now - entry.fetched_at <= max_age);
        before - self.entries.len()
    }

    pub fn get(&self, player: &str) -> Option<&GradeCacheEntry> {
        self.entries.get(player)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
