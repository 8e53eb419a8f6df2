//! Nation roster polling loop.
//!
//! Independent from the player scanner: it keeps its own status message and a
//! grade cache, and only shares the HTTP client and webhook with it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::DateTime;
use chrono_tz::Tz;
use lookout_db::KeyValueStore;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::dynmap::DynmapClient;
use crate::error::{Result, ScanError};
use crate::grades::{GradeCache, GradeSource};
use crate::helpers::local_now;
use crate::report::{NationReport, nation_embed};
use crate::webhook::{StatusBoard, WebhookClient};

pub const NATION_MESSAGE_KEY: &str = "message:nations";

#[derive(Debug, Clone, Deserialize)]
pub struct Nation {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Deserialize)]
struct PlayerGrade {
    grade: String,
}

/// Client for the nation API: rosters and grades.
#[derive(Clone)]
pub struct NationApi {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NationApi {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub async fn fetch_nation(&self, name: &str) -> Result<Nation> {
        let response = self
            .http
            .get(format!("{}/nations/{}", self.base_url, name))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ScanError::from_response(response).await);
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl GradeSource for NationApi {
    async fn fetch_grade(&self, player: &str) -> Result<String> {
        let mut request = self
            .http
            .get(format!("{}/players/{}", self.base_url, player));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ScanError::from_response(response).await);
        }
        let body = response.bytes().await?;
        let grade: PlayerGrade = serde_json::from_slice(&body)?;
        Ok(grade.grade)
    }
}

pub struct NationScanner<S> {
    dynmap: DynmapClient,
    api: NationApi,
    nations: Vec<String>,
    cache: GradeCache,
    board: StatusBoard<S>,
    timezone: Tz,
    sweep_interval: Duration,
    last_sweep: Instant,
}

impl<S: KeyValueStore> NationScanner<S> {
    pub async fn new(
        dynmap: DynmapClient,
        api: NationApi,
        nations: Vec<String>,
        grade_freshness: Duration,
        timezone: Tz,
        webhook: Arc<WebhookClient>,
        store: Arc<S>,
    ) -> Self {
        let board = StatusBoard::load(webhook, store, NATION_MESSAGE_KEY).await;
        Self {
            dynmap,
            api,
            nations,
            cache: GradeCache::new(grade_freshness),
            board,
            timezone,
            sweep_interval: grade_freshness * 2,
            last_sweep: Instant::now(),
        }
    }

    pub fn cache(&self) -> &GradeCache {
        &self.cache
    }

    pub fn board(&self) -> &StatusBoard<S> {
        &self.board
    }

    /// Build the report for every watched nation. A nation whose roster
    /// cannot be fetched is reported as unavailable.
    pub async fn collect(&mut self, roster: &HashSet<String>, now: &DateTime<Tz>) -> Vec<NationReport> {
        let now_ms = now.timestamp_millis();
        let mut reports = Vec::with_capacity(self.nations.len());

        for name in &self.nations {
            let nation = match self.api.fetch_nation(name).await {
                Ok(nation) => nation,
                Err(e) => {
                    tracing::error!(nation = %name, error = %e, "failed to fetch nation");
                    reports.push(NationReport {
                        name: name.clone(),
                        online: None,
                        member_count: 0,
                    });
                    continue;
                }
            };

            let mut online_members: Vec<&String> =
                nation.members.iter().filter(|m| roster.contains(*m)).collect();
            online_members.sort();

            let mut online = Vec::with_capacity(online_members.len());
            for member in online_members {
                let grade = self.cache.get_grade(&self.api, member, now_ms).await;
                online.push((member.clone(), grade));
            }

            reports.push(NationReport {
                name: nation.name.clone(),
                online: Some(online),
                member_count: nation.members.len(),
            });
        }

        reports
    }

    pub async fn tick(&mut self, now: DateTime<Tz>) -> Result<()> {
        let world = self.dynmap.fetch_world().await?;
        let reports = self.collect(&world.roster(), &now).await;

        let embed = nation_embed(&reports, &now);
        if let Err(e) = self.board.publish(&embed).await {
            tracing::error!(error = %e, "failed to publish nation status");
        }

        if self.last_sweep.elapsed() >= self.sweep_interval {
            let removed = self.cache.sweep(now.timestamp_millis());
            if removed > 0 {
                tracing::debug!(removed, "swept grade cache");
            }
            self.last_sweep = Instant::now();
        }

        tracing::info!(nations = reports.len(), "nation scan complete");
        Ok(())
    }

    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(local_now(self.timezone)).await {
                        tracing::error!(error = %e, "nation scan failed");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("nation scanner stopped");
                    return;
                }
            }
        }
    }
}
