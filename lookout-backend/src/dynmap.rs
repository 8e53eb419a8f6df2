//! Dynmap roster source.

use std::collections::HashSet;

use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, ScanError};

#[derive(Debug, Clone, Deserialize)]
pub struct DynmapPlayer {
    pub name: String,
}

/// Subset of `dynmap_world.json` the scanner reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub players: Vec<DynmapPlayer>,
    #[serde(default)]
    pub currentcount: Option<u32>,
    /// World clock in ticks
    #[serde(default)]
    pub servertime: i64,
}

impl WorldSnapshot {
    pub fn roster(&self) -> HashSet<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    /// Total players online as reported by the server, falling back to the
    /// roster length.
    pub fn total_online(&self) -> u32 {
        match self.currentcount {
            Some(count) if count > 0 => count,
            _ => self.players.len() as u32,
        }
    }
}

#[derive(Clone)]
pub struct DynmapClient {
    http: Client,
    url: String,
}

impl DynmapClient {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub async fn fetch_world(&self) -> Result<WorldSnapshot> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ScanError::from_response(response).await);
        }
        let body = response.bytes().await?;
        let snapshot = serde_json::from_slice(&body)?;
        Ok(snapshot)
    }
}
