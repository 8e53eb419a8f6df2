//! Periodic request to our own public address so the host does not put the
//! service to sleep.

use std::time::Duration;

use reqwest::Client;
use tokio::time::MissedTickBehavior;

/// Add an `https://` scheme when the configured address has none.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

pub async fn self_ping_loop(http: Client, url: String, interval: Duration) {
    let url = normalize_url(&url);
    tracing::info!(url = %url, "self-ping enabled");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the listener may not be up yet.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match http.get(&url).send().await {
            Ok(response) => tracing::info!(status = %response.status(), "self-ping"),
            Err(e) => tracing::warn!(error = %e, "self-ping failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("lookout.onrender.com"), "https://lookout.onrender.com");
        assert_eq!(normalize_url("http://localhost:3000"), "http://localhost:3000");
        assert_eq!(normalize_url("https://lookout.onrender.com"), "https://lookout.onrender.com");
    }
}
