use std::sync::Arc;

use lookout_backend::config::Config;
use lookout_backend::dynmap::DynmapClient;
use lookout_backend::keepalive::self_ping_loop;
use lookout_backend::nations::{NationApi, NationScanner};
use lookout_backend::scanner::Scanner;
use lookout_backend::sessions::{HISTORY_KEY_PREFIX, unwatched_histories};
use lookout_backend::webhook::WebhookClient;
use lookout_backend::{build_http_client, create_app};
use lookout_db::Database;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting Lookout scanner...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!(
        "Configuration: port={}, db_path={}, interval={}ms, watched={}, timezone={}, timeout={}s",
        config.port,
        config.database_path,
        config.check_interval.as_millis(),
        config.watch_list.len(),
        config.timezone,
        config.request_timeout.as_secs()
    );

    let db = Arc::new(Database::open(&config.database_path).await?);
    let stored = db.keys_with_prefix(HISTORY_KEY_PREFIX.to_string()).await?;
    tracing::info!("{} stored session histories", stored.len());
    for player in unwatched_histories(&stored, &config.watch_list) {
        tracing::warn!("Stored history for {} who is no longer watched", player);
    }

    let http = build_http_client(config.request_timeout)?;
    let webhook = Arc::new(WebhookClient::new(
        http.clone(),
        config.webhook_url.clone(),
        config.webhook_min_delay,
    ));
    let dynmap = DynmapClient::new(http.clone(), config.dynmap_url.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scanner = Scanner::new(&config, dynmap.clone(), webhook.clone(), db.clone()).await;
    let mut scanner_task = tokio::spawn(scanner.run(config.check_interval, shutdown_rx.clone()));
    tracing::info!("Scanner: watching {} players", config.watch_list.len());

    if config.nations_enabled() {
        let api = NationApi::new(
            http.clone(),
            config.nation_api_url.clone().unwrap_or_default(),
            config.nation_api_key.clone(),
        );
        let nations = NationScanner::new(
            dynmap,
            api,
            config.watch_nations.clone(),
            config.grade_freshness,
            config.timezone,
            webhook.clone(),
            db.clone(),
        )
        .await;
        tokio::spawn(nations.run(config.nation_interval, shutdown_rx.clone()));
        tracing::info!("Nation watch: {} nations", config.watch_nations.len());
    }

    if let Some(url) = config.public_url.clone() {
        tokio::spawn(self_ping_loop(http.clone(), url, config.self_ping_interval));
    }

    let app = create_app(config.request_timeout);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let mut scanner_running = true;
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("Axum server error: {}", e);
            }
        }
        result = &mut scanner_task => {
            scanner_running = false;
            if let Err(e) = result {
                tracing::error!("Scanner task stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    // Let the scanner write its histories before exiting
    let _ = shutdown_tx.send(true);
    if scanner_running {
        if let Err(e) = scanner_task.await {
            tracing::error!("Scanner task stopped: {}", e);
        }
    }

    Ok(())
}
