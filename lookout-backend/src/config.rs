use std::env::var;
use std::time::Duration;

use arrayvec::ArrayString;
use chrono_tz::Tz;
use dotenvy::dotenv;

use crate::error::ScanError;
use crate::validation::{validate_nation_name, validate_player_name, validate_watch_list_size};

/// Minecraft player name - max 16 characters, stored inline.
pub type PlayerName = ArrayString<16>;

const DEFAULT_DYNMAP_URL: &str = "https://lime.nationsglory.fr/standalone/dynmap_world.json";

const DEFAULT_WATCH_LIST: &[&str] = &[
    "Canisi",
    "Darkholess",
    "UFO_Thespoot",
    "firecharge94",
    "Franky753",
    "Blakonne",
    "Thepainx31x",
    "Farsgame",
    "ClashKiller78",
    "Olmat38",
    "AstaPatate",
];

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Health listener port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Database file path
    /// Env: DATABASE_PATH (default: "lookout.db")
    pub database_path: String,

    /// Dynmap world endpoint polled for the roster
    /// Env: DYNMAP_URL
    pub dynmap_url: String,

    /// Discord webhook URL
    /// Env: DISCORD_WEBHOOK (required)
    pub webhook_url: String,

    /// Delay between two roster polls
    /// Env: CHECK_INTERVAL_MS (default: 1000)
    pub check_interval: Duration,

    /// Watched players
    /// Env: WATCH_LIST (comma separated)
    pub watch_list: Vec<PlayerName>,

    /// Time zone used for session hours/weekdays and displayed clocks
    /// Env: TIMEZONE (default: "Europe/Paris")
    pub timezone: Tz,

    /// Externally reachable address pinged to prevent idle shutdown
    /// Env: PUBLIC_URL (optional, self-ping disabled when unset)
    pub public_url: Option<String>,

    /// Env: SELF_PING_INTERVAL_SECS (default: 600)
    pub self_ping_interval: Duration,

    /// How often session histories are written even without a close
    /// Env: HISTORY_FLUSH_SECS (default: 300)
    pub history_flush_interval: Duration,

    /// Timeout applied to every outgoing request and to the health listener
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Minimum spacing between two webhook requests
    /// Env: WEBHOOK_MIN_DELAY_MS (default: 500)
    pub webhook_min_delay: Duration,

    /// Base URL of the nation API (optional, nation loop disabled when unset)
    /// Env: NATION_API_URL
    pub nation_api_url: Option<String>,

    /// Credential sent to the nation API for grade lookups
    /// Env: NATION_API_KEY
    pub nation_api_key: Option<String>,

    /// Watched nations
    /// Env: WATCH_NATIONS (comma separated)
    pub watch_nations: Vec<String>,

    /// Env: NATION_INTERVAL_SECS (default: 30)
    pub nation_interval: Duration,

    /// Maximum age of a cached grade
    /// Env: GRADE_FRESHNESS_SECS (default: 60)
    pub grade_freshness: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self, ScanError> {
        let _ = dotenv();
        let defaults = Self::default();

        let webhook_url = var("DISCORD_WEBHOOK")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ScanError::Config("DISCORD_WEBHOOK is not set".to_string()))?;

        let timezone = match var("TIMEZONE") {
            Ok(name) => name
                .parse::<Tz>()
                .map_err(|_| ScanError::Config(format!("unknown time zone '{}'", name)))?,
            Err(_) => defaults.timezone,
        };

        let watch_list = match var("WATCH_LIST") {
            Ok(raw) => parse_watch_list(&raw),
            Err(_) => defaults.watch_list,
        };
        validate_watch_list_size(watch_list.len())?;

        Ok(Self {
            port: env_or_default("PORT", defaults.port),
            database_path: env_or_default_string("DATABASE_PATH", &defaults.database_path),
            dynmap_url: env_or_default_string("DYNMAP_URL", DEFAULT_DYNMAP_URL),
            webhook_url,
            check_interval: Duration::from_millis(env_nonzero_or_default("CHECK_INTERVAL_MS", 1000)),
            watch_list,
            timezone,
            public_url: env_optional("PUBLIC_URL").or_else(|| env_optional("RENDER_EXTERNAL_URL")),
            self_ping_interval: Duration::from_secs(env_nonzero_or_default("SELF_PING_INTERVAL_SECS", 600)),
            history_flush_interval: Duration::from_secs(env_nonzero_or_default("HISTORY_FLUSH_SECS", 300)),
            request_timeout: Duration::from_secs(env_nonzero_or_default("REQUEST_TIMEOUT_SECS", 30)),
            webhook_min_delay: Duration::from_millis(env_or_default("WEBHOOK_MIN_DELAY_MS", 500)),
            nation_api_url: env_optional("NATION_API_URL"),
            nation_api_key: env_optional("NATION_API_KEY"),
            watch_nations: var("WATCH_NATIONS")
                .map(|raw| parse_nations(&raw))
                .unwrap_or_default(),
            nation_interval: Duration::from_secs(env_nonzero_or_default("NATION_INTERVAL_SECS", 30)),
            grade_freshness: Duration::from_secs(env_nonzero_or_default("GRADE_FRESHNESS_SECS", 60)),
        })
    }

    /// Whether the nation loop has everything it needs to run.
    pub fn nations_enabled(&self) -> bool {
        self.nation_api_url.is_some() && !self.watch_nations.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_path: "lookout.db".to_string(),
            dynmap_url: DEFAULT_DYNMAP_URL.to_string(),
            webhook_url: String::new(),
            check_interval: Duration::from_millis(1000),
            watch_list: DEFAULT_WATCH_LIST
                .iter()
                .filter_map(|name| PlayerName::try_from(*name).ok())
                .collect(),
            timezone: chrono_tz::Europe::Paris,
            public_url: None,
            self_ping_interval: Duration::from_secs(600),
            history_flush_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            webhook_min_delay: Duration::from_millis(500),
            nation_api_url: None,
            nation_api_key: None,
            watch_nations: Vec::new(),
            nation_interval: Duration::from_secs(30),
            grade_freshness: Duration::from_secs(60),
        }
    }
}

/// Parse a comma separated watch list. Invalid and duplicate names are skipped.
pub fn parse_watch_list(raw: &str) -> Vec<PlayerName> {
    let mut names: Vec<PlayerName> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if let Err(e) = validate_player_name(name) {
            tracing::warn!(player = %name, error = %e, "skipping watched player");
            continue;
        }
        let Ok(name) = PlayerName::try_from(name) else {
            continue;
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Parse a comma separated list of nations. Invalid and duplicate names are skipped.
pub fn parse_nations(raw: &str) -> Vec<String> {
    let mut nations: Vec<String> = Vec::new();
    for nation in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if let Err(e) = validate_nation_name(nation) {
            tracing::warn!(nation = %nation, error = %e, "skipping watched nation");
            continue;
        }
        if !nations.iter().any(|n| n == nation) {
            nations.push(nation.to_string());
        }
    }
    nations
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse a period from the environment. Zero and unparsable values fall back
/// to the default, a zero period cannot drive a timer.
fn env_nonzero_or_default(key: &str, default: u64) -> u64 {
    var(key)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .filter(|val| *val > 0)
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    var(key).ok().filter(|v| !v.trim().is_empty())
}
