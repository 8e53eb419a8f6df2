use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Current instant in the configured time zone.
pub fn local_now(tz: Tz) -> DateTime<Tz> {
  Utc::now().with_timezone(&tz)
}

/// Format a duration in milliseconds for display.
///
/// - `< 1 minute`: "Xs"
/// - `< 1 hour`: "Xm"
/// - otherwise: "Xh YYm"
pub fn format_duration(ms: i64) -> String {
  let seconds = ms.max(0) / 1000;
  if seconds < 60 {
    format!("{}s", seconds)
  } else if seconds < 3600 {
    format!("{}m", seconds / 60)
  } else {
    format!("{}h {:02}m", seconds / 3600, (seconds % 3600) / 60)
  }
}

/// In-game clock from dynmap's `servertime`, counted in ticks of 1000 per hour.
pub fn format_game_time(server_time: i64) -> String {
  let hours = (server_time / 1000).rem_euclid(24);
  let minutes = (server_time.rem_euclid(1000) * 60) / 1000;
  format!("{:02}:{:02}:00", hours, minutes)
}
