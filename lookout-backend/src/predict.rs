//! Time-of-day estimates derived from past sessions.
//!
//! Both estimators look at the closed sessions of the last seven days only and
//! refuse to guess below [`MIN_SESSIONS`] recorded sessions.

use chrono::{DateTime, Datelike, TimeDelta, Timelike};
use chrono_tz::Tz;

use crate::sessions::{Session, SessionHistory};

/// Minimum number of closed sessions before any prediction is made.
pub const MIN_SESSIONS: usize = 5;

const WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;
const HOUR_TOLERANCE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPrediction {
    pub hour: u32,
    /// 0-100
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectionPrediction {
    pub hour: u32,
    pub minute: u32,
    /// 0-100
    pub confidence: u8,
}

/// Usual connection hour for today's weekday.
pub fn predict_next_connection(
    history: &SessionHistory,
    now: &DateTime<Tz>,
) -> Option<ConnectionPrediction> {
    if history.closed.len() < MIN_SESSIONS {
        return None;
    }

    let week = recent(history, now);
    if week.is_empty() {
        return None;
    }

    let today = now.weekday().num_days_from_sunday();
    let same_day: Vec<&Session> = week.iter().copied().filter(|s| s.start_day == today).collect();
    if same_day.is_empty() {
        return None;
    }

    let mean_hour =
        same_day.iter().map(|s| s.start_hour as f64).sum::<f64>() / same_day.len() as f64;

    Some(ConnectionPrediction {
        hour: (mean_hour.round() as u32) % 24,
        confidence: confidence(same_day.len(), week.len()),
    })
}

/// Expected end of the session in progress, based on sessions that started
/// around the same hour.
///
/// Returns `None` when no session is open or when the expected end is already
/// in the past.
pub fn predict_disconnection(
    history: &SessionHistory,
    now: &DateTime<Tz>,
) -> Option<DisconnectionPrediction> {
    let open = history.open.as_ref()?;
    if history.closed.len() < MIN_SESSIONS {
        return None;
    }

    let week = recent(history, now);
    if week.is_empty() {
        return None;
    }

    let hour = now.hour();
    let similar: Vec<&Session> = week
        .iter()
        .copied()
        .filter(|s| hour_distance(s.start_hour, hour) <= HOUR_TOLERANCE)
        .collect();
    if similar.is_empty() {
        return None;
    }

    let avg_duration =
        similar.iter().map(|s| s.duration_ms as f64).sum::<f64>() / similar.len() as f64;
    let elapsed = (now.timestamp_millis() - open.start) as f64;
    let remaining = avg_duration - elapsed;
    if remaining < 0.0 {
        return None;
    }

    let expected = *now + TimeDelta::milliseconds(remaining.round() as i64);
    Some(DisconnectionPrediction {
        hour: expected.hour(),
        minute: expected.minute(),
        confidence: confidence(similar.len(), week.len()),
    })
}

/// Closed sessions that started within the last seven days.
fn recent<'a>(history: &'a SessionHistory, now: &DateTime<Tz>) -> Vec<&'a Session> {
    let cutoff = now.timestamp_millis() - WINDOW_MS;
    history.closed.iter().filter(|s| s.start >= cutoff).collect()
}

/// Distance between two hours on a 24h clock (23 and 1 are 2 apart).
fn hour_distance(a: u32, b: u32) -> u32 {
    let d = a.abs_diff(b) % 24;
    d.min(24 - d)
}

fn confidence(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (100.0 * part as f64 / total as f64).round().min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Paris;

    /// Monday 2024-01-15 at the given local time.
    fn monday(h: u32, m: u32) -> DateTime<Tz> {
        Paris.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn closed(start: DateTime<Tz>, minutes: i64) -> Session {
        let end = start + TimeDelta::minutes(minutes);
        Session {
            start: start.timestamp_millis(),
            end: Some(end.timestamp_millis()),
            start_hour: start.hour(),
            start_day: start.weekday().num_days_from_sunday(),
            duration_ms: minutes * 60 * 1000,
        }
    }

    fn open(start: DateTime<Tz>) -> Session {
        Session {
            start: start.timestamp_millis(),
            end: None,
            start_hour: start.hour(),
            start_day: start.weekday().num_days_from_sunday(),
            duration_ms: 0,
        }
    }

    fn history(sessions: Vec<Session>) -> SessionHistory {
        SessionHistory {
            closed: sessions.into(),
            open: None,
        }
    }

    #[test]
    fn test_hour_distance_wraps() {
        assert_eq!(hour_distance(23, 1), 2);
        assert_eq!(hour_distance(1, 23), 2);
        assert_eq!(hour_distance(0, 12), 12);
        assert_eq!(hour_distance(5, 5), 0);
        assert_eq!(hour_distance(22, 1), 3);
    }

    #[test]
    fn test_next_connection_needs_five_sessions() {
        let now = monday(12, 0);
        let sessions: Vec<Session> = (0..4).map(|i| closed(monday(8 + i, 0), 30)).collect();
        assert!(predict_next_connection(&history(sessions), &now).is_none());
    }

    #[test]
    fn test_next_connection_with_five_sessions_today() {
        let now = monday(23, 0);
        // Start hours 18, 19, 20, 21, 22 -> mean 20
        let sessions: Vec<Session> = (0..5).map(|i| closed(monday(18 + i, 0), 30)).collect();

        let prediction = predict_next_connection(&history(sessions), &now).unwrap();
        assert_eq!(prediction.hour, 20);
        assert_eq!(prediction.confidence, 100);
    }

    #[test]
    fn test_next_connection_rounds_mean_hour() {
        let now = monday(23, 0);
        // 18, 18, 19, 19, 19 -> 18.6 -> 19
        let hours = [18, 18, 19, 19, 19];
        let sessions: Vec<Session> = hours.iter().map(|h| closed(monday(*h, 0), 10)).collect();
        assert_eq!(predict_next_connection(&history(sessions), &now).unwrap().hour, 19);
    }

    #[test]
    fn test_next_connection_confidence_is_share_of_week() {
        let now = monday(23, 0);
        let mut sessions: Vec<Session> = (0..2).map(|i| closed(monday(20 + i, 0), 30)).collect();
        // Three sessions on the previous Saturday
        let saturday = Paris.with_ymd_and_hms(2024, 1, 13, 15, 0, 0).unwrap();
        sessions.extend((0..3).map(|i| closed(saturday + TimeDelta::hours(i), 30)));

        let prediction = predict_next_connection(&history(sessions), &now).unwrap();
        assert_eq!(prediction.hour, 21); // mean of 20 and 21 = 20.5, rounded up
        assert_eq!(prediction.confidence, 40);
    }

    #[test]
    fn test_next_connection_ignores_old_sessions() {
        let now = monday(23, 0);
        // Eight days ago: outside the window
        let old = now - TimeDelta::days(8);
        let sessions: Vec<Session> = (0..6).map(|i| closed(old + TimeDelta::minutes(i * 60), 30)).collect();
        assert!(predict_next_connection(&history(sessions), &now).is_none());
    }

    #[test]
    fn test_next_connection_none_without_same_weekday() {
        let now = monday(23, 0);
        let sunday = Paris.with_ymd_and_hms(2024, 1, 14, 10, 0, 0).unwrap();
        let sessions: Vec<Session> = (0..5).map(|i| closed(sunday + TimeDelta::hours(i), 30)).collect();
        assert!(predict_next_connection(&history(sessions), &now).is_none());
    }

    #[test]
    fn test_disconnection_requires_open_session() {
        let now = monday(21, 0);
        let sessions: Vec<Session> = (0..5).map(|i| closed(monday(20, 0) - TimeDelta::days(i), 60)).collect();
        assert!(predict_disconnection(&history(sessions), &now).is_none());
    }

    #[test]
    fn test_disconnection_estimate() {
        let now = monday(21, 0);
        // Five 2h sessions that started at 20:00 on previous days
        let sessions: Vec<Session> = (1..=5)
            .map(|i| closed(monday(20, 0) - TimeDelta::days(i), 120))
            .collect();
        let mut h = history(sessions);
        h.open = Some(open(monday(20, 30)));

        // 120 min average, 30 min elapsed -> ends at 22:30
        let prediction = predict_disconnection(&h, &now).unwrap();
        assert_eq!((prediction.hour, prediction.minute), (22, 30));
        assert_eq!(prediction.confidence, 100);
    }

    #[test]
    fn test_disconnection_only_uses_similar_hours() {
        let now = monday(23, 0);
        let mut sessions: Vec<Session> = (1..=3)
            .map(|i| closed(monday(1, 0) - TimeDelta::days(i - 1), 60))
            .collect();
        // Far from 23h: ignored for the average
        sessions.extend((1..=2).map(|i| closed(monday(12, 0) - TimeDelta::days(i), 600)));
        let mut h = history(sessions);
        h.open = Some(open(monday(22, 50)));

        // 01:00 sessions are 2h away from 23:00 across midnight
        let prediction = predict_disconnection(&h, &now).unwrap();
        assert_eq!((prediction.hour, prediction.minute), (23, 50));
        assert_eq!(prediction.confidence, 60);
    }

    #[test]
    fn test_disconnection_none_when_estimate_passed() {
        let now = monday(21, 0);
        let sessions: Vec<Session> = (1..=5)
            .map(|i| closed(monday(20, 0) - TimeDelta::days(i), 30))
            .collect();
        let mut h = history(sessions);
        h.open = Some(open(monday(20, 0)));

        assert!(predict_disconnection(&h, &now).is_none());
    }

    #[test]
    fn test_disconnection_needs_five_closed_sessions() {
        let now = monday(21, 0);
        let sessions: Vec<Session> = (1..=4)
            .map(|i| closed(monday(20, 0) - TimeDelta::days(i), 120))
            .collect();
        let mut h = history(sessions);
        h.open = Some(open(monday(20, 30)));
        assert!(predict_disconnection(&h, &now).is_none());
    }
}
