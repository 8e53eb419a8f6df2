//! Discord embed payloads for the status, nation and alert messages.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::PlayerName;
use crate::helpers::format_duration;
use crate::predict::{ConnectionPrediction, DisconnectionPrediction};

pub const COLOR_ONLINE: u32 = 3066993;
pub const COLOR_IDLE: u32 = 10197915;
pub const COLOR_LEFT: u32 = 15158332;

/// Discord caps embed field values at 1024 characters.
const FIELD_VALUE_LIMIT: usize = 1024;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

/// Body of a webhook create/edit request.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub embeds: [&'a Embed; 1],
}

impl EmbedField {
    fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: truncate(value.into(), FIELD_VALUE_LIMIT),
            inline,
        }
    }
}

/// A watched player currently online.
#[derive(Debug, Clone)]
pub struct OnlineEntry {
    pub player: PlayerName,
    /// Time since the tracked session started, if one is open
    pub session_ms: Option<i64>,
    pub disconnection: Option<DisconnectionPrediction>,
}

/// A watched player currently offline.
#[derive(Debug, Clone)]
pub struct OfflineEntry {
    pub player: PlayerName,
    pub next_connection: Option<ConnectionPrediction>,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub total_online: u32,
    pub game_time: String,
    pub scanned_at: DateTime<Tz>,
    pub refresh_label: String,
    pub online: Vec<OnlineEntry>,
    pub offline: Vec<OfflineEntry>,
}

pub fn status_embed(report: &StatusReport) -> Embed {
    let mut sections = Vec::new();

    if !report.online.is_empty() {
        let lines: Vec<String> = report
            .online
            .iter()
            .map(|entry| {
                let mut line = format!("• {}", entry.player);
                if let Some(ms) = entry.session_ms {
                    line.push_str(&format!(" ({})", format_duration(ms)));
                }
                if let Some(p) = entry.disconnection {
                    line.push_str(&format!(
                        " - leaves ~{:02}:{:02} ({}%)",
                        p.hour, p.minute, p.confidence
                    ));
                }
                line
            })
            .collect();
        sections.push(format!(
            "🟢 **Online ({}):**\n{}",
            report.online.len(),
            lines.join("\n")
        ));
    }

    if !report.offline.is_empty() {
        let lines: Vec<String> = report
            .offline
            .iter()
            .map(|entry| match entry.next_connection {
                Some(p) => format!("• {} - usually ~{:02}h ({}%)", entry.player, p.hour, p.confidence),
                None => format!("• {}", entry.player),
            })
            .collect();
        sections.push(format!(
            "⚪ **Offline ({}):**\n{}",
            report.offline.len(),
            lines.join("\n")
        ));
    }

    let watch_status = if sections.is_empty() {
        "No watched player online".to_string()
    } else {
        sections.join("\n\n")
    };

    Embed {
        title: "🟢 LOOKOUT REPORT".to_string(),
        color: if report.online.is_empty() {
            COLOR_IDLE
        } else {
            COLOR_ONLINE
        },
        description: None,
        fields: vec![
            EmbedField::new("👥 Players online", format!("**{}**", report.total_online), true),
            EmbedField::new("🕐 In-game time", format!("**{}**", report.game_time), true),
            EmbedField::new(
                "⏱️ Last scan",
                format!("**{}**", report.scanned_at.format("%H:%M:%S")),
                true,
            ),
            EmbedField::new("👁️ Watch status", watch_status, false),
        ],
        footer: Some(EmbedFooter {
            text: format!("Automatic scanner 24/7 • refreshed every {}", report.refresh_label),
        }),
        timestamp: iso_timestamp(&report.scanned_at),
    }
}

/// One-off alert for a connection or disconnection.
pub fn transition_embed(
    player: &PlayerName,
    became_online: bool,
    closed_session_ms: Option<i64>,
    at: &DateTime<Tz>,
) -> Embed {
    let (title, color) = if became_online {
        (format!("🟢 {} connected", player), COLOR_ONLINE)
    } else {
        (format!("🔴 {} disconnected", player), COLOR_LEFT)
    };
    let description = match (became_online, closed_session_ms) {
        (false, Some(ms)) => format!("Session lasted {}", format_duration(ms)),
        _ => format!("At {}", at.format("%H:%M:%S")),
    };

    Embed {
        title,
        color,
        description: Some(description),
        fields: Vec::new(),
        footer: None,
        timestamp: iso_timestamp(at),
    }
}

/// Online members of one watched nation.
#[derive(Debug, Clone)]
pub struct NationReport {
    pub name: String,
    /// `(member, grade)` pairs, `None` when the roster could not be fetched
    pub online: Option<Vec<(String, String)>>,
    pub member_count: usize,
}

pub fn nation_embed(reports: &[NationReport], scanned_at: &DateTime<Tz>) -> Embed {
    let any_online = reports
        .iter()
        .any(|r| r.online.as_ref().is_some_and(|o| !o.is_empty()));

    let fields = reports
        .iter()
        .map(|report| {
            let value = match &report.online {
                None => "Roster unavailable".to_string(),
                Some(online) if online.is_empty() => "Nobody online".to_string(),
                Some(online) => online
                    .iter()
                    .map(|(member, grade)| format!("• {} - {}", member, grade))
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            let online_count = report.online.as_ref().map_or(0, Vec::len);
            EmbedField::new(
                format!("🏳️ {} ({}/{})", report.name, online_count, report.member_count),
                value,
                false,
            )
        })
        .collect();

    Embed {
        title: "🏳️ NATION WATCH".to_string(),
        color: if any_online { COLOR_ONLINE } else { COLOR_IDLE },
        description: None,
        fields,
        footer: Some(EmbedFooter {
            text: format!("Last scan {}", scanned_at.format("%H:%M:%S")),
        }),
        timestamp: iso_timestamp(scanned_at),
    }
}

fn iso_timestamp(at: &DateTime<Tz>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn truncate(value: String, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value;
    }
    let mut out: String = value.chars().take(limit - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Paris;

    fn name(s: &str) -> PlayerName {
        PlayerName::try_from(s).unwrap()
    }

    fn scanned_at() -> DateTime<Tz> {
        Paris.with_ymd_and_hms(2024, 1, 15, 21, 5, 9).unwrap()
    }

    fn report(online: Vec<OnlineEntry>, offline: Vec<OfflineEntry>) -> StatusReport {
        StatusReport {
            total_online: 57,
            game_time: "13:30:00".to_string(),
            scanned_at: scanned_at(),
            refresh_label: "1s".to_string(),
            online,
            offline,
        }
    }

    #[test]
    fn test_status_embed_with_online_players() {
        let embed = status_embed(&report(
            vec![OnlineEntry {
                player: name("Canisi"),
                session_ms: Some(3_900_000),
                disconnection: Some(DisconnectionPrediction {
                    hour: 22,
                    minute: 30,
                    confidence: 80,
                }),
            }],
            vec![
                OfflineEntry {
                    player: name("Blakonne"),
                    next_connection: Some(ConnectionPrediction {
                        hour: 20,
                        confidence: 100,
                    }),
                },
                OfflineEntry {
                    player: name("Olmat38"),
                    next_connection: None,
                },
            ],
        ));

        assert_eq!(embed.color, COLOR_ONLINE);
        assert_eq!(embed.fields[0].value, "**57**");
        assert_eq!(embed.fields[1].value, "**13:30:00**");
        assert_eq!(embed.fields[2].value, "**21:05:09**");
        assert_eq!(
            embed.fields[3].value,
            "🟢 **Online (1):**\n• Canisi (1h 05m) - leaves ~22:30 (80%)\n\n\
             ⚪ **Offline (2):**\n• Blakonne - usually ~20h (100%)\n• Olmat38"
        );
        assert_eq!(embed.timestamp, "2024-01-15T20:05:09.000Z");
    }

    #[test]
    fn test_status_embed_without_online_players() {
        let embed = status_embed(&report(
            vec![],
            vec![OfflineEntry {
                player: name("Blakonne"),
                next_connection: None,
            }],
        ));
        assert_eq!(embed.color, COLOR_IDLE);
        assert_eq!(embed.fields[3].value, "⚪ **Offline (1):**\n• Blakonne");
    }

    #[test]
    fn test_status_embed_with_empty_watch_list() {
        let embed = status_embed(&report(vec![], vec![]));
        assert_eq!(embed.color, COLOR_IDLE);
        assert_eq!(embed.fields[3].value, "No watched player online");
    }

    #[test]
    fn test_payload_shape() {
        let embed = transition_embed(&name("Canisi"), false, Some(600_000), &scanned_at());
        let json = serde_json::to_value(WebhookPayload { embeds: [&embed] }).unwrap();
        assert_eq!(json["embeds"][0]["title"], "🔴 Canisi disconnected");
        assert_eq!(json["embeds"][0]["description"], "Session lasted 10m");
        assert_eq!(json["embeds"][0]["color"], COLOR_LEFT);
        assert!(json["embeds"][0].get("fields").is_none());
        assert!(json["embeds"][0].get("footer").is_none());
    }

    #[test]
    fn test_nation_embed() {
        let embed = nation_embed(
            &[
                NationReport {
                    name: "France".to_string(),
                    online: Some(vec![("Canisi".to_string(), "Leader".to_string())]),
                    member_count: 12,
                },
                NationReport {
                    name: "Japon".to_string(),
                    online: None,
                    member_count: 0,
                },
            ],
            &scanned_at(),
        );
        assert_eq!(embed.color, COLOR_ONLINE);
        assert_eq!(embed.fields[0].name, "🏳️ France (1/12)");
        assert_eq!(embed.fields[0].value, "• Canisi - Leader");
        assert_eq!(embed.fields[1].value, "Roster unavailable");
    }

    #[test]
    fn test_long_field_is_truncated() {
        let field = EmbedField::new("x", "a".repeat(2000), false);
        assert_eq!(field.value.chars().count(), FIELD_VALUE_LIMIT);
        assert!(field.value.ends_with('…'));
    }
}
