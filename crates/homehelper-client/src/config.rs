//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the chat client can start against a local
//! development server with no configuration at all.

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

use homehelper_shared::constants::{AT_BOTTOM_EPSILON_PX, LAZY_LOAD_THRESHOLD_PX};
use homehelper_shared::mentions::Member;
use homehelper_shared::protocol::{ActivityItem, MentionNotification};
use homehelper_shared::types::{ChannelId, RenovationId, UserId};

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the web application for history and mark-seen calls.
    /// Env: `HOMEHELPER_BASE_URL`
    /// Default: `http://localhost:8080`
    pub base_url: String,

    /// WebSocket URL of the STOMP endpoint.
    /// Env: `HOMEHELPER_BROKER_URL`
    /// Default: `ws://localhost:8080/ws`
    pub broker_url: String,

    /// The authenticated user.
    /// Env: `HOMEHELPER_USER_ID`
    pub user_id: UserId,

    /// Env: `HOMEHELPER_RENOVATION_ID`
    pub renovation_id: RenovationId,

    /// Open chat channel, if any. Without one only the mention and activity
    /// feeds run.
    /// Env: `HOMEHELPER_CHANNEL_ID`
    pub channel_id: Option<ChannelId>,

    /// When set, the initial load centres on this instant instead of the most
    /// recent messages.
    /// Env: `HOMEHELPER_MENTION_TIME` (RFC 3339)
    pub mention_time: Option<DateTime<Utc>>,

    /// Header carrying the CSRF token on state-changing requests.
    /// Env: `HOMEHELPER_CSRF_HEADER`
    /// Default: `X-CSRF-TOKEN`
    pub csrf_header: String,

    /// Env: `HOMEHELPER_CSRF_TOKEN`
    pub csrf_token: Option<String>,

    /// Offset used for calendar-date comparison and display.
    /// Env: `HOMEHELPER_UTC_OFFSET` (e.g. `+13:00`)
    /// Default: the host's current local offset.
    pub utc_offset: FixedOffset,

    /// Channel members used for @mention detection.
    /// Env: `HOMEHELPER_MEMBERS` (JSON array)
    pub members: Vec<Member>,

    /// Unseen mentions known at startup.
    /// Env: `HOMEHELPER_UNSEEN_MENTIONS` (JSON array)
    pub unseen_mentions: Vec<MentionNotification>,

    /// Recent activity rendered with the page, newest first.
    /// Env: `HOMEHELPER_ACTIVITY_ITEMS` (JSON array)
    pub activity_items: Vec<ActivityItem>,

    /// Env: `HOMEHELPER_LAZY_LOAD_THRESHOLD_PX`
    /// Default: `700`
    pub lazy_load_threshold_px: f64,

    /// Env: `HOMEHELPER_AT_BOTTOM_EPSILON_PX`
    /// Default: `2`
    pub at_bottom_epsilon_px: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            broker_url: "ws://localhost:8080/ws".to_string(),
            user_id: UserId(0),
            renovation_id: RenovationId(0),
            channel_id: None,
            mention_time: None,
            csrf_header: "X-CSRF-TOKEN".to_string(),
            csrf_token: None,
            utc_offset: Local::now().offset().fix(),
            members: Vec::new(),
            unseen_mentions: Vec::new(),
            activity_items: Vec::new(),
            lazy_load_threshold_px: LAZY_LOAD_THRESHOLD_PX,
            at_bottom_epsilon_px: AT_BOTTOM_EPSILON_PX,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("HOMEHELPER_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(url) = lookup("HOMEHELPER_BROKER_URL") {
            config.broker_url = url;
        }

        if let Some(id) = parse_id(&lookup, "HOMEHELPER_USER_ID") {
            config.user_id = UserId(id);
        }

        if let Some(id) = parse_id(&lookup, "HOMEHELPER_RENOVATION_ID") {
            config.renovation_id = RenovationId(id);
        }

        if let Some(id) = parse_id(&lookup, "HOMEHELPER_CHANNEL_ID") {
            config.channel_id = Some(ChannelId(id));
        }

        if let Some(val) = lookup("HOMEHELPER_MENTION_TIME") {
            match DateTime::parse_from_rfc3339(val.trim()) {
                Ok(at) => config.mention_time = Some(at.with_timezone(&Utc)),
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "Invalid HOMEHELPER_MENTION_TIME, ignoring");
                }
            }
        }

        if let Some(header) = lookup("HOMEHELPER_CSRF_HEADER") {
            if !header.is_empty() {
                config.csrf_header = header;
            }
        }

        if let Some(token) = lookup("HOMEHELPER_CSRF_TOKEN") {
            if !token.is_empty() {
                config.csrf_token = Some(token);
            }
        }

        if let Some(val) = lookup("HOMEHELPER_UTC_OFFSET") {
            match parse_utc_offset(&val) {
                Ok(offset) => config.utc_offset = offset,
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "Invalid HOMEHELPER_UTC_OFFSET, using local offset");
                }
            }
        }

        if let Some(json) = lookup("HOMEHELPER_MEMBERS") {
            match serde_json::from_str(&json) {
                Ok(members) => config.members = members,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid HOMEHELPER_MEMBERS, mention detection disabled");
                }
            }
        }

        if let Some(json) = lookup("HOMEHELPER_UNSEEN_MENTIONS") {
            match serde_json::from_str(&json) {
                Ok(mentions) => config.unseen_mentions = mentions,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid HOMEHELPER_UNSEEN_MENTIONS, starting with an empty inbox");
                }
            }
        }

        if let Some(json) = lookup("HOMEHELPER_ACTIVITY_ITEMS") {
            match serde_json::from_str(&json) {
                Ok(items) => config.activity_items = items,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid HOMEHELPER_ACTIVITY_ITEMS, starting with an empty feed");
                }
            }
        }

        if let Some(px) = parse_px(&lookup, "HOMEHELPER_LAZY_LOAD_THRESHOLD_PX") {
            config.lazy_load_threshold_px = px;
        }

        if let Some(px) = parse_px(&lookup, "HOMEHELPER_AT_BOTTOM_EPSILON_PX") {
            config.at_bottom_epsilon_px = px;
        }

        config
    }
}

// The CSRF token is a credential and never reaches the logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("broker_url", &self.broker_url)
            .field("user_id", &self.user_id)
            .field("renovation_id", &self.renovation_id)
            .field("channel_id", &self.channel_id)
            .field("mention_time", &self.mention_time)
            .field("csrf_header", &self.csrf_header)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
            .field("utc_offset", &self.utc_offset)
            .field("members", &self.members.len())
            .field("unseen_mentions", &self.unseen_mentions.len())
            .field("activity_items", &self.activity_items.len())
            .field("lazy_load_threshold_px", &self.lazy_load_threshold_px)
            .field("at_bottom_epsilon_px", &self.at_bottom_epsilon_px)
            .finish()
    }
}

fn parse_id(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<i64> {
    let val = lookup(key)?;
    match val.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(key, value = %val, "Invalid id, using default");
            None
        }
    }
}

fn parse_px(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    let val = lookup(key)?;
    match val.trim().parse::<f64>() {
        Ok(px) if px.is_finite() && px >= 0.0 => Some(px),
        _ => {
            tracing::warn!(key, value = %val, "Invalid pixel distance, using default");
            None
        }
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `Z`.
fn parse_utc_offset(s: &str) -> Result<FixedOffset, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| "zero offset".to_string());
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(format!("expected a leading sign, got {s:?}")),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("expected HH:MM, got {rest:?}"));
    }

    let hours: i32 = digits[..2].parse().map_err(|e| format!("{e}"))?;
    let minutes: i32 = digits[2..].parse().map_err(|e| format!("{e}"))?;
    if minutes >= 60 {
        return Err(format!("minutes out of range: {minutes}"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset out of range: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.broker_url, "ws://localhost:8080/ws");
        assert_eq!(config.channel_id, None);
        assert_eq!(config.lazy_load_threshold_px, 700.0);
        assert_eq!(config.at_bottom_epsilon_px, 2.0);
        assert!(config.members.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("HOMEHELPER_BASE_URL", "https://homehelper.example/"),
            ("HOMEHELPER_USER_ID", "4"),
            ("HOMEHELPER_RENOVATION_ID", "12"),
            ("HOMEHELPER_CHANNEL_ID", "30"),
            ("HOMEHELPER_MENTION_TIME", "2025-03-01T10:00:00.123+13:00"),
            ("HOMEHELPER_CSRF_TOKEN", "tok"),
            ("HOMEHELPER_UTC_OFFSET", "+13:00"),
            ("HOMEHELPER_MEMBERS", r#"[{"id":5,"firstName":"Bob","lastName":"Smith"}]"#),
            ("HOMEHELPER_LAZY_LOAD_THRESHOLD_PX", "350"),
            (
                "HOMEHELPER_ACTIVITY_ITEMS",
                r#"[{"renovationId":12,"renovationName":"Bathroom","activityType":"BUDGET_EDITED","timestamp":"2025-03-01T09:00:00Z"}]"#,
            ),
        ]));

        assert_eq!(config.base_url, "https://homehelper.example");
        assert_eq!(config.user_id, UserId(4));
        assert_eq!(config.renovation_id, RenovationId(12));
        assert_eq!(config.channel_id, Some(ChannelId(30)));
        assert_eq!(
            config.mention_time,
            Some("2025-02-28T21:00:00.123Z".parse().unwrap())
        );
        assert_eq!(config.csrf_header, "X-CSRF-TOKEN");
        assert_eq!(config.csrf_token.as_deref(), Some("tok"));
        assert_eq!(config.utc_offset.local_minus_utc(), 13 * 3600);
        assert_eq!(config.members.len(), 1);
        assert_eq!(config.members[0].full_name(), "Bob Smith");
        assert_eq!(config.lazy_load_threshold_px, 350.0);
        assert_eq!(config.activity_items.len(), 1);
        assert_eq!(config.activity_items[0].renovation_name, "Bathroom");
    }

    #[test]
    fn test_debug_redacts_csrf_token() {
        let config = ClientConfig::from_lookup(lookup(&[("HOMEHELPER_CSRF_TOKEN", "s3cret-token")]));
        let printed = format!("{config:?}");
        assert!(!printed.contains("s3cret-token"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("http://localhost:8080"));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("HOMEHELPER_USER_ID", "abc"),
            ("HOMEHELPER_MENTION_TIME", "yesterday"),
            ("HOMEHELPER_MEMBERS", "{not json"),
            ("HOMEHELPER_ACTIVITY_ITEMS", "[{}]"),
            ("HOMEHELPER_AT_BOTTOM_EPSILON_PX", "-1"),
        ]));
        assert_eq!(config.user_id, UserId(0));
        assert_eq!(config.mention_time, None);
        assert!(config.members.is_empty());
        assert!(config.activity_items.is_empty());
        assert_eq!(config.at_bottom_epsilon_px, 2.0);
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+13:00").unwrap().local_minus_utc(), 46800);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("13:00").is_err());
        assert!(parse_utc_offset("+1:00").is_err());
        assert!(parse_utc_offset("+12:75").is_err());
    }
}
