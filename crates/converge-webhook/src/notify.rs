//! Outbound HTTP notifications with HMAC signing, ported from
//! `notifications/webhook_adapter.py`: one retry with a 1s gap, signs the
//! body when a secret is configured, and reports success/failure for the
//! caller to turn into `NOTIFICATION_SENT`/`NOTIFICATION_FAILED` events.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::signature::sign_header;

#[derive(Debug, Clone, Serialize)]
struct NotificationBody<'a> {
    event_type: &'a str,
    payload: &'a Value,
    timestamp: DateTime<Utc>,
}

pub struct NotificationOutcome {
    pub sent: bool,
    pub url: String,
    pub status_code: Option<u16>,
}

/// Resolves the delivery URL for `channel`, falling back to the `"default"`
/// entry when the channel has no dedicated URL.
pub fn resolve_url<'a>(urls: &'a BTreeMap<String, String>, channel: &str) -> Option<&'a str> {
    urls.get(channel).or_else(|| urls.get("default")).map(|s| s.as_str())
}

/// Sends `payload` to `channel`'s configured URL, signing the body with
/// `secret` if one is set. Retries once after a 1s gap on failure.
pub fn send(client: &reqwest::blocking::Client, url: &str, secret: Option<&str>, event_type: &str, payload: &Value) -> NotificationOutcome {
    let body = NotificationBody { event_type, payload, timestamp: converge_types::now() };
    let body_json = match serde_json::to_vec(&body) {
        Ok(b) => b,
        Err(_) => return NotificationOutcome { sent: false, url: url.to_string(), status_code: None },
    };

    for attempt in 0..2 {
        let mut request = client.post(url).header("Content-Type", "application/json").body(body_json.clone());
        if let Some(secret) = secret {
            request = request.header("X-Converge-Signature", sign_header(secret, &body_json));
        }

        match request.send() {
            Ok(resp) if resp.status().as_u16() < 400 => {
                return NotificationOutcome { sent: true, url: url.to_string(), status_code: Some(resp.status().as_u16()) };
            }
            _ => {
                if attempt == 0 {
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    NotificationOutcome { sent: false, url: url.to_string(), status_code: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_url_falls_back_to_default() {
        let mut urls = BTreeMap::new();
        urls.insert("default".to_string(), "https://example.com/default".to_string());
        assert_eq!(resolve_url(&urls, "slack"), Some("https://example.com/default"));
    }

    #[test]
    fn resolve_url_prefers_channel_specific_entry() {
        let mut urls = BTreeMap::new();
        urls.insert("default".to_string(), "https://example.com/default".to_string());
        urls.insert("slack".to_string(), "https://example.com/slack".to_string());
        assert_eq!(resolve_url(&urls, "slack"), Some("https://example.com/slack"));
    }

    #[test]
    fn resolve_url_none_when_nothing_configured() {
        let urls = BTreeMap::new();
        assert_eq!(resolve_url(&urls, "slack"), None);
    }
}
