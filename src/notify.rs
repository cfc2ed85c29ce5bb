//! Change notifications.
//!
//! `summarize` turns the reconciler's changed-station list into a short
//! alert text. Delivery is behind the `Notifier` trait: the default just
//! logs the text; `PubSubNotifier` publishes it as a Pub/Sub message so a
//! phone/desktop push service can pick it up.
//!
//! A delivery failure is logged by the daemon and never fails the cycle:
//! by the time a notifier runs, state has already been saved.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use std::error::Error;
use std::time::Duration;

use crate::config::{NotifyConfig, pubsub_token};
use crate::logging::{self, Component};
use crate::model::ChangedStation;

/// Stations listed individually before the "more" suffix.
pub const DEFAULT_SUMMARY_LIMIT: usize = 3;

// ---------------------------------------------------------------------------
// Summary text
// ---------------------------------------------------------------------------

/// One line per changed station, e.g. `"Trạm A: ▲2.3 mm"`.
fn format_line(station: &ChangedStation) -> String {
    let arrow = if station.diff > 0.0 { '▲' } else { '▼' };
    format!("{}: {}{:.1} mm", station.name, arrow, station.diff.abs())
}

/// Builds the alert text for a cycle, or `None` when nothing changed.
///
/// The first `limit` stations are listed in the order they were
/// encountered; any remainder is collapsed into a trailing
/// `"…and N more stations"` line.
pub fn summarize(changed: &[ChangedStation], limit: usize) -> Option<String> {
    if changed.is_empty() {
        return None;
    }

    let mut lines: Vec<String> = changed.iter().take(limit).map(format_line).collect();
    if changed.len() > limit {
        lines.push(format!("…and {} more stations", changed.len() - limit));
    }

    Some(lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

pub trait Notifier {
    fn notify(&mut self, summary: &str, changed: &[ChangedStation]) -> Result<(), Box<dyn Error>>;
}

/// Writes the summary to the service log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, summary: &str, changed: &[ChangedStation]) -> Result<(), Box<dyn Error>> {
        logging::info(
            Component::Notify,
            None,
            &format!("🌧 Rainfall changed at {} station(s)", changed.len()),
        );
        for line in summary.lines() {
            logging::info(Component::Notify, None, line);
        }
        Ok(())
    }
}

/// Discards everything. Used when notifications are disabled.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&mut self, _summary: &str, _changed: &[ChangedStation]) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// Publishes the summary to a Pub/Sub `topics/*:publish` REST endpoint.
pub struct PubSubNotifier {
    client: reqwest::blocking::Client,
    publish_url: String,
    bearer_token: Option<String>,
}

impl PubSubNotifier {
    pub fn new(
        publish_url: &str,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(PubSubNotifier {
            client,
            publish_url: publish_url.to_string(),
            bearer_token,
        })
    }
}

/// Builds the publish request body: one message whose `data` is the
/// base64-encoded JSON payload.
pub fn build_publish_body(summary: &str, changed: &[ChangedStation]) -> serde_json::Value {
    let payload = json!({
        "summary": summary,
        "stations": changed,
    });
    let data = STANDARD.encode(payload.to_string().as_bytes());

    json!({
        "messages": [{
            "data": data,
            "attributes": {
                "source": "rainmon_service",
                "changed": changed.len().to_string(),
            }
        }]
    })
}

impl Notifier for PubSubNotifier {
    fn notify(&mut self, summary: &str, changed: &[ChangedStation]) -> Result<(), Box<dyn Error>> {
        let mut request = self
            .client
            .post(&self.publish_url)
            .json(&build_publish_body(summary, changed));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(format!("Pub/Sub publish failed: HTTP {}", response.status()).into());
        }

        logging::debug(
            Component::Notify,
            None,
            &format!("published change summary for {} station(s)", changed.len()),
        );
        Ok(())
    }
}

/// Builds the notifier described by `[notify]`.
pub fn build_notifier(
    config: &NotifyConfig,
    timeout: Duration,
) -> Result<Box<dyn Notifier>, Box<dyn Error>> {
    if !config.enabled {
        return Ok(Box::new(SilentNotifier));
    }
    match &config.pubsub_url {
        Some(url) => Ok(Box::new(PubSubNotifier::new(url, pubsub_token(), timeout)?)),
        None => Ok(Box::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(name: &str, diff: f64) -> ChangedStation {
        ChangedStation {
            id: format!("id-{}", name),
            name: name.to_string(),
            diff,
            new_value: 10.0,
        }
    }

    #[test]
    fn test_summarize_empty_is_none() {
        assert_eq!(summarize(&[], DEFAULT_SUMMARY_LIMIT), None);
    }

    #[test]
    fn test_summarize_arrows_and_absolute_values() {
        let text = summarize(&[station("A", 2.3), station("B", -1.5)], 3).unwrap();
        assert_eq!(text, "A: ▲2.3 mm\nB: ▼1.5 mm");
    }

    #[test]
    fn test_summarize_exactly_limit_has_no_suffix() {
        let changed = vec![station("A", 1.0), station("B", 1.0), station("C", 1.0)];
        let text = summarize(&changed, 3).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(!text.contains("more"));
    }

    #[test]
    fn test_summarize_over_limit_keeps_order_and_counts_rest() {
        let changed = vec![
            station("A", 1.0),
            station("B", 2.0),
            station("C", 3.0),
            station("D", 4.0),
            station("E", 5.0),
        ];
        let text = summarize(&changed, 3).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "A: ▲1.0 mm");
        assert_eq!(lines[2], "C: ▲3.0 mm");
        assert_eq!(lines[3], "…and 2 more stations");
    }

    #[test]
    fn test_publish_body_round_trips_payload() {
        let changed = vec![station("A", 2.3)];
        let body = build_publish_body("A: ▲2.3 mm", &changed);

        let data = body["messages"][0]["data"].as_str().expect("data is a string");
        let decoded = STANDARD.decode(data).expect("valid base64");
        let payload: serde_json::Value = serde_json::from_slice(&decoded).unwrap();

        assert_eq!(payload["summary"], "A: ▲2.3 mm");
        assert_eq!(payload["stations"][0]["newValue"], 10.0);
        assert_eq!(body["messages"][0]["attributes"]["changed"], "1");
    }
}
