//! Calendar and event endpoints.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use timetree_core::{RemoteCalendar, RemoteEventRecord};

use crate::session::Session;
use crate::{API_BASE, CLIENT_HEADER, CLIENT_HEADER_VALUE};

/// Upper bound on sync pages, in case the service keeps reporting more
const MAX_PAGES: usize = 1000;

pub struct TimeTreeClient {
    http: reqwest::Client,
    session: Session,
}

#[derive(Debug, Deserialize)]
struct CalendarsResponse {
    calendars: Vec<CalendarMetadata>,
}

#[derive(Debug, Deserialize)]
struct CalendarMetadata {
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    deactivated_at: Option<Value>,
}

impl From<CalendarMetadata> for RemoteCalendar {
    fn from(metadata: CalendarMetadata) -> Self {
        RemoteCalendar {
            id: id_string(&metadata.id),
            name: metadata.name.unwrap_or_default(),
            deactivated: metadata.deactivated_at.is_some_and(|v| !v.is_null()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    events: Vec<Value>,
    /// More pages follow
    #[serde(default)]
    chunk: bool,
    /// Cursor for the next page
    #[serde(default)]
    since: Option<i64>,
}

impl TimeTreeClient {
    pub fn new(session: Session) -> Self {
        TimeTreeClient {
            http: reqwest::Client::new(),
            session,
        }
    }

    /// All calendars of the signed-in account, deactivated ones included.
    pub async fn calendars(&self) -> Result<Vec<RemoteCalendar>> {
        let response: CalendarsResponse = self
            .get("/v2/calendars?since=0")
            .await
            .context("Failed to fetch TimeTree calendars")?;

        Ok(response.calendars.into_iter().map(Into::into).collect())
    }

    /// Every event of a calendar, in the order the service returns them.
    pub async fn events(&self, calendar_id: &str) -> Result<Vec<RemoteEventRecord>> {
        let base = format!("/v1/calendar/{calendar_id}/events/sync");
        let mut page: EventsPage = self
            .get(&base)
            .await
            .with_context(|| format!("Failed to fetch events for calendar {calendar_id}"))?;

        let mut records = collect_records(std::mem::take(&mut page.events));
        let mut pages = 1;

        while page.chunk {
            let Some(since) = page.since else {
                tracing::warn!("TimeTree reported more events without a cursor; stopping");
                break;
            };
            if pages >= MAX_PAGES {
                tracing::warn!("Stopped after {} pages of events", pages);
                break;
            }

            tracing::debug!("Fetching events page {} (since={})", pages + 1, since);
            page = self
                .get(&format!("{base}?since={since}"))
                .await
                .with_context(|| format!("Failed to fetch events for calendar {calendar_id}"))?;
            records.extend(collect_records(std::mem::take(&mut page.events)));
            pages += 1;
        }

        tracing::debug!("Fetched {} events in {} pages", records.len(), pages);
        Ok(records)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{API_BASE}{path}"))
            .header(CLIENT_HEADER, CLIENT_HEADER_VALUE)
            .header(reqwest::header::COOKIE, self.session.cookie())
            .send()
            .await
            .context("Failed to send request to TimeTree")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("TimeTree API error ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse TimeTree response")
    }
}

/// Non-object entries are not events; drop them here.
fn collect_records(events: Vec<Value>) -> Vec<RemoteEventRecord> {
    events
        .into_iter()
        .filter_map(RemoteEventRecord::from_value)
        .collect()
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_calendar_metadata() {
        let response: CalendarsResponse = serde_json::from_value(json!({
            "calendars": [
                {"id": 12345, "name": "Old", "deactivated_at": 1_600_000_000_000_i64},
                {"id": "67890", "name": "Family", "deactivated_at": null, "color": "#fff"},
            ]
        }))
        .unwrap();

        let calendars: Vec<RemoteCalendar> =
            response.calendars.into_iter().map(Into::into).collect();
        assert_eq!(calendars[0].id, "12345");
        assert!(calendars[0].deactivated);
        assert_eq!(calendars[1].id, "67890");
        assert_eq!(calendars[1].name, "Family");
        assert!(!calendars[1].deactivated);
    }

    #[test]
    fn test_events_page() {
        let mut page: EventsPage = serde_json::from_value(json!({
            "events": [{"uuid": "a", "start_at": 0}, "junk", {"uuid": "b", "start_at": 1}],
            "chunk": true,
            "since": 1700000000000_i64,
        }))
        .unwrap();

        assert!(page.chunk);
        assert_eq!(page.since, Some(1_700_000_000_000));
        let records = collect_records(std::mem::take(&mut page.events));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("uuid"), Some(&json!("b")));
    }

    #[test]
    fn test_last_page_defaults() {
        let page: EventsPage = serde_json::from_value(json!({"events": []})).unwrap();
        assert!(!page.chunk);
        assert_eq!(page.since, None);
    }
}
