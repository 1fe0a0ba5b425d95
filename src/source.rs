//! Where the event records come from: a saved JSON file or the TimeTree API.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use timetree_client::{Session, TimeTreeClient};
use timetree_core::{RemoteEventRecord, select_calendar};

use crate::config::Credentials;

pub struct RecordBatch {
    pub records: Vec<RemoteEventRecord>,
    /// Name of the calendar the records belong to, when known
    pub calendar_name: Option<String>,
}

/// Read records from a JSON file: either an array of events or an
/// object with an `events` array (a saved sync response).
pub fn read_input_file(path: &Path) -> Result<RecordBatch> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file at {}", path.display()))?;

    let records = parse_records(&contents)
        .with_context(|| format!("Failed to parse events file at {}", path.display()))?;

    Ok(RecordBatch {
        records,
        calendar_name: None,
    })
}

fn parse_records(contents: &str) -> Result<Vec<RemoteEventRecord>> {
    let value: Value = serde_json::from_str(contents)?;

    let events = match value {
        Value::Array(events) => events,
        Value::Object(mut fields) => match fields.remove("events") {
            Some(Value::Array(events)) => events,
            _ => anyhow::bail!("expected an \"events\" array"),
        },
        _ => anyhow::bail!("expected a JSON array of events"),
    };

    let total = events.len();
    let records: Vec<RemoteEventRecord> = events
        .into_iter()
        .filter_map(RemoteEventRecord::from_value)
        .collect();

    if records.len() < total {
        tracing::warn!("Ignored {} entries that are not JSON objects", total - records.len());
    }

    Ok(records)
}

/// Sign in and fetch all events of the selected calendar.
pub async fn fetch_remote(credentials: &Credentials, calendar: Option<&str>) -> Result<RecordBatch> {
    let session = Session::login(&credentials.email, &credentials.password).await?;
    let client = TimeTreeClient::new(session);

    let calendars = client.calendars().await?;
    tracing::debug!("Account has {} calendars", calendars.len());

    let selected = select_calendar(&calendars, calendar)?;
    tracing::info!("Exporting calendar '{}' ({})", selected.name, selected.id);

    let records = client.events(&selected.id).await?;

    Ok(RecordBatch {
        records,
        calendar_name: Some(selected.name.clone()).filter(|n| !n.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array() {
        let records = parse_records(r#"[{"uuid": "a"}, {"uuid": "b"}]"#).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_sync_response() {
        let records =
            parse_records(r#"{"events": [{"uuid": "a"}, 42], "chunk": false}"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse_records(r#"{"calendars": []}"#).is_err());
        assert!(parse_records("\"events\"").is_err());
        assert!(parse_records("not json").is_err());
    }
}
