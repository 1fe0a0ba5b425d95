//! Batch export: records in, one iCalendar document out.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar::{ExportDocument, assemble};
use crate::constants::{DEFAULT_TIMEZONE, PRODUCT_ID};
use crate::error::{ExportError, ParseError, RecurrenceTranslationWarning};
use crate::event::{EventModel, Unsupported};
use crate::ics::convert;
use crate::record::RemoteEventRecord;

/// Settings for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Zone for timestamps whose record names no (known) zone
    pub fallback_timezone: Tz,
    pub product_id: String,
    pub calendar_name: Option<String>,
    /// DTSTAMP for events without created/updated times
    pub generated_at: DateTime<Utc>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            fallback_timezone: DEFAULT_TIMEZONE,
            product_id: PRODUCT_ID.to_string(),
            calendar_name: None,
            generated_at: Utc::now(),
        }
    }
}

/// Why a record did not make it into the document.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Invalid(ParseError),
    Unsupported(Unsupported),
    /// A record with the same id was already exported
    DuplicateId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Invalid(e) => write!(f, "{e}"),
            SkipReason::Unsupported(u) => write!(f, "{u}"),
            SkipReason::DuplicateId => write!(f, "duplicate event id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEvent {
    /// Position in the input batch
    pub index: usize,
    pub id: Option<String>,
    pub reason: SkipReason,
}

/// Outcome counts of an export run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub converted: usize,
    pub total: usize,
    pub skipped: Vec<SkippedEvent>,
    pub warnings: Vec<RecurrenceTranslationWarning>,
}

#[derive(Debug, Clone)]
pub struct Export {
    pub document: ExportDocument,
    pub report: ExportReport,
}

/// Parse, convert and assemble a batch of records.
///
/// Per-record failures are collected in the report and never stop the
/// batch. Fails only when no record could be converted.
pub fn export(records: &[RemoteEventRecord], options: &ExportOptions) -> Result<Export, ExportError> {
    let mut report = ExportReport {
        total: records.len(),
        ..Default::default()
    };
    let mut components = Vec::new();
    let mut seen = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let event = match EventModel::parse(record, options.fallback_timezone) {
            Ok(event) => event,
            Err(e) => {
                report.skipped.push(SkippedEvent {
                    index,
                    id: record.text(&["uuid", "id"]),
                    reason: SkipReason::Invalid(e),
                });
                continue;
            }
        };

        let Some(component) = convert(&event, options.generated_at) else {
            report.skipped.extend(event.unsupported().map(|reason| SkippedEvent {
                index,
                id: Some(event.id.clone()),
                reason: SkipReason::Unsupported(reason),
            }));
            continue;
        };

        if !seen.insert(event.id.clone()) {
            report.skipped.push(SkippedEvent {
                index,
                id: Some(event.id),
                reason: SkipReason::DuplicateId,
            });
            continue;
        }

        report.warnings.extend(event.warnings);
        components.push(component);
    }

    report.converted = components.len();
    if report.converted == 0 {
        return Err(ExportError::NoExportableEvents {
            total: report.total,
        });
    }

    let document = assemble(
        components,
        options.product_id.clone(),
        options.calendar_name.clone(),
    );
    Ok(Export { document, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn records(values: Vec<Value>) -> Vec<RemoteEventRecord> {
        values
            .into_iter()
            .map(|v| RemoteEventRecord::from_value(v).unwrap())
            .collect()
    }

    fn options() -> ExportOptions {
        ExportOptions {
            generated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_counts_and_skip_reasons() {
        let batch = records(vec![
            json!({"uuid": "a", "title": "A", "start_at": "2024-01-01T10:00:00Z"}),
            json!({"uuid": "b", "title": "no start"}),
            json!({"uuid": "c", "start_at": "2024-01-01T10:00:00Z", "type": 1}),
            json!({"uuid": "a", "start_at": "2024-01-02T10:00:00Z"}),
            json!({"uuid": "d", "start_at": "2024-01-01T10:00:00Z",
                   "recurrences": ["RRULE:FREQ=HOURLY"]}),
        ]);

        let export = export(&batch, &options()).unwrap();
        let report = &export.report;

        assert_eq!(report.total, 5);
        assert_eq!(report.converted, 2);
        assert_eq!(export.document.len(), 2);
        assert_eq!(report.skipped.len(), 3);

        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].id.as_deref(), Some("b"));
        assert!(matches!(report.skipped[0].reason, SkipReason::Invalid(_)));
        assert_eq!(
            report.skipped[1].reason,
            SkipReason::Unsupported(Unsupported::Birthday)
        );
        assert_eq!(report.skipped[2].reason, SkipReason::DuplicateId);

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].event_id, "d");
    }

    #[test]
    fn test_no_exportable_events() {
        let batch = records(vec![json!({"uuid": "b"}), json!({"title": "no id"})]);
        let err = export(&batch, &options()).unwrap_err();
        assert!(matches!(err, ExportError::NoExportableEvents { total: 2 }));

        let err = export(&[], &options()).unwrap_err();
        assert!(matches!(err, ExportError::NoExportableEvents { total: 0 }));
    }

    #[test]
    fn test_document_metadata_from_options() {
        let batch = records(vec![json!({"uuid": "a", "start_at": 0})]);
        let options = ExportOptions {
            product_id: "-//test//EN".to_string(),
            calendar_name: Some("Family".to_string()),
            ..options()
        };
        let export = export(&batch, &options).unwrap();
        assert_eq!(export.document.product_id, "-//test//EN");
        assert_eq!(export.document.calendar_name.as_deref(), Some("Family"));
        assert_eq!(export.document.components()[0].uid(), "a");
    }

    #[test]
    fn test_unsupported_record_does_not_claim_its_id() {
        let batch = records(vec![
            json!({"uuid": "a", "start_at": 0, "deactivated_at": 1}),
            json!({"uuid": "a", "title": "Rescheduled", "start_at": 0}),
        ]);

        let export = export(&batch, &options()).unwrap();
        assert_eq!(export.report.converted, 1);
        assert_eq!(
            export.report.skipped,
            vec![SkippedEvent {
                index: 0,
                id: Some("a".to_string()),
                reason: SkipReason::Unsupported(Unsupported::Cancelled),
            }]
        );
    }
}
