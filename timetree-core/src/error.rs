//! Error types for the export pipeline.

use thiserror::Error;

/// A remote record that could not be turned into an event.
///
/// These never abort a batch: the record is skipped and counted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Malformed record: field '{field}' {reason}")]
    MalformedRecord { field: &'static str, reason: String },

    #[error("Invalid time range for event '{id}': end {end} precedes start {start}")]
    InvalidTimeRange {
        id: String,
        start: String,
        end: String,
    },
}

impl ParseError {
    pub(crate) fn missing(field: &'static str) -> Self {
        ParseError::MalformedRecord {
            field,
            reason: "is missing".to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ParseError::MalformedRecord {
            field,
            reason: reason.into(),
        }
    }
}

/// Recurrence data that could not be translated.
///
/// Non-fatal: the event is still exported, as a single occurrence when the
/// rule itself was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Recurrence for event '{event_id}' ignored: {reason}")]
pub struct RecurrenceTranslationWarning {
    pub event_id: String,
    pub reason: String,
}

/// The assembled document could not be rendered to valid iCalendar text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ICS serialization error: {0}")]
pub struct SerializationError(pub String);

/// An iCalendar document that could not be read back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ICS parse error: {0}")]
pub struct IcsParseError(pub String);

/// Terminating conditions of an export run.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No exportable events found ({total} records processed)")]
    NoExportableEvents { total: usize },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Errors choosing which remote calendar to export.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No active calendars found")]
    NoActiveCalendars,

    #[error("Calendar '{requested}' not found among active calendars. Available: {available}")]
    CalendarNotFound {
        requested: String,
        available: String,
    },
}

/// Result type alias for record parsing.
pub type ParseResult<T> = Result<T, ParseError>;
