//! Event model and iCalendar conversion for TimeTree exports.
//!
//! The pipeline is pure and synchronous:
//! - [`record`] wraps the untyped records the remote service returns
//! - [`event`] parses them into validated [`EventModel`]s
//! - [`ics`] converts events into VEVENTs and reads documents back
//! - [`calendar`] assembles and serializes the document
//! - [`export`] runs the whole batch and reports what was skipped
//!
//! Nothing here logs or touches the network; results carry the counts.

pub mod calendar;
pub mod constants;
pub mod error;
pub mod event;
pub mod export;
pub mod ics;
pub mod record;
pub mod recurrence;
pub mod remote;

pub use calendar::{ExportDocument, assemble, serialize};
pub use error::{
    ExportError, IcsParseError, ParseError, RecurrenceTranslationWarning, SelectionError,
    SerializationError,
};
pub use event::{Attendee, EventKind, EventModel, EventTime, Reminder, Unsupported};
pub use export::{Export, ExportOptions, ExportReport, SkipReason, SkippedEvent, export};
pub use ics::{CalendarComponent, ParsedEvent, convert, parse_document};
pub use record::RemoteEventRecord;
pub use recurrence::{Frequency, RecurrenceBound, RecurrenceRule, Until};
pub use remote::{RemoteCalendar, select_calendar};
