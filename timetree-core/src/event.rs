//! Normalized event types.
//!
//! An [`EventModel`] is built once from a [`RemoteEventRecord`] and never
//! changed afterwards; the converter only reads it.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{ParseError, ParseResult, RecurrenceTranslationWarning};
use crate::record::{RawTime, RemoteEventRecord};
use crate::recurrence::{RecurrenceRule, parse_recurrence};

/// Remote `type` value for birthday entries.
const TYPE_BIRTHDAY: i64 = 1;
/// Remote `category` value for memo ("keep") entries.
const CATEGORY_MEMO: i64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    /// All-day boundary
    Date(NaiveDate),
    /// Instant carried in the event's own zone
    DateTime(DateTime<Tz>),
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Calendar date in the value's own zone.
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTime(dt) => dt.date_naive(),
        }
    }

    /// Dates are taken as midnight UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
            EventTime::DateTime(dt) => dt.with_timezone(&Utc),
        }
    }

    pub fn timezone(&self) -> Option<Tz> {
        match self {
            EventTime::Date(_) => None,
            EventTime::DateTime(dt) => Some(dt.timezone()),
        }
    }

    /// TZID to qualify this value with, `None` for dates and UTC times.
    pub fn tzid(&self) -> Option<&'static str> {
        self.timezone().filter(|tz| !is_utc(*tz)).map(|tz| tz.name())
    }

    /// Property value in iCalendar form (`20240101`, `20240101T090000Z`
    /// or local `20240101T090000` to be paired with [`EventTime::tzid`]).
    pub fn to_ics_string(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
            EventTime::DateTime(dt) if self.tzid().is_none() => {
                dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string()
            }
            EventTime::DateTime(dt) => dt.naive_local().format("%Y%m%dT%H%M%S").to_string(),
        }
    }
}

pub(crate) fn is_utc(tz: Tz) -> bool {
    matches!(
        tz.name(),
        "UTC" | "Etc/UTC" | "Etc/UCT" | "Etc/Universal" | "Etc/Zulu" | "Universal" | "Zulu"
    )
}

/// What the remote service says this entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Birthday,
    Memo,
}

/// Why an event is deliberately left out of the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    Birthday,
    Memo,
    Cancelled,
}

impl std::fmt::Display for Unsupported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unsupported::Birthday => write!(f, "birthday entries are not exported"),
            Unsupported::Memo => write!(f, "memo entries are not exported"),
            Unsupported::Cancelled => write!(f, "event is cancelled or deleted"),
        }
    }
}

/// A reminder/alarm for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reminder {
    /// Minutes before the event to trigger
    pub minutes: i64,
}

/// An event attendee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub name: Option<String>,
    pub email: String,
}

/// A calendar event, parsed and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct EventModel {
    pub id: String,
    pub title: String,
    /// Empty when the record had none
    pub description: String,
    pub location: Option<String>,
    pub url: Option<String>,
    /// (latitude, longitude)
    pub geo: Option<(f64, f64)>,

    pub is_all_day: bool,
    /// `Date` when all-day, `DateTime` otherwise
    pub start: EventTime,
    /// Last included day when all-day (inclusive), end instant otherwise
    pub end: EventTime,
    /// Zone used to read naive timestamps
    pub timezone: Tz,

    pub recurrence: Option<RecurrenceRule>,
    pub category: Option<String>,
    pub reminders: Vec<Reminder>,
    pub attendees: Vec<Attendee>,

    pub kind: EventKind,
    pub cancelled: bool,
    pub calendar_id: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,

    /// Recurrence problems found while parsing; never fatal
    pub warnings: Vec<RecurrenceTranslationWarning>,
}

impl EventModel {
    /// Build an event from a raw record.
    ///
    /// Fails when `id` or the start boundary is missing or unreadable, or
    /// when the end precedes the start. Missing optional fields become empty
    /// values; naive timestamps are read in the record's timezone, or
    /// `fallback_tz` when the record names none (or an unknown one).
    pub fn parse(record: &RemoteEventRecord, fallback_tz: Tz) -> ParseResult<Self> {
        let id = record
            .text(&["uuid", "id"])
            .ok_or_else(|| ParseError::missing("id"))?;

        let timezone = record
            .text(&["start_timezone", "timezone"])
            .and_then(|name| name.parse::<Tz>().ok())
            .unwrap_or(fallback_tz);
        let end_timezone = record
            .text(&["end_timezone"])
            .and_then(|name| name.parse::<Tz>().ok())
            .unwrap_or(timezone);

        let raw_start = record
            .timestamp(&["start_at", "start"])?
            .ok_or_else(|| ParseError::missing("start"))?;
        let raw_end = record.timestamp(&["end_at", "end"])?;

        let all_day_flag = record.flag(&["all_day", "is_all_day"]);

        // Whole days never go through a zone: midnight may not exist there
        let day_span = match all_day_flag {
            // The flag carries the last day inclusively
            Some(true) => {
                let first_day = local_date(raw_start, timezone);
                let last_day = raw_end.map_or(first_day, |raw| local_date(raw, end_timezone));
                Some((first_day, last_day))
            }
            Some(false) => None,
            None => date_only_span(raw_start, raw_end),
        };

        let (start, end) = match day_span {
            Some((first_day, last_day)) => (EventTime::Date(first_day), EventTime::Date(last_day)),
            None => {
                let start = resolve(raw_start, timezone).ok_or_else(|| {
                    ParseError::invalid("start", format!("does not exist in zone {}", timezone.name()))
                })?;
                let end = match raw_end {
                    Some(raw) => resolve(raw, end_timezone).ok_or_else(|| {
                        ParseError::invalid("end", format!("does not exist in zone {}", end_timezone.name()))
                    })?,
                    None => start.clone(),
                };

                if all_day_flag.is_none() && spans_whole_days(&start, &end) {
                    // An inferred span ends at the following midnight
                    let first_day = start.date_naive();
                    let last_day = end.date_naive().pred_opt().unwrap_or(first_day);
                    (EventTime::Date(first_day), EventTime::Date(last_day))
                } else {
                    (EventTime::DateTime(start), EventTime::DateTime(end))
                }
            }
        };
        let is_all_day = start.is_date();

        if end.to_utc() < start.to_utc() {
            return Err(ParseError::InvalidTimeRange {
                id,
                start: start.to_ics_string(),
                end: end.to_ics_string(),
            });
        }

        let recurrence_lines: Vec<String> = record
            .list(&["recurrences", "recurrence"])
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        let (recurrence, warnings) = parse_recurrence(&recurrence_lines, &id, &start);

        let kind = if record.integer(&["type"]) == Some(TYPE_BIRTHDAY) {
            EventKind::Birthday
        } else if record.integer(&["category"]) == Some(CATEGORY_MEMO) {
            EventKind::Memo
        } else {
            EventKind::Normal
        };

        let category = record.text(&["label", "label_name"]).or_else(|| {
            record
                .get("category")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });

        let cancelled = record.get("deactivated_at").is_some()
            || record.get("deleted_at").is_some()
            || record
                .text(&["status"])
                .is_some_and(|s| s.eq_ignore_ascii_case("cancelled"));

        let geo = match (
            record.float(&["location_lat"]),
            record.float(&["location_lon"]),
        ) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        };

        let reminders = record
            .list(&["alerts"])
            .into_iter()
            .filter_map(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))
            .filter(|minutes| *minutes >= 0 && TimeDelta::try_minutes(*minutes).is_some())
            .map(|minutes| Reminder { minutes })
            .collect();

        let attendees = record
            .list(&["attendees"])
            .into_iter()
            .filter_map(parse_attendee)
            .collect();

        Ok(EventModel {
            title: record.text(&["title", "summary"]).unwrap_or_default(),
            description: record.text(&["note", "description"]).unwrap_or_default(),
            location: record.text(&["location"]),
            url: record.text(&["url"]),
            geo,
            is_all_day,
            start,
            end,
            timezone,
            recurrence,
            category,
            reminders,
            attendees,
            kind,
            cancelled,
            calendar_id: record.text(&["calendar_id"]),
            created: optional_instant(record, "created_at", timezone),
            updated: optional_instant(record, "updated_at", timezone),
            warnings,
            id,
        })
    }

    /// Why this event is not exported, if it is not.
    pub fn unsupported(&self) -> Option<Unsupported> {
        if self.cancelled {
            Some(Unsupported::Cancelled)
        } else {
            match self.kind {
                EventKind::Birthday => Some(Unsupported::Birthday),
                EventKind::Memo => Some(Unsupported::Memo),
                EventKind::Normal => None,
            }
        }
    }

    /// DTEND for an all-day event: one day past the last included day.
    pub fn exclusive_end_date(&self) -> Option<NaiveDate> {
        match self.end {
            EventTime::Date(last_day) if self.is_all_day => last_day.checked_add_days(Days::new(1)),
            _ => None,
        }
    }
}

/// Place a raw timestamp in `tz`. `None` for local times skipped by a DST gap.
fn resolve(raw: RawTime, tz: Tz) -> Option<DateTime<Tz>> {
    match raw {
        RawTime::Instant(dt) => Some(dt.with_timezone(&tz)),
        RawTime::Local(naive) => tz.from_local_datetime(&naive).earliest(),
        RawTime::Date(d) => tz.from_local_datetime(&d.and_time(NaiveTime::MIN)).earliest(),
    }
}

/// Calendar day of a raw timestamp as seen in `tz`.
fn local_date(raw: RawTime, tz: Tz) -> NaiveDate {
    match raw {
        RawTime::Instant(dt) => dt.with_timezone(&tz).date_naive(),
        RawTime::Local(naive) => naive.date(),
        RawTime::Date(d) => d,
    }
}

/// Days covered by a record given as bare dates. A lone date, or an end
/// equal to the start, is one day; a later end date is exclusive.
fn date_only_span(start: RawTime, end: Option<RawTime>) -> Option<(NaiveDate, NaiveDate)> {
    match (start, end) {
        (RawTime::Date(first), None) => Some((first, first)),
        (RawTime::Date(first), Some(RawTime::Date(end))) if end == first => Some((first, first)),
        (RawTime::Date(first), Some(RawTime::Date(end))) if end > first => {
            Some((first, end.pred_opt()?))
        }
        _ => None,
    }
}

fn spans_whole_days(start: &DateTime<Tz>, end: &DateTime<Tz>) -> bool {
    start.time() == NaiveTime::MIN && end.time() == NaiveTime::MIN && end > start
}

fn optional_instant(
    record: &RemoteEventRecord,
    field: &'static str,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let raw = record.timestamp(&[field]).ok().flatten()?;
    resolve(raw, tz).map(|dt| dt.with_timezone(&Utc))
}

fn parse_attendee(value: &Value) -> Option<Attendee> {
    match value {
        Value::String(email) if email.contains('@') => Some(Attendee {
            name: None,
            email: email.trim().to_string(),
        }),
        Value::Object(fields) => {
            let email = fields.get("email")?.as_str()?.trim();
            if email.is_empty() {
                return None;
            }
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string);
            Some(Attendee {
                name,
                email: email.to_string(),
            })
        }
        _ => None,
    }
}
