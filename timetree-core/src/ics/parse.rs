//! Reading exported documents back, using the icalendar crate's parser.
//!
//! Serialization uses this to check its own output; tests use it for
//! round-trips.

use chrono::TimeZone;
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::IcsParseError;
use crate::event::{EventTime, Reminder};

/// The fields of one VEVENT that an export promises to preserve.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub rrule: Option<String>,
    pub exdates: Vec<EventTime>,
    pub categories: Option<String>,
    pub reminders: Vec<Reminder>,
}

/// Parse every VEVENT of an iCalendar document, in document order.
pub fn parse_document(content: &str) -> Result<Vec<ParsedEvent>, IcsParseError> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| IcsParseError(e.to_string()))?;

    calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_vevent)
        .collect()
}

fn parse_vevent(vevent: &Component) -> Result<ParsedEvent, IcsParseError> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| IcsParseError("VEVENT without UID".to_string()))?;

    let start = required_time(vevent, "DTSTART", &uid)?;
    let end = required_time(vevent, "DTEND", &uid)?;

    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_default();
    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| unescape_text(p.val.as_ref()));
    let categories = vevent
        .find_prop("CATEGORIES")
        .map(|p| unescape_text(p.val.as_ref()));
    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());

    let exdates = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .filter_map(|p| DatePerhapsTime::try_from(p).ok())
        .filter_map(to_event_time)
        .collect();

    // Reminders from VALARM components
    let reminders = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| {
            let trigger = alarm.find_prop("TRIGGER")?.val.as_ref();
            let minutes = parse_trigger_minutes(trigger)?;
            Some(Reminder { minutes })
        })
        .collect();

    Ok(ParsedEvent {
        uid,
        summary,
        description,
        start,
        end,
        rrule,
        exdates,
        categories,
        reminders,
    })
}

fn required_time(vevent: &Component, name: &str, uid: &str) -> Result<EventTime, IcsParseError> {
    vevent
        .find_prop(name)
        .and_then(|p: &Property| DatePerhapsTime::try_from(p).ok())
        .and_then(to_event_time)
        .ok_or_else(|| IcsParseError(format!("VEVENT '{uid}' has no readable {name}")))
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info.
/// Floating times and unknown TZIDs have no place in an export.
fn to_event_time(dpt: DatePerhapsTime) -> Option<EventTime> {
    match dpt {
        DatePerhapsTime::Date(d) => Some(EventTime::Date(d)),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => Some(EventTime::DateTime(dt.with_timezone(&Tz::UTC))),
            CalendarDateTime::Floating(_) => None,
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let tz: Tz = tzid.parse().ok()?;
                tz.from_local_datetime(&date_time)
                    .earliest()
                    .map(EventTime::DateTime)
            }
        },
    }
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse TRIGGER value to minutes before event (-PT30M, -P1D, etc.)
fn parse_trigger_minutes(value: &str) -> Option<i64> {
    let is_before = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let minutes = (std_duration.as_secs() / 60) as i64;

    Some(if is_before { minutes } else { -minutes })
}
