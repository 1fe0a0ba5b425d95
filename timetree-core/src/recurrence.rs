//! Recurrence rules for exported events.
//!
//! The remote service hands over recurrence as RFC 5545 content lines
//! (`RRULE:...`, `EXDATE...:...`). They are parsed into a [`RecurrenceRule`]
//! restricted to the four supported frequencies, checked against the event's
//! DTSTART with the `rrule` crate, and rendered back when converting.
//! Anything that does not survive this round is dropped with a warning and the
//! event is exported as a single occurrence.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::RecurrenceTranslationWarning;
use crate::event::EventTime;

const SUPPORTED_BY_PARTS: &[&str] = &[
    "BYDAY",
    "BYMONTHDAY",
    "BYMONTH",
    "BYYEARDAY",
    "BYWEEKNO",
    "BYSETPOS",
    "WKST",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    pub fn as_ics_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

/// Last occurrence bound of an UNTIL clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceBound {
    Count(u32),
    Until(Until),
}

/// A recurrence rule with its excluded dates.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub bound: Option<RecurrenceBound>,
    /// BY* and WKST parts, kept verbatim in input order
    pub by_parts: Vec<(String, String)>,
    /// Excluded occurrences, in the same value type as the event start
    pub exdates: Vec<EventTime>,
}

impl RecurrenceRule {
    /// Render the RRULE value for an event starting at `start`.
    ///
    /// UNTIL follows the DTSTART value type: a DATE for all-day events,
    /// a UTC date-time otherwise.
    pub fn to_rrule_string(&self, start: &EventTime) -> String {
        let mut parts = vec![format!("FREQ={}", self.frequency.as_ics_str())];

        if self.interval > 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }

        match self.bound {
            Some(RecurrenceBound::Count(count)) => parts.push(format!("COUNT={count}")),
            Some(RecurrenceBound::Until(until)) => {
                let value = match start {
                    EventTime::Date(_) => until_date(until).format("%Y%m%d").to_string(),
                    EventTime::DateTime(dt) => until_instant(until, dt.timezone())
                        .format("%Y%m%dT%H%M%SZ")
                        .to_string(),
                };
                parts.push(format!("UNTIL={value}"));
            }
            None => {}
        }

        for (key, value) in &self.by_parts {
            parts.push(format!("{key}={value}"));
        }

        parts.join(";")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ics_str())
    }
}

/// Parse the remote service's recurrence lines for an event.
///
/// Returns the rule (if one survives) and any warnings raised on the way.
pub(crate) fn parse_recurrence(
    lines: &[String],
    event_id: &str,
    start: &EventTime,
) -> (Option<RecurrenceRule>, Vec<RecurrenceTranslationWarning>) {
    let mut warnings = Vec::new();
    let warn = |reason: String| RecurrenceTranslationWarning {
        event_id: event_id.to_string(),
        reason,
    };

    let mut rrules = Vec::new();
    let mut exdate_lines = Vec::new();

    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let (name, _) = line.split_once([':', ';']).unwrap_or((line, ""));
        match name.to_ascii_uppercase().as_str() {
            "RRULE" => rrules.push(line.split_once(':').map_or("", |(_, v)| v)),
            "EXDATE" => exdate_lines.push(line),
            _ if line.to_ascii_uppercase().starts_with("FREQ=") => rrules.push(line),
            other => warnings.push(warn(format!("unsupported recurrence line '{other}'"))),
        }
    }

    let Some(rrule) = rrules.first() else {
        if !exdate_lines.is_empty() {
            warnings.push(warn("EXDATE without RRULE".to_string()));
        }
        return (None, warnings);
    };

    if rrules.len() > 1 {
        warnings.push(warn(format!(
            "{} RRULE lines present, only the first is used",
            rrules.len()
        )));
    }

    let mut rule = match parse_rrule_value(rrule, start) {
        Ok(rule) => rule,
        Err(reason) => {
            warnings.push(warn(reason));
            return (None, warnings);
        }
    };

    if let Err(reason) = validate(&rule, start) {
        warnings.push(warn(format!("rule rejected: {reason}")));
        return (None, warnings);
    }

    for line in exdate_lines {
        let (exdates, failed) = parse_exdate_line(line, start);
        rule.exdates.extend(exdates);
        for value in failed {
            warnings.push(warn(format!("unreadable EXDATE value '{value}'")));
        }
    }

    (Some(rule), warnings)
}

fn parse_rrule_value(value: &str, start: &EventTime) -> Result<RecurrenceRule, String> {
    let mut frequency = None;
    let mut interval = 1;
    let mut count = None;
    let mut until = None;
    let mut by_parts = Vec::new();

    for part in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, val) = part
            .split_once('=')
            .ok_or_else(|| format!("malformed rule part '{part}'"))?;
        let key = key.to_ascii_uppercase();

        match key.as_str() {
            "FREQ" => {
                frequency = Some(
                    Frequency::from_ics_str(val)
                        .ok_or_else(|| format!("unsupported frequency '{val}'"))?,
                );
            }
            "INTERVAL" => {
                interval = val
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("invalid INTERVAL '{val}'"))?;
            }
            "COUNT" => {
                count = Some(
                    val.parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| format!("invalid COUNT '{val}'"))?,
                );
            }
            "UNTIL" => {
                until = Some(parse_until(val, start).ok_or_else(|| format!("invalid UNTIL '{val}'"))?);
            }
            k if SUPPORTED_BY_PARTS.contains(&k) => {
                by_parts.push((key.clone(), val.to_ascii_uppercase()));
            }
            _ => return Err(format!("unsupported rule part '{key}'")),
        }
    }

    let frequency = frequency.ok_or_else(|| "rule has no FREQ".to_string())?;

    let bound = match (count, until) {
        (Some(_), Some(_)) => return Err("rule has both COUNT and UNTIL".to_string()),
        (Some(count), None) => Some(RecurrenceBound::Count(count)),
        (None, Some(until)) => Some(RecurrenceBound::Until(until)),
        (None, None) => None,
    };

    Ok(RecurrenceRule {
        frequency,
        interval,
        bound,
        by_parts,
        exdates: Vec::new(),
    })
}

fn parse_until(value: &str, start: &EventTime) -> Option<Until> {
    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| Until::DateTime(dt.and_utc()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        return Some(Until::Date(date));
    }

    // Floating UNTIL: read it in the event's own zone
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    let tz = start.timezone().unwrap_or(Tz::UTC);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| Until::DateTime(dt.with_timezone(&Utc)))
}

fn until_date(until: Until) -> NaiveDate {
    match until {
        Until::Date(d) => d,
        Until::DateTime(dt) => dt.date_naive(),
    }
}

/// A DATE bound on a timed event covers the whole of that local day.
fn until_instant(until: Until, tz: Tz) -> DateTime<Utc> {
    match until {
        Until::DateTime(dt) => dt,
        Until::Date(d) => {
            let end_of_day = d.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default());
            tz.from_local_datetime(&end_of_day)
                .latest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| end_of_day.and_utc())
        }
    }
}

/// Check the rule with the `rrule` crate so that clients will accept it.
fn validate(rule: &RecurrenceRule, start: &EventTime) -> Result<(), String> {
    // The rrule crate needs a datetime, so all-day dates become midnight UTC
    let dtstart = match start {
        EventTime::Date(d) => format!("DTSTART:{}T000000Z", d.format("%Y%m%d")),
        EventTime::DateTime(dt) => match start.tzid() {
            Some(tzid) => format!(
                "DTSTART;TZID={}:{}",
                tzid,
                dt.naive_local().format("%Y%m%dT%H%M%S")
            ),
            None => format!(
                "DTSTART:{}",
                dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ")
            ),
        },
    };

    let mut candidate = rule.clone();
    if let Some(RecurrenceBound::Until(until)) = candidate.bound {
        let tz = start.timezone().unwrap_or(Tz::UTC);
        candidate.bound = Some(RecurrenceBound::Until(Until::DateTime(until_instant(until, tz))));
    }
    // Render against a timed start so UNTIL is always a UTC date-time here
    let timed_start = EventTime::DateTime(start.to_utc().with_timezone(&Tz::UTC));
    let rrule = candidate.to_rrule_string(&timed_start);

    format!("{dtstart}\nRRULE:{rrule}")
        .parse::<RRuleSet>()
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Parse one EXDATE line into event times matching the start's value type.
///
/// Handles:
/// - TZID parameter: `EXDATE;TZID=America/New_York:20240108T100000`
/// - VALUE=DATE: `EXDATE;VALUE=DATE:20240108`
/// - UTC: `EXDATE:20240108T100000Z`
/// - Floating: `EXDATE:20240108T100000` (read in the event's zone)
/// - Comma-separated values
///
/// Returns the parsed times and the raw values that could not be read.
fn parse_exdate_line(line: &str, start: &EventTime) -> (Vec<EventTime>, Vec<String>) {
    let Some((params_part, value)) = line.split_once(':') else {
        return (Vec::new(), vec![line.to_string()]);
    };
    let params = params_part
        .get("EXDATE".len()..)
        .unwrap_or("")
        .trim_start_matches(';');

    let tz = params
        .split(';')
        .find_map(|p| p.strip_prefix("TZID="))
        .and_then(|tzid| tzid.parse::<Tz>().ok())
        .or_else(|| start.timezone())
        .unwrap_or(Tz::UTC);

    let mut parsed = Vec::new();
    let mut failed = Vec::new();

    for raw in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match parse_exdate_value(raw, tz).map(|t| align_to_start(t, start)) {
            Some(time) => parsed.push(time),
            None => failed.push(raw.to_string()),
        }
    }

    (parsed, failed)
}

fn parse_exdate_value(s: &str, tz: Tz) -> Option<EventTime> {
    if let Some(utc) = s.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| EventTime::DateTime(dt.and_utc().with_timezone(&Tz::UTC)));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(EventTime::Date(date));
    }

    let naive = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(EventTime::DateTime)
}

/// EXDATE must use the same value type as DTSTART.
fn align_to_start(time: EventTime, start: &EventTime) -> EventTime {
    match (time, start) {
        (EventTime::Date(d), EventTime::Date(_)) => EventTime::Date(d),
        (EventTime::DateTime(dt), EventTime::Date(_)) => EventTime::Date(dt.date_naive()),
        (EventTime::DateTime(dt), EventTime::DateTime(s)) => {
            EventTime::DateTime(dt.with_timezone(&s.timezone()))
        }
        (EventTime::Date(d), EventTime::DateTime(s)) => {
            let tz = s.timezone();
            tz.from_local_datetime(&d.and_time(s.naive_local().time()))
                .earliest()
                .map(EventTime::DateTime)
                .unwrap_or_else(|| EventTime::DateTime(s.clone()))
        }
    }
}
