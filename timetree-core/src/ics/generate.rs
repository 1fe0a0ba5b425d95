//! VEVENT generation for a single event.

use chrono::{DateTime, TimeDelta, Utc};
use icalendar::{Alarm, Component, EventLike, Property, Trigger, ValueType};

use crate::event::{EventModel, EventTime};

/// One converted event, keyed by the originating event id.
#[derive(Debug, Clone)]
pub struct CalendarComponent {
    uid: String,
    event: icalendar::Event,
}

impl CalendarComponent {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub(crate) fn as_ical(&self) -> &icalendar::Event {
        &self.event
    }
}

/// Convert an event into a VEVENT.
///
/// Returns `None` for events that are deliberately not exported (see
/// [`EventModel::unsupported`]); callers count those as skipped.
/// `dtstamp` is used when the event carries no modification time.
pub fn convert(event: &EventModel, dtstamp: DateTime<Utc>) -> Option<CalendarComponent> {
    if event.unsupported().is_some() {
        return None;
    }

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.id);
    ics_event.summary(&escape_text(&event.title));

    // DTSTAMP - required by RFC 5545
    let stamp = event.updated.or(event.created).unwrap_or(dtstamp);
    ics_event.add_property("DTSTAMP", format_utc(stamp));

    if let Some(created) = event.created {
        ics_event.add_property("CREATED", format_utc(created));
    }
    if let Some(updated) = event.updated {
        ics_event.add_property("LAST-MODIFIED", format_utc(updated));
    }

    add_datetime_property(&mut ics_event, "DTSTART", &event.start);
    match event.exclusive_end_date() {
        // All-day: DTEND is exclusive
        Some(end) => add_datetime_property(&mut ics_event, "DTEND", &EventTime::Date(end)),
        None => add_datetime_property(&mut ics_event, "DTEND", &event.end),
    }

    if !event.description.is_empty() {
        ics_event.description(&escape_text(&event.description));
    }

    if let Some(ref loc) = event.location {
        ics_event.location(&escape_text(loc));
    }

    if let Some((lat, lon)) = event.geo {
        ics_event.add_property("GEO", format!("{lat};{lon}"));
    }

    if let Some(ref url) = event.url {
        ics_event.add_property("URL", url);
    }

    if let Some(ref recurrence) = event.recurrence {
        ics_event.add_property("RRULE", recurrence.to_rrule_string(&event.start));
        for exdate in &recurrence.exdates {
            add_exdate_property(&mut ics_event, exdate);
        }
    }

    if let Some(ref category) = event.category {
        ics_event.add_property("CATEGORIES", escape_text(category));
    }

    // ATTENDEE (multi-property - can appear multiple times)
    for attendee in &event.attendees {
        let mut prop = Property::new("ATTENDEE", format!("mailto:{}", attendee.email));
        if let Some(ref name) = attendee.name {
            prop.add_parameter("CN", &param_value(name));
        }
        ics_event.append_multi_property(prop);
    }

    // VALARM components - minimal per RFC 5545
    for reminder in event.reminders.iter().filter(|r| r.minutes >= 0) {
        let Some(before) = TimeDelta::try_minutes(reminder.minutes) else {
            continue;
        };
        ics_event.alarm(Alarm::display("Reminder", Trigger::before_start(before)));
    }

    Some(CalendarComponent {
        uid: event.id.clone(),
        event: ics_event.done(),
    })
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape a TEXT value (RFC 5545 section 3.3.11).
pub(crate) fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Parameter values cannot contain DQUOTE and need quoting around `:;,`.
fn param_value(s: &str) -> String {
    let clean: String = s.chars().filter(|c| *c != '"' && !c.is_control()).collect();
    if clean.contains([':', ';', ',']) {
        format!("\"{clean}\"")
    } else {
        clean
    }
}

/// Add a datetime property with proper formatting based on EventTime variant
fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    let value = time.to_ics_string();
    match (time, time.tzid()) {
        (EventTime::Date(_), _) => {
            let mut prop = Property::new(name, value);
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        (EventTime::DateTime(_), Some(tzid)) => {
            let mut prop = Property::new(name, value);
            prop.add_parameter("TZID", tzid);
            ics_event.append_property(prop);
        }
        (EventTime::DateTime(_), None) => {
            // UTC datetime with Z suffix
            ics_event.add_property(name, value);
        }
    }
}

/// Add an EXDATE property for a single exception date
fn add_exdate_property(ics_event: &mut icalendar::Event, time: &EventTime) {
    let mut prop = Property::new("EXDATE", time.to_ics_string());
    match (time, time.tzid()) {
        (EventTime::Date(_), _) => {
            prop.append_parameter(ValueType::Date);
        }
        (EventTime::DateTime(_), Some(tzid)) => {
            prop.add_parameter("TZID", tzid);
        }
        (EventTime::DateTime(_), None) => {}
    }
    ics_event.append_multi_property(prop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Attendee, EventKind, Reminder};
    use crate::recurrence::{Frequency, RecurrenceBound, RecurrenceRule};
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Tz;
    use icalendar::Calendar;

    fn make_test_event() -> EventModel {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        EventModel {
            id: "test-event-123".to_string(),
            title: "Test Event".to_string(),
            description: String::new(),
            location: None,
            url: None,
            geo: None,
            is_all_day: false,
            start: EventTime::DateTime(tz.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()),
            end: EventTime::DateTime(tz.with_ymd_and_hms(2025, 3, 20, 16, 0, 0).unwrap()),
            timezone: tz,
            recurrence: None,
            category: None,
            reminders: vec![],
            attendees: vec![],
            kind: EventKind::Normal,
            cancelled: false,
            calendar_id: None,
            created: None,
            updated: None,
            warnings: vec![],
        }
    }

    fn render(component: &CalendarComponent) -> String {
        let mut cal = Calendar::new();
        cal.push(component.as_ical().clone());
        cal.done().to_string()
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_timed_event_has_tzid() {
        let component = convert(&make_test_event(), stamp()).unwrap();
        let ics = render(&component);

        assert_eq!(component.uid(), "test-event-123");
        assert!(ics.contains("UID:test-event-123"), "ICS:\n{ics}");
        assert!(
            ics.contains("DTSTART;TZID=Asia/Tokyo:20250320T150000"),
            "ICS:\n{ics}"
        );
        assert!(ics.contains("DTEND;TZID=Asia/Tokyo:20250320T160000"), "ICS:\n{ics}");
        assert!(ics.contains("DTSTAMP:20250101T000000Z"), "ICS:\n{ics}");
        assert!(!ics.contains("DESCRIPTION"), "empty description is omitted");
    }

    #[test]
    fn test_utc_event_uses_z_suffix() {
        let mut event = make_test_event();
        event.start = EventTime::DateTime(Tz::UTC.with_ymd_and_hms(2025, 3, 20, 6, 0, 0).unwrap());
        event.end = EventTime::DateTime(Tz::UTC.with_ymd_and_hms(2025, 3, 20, 7, 0, 0).unwrap());

        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("DTSTART:20250320T060000Z"), "ICS:\n{ics}");
        assert!(ics.contains("DTEND:20250320T070000Z"), "ICS:\n{ics}");
    }

    #[test]
    fn test_all_day_event_has_exclusive_end() {
        let mut event = make_test_event();
        event.is_all_day = true;
        event.start = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());
        event.end = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 22).unwrap());

        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("DTSTART;VALUE=DATE:20250320"), "ICS:\n{ics}");
        assert!(ics.contains("DTEND;VALUE=DATE:20250323"), "ICS:\n{ics}");
    }

    #[test]
    fn test_recurrence_and_exdates() {
        let mut event = make_test_event();
        let tz = event.timezone;
        event.recurrence = Some(RecurrenceRule {
            frequency: Frequency::Weekly,
            interval: 1,
            bound: Some(RecurrenceBound::Count(4)),
            by_parts: vec![("BYDAY".to_string(), "TH".to_string())],
            exdates: vec![
                EventTime::DateTime(tz.with_ymd_and_hms(2025, 3, 27, 15, 0, 0).unwrap()),
                EventTime::DateTime(tz.with_ymd_and_hms(2025, 4, 3, 15, 0, 0).unwrap()),
            ],
        });

        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("RRULE:FREQ=WEEKLY;COUNT=4;BYDAY=TH"), "ICS:\n{ics}");
        let exdates = ics.lines().filter(|l| l.starts_with("EXDATE")).count();
        assert_eq!(exdates, 2, "ICS:\n{ics}");
        assert!(ics.contains("EXDATE;TZID=Asia/Tokyo:20250327T150000"), "ICS:\n{ics}");
    }

    #[test]
    fn test_text_fields_are_escaped() {
        let mut event = make_test_event();
        event.title = "Lunch, then review; maybe".to_string();
        event.description = "Line one\nLine two".to_string();
        event.category = Some("Work".to_string());

        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(
            ics.contains("SUMMARY:Lunch\\, then review\\; maybe"),
            "ICS:\n{ics}"
        );
        assert!(ics.contains("DESCRIPTION:Line one\\nLine two"), "ICS:\n{ics}");
        assert!(ics.contains("CATEGORIES:Work"), "ICS:\n{ics}");
    }

    #[test]
    fn test_attendees_and_alarms() {
        let mut event = make_test_event();
        event.attendees = vec![
            Attendee {
                name: Some("Alice".to_string()),
                email: "alice@example.com".to_string(),
            },
            Attendee {
                name: None,
                email: "bob@example.com".to_string(),
            },
        ];
        event.reminders = vec![Reminder { minutes: 30 }];

        let ics = render(&convert(&event, stamp()).unwrap());
        let attendee_count = ics.lines().filter(|l| l.starts_with("ATTENDEE")).count();
        assert_eq!(attendee_count, 2, "ICS:\n{ics}");
        assert!(ics.contains("CN=Alice"), "ICS:\n{ics}");
        assert!(ics.contains("mailto:bob@example.com"), "ICS:\n{ics}");
        assert!(ics.contains("BEGIN:VALARM"), "ICS:\n{ics}");
        assert!(ics.contains("ACTION:DISPLAY"), "ICS:\n{ics}");
    }

    #[test]
    fn test_unsupported_event_is_skipped() {
        let mut event = make_test_event();
        event.kind = EventKind::Birthday;
        assert!(convert(&event, stamp()).is_none());

        let mut event = make_test_event();
        event.cancelled = true;
        assert!(convert(&event, stamp()).is_none());
    }

    #[test]
    fn test_param_value_quoting() {
        assert_eq!(param_value("Alice"), "Alice");
        assert_eq!(param_value("Doe, Jane"), "\"Doe, Jane\"");
        assert_eq!(param_value("say \"hi\""), "say hi");
    }

    #[test]
    fn test_dtstamp_prefers_updated_then_created() {
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();

        let mut event = make_test_event();
        event.created = Some(created);
        event.updated = Some(updated);
        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("DTSTAMP:20240301T083000Z"), "ICS:\n{ics}");
        assert!(ics.contains("CREATED:20240201T080000Z"), "ICS:\n{ics}");
        assert!(ics.contains("LAST-MODIFIED:20240301T083000Z"), "ICS:\n{ics}");

        event.updated = None;
        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("DTSTAMP:20240201T080000Z"), "ICS:\n{ics}");
        assert!(!ics.contains("LAST-MODIFIED"), "ICS:\n{ics}");

        event.created = None;
        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("DTSTAMP:20250101T000000Z"), "ICS:\n{ics}");
        assert!(!ics.contains("CREATED"), "ICS:\n{ics}");
    }

    #[test]
    fn test_location_url_and_geo() {
        let mut event = make_test_event();
        event.location = Some("Room 1, HQ".to_string());
        event.url = Some("https://example.com/meet".to_string());
        event.geo = Some((35.6, 139.7));

        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("LOCATION:Room 1\\, HQ"), "ICS:\n{ics}");
        assert!(ics.contains("URL:https://example.com/meet"), "ICS:\n{ics}");
        assert!(ics.contains("GEO:35.6;139.7"), "ICS:\n{ics}");
    }

    #[test]
    fn test_end_in_other_zone_has_own_tzid() {
        let mut event = make_test_event();
        let la: Tz = "America/Los_Angeles".parse().unwrap();
        event.end = EventTime::DateTime(la.with_ymd_and_hms(2025, 3, 20, 8, 0, 0).unwrap());

        let ics = render(&convert(&event, stamp()).unwrap());
        assert!(ics.contains("DTSTART;TZID=Asia/Tokyo:20250320T150000"), "ICS:\n{ics}");
        assert!(
            ics.contains("DTEND;TZID=America/Los_Angeles:20250320T080000"),
            "ICS:\n{ics}"
        );
    }

    #[test]
    fn test_unusable_reminders_are_dropped() {
        let mut event = make_test_event();
        event.reminders = vec![
            Reminder { minutes: -10 },
            Reminder { minutes: 9_223_372_036_854_775 },
            Reminder { minutes: 15 },
        ];

        let ics = render(&convert(&event, stamp()).unwrap());
        assert_eq!(ics.matches("BEGIN:VALARM").count(), 1, "ICS:\n{ics}");
        let parsed = crate::ics::parse_document(&ics).unwrap();
        assert_eq!(parsed[0].reminders, vec![Reminder { minutes: 15 }]);
    }
}
