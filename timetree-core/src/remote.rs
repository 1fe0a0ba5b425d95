//! Remote calendars and which one to export.

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// A calendar as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCalendar {
    pub id: String,
    pub name: String,
    /// Archived or left calendars
    #[serde(default)]
    pub deactivated: bool,
}

/// Pick the calendar to export.
///
/// Deactivated calendars are never chosen. Without `requested`, the first
/// active calendar wins. Only one calendar is exported per run.
pub fn select_calendar<'a>(
    calendars: &'a [RemoteCalendar],
    requested: Option<&str>,
) -> Result<&'a RemoteCalendar, SelectionError> {
    let mut active = calendars.iter().filter(|c| !c.deactivated).peekable();
    if active.peek().is_none() {
        return Err(SelectionError::NoActiveCalendars);
    }

    match requested {
        None => active.next().ok_or(SelectionError::NoActiveCalendars),
        Some(id) => {
            let active: Vec<&RemoteCalendar> = active.collect();
            active.iter().copied().find(|c| c.id == id).ok_or_else(|| {
                SelectionError::CalendarNotFound {
                    requested: id.to_string(),
                    available: active
                        .iter()
                        .map(|c| format!("{} ({})", c.id, c.name))
                        .collect::<Vec<_>>()
                        .join(", "),
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar(id: &str, deactivated: bool) -> RemoteCalendar {
        RemoteCalendar {
            id: id.to_string(),
            name: format!("Calendar {id}"),
            deactivated,
        }
    }

    #[test]
    fn test_first_active_calendar_is_default() {
        let calendars = vec![calendar("1", true), calendar("2", false), calendar("3", false)];
        assert_eq!(select_calendar(&calendars, None).unwrap().id, "2");
    }

    #[test]
    fn test_requested_calendar() {
        let calendars = vec![calendar("1", false), calendar("2", false)];
        assert_eq!(select_calendar(&calendars, Some("2")).unwrap().id, "2");
    }

    #[test]
    fn test_requested_deactivated_calendar_is_not_found() {
        let calendars = vec![calendar("1", true), calendar("2", false)];
        let err = select_calendar(&calendars, Some("1")).unwrap_err();
        assert_eq!(
            err,
            SelectionError::CalendarNotFound {
                requested: "1".to_string(),
                available: "2 (Calendar 2)".to_string(),
            }
        );
    }

    #[test]
    fn test_no_active_calendars() {
        assert_eq!(
            select_calendar(&[calendar("1", true)], None),
            Err(SelectionError::NoActiveCalendars)
        );
        assert_eq!(select_calendar(&[], Some("1")), Err(SelectionError::NoActiveCalendars));
    }
}
