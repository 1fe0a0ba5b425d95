//! Calendar assembly: the export document and its serialized form.

use icalendar::Calendar;

use crate::error::SerializationError;
use crate::ics::{CalendarComponent, escape_text, parse_document};

/// Longest content line, CRLF excluded
const MAX_LINE_OCTETS: usize = 75;

/// The whole export: document metadata plus components in fetch order.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub product_id: String,
    /// Written as X-WR-CALNAME when set
    pub calendar_name: Option<String>,
    components: Vec<CalendarComponent>,
}

impl ExportDocument {
    pub fn components(&self) -> &[CalendarComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Collect converted components into one document, preserving their order.
pub fn assemble(
    components: Vec<CalendarComponent>,
    product_id: impl Into<String>,
    calendar_name: Option<String>,
) -> ExportDocument {
    ExportDocument {
        product_id: product_id.into(),
        calendar_name,
        components,
    }
}

/// Render the document as iCalendar bytes.
///
/// The output is read back before returning; a document that does not
/// survive that is reported instead of being handed to the caller.
pub fn serialize(doc: &ExportDocument) -> Result<Vec<u8>, SerializationError> {
    let mut cal = Calendar::new();
    for component in &doc.components {
        cal.push(component.as_ical().clone());
    }
    let cal = cal.done();

    let output = normalize(&cal.to_string(), doc);

    let parsed = parse_document(&output).map_err(|e| SerializationError(e.to_string()))?;
    if parsed.len() != doc.components.len() {
        return Err(SerializationError(format!(
            "expected {} VEVENT blocks, rendered {}",
            doc.components.len(),
            parsed.len()
        )));
    }
    if let Some((parsed, component)) = parsed
        .iter()
        .zip(&doc.components)
        .find(|(p, c)| p.uid != c.uid())
    {
        return Err(SerializationError(format!(
            "VEVENT order changed: expected UID '{}', found '{}'",
            component.uid(),
            parsed.uid
        )));
    }

    Ok(output.into_bytes())
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with the document's product id, followed by X-WR-CALNAME
/// - Remove CALSCALE:GREGORIAN (it's the default)
/// - Remove DTSTAMP and UID inside VALARM sections (not required by RFC 5545)
fn normalize(ics: &str, doc: &ExportDocument) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            push_folded(&mut result, &format!("PRODID:{}", escape_text(&doc.product_id)));
            if let Some(ref name) = doc.calendar_name {
                push_folded(&mut result, &format!("X-WR-CALNAME:{}", escape_text(name)));
            }
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

/// Append a content line, folded at 75 octets (RFC 5545 section 3.1).
/// Folds never split a UTF-8 sequence.
fn push_folded(out: &mut String, line: &str) {
    let mut octets = 0;
    for c in line.chars() {
        if octets + c.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            octets = 1;
        }
        out.push(c);
        octets += c.len_utf8();
    }
    out.push_str("\r\n");
}
