//! ICS generation and parsing.
//!
//! This module handles writing VEVENTs and reading exports back according to RFC 5545.

mod generate;
mod parse;

pub use generate::{CalendarComponent, convert};
pub(crate) use generate::escape_text;
pub use parse::{ParsedEvent, parse_document};
