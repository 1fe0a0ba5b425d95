//! Client for the TimeTree web API.
//!
//! Only what an export needs: sign in, list calendars, fetch a
//! calendar's events.

mod api;
mod session;

pub use api::TimeTreeClient;
pub use session::Session;

const API_BASE: &str = "https://timetreeapp.com/api";

/// Client identification header the web app sends with every request
const CLIENT_HEADER: &str = "X-Timetreea";
const CLIENT_HEADER_VALUE: &str = "web/2.1.0/en";
