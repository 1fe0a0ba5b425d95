use chrono_tz::Tz;

/// Zone for naive timestamps when neither the record nor the config names one
pub const DEFAULT_TIMEZONE: Tz = Tz::UTC;

pub const PRODUCT_ID: &str = "-//timetree-exporter//EN";
