use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use timetree_core::constants::DEFAULT_TIMEZONE;

const EMAIL_VAR: &str = "TIMETREE_EMAIL";
const PASSWORD_VAR: &str = "TIMETREE_PASSWORD";
const DEFAULT_OUTPUT: &str = "timetree.ics";

/// Optional settings from ~/.config/timetree-exporter/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Fallback zone for timestamps without one (IANA name)
    pub timezone: Option<String>,
    /// Where to write the .ics file
    pub output: Option<PathBuf>,
    /// Calendar id to export instead of the first active one
    pub calendar: Option<String>,
}

/// Effective settings after applying CLI overrides to the config file.
#[derive(Debug)]
pub struct Settings {
    pub timezone: Tz,
    pub output: PathBuf,
    pub calendar: Option<String>,
}

pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Get the config directory path (~/.config/timetree-exporter)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("timetree-exporter");
    Ok(config_dir)
}

/// Load the config file.
///
/// A missing file at the default location is an empty config; a missing
/// file that was asked for explicitly is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_dir()?.join("config.toml");
            if !path.exists() {
                return Ok(Config::default());
            }
            path
        }
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

    Ok(config)
}

impl Config {
    pub fn resolve(
        self,
        timezone: Option<String>,
        output: Option<PathBuf>,
        calendar: Option<String>,
    ) -> Result<Settings> {
        let timezone = match timezone.or(self.timezone) {
            Some(name) => parse_timezone(&name)?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Settings {
            timezone,
            output: output
                .or(self.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            calendar: calendar.or(self.calendar),
        })
    }
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("Unknown timezone '{}' (expected an IANA name like Asia/Tokyo)", name))
}

/// Read TimeTree credentials from TIMETREE_EMAIL / TIMETREE_PASSWORD
pub fn credentials_from_env() -> Result<Credentials> {
    let email = std::env::var(EMAIL_VAR).ok().filter(|v| !v.is_empty());
    let password = std::env::var(PASSWORD_VAR).ok().filter(|v| !v.is_empty());

    match (email, password) {
        (Some(email), Some(password)) => Ok(Credentials { email, password }),
        _ => anyhow::bail!(
            "Email and password must be provided through the {} and {} environment variables\n\
            (or pass --input to convert a saved events file)",
            EMAIL_VAR,
            PASSWORD_VAR
        ),
    }
}
