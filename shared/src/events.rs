//! System event access (syslog on Linux hosts).

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::{Error, Result};

/// Number of trailing syslog lines inspected per request.
pub const TAIL_LINES: usize = 200;

const SYSLOG_PATHS: [&str; 2] = ["/var/log/syslog", "/var/log/messages"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Windows,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    All,
    Error,
    Warning,
}

/// `/events` response payload.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<String>,
}

impl FromStr for EventSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(Error::Validation(format!(
                "source must be one of windows, linux (got {})",
                other
            ))),
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("windows"),
            Self::Linux => f.write_str("linux"),
        }
    }
}

impl FromStr for EventLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            other => Err(Error::Validation(format!(
                "level must be one of all, error, warning (got {})",
                other
            ))),
        }
    }
}

impl EventLevel {
    fn keeps(&self, line: &str) -> bool {
        match self {
            Self::All => true,
            Self::Error => line.to_ascii_lowercase().contains("error"),
            Self::Warning => line.to_ascii_lowercase().contains("warn"),
        }
    }
}

/// Reads recent events from the host's system log.
///
/// Only the Linux syslog is wired up; other source/host pairs are reported as
/// unsupported.
pub fn read_events(source: EventSource, level: EventLevel) -> Result<EventsResponse> {
    match source {
        EventSource::Linux if cfg!(target_os = "linux") => {
            let path = SYSLOG_PATHS
                .iter()
                .map(Path::new)
                .find(|p| p.exists())
                .unwrap_or_else(|| Path::new(SYSLOG_PATHS[1]));

            let bytes = std::fs::read(path)?;
            let text = String::from_utf8_lossy(&bytes);
            Ok(EventsResponse {
                events: filter_tail(&text, level, TAIL_LINES),
            })
        }
        _ => Err(Error::Unsupported(format!(
            "{} logs not available on {}",
            source,
            host_os_name()
        ))),
    }
}

/// Keeps the last `tail` lines, then applies the level filter.
pub fn filter_tail(text: &str, level: EventLevel, tail: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(tail);

    lines[start..]
        .iter()
        .filter(|line| level.keeps(line))
        .map(|line| line.trim().to_string())
        .collect()
}

fn host_os_name() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "windows" => "Windows",
        "macos" => "Darwin",
        other => other,
    }
}
