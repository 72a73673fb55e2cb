//! Session domain types shared by the loader, the pipeline and the routes.
//!
//! All times inside a [`Session`] are offsets from the session start, so the
//! lap table and the weather table live on the same axis.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// The three session kinds the dashboard can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub enum SessionType {
    Practice,
    Qualifying,
    Race,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Practice => "Practice",
            SessionType::Qualifying => "Qualifying",
            SessionType::Race => "Race",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "practice" => Ok(SessionType::Practice),
            "qualifying" => Ok(SessionType::Qualifying),
            "race" => Ok(SessionType::Race),
            other => Err(format!(
                "unknown session type '{}' (expected Practice, Qualifying or Race)",
                other
            )),
        }
    }
}

/// Cache key for a loaded session: the exact selection tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub year: i32,
    pub event: String,
    pub session_type: SessionType,
}

impl SessionKey {
    pub fn new(year: i32, event: impl Into<String>, session_type: SessionType) -> Self {
        Self {
            year,
            event: event.into(),
            session_type,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} - {}", self.event, self.year, self.session_type)
    }
}

/// Provider-side metadata for a resolved session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Provider identifier (OpenF1 `session_key`)
    pub provider_key: u32,
    /// e.g. "Race", "Sprint", "Practice 2"
    pub session_name: String,
    pub location: Option<String>,
    pub country_name: Option<String>,
    pub circuit_short_name: Option<String>,
    /// Wall-clock session start; every offset in the session is relative to it.
    pub date_start: DateTime<Utc>,
}

/// Timing data for one driver's lap.
#[derive(Debug, Clone, PartialEq)]
pub struct LapRecord {
    /// Driver id (three-letter acronym, e.g. "VER")
    pub driver: String,
    /// 1-based, unique per driver
    pub lap_number: u32,
    /// Offset from session start
    pub lap_start: Duration,
    /// `None` for incomplete laps
    pub lap_time: Option<Duration>,
    pub is_pit_out_lap: bool,
    pub is_pit_in_lap: bool,
}

/// One weather station reading.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSample {
    /// Offset from session start
    pub time: Duration,
    pub rainfall: Option<bool>,
    pub track_temp_c: Option<f64>,
    pub air_temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
}

/// A loaded session: immutable once fetched.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,
    pub info: SessionInfo,
    pub laps: Vec<LapRecord>,
    pub weather: Vec<WeatherSample>,
}

impl Session {
    /// Distinct driver ids in order of first appearance in the lap table.
    pub fn drivers(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.laps
            .iter()
            .filter(|lap| seen.insert(lap.driver.as_str()))
            .map(|lap| lap.driver.clone())
            .collect()
    }
}
