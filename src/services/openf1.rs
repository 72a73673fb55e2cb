//! OpenF1 REST client.
//!
//! Resolves a (year, event, session type) selection to an OpenF1 session and
//! fetches its laps, weather, driver list and pit stops.
//! See: https://openf1.org/#api-endpoints

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::helpers::{offset_since, seconds_to_duration};
use crate::models::{LapRecord, Session, SessionInfo, SessionKey, WeatherSample};
use crate::services::provider::{ProviderError, SessionProvider};

/// Client for the OpenF1 API.
#[derive(Debug, Clone)]
pub struct OpenF1Client {
    client: reqwest::Client,
    base_url: String,
}

// --- OpenF1 JSON response types ---

#[derive(Debug, Clone, Deserialize)]
struct OpenF1Session {
    session_key: u32,
    #[serde(default)]
    session_name: String,
    #[serde(default)]
    session_type: String,
    date_start: Option<DateTime<Utc>>,
    location: Option<String>,
    country_name: Option<String>,
    circuit_short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenF1Lap {
    driver_number: u32,
    lap_number: u32,
    date_start: Option<DateTime<Utc>>,
    lap_duration: Option<f64>,
    is_pit_out_lap: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OpenF1Weather {
    date: DateTime<Utc>,
    air_temperature: Option<f64>,
    track_temperature: Option<f64>,
    humidity: Option<f64>,
    /// 0 or 1 in the feed
    rainfall: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenF1Driver {
    driver_number: u32,
    name_acronym: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenF1Pit {
    driver_number: u32,
    lap_number: Option<u32>,
}

impl OpenF1Session {
    /// Case-insensitive substring match of the event against the session's
    /// place names. `event` must already be lowercased.
    fn matches_event(&self, event: &str) -> bool {
        if event.is_empty() {
            return false;
        }
        [&self.location, &self.country_name, &self.circuit_short_name]
            .into_iter()
            .flatten()
            .any(|name| name.to_lowercase().contains(event))
    }
}

impl OpenF1Client {
    pub fn new(base_url: &str, user_agent: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET one OpenF1 collection endpoint.
    async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self.client.get(&url).query(query).send().await?;

        // OpenF1 answers 404 "No results found." when a filter matches nothing
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("OpenF1 /{} returned no results for {:?}", endpoint, query);
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                endpoint: format!("/{}", endpoint),
                status: response.status(),
            });
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| ProviderError::Decode {
                endpoint: format!("/{}", endpoint),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SessionProvider for OpenF1Client {
    async fn fetch_session(&self, key: &SessionKey) -> Result<Session, ProviderError> {
        let sessions: Vec<OpenF1Session> = self
            .get_list("sessions", &[("year", key.year.to_string())])
            .await?;
        let info = select_session(sessions, key)?;

        let by_session = [("session_key", info.provider_key.to_string())];
        let (raw_laps, raw_weather, drivers, pits) = futures::try_join!(
            self.get_list::<OpenF1Lap>("laps", &by_session),
            self.get_list::<OpenF1Weather>("weather", &by_session),
            self.get_list::<OpenF1Driver>("drivers", &by_session),
            self.get_list::<OpenF1Pit>("pit", &by_session),
        )?;

        tracing::debug!(
            "OpenF1 session {} ({}): {} laps, {} weather samples, {} drivers, {} pit stops",
            info.provider_key,
            info.session_name,
            raw_laps.len(),
            raw_weather.len(),
            drivers.len(),
            pits.len()
        );

        let laps = convert_laps(raw_laps, &drivers, &pits, info.date_start);
        let weather = convert_weather(raw_weather, info.date_start);

        Ok(Session {
            key: key.clone(),
            info,
            laps,
            weather,
        })
    }
}

/// Pick the session matching the requested type and event.
///
/// Prefers the session whose name equals the type ("Race" over "Sprint"),
/// then the earliest start ("Practice 1" for Practice).
fn select_session(
    sessions: Vec<OpenF1Session>,
    key: &SessionKey,
) -> Result<SessionInfo, ProviderError> {
    let event = key.event.trim().to_lowercase();
    let type_name = key.session_type.as_str();

    let chosen = sessions
        .into_iter()
        .filter(|s| s.session_type.eq_ignore_ascii_case(type_name))
        .filter(|s| s.matches_event(&event))
        .filter_map(|s| s.date_start.map(|start| (s, start)))
        .min_by_key(|(s, start)| (!s.session_name.eq_ignore_ascii_case(type_name), *start))
        .ok_or_else(|| ProviderError::SessionNotFound(key.to_string()))?;

    let (s, date_start) = chosen;
    Ok(SessionInfo {
        provider_key: s.session_key,
        session_name: s.session_name,
        location: s.location,
        country_name: s.country_name,
        circuit_short_name: s.circuit_short_name,
        date_start,
    })
}

/// Convert OpenF1 laps into session-relative lap records.
///
/// Drivers are identified by acronym when `/drivers` knows them. A lap that
/// appears in `/pit` is the pit-in lap. A missing `date_start` is estimated
/// from the driver's previous lap; laps that cannot be placed are skipped.
fn convert_laps(
    mut raw_laps: Vec<OpenF1Lap>,
    drivers: &[OpenF1Driver],
    pits: &[OpenF1Pit],
    session_start: DateTime<Utc>,
) -> Vec<LapRecord> {
    let acronyms: HashMap<u32, &str> = drivers
        .iter()
        .filter_map(|d| d.name_acronym.as_deref().map(|a| (d.driver_number, a)))
        .collect();
    let pit_in_laps: HashSet<(u32, u32)> = pits
        .iter()
        .filter_map(|p| p.lap_number.map(|lap| (p.driver_number, lap)))
        .collect();

    raw_laps.sort_by_key(|l| (l.driver_number, l.lap_number));

    // driver_number -> (start, duration) of the last placed lap
    let mut previous: HashMap<u32, (Duration, Option<Duration>)> = HashMap::new();
    let mut laps = Vec::with_capacity(raw_laps.len());

    for raw in raw_laps {
        if raw.lap_number == 0 {
            tracing::warn!("Skipping lap 0 for driver {}", raw.driver_number);
            continue;
        }

        let lap_time = raw.lap_duration.and_then(seconds_to_duration);

        let lap_start = match raw.date_start {
            Some(ts) => Some(offset_since(session_start, ts)),
            None => match previous.get(&raw.driver_number) {
                Some((prev_start, Some(prev_time))) => prev_start.checked_add(prev_time),
                _ => None,
            },
        };
        let Some(lap_start) = lap_start else {
            tracing::warn!(
                "Skipping lap {} for driver {}: no start time",
                raw.lap_number,
                raw.driver_number
            );
            continue;
        };
        previous.insert(raw.driver_number, (lap_start, lap_time));

        let driver = acronyms
            .get(&raw.driver_number)
            .map(|a| a.to_string())
            .unwrap_or_else(|| raw.driver_number.to_string());

        laps.push(LapRecord {
            driver,
            lap_number: raw.lap_number,
            lap_start,
            lap_time,
            is_pit_out_lap: raw.is_pit_out_lap.unwrap_or(false),
            is_pit_in_lap: pit_in_laps.contains(&(raw.driver_number, raw.lap_number)),
        });
    }

    laps
}

/// Convert OpenF1 weather readings into session-relative samples.
fn convert_weather(raw: Vec<OpenF1Weather>, session_start: DateTime<Utc>) -> Vec<WeatherSample> {
    raw.into_iter()
        .map(|w| WeatherSample {
            time: offset_since(session_start, w.date),
            rainfall: w.rainfall.map(|r| r > 0.0),
            track_temp_c: w.track_temperature,
            air_temp_c: w.air_temperature,
            humidity_pct: w.humidity,
        })
        .collect()
}
