//! Session HTTP endpoints.
//!
//! - GET /api/v1/sessions/:year/:event/:session_type
//! - GET /api/v1/sessions/:year/:event/:session_type/views?driver=VER

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, ErrorResponse};
use crate::helpers::duration_to_seconds;
use crate::models::{SessionKey, SessionType};
use crate::services::pipeline::{
    build_views, DriverFilter, MergedLap, QuickLapPolicy, SummaryView,
};
use crate::services::session::SessionLoader;
use crate::services::trend::{track_temp_trends, TrendLine, TRENDLINE_AVAILABLE};

/// Shared application state for all endpoints.
#[derive(Clone)]
pub struct AppState {
    pub loader: SessionLoader,
    pub quick_laps: QuickLapPolicy,
}

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ViewsQuery {
    /// Driver abbreviation (e.g. "VER"); omit, "All" or "All Drivers" for everyone
    pub driver: Option<String>,
}

// ---------------------------------------------------------------------------
// Column tables
// ---------------------------------------------------------------------------

/// A table serialised column-wise: `{"Driver": [...], "LapNumber": [...]}`.
///
/// Columns keep their insertion order in the JSON output and every column
/// has one value per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    columns: Vec<(&'static str, Vec<Value>)>,
}

impl ColumnTable {
    fn column<T: Into<Value>>(
        mut self,
        name: &'static str,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        self.columns
            .push((name, values.into_iter().map(Into::into).collect()));
        self
    }

    /// Number of rows (length of the first column).
    #[cfg(test)]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }
}

impl Serialize for ColumnTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

fn lap_table(rows: &[MergedLap]) -> ColumnTable {
    ColumnTable::default()
        .column("Driver", rows.iter().map(|r| r.driver.clone()))
        .column("LapNumber", rows.iter().map(|r| r.lap_number))
        .column("SessionTime", rows.iter().map(|r| duration_to_seconds(r.lap_start)))
        .column("LapTime_seconds", rows.iter().map(|r| r.lap_time_seconds))
        .column("TrackTemp", rows.iter().map(|r| r.track_temp_c))
        .column("AirTemp", rows.iter().map(|r| r.air_temp_c))
        .column("Humidity", rows.iter().map(|r| r.humidity_pct))
        .column("Rainfall", rows.iter().map(|r| r.rainfall))
        .column("Rain", rows.iter().map(|r| r.rain))
        .column("WeatherTime", rows.iter().map(|r| duration_to_seconds(r.weather_time)))
}

fn summary_table(summary: &SummaryView) -> ColumnTable {
    ColumnTable::default()
        .column("Driver", summary.rows.iter().map(|r| r.driver.clone()))
        .column("avg_lap_time", summary.rows.iter().map(|r| r.avg_lap_time))
        .column("lap_count", summary.rows.iter().map(|r| r.lap_count as u64))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response for GET /api/v1/sessions/:year/:event/:session_type.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Status line for the dashboard (e.g. "Loaded: Monza 2023 - Race")
    pub message: String,
    pub year: i32,
    pub event: String,
    pub session_type: SessionType,
    /// Provider session name (e.g. "Race", "Practice 2")
    pub session_name: String,
    pub location: Option<String>,
    pub country_name: Option<String>,
    pub circuit_short_name: Option<String>,
    /// Session start in ISO 8601 / RFC 3339 format
    pub date_start: String,
    pub lap_count: usize,
    pub weather_sample_count: usize,
    /// Driver dropdown options, "All Drivers" last
    pub drivers: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChartTitles {
    pub lap_times: String,
    pub track_temperature: String,
    pub average_lap_time: String,
}

impl ChartTitles {
    fn for_key(key: &SessionKey) -> Self {
        let suffix = format!("{} {} {}", key.event, key.year, key.session_type);
        Self {
            lap_times: format!("Lap Times - {}", suffix),
            track_temperature: format!("Track Temperature vs Lap Time - {}", suffix),
            average_lap_time: format!("Average Lap Time by Driver - {}", suffix),
        }
    }
}

/// Response for GET /api/v1/sessions/:year/:event/:session_type/views.
#[derive(Debug, Serialize, ToSchema)]
pub struct ViewsResponse {
    /// Selected driver, or "All Drivers"
    pub driver: String,
    pub titles: ChartTitles,
    /// False when no filtered lap has a track temperature; draw the
    /// "No temperature data available" placeholder instead
    pub has_track_temperature: bool,
    /// Every quick lap merged with its nearest weather sample
    #[schema(value_type = Object)]
    pub merged: ColumnTable,
    /// Merged laps of the selected driver(s)
    #[schema(value_type = Object)]
    pub filtered: ColumnTable,
    /// Driver, avg_lap_time, lap_count; fastest average first, may be empty
    #[schema(value_type = Object)]
    pub summary: ColumnTable,
    /// Per-driver lap time vs track temperature fits. Null when the server
    /// was built without trend-line support.
    pub trendlines: Option<Vec<TrendLine>>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate the path selection and build the cache key.
fn parse_key(year: i32, event: &str, session_type: &str) -> Result<SessionKey, AppError> {
    if year <= 0 {
        return Err(AppError::BadRequest(format!("Invalid year: {}", year)));
    }
    let event = event.trim();
    if event.is_empty() {
        return Err(AppError::BadRequest("Event must not be empty".to_string()));
    }
    let session_type: SessionType = session_type.parse().map_err(AppError::BadRequest)?;
    Ok(SessionKey::new(year, event, session_type))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Load a session (from cache when possible) and list its drivers.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{year}/{event}/{session_type}",
    tag = "Sessions",
    params(
        ("year" = i32, Path, description = "Season year (e.g. 2023)"),
        ("event" = String, Path, description = "Event, matched against location, country or circuit (e.g. \"Monza\")"),
        ("session_type" = String, Path, description = "Practice, Qualifying or Race"),
    ),
    responses(
        (status = 200, description = "Session loaded", body = SessionResponse),
        (status = 400, description = "Invalid selection", body = ErrorResponse),
        (status = 502, description = "Session data could not be loaded", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path((year, event, session_type)): Path<(i32, String, String)>,
) -> Result<Json<SessionResponse>, AppError> {
    let key = parse_key(year, &event, &session_type)?;
    let session = state.loader.load_session(&key).await?;

    let mut drivers = session.drivers();
    drivers.push(DriverFilter::ALL_LABEL.to_string());

    Ok(Json(SessionResponse {
        message: format!("Loaded: {}", session.key),
        year: key.year,
        event: key.event.clone(),
        session_type: key.session_type,
        session_name: session.info.session_name.clone(),
        location: session.info.location.clone(),
        country_name: session.info.country_name.clone(),
        circuit_short_name: session.info.circuit_short_name.clone(),
        date_start: session.info.date_start.to_rfc3339(),
        lap_count: session.laps.len(),
        weather_sample_count: session.weather.len(),
        drivers,
    }))
}

/// Merge laps with weather and summarise per driver.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{year}/{event}/{session_type}/views",
    tag = "Sessions",
    params(
        ("year" = i32, Path, description = "Season year (e.g. 2023)"),
        ("event" = String, Path, description = "Event, matched against location, country or circuit (e.g. \"Monza\")"),
        ("session_type" = String, Path, description = "Practice, Qualifying or Race"),
        ViewsQuery,
    ),
    responses(
        (status = 200, description = "Chart data for the selection", body = ViewsResponse),
        (status = 400, description = "Invalid selection", body = ErrorResponse),
        (status = 404, description = "Nothing to plot (no laps, no weather, or unknown driver)", body = ErrorResponse),
        (status = 502, description = "Session data could not be loaded", body = ErrorResponse),
    )
)]
pub async fn get_session_views(
    State(state): State<AppState>,
    Path((year, event, session_type)): Path<(i32, String, String)>,
    Query(params): Query<ViewsQuery>,
) -> Result<Json<ViewsResponse>, AppError> {
    let key = parse_key(year, &event, &session_type)?;
    let driver = DriverFilter::from_query(params.driver.as_deref());
    let session = state.loader.load_session(&key).await?;

    let views = build_views(&session, &driver, state.quick_laps)?;
    tracing::debug!(
        "Built views for {} ({}): {} merged, {} filtered, {} summary rows",
        key,
        driver.label(),
        views.merged.rows.len(),
        views.filtered.rows.len(),
        views.summary.rows.len()
    );

    let trendlines = TRENDLINE_AVAILABLE.then(|| track_temp_trends(&views.filtered.rows));

    Ok(Json(ViewsResponse {
        driver: driver.label().to_string(),
        titles: ChartTitles::for_key(&key),
        has_track_temperature: views.filtered.has_track_temperature(),
        merged: lap_table(&views.merged.rows),
        filtered: lap_table(&views.filtered.rows),
        summary: summary_table(&views.summary),
        trendlines,
    }))
}
