//! Lap/weather alignment and per-driver aggregation.
//!
//! Pure functions over a loaded [`Session`]; every request recomputes the
//! views from scratch, so runs never share state.
//!
//! Steps:
//!   1. quick-lap filter (policy driven)
//!   2. put weather on the lap time axis (session-relative milliseconds)
//!   3. nearest-time merge, one merged row per lap
//!   4. null rainfall counts as dry
//!   5. driver filter
//!   6. mean lap time and lap count per driver

use chrono::Duration;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::helpers::{duration_to_seconds, opt_duration_to_seconds};
use crate::models::{LapRecord, Session, WeatherSample};

/// Default multiple of the fastest lap above which a lap is not "quick".
pub const DEFAULT_QUICK_LAP_THRESHOLD: f64 = 1.07;

/// Which laps count towards the views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuickLapPolicy {
    /// Keep every lap, including pit laps and incomplete laps.
    Disabled,
    /// Drop pit-in/pit-out laps, laps without a time, and laps slower than
    /// `threshold ×` the fastest lap of the session.
    Threshold(f64),
}

impl Default for QuickLapPolicy {
    fn default() -> Self {
        QuickLapPolicy::Threshold(DEFAULT_QUICK_LAP_THRESHOLD)
    }
}

/// Driver selection for the filtered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverFilter {
    All,
    Driver(String),
}

impl DriverFilter {
    /// Label the dashboard uses for the "every driver" option.
    pub const ALL_LABEL: &'static str = "All Drivers";

    /// Interpret a `driver` query value; absent, "All" and "All Drivers"
    /// select everyone.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => DriverFilter::All,
            Some(v) if v.eq_ignore_ascii_case("all") || v.eq_ignore_ascii_case(Self::ALL_LABEL) => {
                DriverFilter::All
            }
            Some(v) => DriverFilter::Driver(v.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DriverFilter::All => Self::ALL_LABEL,
            DriverFilter::Driver(id) => id,
        }
    }

    fn matches(&self, driver: &str) -> bool {
        match self {
            DriverFilter::All => true,
            DriverFilter::Driver(id) => id == driver,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No valid lap data available")]
    NoLapData,
    #[error("No weather data available")]
    NoWeatherData,
    #[error("No data available for driver {0}")]
    NoDriverData(String),
}

/// One lap with the weather of the nearest sample attached.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedLap {
    pub driver: String,
    pub lap_number: u32,
    pub lap_start: Duration,
    /// `None` for incomplete laps
    pub lap_time_seconds: Option<f64>,
    /// Offset of the weather sample that was matched
    pub weather_time: Duration,
    pub track_temp_c: Option<f64>,
    pub air_temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    /// As reported by the matched sample
    pub rainfall: Option<bool>,
    /// `rainfall` with null read as dry
    pub rain: bool,
}

/// Every quick lap, merged with weather, ordered by lap start.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedView {
    pub rows: Vec<MergedLap>,
}

/// The merged rows of the selected driver(s).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilteredView {
    pub rows: Vec<MergedLap>,
}

impl FilteredView {
    /// Whether any row has a track temperature to plot against.
    pub fn has_track_temperature(&self) -> bool {
        self.rows.iter().any(|r| r.track_temp_c.is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverSummary {
    pub driver: String,
    /// Mean lap time in seconds over laps with a time
    pub avg_lap_time: f64,
    /// Number of laps with a time
    pub lap_count: usize,
}

/// One row per driver, fastest average first. May be empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryView {
    pub rows: Vec<DriverSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionViews {
    pub merged: MergedView,
    pub filtered: FilteredView,
    pub summary: SummaryView,
}

/// Run the full pipeline for one selection. All three views are produced
/// or none are.
pub fn build_views(
    session: &Session,
    driver_filter: &DriverFilter,
    policy: QuickLapPolicy,
) -> Result<SessionViews, PipelineError> {
    let laps = pick_quick_laps(&session.laps, policy);
    if laps.is_empty() {
        return Err(PipelineError::NoLapData);
    }

    let axis = WeatherAxis::new(&session.weather)?;
    let merged = merge_nearest(&laps, &axis);
    let filtered = filter_driver(&merged, driver_filter)?;
    let summary = summarize(&filtered);

    Ok(SessionViews {
        merged,
        filtered,
        summary,
    })
}

/// Step 1: apply the quick-lap policy.
fn pick_quick_laps(laps: &[LapRecord], policy: QuickLapPolicy) -> Vec<&LapRecord> {
    let threshold = match policy {
        QuickLapPolicy::Disabled => return laps.iter().collect(),
        QuickLapPolicy::Threshold(t) => t,
    };

    let Some(fastest) = laps.iter().filter_map(|l| l.lap_time).min() else {
        return Vec::new();
    };
    let cutoff = duration_to_seconds(fastest) * threshold;

    laps.iter()
        .filter(|l| !l.is_pit_in_lap && !l.is_pit_out_lap)
        .filter(|l| {
            l.lap_time
                .map(|t| duration_to_seconds(t) < cutoff)
                .unwrap_or(false)
        })
        .collect()
}

/// Step 2: weather samples sorted on the session-relative millisecond axis.
struct WeatherAxis<'a> {
    points: Vec<(i64, &'a WeatherSample)>,
}

impl<'a> WeatherAxis<'a> {
    fn new(weather: &'a [WeatherSample]) -> Result<Self, PipelineError> {
        if weather.is_empty() {
            return Err(PipelineError::NoWeatherData);
        }
        let mut points: Vec<(i64, &WeatherSample)> = weather
            .iter()
            .map(|w| (w.time.num_milliseconds(), w))
            .collect();
        // Stable: equal timestamps keep provider order
        points.sort_by_key(|(t, _)| *t);
        Ok(Self { points })
    }

    /// The sample closest to `t_ms`; the earlier one wins an exact tie.
    fn nearest(&self, t_ms: i64) -> &'a WeatherSample {
        let idx = self.points.partition_point(|(t, _)| *t <= t_ms);
        let chosen = match (idx.checked_sub(1), self.points.get(idx)) {
            (Some(before), Some((after_t, _))) => {
                let before_t = self.points[before].0;
                if t_ms - before_t <= after_t - t_ms {
                    before
                } else {
                    idx
                }
            }
            (Some(before), None) => before,
            (None, _) => idx,
        };
        self.points[chosen].1
    }
}

/// Steps 3 and 4: attach nearest weather to every lap.
fn merge_nearest(laps: &[&LapRecord], axis: &WeatherAxis<'_>) -> MergedView {
    let mut ordered: Vec<&LapRecord> = laps.to_vec();
    ordered.sort_by_key(|l| l.lap_start);

    let rows = ordered
        .into_iter()
        .map(|lap| {
            let w = axis.nearest(lap.lap_start.num_milliseconds());
            MergedLap {
                driver: lap.driver.clone(),
                lap_number: lap.lap_number,
                lap_start: lap.lap_start,
                lap_time_seconds: opt_duration_to_seconds(lap.lap_time),
                weather_time: w.time,
                track_temp_c: w.track_temp_c,
                air_temp_c: w.air_temp_c,
                humidity_pct: w.humidity_pct,
                rainfall: w.rainfall,
                rain: w.rainfall.unwrap_or(false),
            }
        })
        .collect();

    MergedView { rows }
}

/// Step 5: keep the selected driver's rows.
fn filter_driver(
    merged: &MergedView,
    driver_filter: &DriverFilter,
) -> Result<FilteredView, PipelineError> {
    let rows: Vec<MergedLap> = merged
        .rows
        .iter()
        .filter(|r| driver_filter.matches(&r.driver))
        .cloned()
        .collect();

    if let DriverFilter::Driver(id) = driver_filter {
        if rows.is_empty() {
            return Err(PipelineError::NoDriverData(id.clone()));
        }
    }

    Ok(FilteredView { rows })
}

/// Step 6: mean and count of lap times per driver, fastest first.
fn summarize(filtered: &FilteredView) -> SummaryView {
    // driver -> (sum of seconds, count)
    let mut groups: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in &filtered.rows {
        let entry = groups.entry(row.driver.as_str()).or_insert((0.0, 0));
        if let Some(secs) = row.lap_time_seconds.filter(|s| s.is_finite()) {
            entry.0 += secs;
            entry.1 += 1;
        }
    }

    let mut rows: Vec<DriverSummary> = groups
        .into_iter()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(driver, (sum, count))| DriverSummary {
            driver: driver.to_string(),
            avg_lap_time: sum / count as f64,
            lap_count: count,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.avg_lap_time
            .total_cmp(&b.avg_lap_time)
            .then_with(|| a.driver.cmp(&b.driver))
    });

    SummaryView { rows }
}
