//! Optional trend-line overlay: lap time against track temperature.
//!
//! Only compiled with the `trendline` feature (linfa ordinary least
//! squares). Without it the capability reports unavailable and no trends
//! are produced; the presentation layer decides what to draw.

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::pipeline::MergedLap;

/// Whether this build can compute trend lines.
pub const TRENDLINE_AVAILABLE: bool = cfg!(feature = "trendline");

/// Fewest usable laps a driver needs before a trend is fitted.
#[cfg_attr(not(feature = "trendline"), allow(dead_code))]
const MIN_TREND_POINTS: usize = 3;

/// `lap_time_seconds ≈ slope * track_temp_c + intercept` for one driver.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendLine {
    pub driver: String,
    /// Seconds of lap time per °C of track temperature
    pub slope: f64,
    pub intercept: f64,
    /// Laps the fit was computed from
    pub points: usize,
}

/// Per-driver (track temperature, lap time) pairs with both values present.
#[cfg_attr(not(feature = "trendline"), allow(dead_code))]
fn usable_points(rows: &[MergedLap]) -> std::collections::BTreeMap<&str, Vec<(f64, f64)>> {
    let mut by_driver: std::collections::BTreeMap<&str, Vec<(f64, f64)>> =
        std::collections::BTreeMap::new();
    for row in rows {
        if let (Some(temp), Some(secs)) = (row.track_temp_c, row.lap_time_seconds) {
            if temp.is_finite() && secs.is_finite() {
                by_driver.entry(row.driver.as_str()).or_default().push((temp, secs));
            }
        }
    }
    by_driver
}

/// Fit one trend per driver. Drivers with too few laps, or with a constant
/// track temperature, get no trend.
#[cfg(feature = "trendline")]
pub fn track_temp_trends(rows: &[MergedLap]) -> Vec<TrendLine> {
    use linfa::prelude::*;
    use linfa_linear::LinearRegression;
    use ndarray::{Array1, Array2};

    usable_points(rows)
        .into_iter()
        .filter(|(_, pts)| pts.len() >= MIN_TREND_POINTS)
        .filter(|(_, pts)| {
            let first = pts[0].0;
            pts.iter().any(|(t, _)| (t - first).abs() > f64::EPSILON)
        })
        .filter_map(|(driver, pts)| {
            let x = Array2::from_shape_vec((pts.len(), 1), pts.iter().map(|p| p.0).collect()).ok()?;
            let y = Array1::from_vec(pts.iter().map(|p| p.1).collect());
            let fitted = LinearRegression::new().fit(&Dataset::new(x, y)).ok()?;
            Some(TrendLine {
                driver: driver.to_string(),
                slope: fitted.params()[0],
                intercept: fitted.intercept(),
                points: pts.len(),
            })
        })
        .collect()
}

#[cfg(not(feature = "trendline"))]
pub fn track_temp_trends(_rows: &[MergedLap]) -> Vec<TrendLine> {
    Vec::new()
}
