use crate::services::pipeline::{QuickLapPolicy, DEFAULT_QUICK_LAP_THRESHOLD};

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Base URL of the OpenF1 API (no trailing slash needed).
    pub openf1_base_url: String,
    pub provider_user_agent: String,
    pub provider_timeout_secs: u64,
    pub quick_laps: QuickLapPolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            openf1_base_url: std::env::var("OPENF1_BASE_URL")
                .unwrap_or_else(|_| "https://api.openf1.org/v1".to_string()),
            provider_user_agent: std::env::var("PROVIDER_USER_AGENT").unwrap_or_else(|_| {
                format!("f1-rain-dashboard/{}", env!("CARGO_PKG_VERSION"))
            }),
            provider_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("PROVIDER_TIMEOUT_SECS must be a whole number of seconds"),
            quick_laps: std::env::var("QUICK_LAP_THRESHOLD")
                .map(|v| parse_quick_lap_policy(&v).expect("QUICK_LAP_THRESHOLD is invalid"))
                .unwrap_or_default(),
        }
    }
}

/// Parse `QUICK_LAP_THRESHOLD`: "off" disables the filter, otherwise a
/// multiple of the fastest lap (at least 1.0, e.g. "1.07").
pub fn parse_quick_lap_policy(value: &str) -> Result<QuickLapPolicy, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none") {
        return Ok(QuickLapPolicy::Disabled);
    }
    if value.is_empty() {
        return Ok(QuickLapPolicy::Threshold(DEFAULT_QUICK_LAP_THRESHOLD));
    }
    let threshold: f64 = value
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    // NaN fails every comparison, so check finiteness first
    if !threshold.is_finite() || threshold < 1.0 {
        return Err(format!("threshold must be a finite number >= 1.0, got {}", value));
    }
    Ok(QuickLapPolicy::Threshold(threshold))
}
