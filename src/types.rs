// types.rs

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One aggregated measurement interval: `[start_time, end_time)` in UTC
/// seconds, with the minimal, average and maximal observed value over that
/// interval in the sensor's unit. Values may be NaN when nothing valid was
/// observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Measure {
    start_time: f64,
    end_time: f64,
    min_value: f64,
    avg_value: f64,
    max_value: f64,
}

impl Measure {
    pub fn new(start_time: f64, end_time: f64, min_value: f64, avg_value: f64, max_value: f64) -> Self {
        Self {
            start_time,
            end_time,
            min_value,
            avg_value,
            max_value,
        }
    }

    /// The all-NaN, zero-duration sentinel used when a data set holds no
    /// observed data at all.
    pub fn invalid() -> Self {
        Self::new(0.0, 0.0, f64::NAN, f64::NAN, f64::NAN)
    }

    /// Start of the measured interval, in UTC seconds.
    pub fn get_start_time_utc(&self) -> f64 {
        self.start_time
    }

    /// End of the measured interval, in UTC seconds.
    pub fn get_end_time_utc(&self) -> f64 {
        self.end_time
    }

    pub fn get_min_value(&self) -> f64 {
        self.min_value
    }

    pub fn get_avg_value(&self) -> f64 {
        self.avg_value
    }

    pub fn get_max_value(&self) -> f64 {
        self.max_value
    }

    /// Start of the interval as a chrono timestamp, when representable.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt((self.start_time * 1000.0).round() as i64)
            .single()
    }

    /// End of the interval as a chrono timestamp, when representable.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt((self.end_time * 1000.0).round() as i64)
            .single()
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// True when all three values are finite and ordered.
    pub fn is_valid(&self) -> bool {
        self.min_value.is_finite()
            && self.avg_value.is_finite()
            && self.max_value.is_finite()
            && self.min_value <= self.avg_value
            && self.avg_value <= self.max_value
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: crate::constants::API_CONFIG.base_url.to_string(),
            timeout_secs: crate::constants::API_CONFIG.timeouts.default.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_accessors() {
        let m = Measure::new(10.0, 12.5, 1.0, 2.0, 3.0);
        assert_eq!(m.get_start_time_utc(), 10.0);
        assert_eq!(m.get_end_time_utc(), 12.5);
        assert_eq!(m.duration(), 2.5);
        assert!(m.is_valid());
    }

    #[test]
    fn test_invalid_measure() {
        let m = Measure::invalid();
        assert!(!m.is_valid());
        assert!(m.get_avg_value().is_nan());
        assert_eq!(m.duration(), 0.0);
    }

    #[test]
    fn test_default_config_follows_api_config() {
        let config = Config::default();
        assert_eq!(config.url, crate::constants::API_CONFIG.base_url);
        assert_eq!(
            config.timeout_secs,
            crate::constants::API_CONFIG.timeouts.default.as_secs()
        );
    }

    #[test]
    fn test_chrono_conversion() {
        let m = Measure::new(1710287585.0, 1710287645.0, 0.0, 0.0, 0.0);
        let start = m.start_time().unwrap();
        assert_eq!(start.timestamp(), 1710287585);
    }
}
