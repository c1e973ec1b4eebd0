// constants.rs
use once_cell::sync::Lazy;
use std::time::Duration;

/// Path of the data logger endpoint, relative to the device base URL.
pub const LOGGER_ENDPOINT: &str = "logger.json";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4444/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub static API_CONFIG: Lazy<ApiConfig> = Lazy::new(|| ApiConfig {
    base_url: DEFAULT_BASE_URL,
    timeouts: TimeoutConfig::default(),
});

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: &'static str,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub default: Duration,
    pub connection: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_TIMEOUT,
            connection: Duration::from_secs(10),
        }
    }
}
