//! Client configuration.
use std::time::Duration;

use crate::sensors::CaptureConstraints;

/// Environment variable holding the base URL of the detection service.
pub const BACKEND_URL_ENV: &str = "DETECT_BACKEND_URL";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the detection service, without the `/api` prefix.
    pub backend_url: String,
    /// Timeout of a single request.
    pub timeout: Duration,
    /// Interval in which the progress estimate advances.
    pub progress_interval: Duration,
    pub camera: CaptureConstraints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            timeout: Duration::from_secs(30),
            progress_interval: Duration::from_millis(200),
            camera: CaptureConstraints::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration with the backend URL taken from the environment if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        match std::env::var(BACKEND_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => config.backend_url = url,
            _ => log::debug!(
                "{} not set, using {}",
                BACKEND_URL_ENV,
                &config.backend_url
            ),
        }
        config
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.backend_url, "http://localhost:8001");
        assert!(config.progress_interval < config.timeout);
    }
}
