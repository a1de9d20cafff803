use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::{info, warn};

const DEFAULT_HOST: &str = "http://localhost:8000";

/// Path of the emotion stream on the inference backend.
pub const EMOTION_STREAM_PATH: &str = "/emotion/detection/";

/// Tunables for the live detection pipeline.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Upper bound on frames pushed to the backend per second.
    pub frame_rate: u32,
    /// JPEG quality (1..=100) used for each captured frame.
    pub jpeg_quality: u8,
    /// How often the capture loop wakes up, standing in for the display's repaint signal.
    pub repaint_interval: Duration,
    /// How long a label set stays visible after its last update.
    pub label_decay: Duration,
    /// Fixed delay before the single reconnect attempt after a close.
    pub reconnect_delay: Duration,
    pub stream_path: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            frame_rate: 10,
            jpeg_quality: 70,
            repaint_interval: Duration::from_millis(16),
            label_decay: Duration::from_millis(2000),
            reconnect_delay: Duration::from_millis(2),
            stream_path: EMOTION_STREAM_PATH.to_string(),
        }
    }
}

impl DetectionConfig {
    /// Minimum spacing between two successful sends.
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    /// `None` leaves the timeout to the transport defaults.
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend base URL, e.g. `https://api.example.com`.
    pub host: String,
    pub debug: bool,
    pub auto_logout: Duration,
    pub detection: DetectionConfig,
    pub http: HttpConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            debug: false,
            auto_logout: Duration::from_secs(400 * 60),
            detection: DetectionConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `SENTISENSE_*` variables, falling back to defaults for anything
    /// missing or malformed.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let debug = env::var("SENTISENSE_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let request_timeout = match env::var("SENTISENSE_REQUEST_TIMEOUT_MS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(0) => None,
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(err) => {
                    warn!("Invalid SENTISENSE_REQUEST_TIMEOUT_MS value: {err}");
                    None
                }
            },
            Err(_) => None,
        };

        let detection = DetectionConfig {
            frame_rate: try_load("SENTISENSE_FRAME_RATE", defaults.detection.frame_rate),
            jpeg_quality: try_load("SENTISENSE_JPEG_QUALITY", defaults.detection.jpeg_quality)
                .clamp(1, 100),
            label_decay: Duration::from_millis(try_load(
                "SENTISENSE_LABEL_DECAY_MS",
                defaults.detection.label_decay.as_millis() as u64,
            )),
            reconnect_delay: Duration::from_millis(try_load(
                "SENTISENSE_RECONNECT_DELAY_MS",
                defaults.detection.reconnect_delay.as_millis() as u64,
            )),
            ..defaults.detection
        };

        Self {
            host: try_load("SENTISENSE_HOST", defaults.host),
            debug,
            auto_logout: Duration::from_secs(try_load(
                "SENTISENSE_AUTO_LOGOUT_SECS",
                defaults.auto_logout.as_secs(),
            )),
            detection,
            http: HttpConfig { request_timeout },
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|err| {
            warn!("Invalid {key} value '{raw}': {err}; using default {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_interval_is_100ms() {
        let config = DetectionConfig::default();
        assert_eq!(config.min_frame_interval(), Duration::from_millis(100));
    }

    #[test]
    fn zero_frame_rate_does_not_divide_by_zero() {
        let config = DetectionConfig {
            frame_rate: 0,
            ..DetectionConfig::default()
        };
        assert_eq!(config.min_frame_interval(), Duration::from_secs(1));
    }

    #[test]
    fn defaults_match_backend_contract() {
        let config = AppConfig::default();
        assert_eq!(config.detection.stream_path, "/emotion/detection/");
        assert_eq!(config.detection.label_decay, Duration::from_millis(2000));
        assert!(config.http.request_timeout.is_none());
    }
}
