use crate::reconnect::ReconnectPolicy;
use std::env;
use std::time::Duration;

pub const DEFAULT_FEED_CAPACITY: usize = 50;
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

pub struct AppConfig {
    pub backend_origin: String,
    pub http_bind: String,
    pub feed_capacity: usize,
    pub timestamp_format: String,
    pub reconnect: ReconnectPolicy,
    pub detail_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let delay = Duration::from_millis(
            env_var("RECONNECT_DELAY_MS", "5000").parse().unwrap_or(5000),
        );
        let reconnect = match env_var("RECONNECT_STRATEGY", "reload").as_str() {
            "backoff" => ReconnectPolicy::Backoff {
                initial: delay,
                max: Duration::from_millis(
                    env_var("RECONNECT_MAX_DELAY_MS", "60000")
                        .parse()
                        .unwrap_or(60_000),
                ),
                max_retries: env_var("RECONNECT_MAX_RETRIES", "").parse().ok(),
                jitter: env_var("RECONNECT_JITTER", "false").parse().unwrap_or(false),
            },
            _ => ReconnectPolicy::Reload { delay },
        };

        Self {
            backend_origin: env_var("BACKEND_ORIGIN", "http://127.0.0.1:8000")
                .trim_end_matches('/')
                .to_string(),
            http_bind: env_var("HTTP_BIND", "0.0.0.0:8080"),
            feed_capacity: env_var("FEED_CAPACITY", "50")
                .parse()
                .unwrap_or(DEFAULT_FEED_CAPACITY)
                .max(1),
            timestamp_format: env_var("TIMESTAMP_FORMAT", DEFAULT_TIMESTAMP_FORMAT),
            reconnect,
            detail_timeout: Duration::from_secs(
                env_var("DETAIL_TIMEOUT_SECS", "10").parse().unwrap_or(10),
            ),
        }
    }

    /// Absolute backend URL for a site-relative path.
    pub fn backend_url(&self, path: &str) -> String {
        format!("{}{}", self.backend_origin, path)
    }
}

fn env_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
