use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`; batch and
    /// generate requests hold the connection while polling).
    pub request_timeout_secs: u64,

    /// Base URL of the remote render service.
    pub render_api_url: String,

    /// Token bucket size for outbound calls (default: `10`).
    pub rate_limit_capacity: f64,
    /// Token refill rate per second (default: `2`).
    pub rate_limit_refill_per_sec: f64,

    /// Default status checks before a poll gives up (default: `30`).
    pub poll_max_attempts: u32,
    /// Default wait after the first "still processing" answer.
    pub poll_initial_interval: Duration,
    /// Default ceiling for the growing poll wait.
    pub poll_max_interval: Duration,

    /// Default quiet period before a watch scan fires.
    pub watch_debounce: Duration,
    /// Default files in flight per batch or scan (default: `3`).
    pub batch_concurrency: usize,
}

impl Settings {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `120`                   |
    /// | `RENDER_API_URL`            | `http://localhost:8800` |
    /// | `RATE_LIMIT_CAPACITY`       | `10`                    |
    /// | `RATE_LIMIT_REFILL_PER_SEC` | `2`                     |
    /// | `POLL_MAX_ATTEMPTS`         | `30`                    |
    /// | `POLL_INITIAL_INTERVAL_MS`  | `1000`                  |
    /// | `POLL_MAX_INTERVAL_MS`      | `10000`                 |
    /// | `WATCH_DEBOUNCE_MS`         | `500`                   |
    /// | `BATCH_CONCURRENCY`         | `3`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parsed("PORT", "3000");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parsed("REQUEST_TIMEOUT_SECS", "120"),
            render_api_url: std::env::var("RENDER_API_URL")
                .unwrap_or_else(|_| "http://localhost:8800".into()),
            rate_limit_capacity: env_parsed("RATE_LIMIT_CAPACITY", "10"),
            rate_limit_refill_per_sec: env_parsed("RATE_LIMIT_REFILL_PER_SEC", "2"),
            poll_max_attempts: env_parsed("POLL_MAX_ATTEMPTS", "30"),
            poll_initial_interval: Duration::from_millis(env_parsed(
                "POLL_INITIAL_INTERVAL_MS",
                "1000",
            )),
            poll_max_interval: Duration::from_millis(env_parsed("POLL_MAX_INTERVAL_MS", "10000")),
            watch_debounce: Duration::from_millis(env_parsed("WATCH_DEBOUNCE_MS", "500")),
            batch_concurrency: env_parsed("BATCH_CONCURRENCY", "3"),
        }
    }
}

/// Read an env var, falling back to `default`, and parse it.
///
/// Panics with the variable name on malformed values: configuration is
/// validated exactly once, at startup.
fn env_parsed<T: std::str::FromStr>(name: &str, default: &str) -> T {
    let raw = std::env::var(name).unwrap_or_else(|_| default.into());
    raw.parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>()))
}
