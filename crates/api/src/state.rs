use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use atelier_client::{GenerationClient, PollOptions, StatusPoller};
use atelier_core::error::CoreError;
use atelier_pipeline::{BatchOptions, HistoryStore};
use atelier_throttle::{RateLimiter, RetryOptions};
use atelier_watch::{WatchDefaults, WatchRegistry};

use crate::config::Settings;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Settings>,
    /// Token bucket shared by every outbound call.
    pub limiter: Arc<RateLimiter>,
    /// Submits jobs and tracks them to completion.
    pub poller: Arc<StatusPoller>,
    /// In-memory record of job outcomes.
    pub history: Arc<HistoryStore>,
    /// Directory watch registry.
    pub watches: Arc<WatchRegistry>,
    /// Master token; request-scoped children hang off it so shutdown
    /// interrupts in-flight polls.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Composition root: build every shared component from settings
    /// and the injected transport.
    ///
    /// The transport is a parameter (rather than constructed here) so
    /// tests can wire a scripted client through the exact production
    /// wiring.
    pub fn new(config: Settings, client: Arc<dyn GenerationClient>) -> Result<Self, CoreError> {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_capacity,
            config.rate_limit_refill_per_sec,
        )?);

        let poller = Arc::new(StatusPoller::new(
            client,
            Arc::clone(&limiter),
            RetryOptions::default(),
        ));

        let history = Arc::new(HistoryStore::new());

        let default_poll = PollOptions {
            max_attempts: config.poll_max_attempts,
            initial_interval: config.poll_initial_interval,
            max_interval: config.poll_max_interval,
            call_timeout: None,
        };
        default_poll.validate()?;

        let watches = Arc::new(WatchRegistry::new(
            Arc::clone(&poller),
            Arc::clone(&history),
            WatchDefaults {
                debounce: config.watch_debounce,
                batch: BatchOptions {
                    concurrency: config.batch_concurrency,
                    stop_on_error: false,
                    poll: default_poll,
                },
            },
        ));

        Ok(Self {
            config: Arc::new(config),
            limiter,
            poller,
            history,
            watches,
            shutdown: CancellationToken::new(),
        })
    }

    /// Default polling schedule with optional per-request overrides.
    pub fn poll_options(
        &self,
        max_attempts: Option<u32>,
        initial_interval_ms: Option<u64>,
        max_interval_ms: Option<u64>,
    ) -> PollOptions {
        PollOptions {
            max_attempts: max_attempts.unwrap_or(self.config.poll_max_attempts),
            initial_interval: initial_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(self.config.poll_initial_interval),
            max_interval: max_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(self.config.poll_max_interval),
            call_timeout: None,
        }
    }
}
