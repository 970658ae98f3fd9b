//! Config for orchestration behaviors
//!
//! This module provides configuration options controlling tournament timing,
//! platform retry behavior, and logging.
//!
//! Configuration can be created programmatically using [`Configuration::new()`]
//! or by reading environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! The following environment variables can be used to override configuration
//! values. All are optional.
//!
//! - `TOURNEY_LOG` — Enable logging to a file; set to `"true"` (default: `false`)
//! - `TOURNEY_LOCK_DELAY_SECS` — Seconds between roster lock and tournament start (default: `120`)
//! - `TOURNEY_PLATFORM_RETRIES` — Retries for transient platform failures (default: `3`)
//! - `TOURNEY_RETRY_BACKOFF_MS` — Base backoff between retries in milliseconds (default: `500`)

use std::time::Duration;

const DEFAULT_LOCK_DELAY: Duration = Duration::from_secs(120);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_PLATFORM_RETRIES: u32 = 3;

const DEFAULT_WELCOME: &str = "Welcome to the tournament announcement channel, \
here you will find announcements of tournaments. To participate, simply go to \
any tournament channel and press the join button.";

/// Configuration for orchestration behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) log: bool,
    pub(crate) lock_delay: Duration,
    pub(crate) platform_retries: u32,
    pub(crate) retry_backoff: Duration,
    pub(crate) welcome_message: String,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Logging to file is disabled.
    /// - Rosters stay locked for two minutes before a tournament starts
    ///   (the bracket-preparation window).
    /// - Transient platform failures are retried three times with a
    ///   half-second base backoff.
    pub fn new() -> Self {
        Self {
            log: false,
            lock_delay: DEFAULT_LOCK_DELAY,
            platform_retries: DEFAULT_PLATFORM_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            welcome_message: DEFAULT_WELCOME.to_owned(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the recognized variables. Unset or
    /// unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_u64(var: &str, default: u64) -> u64 {
            std::env::var(var)
                .ok()
                .and_then(|val| val.trim().parse().ok())
                .unwrap_or(default)
        }

        Self {
            log: get_env_flag("TOURNEY_LOG", false),
            lock_delay: Duration::from_secs(get_env_u64(
                "TOURNEY_LOCK_DELAY_SECS",
                DEFAULT_LOCK_DELAY.as_secs(),
            )),
            platform_retries: get_env_u64(
                "TOURNEY_PLATFORM_RETRIES",
                DEFAULT_PLATFORM_RETRIES as u64,
            ) as u32,
            retry_backoff: Duration::from_millis(get_env_u64(
                "TOURNEY_RETRY_BACKOFF_MS",
                DEFAULT_RETRY_BACKOFF.as_millis() as u64,
            )),
            welcome_message: DEFAULT_WELCOME.to_owned(),
        }
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Set the delay between roster lock and tournament start.
    pub fn with_lock_delay(mut self, value: Duration) -> Self {
        self.lock_delay = value;
        self
    }

    /// Set how many times a transient platform failure is retried.
    pub fn with_platform_retries(mut self, value: u32) -> Self {
        self.platform_retries = value;
        self
    }

    /// Set the base backoff between platform retries.
    ///
    /// The actual backoff grows linearly with the attempt number.
    pub fn with_retry_backoff(mut self, value: Duration) -> Self {
        self.retry_backoff = value;
        self
    }

    /// Set the welcome message pinned in the announcement channel on setup.
    pub fn with_welcome_message(mut self, value: impl Into<String>) -> Self {
        self.welcome_message = value.into();
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
