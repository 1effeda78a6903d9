//! Pipeline configuration.
//!
//! Every tunable of the navigation state machine lives in [`ScrapeConfig`].
//! Values resolve in the order CLI flag > `PRODSCRAPE_*` environment
//! variable > built-in default; the front ends apply the CLI layer on top of
//! [`ScrapeConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Phrases shown by storefront bot-verification interstitials.
pub const DEFAULT_CHALLENGE_MARKERS: &[&str] = &[
    "Enter the characters you see below",
    "Type the characters you see in this image",
    "/errors/validateCaptcha",
    "Sorry, we just need to make sure you're not a robot",
];

/// Structural markers probed in order to confirm the product page rendered:
/// title, price container, alternate title.
pub const DEFAULT_READINESS_SELECTORS: &[&str] = &[
    "#productTitle",
    "#corePrice_feature_div",
    ".a-size-large.product-title-word-break",
];

/// Image CDNs that serve storefront product imagery from outside the
/// storefront's own domain.
pub const DEFAULT_EXTRA_ALLOWED_HOSTS: &[&str] = &["media-amazon.com", "ssl-images-amazon.com"];

/// Tunables for one scraping pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Upper bound for a page load, including network quiescence.
    pub navigation_timeout_ms: u64,
    /// Navigation attempts in total, each on a fresh session.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_backoff_ms: u64,
    /// Treat navigation timeouts as transient (retried) instead of terminal.
    pub retry_on_timeout: bool,
    /// Upper bound of the random delay injected before each navigation.
    pub pre_navigation_jitter_ms: u64,
    /// Interval between content polls while a challenge is displayed.
    pub challenge_poll_interval_ms: u64,
    /// Case-insensitive phrases that identify a challenge interstitial.
    pub challenge_markers: Vec<String>,
    /// Selectors probed in order to confirm the page is scrapeable.
    pub readiness_selectors: Vec<String>,
    /// How long each readiness selector is probed.
    pub selector_timeout_ms: u64,
    /// Pause after scrolling to the bottom so lazy sections render.
    pub settle_delay_ms: u64,
    /// Storefront domain used by the request gate and the session cookie.
    /// Derived from the product URL when unset.
    pub storefront_domain: Option<String>,
    /// Hosts (and their subdomains) whose images and fonts may load.
    pub extra_allowed_hosts: Vec<String>,
    /// Draw a fresh fingerprint profile per pipeline.
    pub randomize_fingerprint: bool,
    /// Explicit Chromium executable.
    pub chromium_path: Option<PathBuf>,
    /// Run the browser without a visible window.
    pub headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 120_000,
            max_attempts: 3,
            retry_backoff_ms: 10_000,
            retry_on_timeout: false,
            pre_navigation_jitter_ms: 3_000,
            challenge_poll_interval_ms: 5_000,
            challenge_markers: DEFAULT_CHALLENGE_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            readiness_selectors: DEFAULT_READINESS_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            selector_timeout_ms: 10_000,
            settle_delay_ms: 3_000,
            storefront_domain: None,
            extra_allowed_hosts: DEFAULT_EXTRA_ALLOWED_HOSTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            randomize_fingerprint: true,
            chromium_path: None,
            headless: true,
        }
    }
}

impl ScrapeConfig {
    /// Defaults overlaid with any `PRODSCRAPE_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("PRODSCRAPE_NAV_TIMEOUT_SECS") {
            config.navigation_timeout_ms = secs_to_ms(secs);
        }
        if let Some(n) = env_parse::<u32>("PRODSCRAPE_MAX_ATTEMPTS") {
            config.max_attempts = n;
        }
        if let Some(secs) = env_parse::<u64>("PRODSCRAPE_RETRY_BACKOFF_SECS") {
            config.retry_backoff_ms = secs_to_ms(secs);
        }
        if let Some(flag) = env_parse::<bool>("PRODSCRAPE_RETRY_ON_TIMEOUT") {
            config.retry_on_timeout = flag;
        }
        if let Some(secs) = env_parse::<u64>("PRODSCRAPE_CHALLENGE_POLL_SECS") {
            config.challenge_poll_interval_ms = secs_to_ms(secs);
        }
        if let Some(secs) = env_parse::<u64>("PRODSCRAPE_SELECTOR_TIMEOUT_SECS") {
            config.selector_timeout_ms = secs_to_ms(secs);
        }
        if let Ok(domain) = std::env::var("PRODSCRAPE_STOREFRONT_DOMAIN") {
            if !domain.trim().is_empty() {
                config.storefront_domain = Some(domain.trim().to_string());
            }
        }
        if let Ok(path) = std::env::var("PRODSCRAPE_CHROMIUM_PATH") {
            config.chromium_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = env_parse::<bool>("PRODSCRAPE_HEADLESS") {
            config.headless = flag;
        }

        config
    }

    /// Settings for extracting from a saved page: no delays, one attempt,
    /// and no challenge wait (a saved challenge page would never clear).
    pub fn for_snapshot(self) -> Self {
        Self {
            max_attempts: 1,
            retry_backoff_ms: 0,
            pre_navigation_jitter_ms: 0,
            challenge_markers: Vec::new(),
            selector_timeout_ms: 0,
            settle_delay_ms: 0,
            ..self
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn pre_navigation_jitter(&self) -> Duration {
        Duration::from_millis(self.pre_navigation_jitter_ms)
    }

    pub fn challenge_poll_interval(&self) -> Duration {
        Duration::from_millis(self.challenge_poll_interval_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Whole seconds to milliseconds, clamped at `u64::MAX`.
pub fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1_000)
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}
