//! CLI configuration layer and logging setup.
//!
//! Flags override `PRODSCRAPE_*` environment variables, which override the
//! built-in defaults.

use clap::Args;
use prodscrape::config::secs_to_ms;
use prodscrape::ScrapeConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Browser and retry flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Path to a Chromium or Chrome executable.
    #[arg(long, global = true)]
    pub chromium: Option<PathBuf>,

    /// Show the browser window instead of running headless.
    #[arg(long, global = true)]
    pub headful: bool,

    /// Navigation timeout in seconds.
    #[arg(long, global = true)]
    pub nav_timeout_secs: Option<u64>,

    /// Navigation attempts before giving up.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Storefront domain for the request gate and session cookie
    /// (defaults to the product URL's host).
    #[arg(long, global = true)]
    pub storefront_domain: Option<String>,
}

impl Overrides {
    /// Apply these flags on top of `config`.
    pub fn apply(&self, mut config: ScrapeConfig) -> ScrapeConfig {
        if let Some(path) = &self.chromium {
            config.chromium_path = Some(path.clone());
        }
        if self.headful {
            config.headless = false;
        }
        if let Some(secs) = self.nav_timeout_secs {
            config.navigation_timeout_ms = secs_to_ms(secs);
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
        if let Some(domain) = &self.storefront_domain {
            config.storefront_domain = Some(domain.clone());
        }
        config
    }

    /// Environment-derived config with these flags applied.
    pub fn resolve(&self) -> ScrapeConfig {
        self.apply(ScrapeConfig::from_env())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
