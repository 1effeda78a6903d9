// Copyright 2026 Prodscrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! Front ends for prodscrape: one-shot CLI commands, an interactive prompt
//! and an HTTP server.

pub mod doctor;
pub mod extract_cmd;
pub mod http;
pub mod output;
pub mod prompt;
pub mod scrape_cmd;
pub mod settings;

pub use http::{router, AppState, BrowserService, EngineService, ScrapeService};
pub use settings::{init_logging, Overrides};
