// Copyright 2026 Prodscrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prodscrape: resilient product-page extraction for JavaScript-heavy storefronts.
//!
//! The pipeline loads one product page through a browser [`engine`], waits out
//! bot-challenge interstitials, and assembles a [`ProductRecord`] from ordered
//! selector chains:
//!
//! - [`fingerprint`] makes each rendering session look like an ordinary browser.
//! - [`gate`] decides which sub-resource requests are allowed to load.
//! - [`navigation`] drives load, challenge wait, and readiness with retries.
//! - [`extract`] evaluates selector chains field by field.
//! - [`assemble`] builds the record and enforces the viability check.

pub mod assemble;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod gate;
pub mod navigation;
pub mod record;

pub use assemble::{parse_product_url, scrape_once, ProductAssembler};
pub use config::ScrapeConfig;
pub use engine::chromium::ChromiumEngine;
pub use engine::snapshot::SnapshotEngine;
pub use engine::{DomNode, Engine, RenderSession, ResourceKind};
pub use error::{ExtractionError, NavigationError};
pub use extract::catalog::FieldCatalog;
pub use extract::FieldExtractor;
pub use fingerprint::{FingerprintConfigurator, FingerprintProfile};
pub use gate::RequestGate;
pub use navigation::{NavigationController, NavigationOutcome, ReadySession};
pub use record::ProductRecord;
