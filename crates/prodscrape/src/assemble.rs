//! Record assembly: navigate, extract every field, enforce viability.

use crate::config::ScrapeConfig;
use crate::engine::chromium::ChromiumEngine;
use crate::engine::{Engine, RenderSession};
use crate::error::ExtractionError;
use crate::extract::catalog::FieldCatalog;
use crate::extract::FieldExtractor;
use crate::fingerprint::FingerprintProfile;
use crate::navigation::NavigationController;
use crate::record::ProductRecord;
use chrono::Utc;
use std::sync::Arc;
use url::Url;

/// Validate a product URL: absolute, with an http(s) scheme and a host.
pub fn parse_product_url(raw: &str) -> Result<Url, ExtractionError> {
    let invalid = |reason: &str| ExtractionError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// Turns a product URL into a [`ProductRecord`].
pub struct ProductAssembler {
    navigator: NavigationController,
    catalog: FieldCatalog,
}

impl ProductAssembler {
    pub fn new(engine: Arc<dyn Engine>, config: ScrapeConfig) -> Self {
        Self {
            navigator: NavigationController::new(engine, config),
            catalog: FieldCatalog::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: FieldCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_profile(mut self, profile: FingerprintProfile) -> Self {
        self.navigator = self.navigator.with_profile(profile);
        self
    }

    /// Load `url`, extract every field and return the record.
    ///
    /// The session is closed on every exit path. A record with neither a
    /// product name nor a price is rejected as [`ExtractionError::NoViableData`].
    pub async fn assemble(&self, url: &str) -> Result<ProductRecord, ExtractionError> {
        let url = parse_product_url(url)?;
        let ready = self.navigator.navigate(&url).await?;
        tracing::debug!(outcome = ?ready.outcome, attempts = ready.attempts, "session ready");

        let mut record = self.extract(ready.session.as_ref(), &url).await;
        if let Err(e) = ready.close().await {
            tracing::debug!(error = %format!("{e:#}"), "failed to close session");
        }

        record.scrape_timestamp = Utc::now();
        if !record.is_viable() {
            tracing::warn!(url = %url, "page yielded neither a product name nor a price");
            return Err(ExtractionError::NoViableData {
                url: url.to_string(),
            });
        }

        tracing::info!(
            url = %url,
            fields = record.populated_fields(),
            "product extracted"
        );
        Ok(record)
    }

    /// Run every field chain against `session`, in record order.
    async fn extract(&self, session: &dyn RenderSession, url: &Url) -> ProductRecord {
        let fields = FieldExtractor::new(session).with_base(url.clone());
        let c = &self.catalog;

        let mut record = ProductRecord::new(url.as_str(), Utc::now());
        record.product_name = fields.one(&c.product_name).await;
        record.rating = fields.one(&c.rating).await;
        record.num_ratings = fields.one(&c.num_ratings).await;
        record.selling_price = fields.one(&c.selling_price).await;
        record.discount = fields.one(&c.discount).await;
        record.bank_offers = fields.all(&c.bank_offers).await;
        record.about_item = fields.all(&c.about_item).await;
        record.product_info = fields.pairs(&c.product_info).await;
        record.product_images = fields
            .all(&c.product_images)
            .await
            .into_iter()
            .map(String::from)
            .collect();
        record.manufacturer_images = fields
            .all(&c.manufacturer_images)
            .await
            .into_iter()
            .map(String::from)
            .collect();
        record.ai_review_summary = fields.one(&c.ai_review_summary).await;
        record
    }
}

/// Launch a browser, assemble one record and shut the browser down again.
pub async fn scrape_once(config: &ScrapeConfig, url: &str) -> Result<ProductRecord, ExtractionError> {
    // Reject bad input before paying for a browser launch.
    parse_product_url(url)?;

    let engine = ChromiumEngine::launch(config)
        .await
        .map_err(|e| ExtractionError::Setup(format!("{e:#}")))?;
    let engine: Arc<dyn Engine> = Arc::new(engine);

    let result = ProductAssembler::new(Arc::clone(&engine), config.clone())
        .assemble(url)
        .await;

    if let Err(e) = engine.shutdown().await {
        tracing::warn!(error = %format!("{e:#}"), "browser shutdown failed");
    }
    result
}
