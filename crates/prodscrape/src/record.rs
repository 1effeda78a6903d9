//! The normalized product record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One product page, normalized.
///
/// Built once by [`crate::ProductAssembler`] and handed to the caller by
/// value. Every field except `scrape_timestamp` and `source_url` may be
/// absent; collections are empty rather than absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_name: Option<String>,
    pub rating: Option<f64>,
    pub num_ratings: Option<u64>,
    pub selling_price: Option<f64>,
    pub discount: Option<String>,
    pub bank_offers: Vec<String>,
    pub about_item: Vec<String>,
    /// Technical details table, keyed by row heading.
    pub product_info: BTreeMap<String, String>,
    /// Unique gallery image URLs in first-seen order.
    pub product_images: Vec<String>,
    /// Unique manufacturer content image URLs in first-seen order.
    pub manufacturer_images: Vec<String>,
    pub ai_review_summary: Option<String>,
    pub scrape_timestamp: DateTime<Utc>,
    pub source_url: String,
}

impl ProductRecord {
    /// An empty record stamped with its source and time.
    pub fn new(source_url: impl Into<String>, scrape_timestamp: DateTime<Utc>) -> Self {
        Self {
            product_name: None,
            rating: None,
            num_ratings: None,
            selling_price: None,
            discount: None,
            bank_offers: Vec::new(),
            about_item: Vec::new(),
            product_info: BTreeMap::new(),
            product_images: Vec::new(),
            manufacturer_images: Vec::new(),
            ai_review_summary: None,
            scrape_timestamp,
            source_url: source_url.into(),
        }
    }

    /// A record is viable when it names the product or prices it.
    pub fn is_viable(&self) -> bool {
        self.product_name.is_some() || self.selling_price.is_some()
    }

    /// Number of optional fields that carry a value.
    pub fn populated_fields(&self) -> usize {
        [
            self.product_name.is_some(),
            self.rating.is_some(),
            self.num_ratings.is_some(),
            self.selling_price.is_some(),
            self.discount.is_some(),
            !self.bank_offers.is_empty(),
            !self.about_item.is_empty(),
            !self.product_info.is_empty(),
            !self.product_images.is_empty(),
            !self.manufacturer_images.is_empty(),
            self.ai_review_summary.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}
