//! Field extraction against a saved product page.

mod common;

use std::sync::Arc;

use prodscrape::engine::snapshot::SnapshotSession;
use prodscrape::extract::{
    DecimalTransform, Descriptor, FieldExtractor, SelectorChain, TextTransform,
};
use prodscrape::{Engine, FieldCatalog, ProductAssembler, SnapshotEngine};

use common::{fast_config, fixture, PRODUCT_URL};

// ─────────────────────── helpers ───────────────────────

fn session(html: &str) -> SnapshotSession {
    SnapshotSession::new(Arc::from(html), Arc::new(Default::default()))
}

// ─────────────────────── full page ───────────────────────

#[tokio::test]
async fn test_fixture_page_extracts_every_field() {
    let engine = Arc::new(SnapshotEngine::new(fixture("product.html")));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());

    let record = assembler.assemble(PRODUCT_URL).await.unwrap();

    assert_eq!(
        record.product_name.as_deref(),
        Some("Acme 139 cm (55 inches) 4K Ultra HD Smart LED TV")
    );
    assert_eq!(record.rating, Some(4.3));
    assert_eq!(record.num_ratings, Some(1234));
    assert_eq!(record.selling_price, Some(1299.0));
    assert_eq!(record.discount.as_deref(), Some("-35%"));
    assert_eq!(record.bank_offers, vec!["Offer A", "Offer B"]);
    assert_eq!(
        record.about_item,
        vec![
            "Resolution: 4K Ultra HD (3840 x 2160)",
            "Refresh rate: 60 Hertz"
        ]
    );
    assert_eq!(record.product_info.len(), 2);
    assert_eq!(record.product_info["Brand"], "Acme");
    assert_eq!(record.product_info["Model Name"], "X55-UHD");
    assert_eq!(
        record.product_images,
        vec![
            "https://m.media-amazon.com/images/I/81aFrontView.jpg",
            "https://m.media-amazon.com/images/I/71bSideView.jpg",
        ]
    );
    assert_eq!(
        record.manufacturer_images,
        vec![
            "https://m.media-amazon.com/images/I/81aFrontView._SX300_.jpg",
            "https://www.amazon.in/images/aplus/hero-banner.jpg",
            "https://m.media-amazon.com/images/S/aplus-media/panel.jpg",
        ]
    );
    assert_eq!(
        record.ai_review_summary.as_deref(),
        Some("Customers like the picture quality and value for money.")
    );
    assert_eq!(record.source_url, PRODUCT_URL);
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn test_record_serializes_with_field_names() {
    let engine = Arc::new(SnapshotEngine::new(fixture("product.html")));
    let record = ProductAssembler::new(engine, fast_config())
        .assemble(PRODUCT_URL)
        .await
        .unwrap();

    let json = serde_json::to_value(&record).unwrap();
    for key in [
        "product_name",
        "rating",
        "num_ratings",
        "selling_price",
        "discount",
        "bank_offers",
        "about_item",
        "product_info",
        "product_images",
        "manufacturer_images",
        "ai_review_summary",
        "scrape_timestamp",
        "source_url",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["selling_price"], 1299.0);
}

// ─────────────────────── chains ───────────────────────

#[tokio::test]
async fn test_first_productive_descriptor_wins() {
    let s = session(r#"<p class="b">X</p><p class="c">Y</p>"#);
    let chain = SelectorChain::new(
        "title",
        vec![
            Descriptor::text(".a", TextTransform::Clean),
            Descriptor::text(".b", TextTransform::Clean),
            Descriptor::text(".c", TextTransform::Clean),
        ],
    );

    let value = FieldExtractor::new(&s).one(&chain).await;
    assert_eq!(value.as_deref(), Some("X"));
}

#[tokio::test]
async fn test_matching_descriptor_without_value_falls_through() {
    let s = session(r#"<span class="price">Currently unavailable</span><span class="alt">₹899</span>"#);
    let chain = SelectorChain::new(
        "selling_price",
        vec![
            Descriptor::text(".price", DecimalTransform::Amount),
            Descriptor::text(".alt", DecimalTransform::Amount),
        ],
    );

    assert_eq!(FieldExtractor::new(&s).one(&chain).await, Some(899.0));
}

#[tokio::test]
async fn test_invalid_selector_is_a_miss_not_an_error() {
    let s = session(r#"<p class="ok">fine</p>"#);
    let chain = SelectorChain::new(
        "name",
        vec![
            Descriptor::text("p[", TextTransform::Clean),
            Descriptor::text(".ok", TextTransform::Clean),
        ],
    );

    assert_eq!(FieldExtractor::new(&s).one(&chain).await.as_deref(), Some("fine"));
}

#[tokio::test]
async fn test_all_descriptors_missing_gives_empty_values() {
    let s = session("<p>nothing to see</p>");
    let catalog = FieldCatalog::default();
    let fields = FieldExtractor::new(&s);

    assert!(fields.one(&catalog.product_name).await.is_none());
    assert!(fields.one(&catalog.rating).await.is_none());
    assert!(fields.all(&catalog.bank_offers).await.is_empty());
    assert!(fields.pairs(&catalog.product_info).await.is_empty());
}
