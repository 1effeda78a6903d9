//! Selector chains for the storefront's product detail page.
//!
//! Scoped selectors come first; the broader class-based fallbacks after
//! them only fire on layouts where the scoped containers are missing.

use super::{
    CountTransform, DecimalTransform, Descriptor, PairChain, PairDescriptor, SelectorChain,
    TextTransform, UrlTransform,
};

/// One chain per [`crate::ProductRecord`] field.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    pub product_name: SelectorChain<TextTransform>,
    pub rating: SelectorChain<DecimalTransform>,
    pub num_ratings: SelectorChain<CountTransform>,
    pub selling_price: SelectorChain<DecimalTransform>,
    pub discount: SelectorChain<TextTransform>,
    pub bank_offers: SelectorChain<TextTransform>,
    pub about_item: SelectorChain<TextTransform>,
    pub product_info: PairChain,
    pub product_images: SelectorChain<UrlTransform>,
    pub manufacturer_images: SelectorChain<UrlTransform>,
    pub ai_review_summary: SelectorChain<TextTransform>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        use DecimalTransform::{Amount, Rating};
        use TextTransform::{Clean, Containing};

        Self {
            product_name: SelectorChain::new(
                "product_name",
                vec![
                    Descriptor::text("#productTitle", Clean),
                    Descriptor::text(".a-size-large.product-title-word-break", Clean),
                    Descriptor::text("#title", Clean),
                ],
            ),
            rating: SelectorChain::new(
                "rating",
                vec![
                    Descriptor::attr("#acrPopover", "title", Rating),
                    Descriptor::text("#acrPopover .a-icon-alt", Rating),
                    Descriptor::text(".a-icon-alt", Rating),
                    Descriptor::text(".a-size-base.a-color-base", Rating),
                ],
            ),
            num_ratings: SelectorChain::new(
                "num_ratings",
                vec![
                    Descriptor::text("#acrCustomerReviewText", CountTransform::Digits),
                    Descriptor::text(".a-size-base.a-color-secondary", CountTransform::Digits),
                ],
            ),
            selling_price: SelectorChain::new(
                "selling_price",
                vec![
                    Descriptor::text("#corePrice_feature_div .a-price-whole", Amount),
                    Descriptor::text(".a-price-whole", Amount),
                    Descriptor::text(".a-price .a-offscreen", Amount),
                ],
            ),
            discount: SelectorChain::new(
                "discount",
                vec![
                    Descriptor::text(".savingsPercentage", Clean),
                    Descriptor::text(".a-color-price", Containing("%")),
                ],
            ),
            bank_offers: SelectorChain::new(
                "bank_offers",
                vec![Descriptor::text(
                    r#"div[id^="offer_"], .a-section.a-spacing-none.a-spacing-top-micro"#,
                    Clean,
                )],
            ),
            about_item: SelectorChain::new(
                "about_item",
                vec![Descriptor::text(
                    "#feature-bullets li, #productOverview_feature_div li",
                    Clean,
                )],
            ),
            product_info: PairChain {
                field: "product_info",
                descriptors: vec![
                    PairDescriptor {
                        rows: "#productDetails_techSpec_section_1 tr, #productDetails_detailBullets_sections1 tr",
                        key: "th",
                        value: "td",
                    },
                    PairDescriptor {
                        rows: "#productOverview_feature_div tr",
                        key: "td:first-child",
                        value: "td:last-child",
                    },
                ],
            },
            product_images: SelectorChain::new(
                "product_images",
                vec![
                    Descriptor::text(
                        r#"script[type="text/javascript"]"#,
                        UrlTransform::Embedded {
                            marker: "ImageBlockATF",
                        },
                    ),
                    Descriptor::attr("#landingImage", "data-old-hires", UrlTransform::Resolve),
                    Descriptor::attr("#altImages img", "src", UrlTransform::Resolve),
                ],
            ),
            manufacturer_images: SelectorChain::new(
                "manufacturer_images",
                vec![
                    Descriptor::attr("#aplus img, #landingImage", "src", UrlTransform::Resolve),
                    Descriptor::attr("#aplus img", "data-src", UrlTransform::Resolve),
                ],
            ),
            ai_review_summary: SelectorChain::new(
                "ai_review_summary",
                vec![
                    Descriptor::text("#cr-summarization-attributes", Clean),
                    Descriptor::text("#product-summary p", Clean),
                ],
            ),
        }
    }
}
