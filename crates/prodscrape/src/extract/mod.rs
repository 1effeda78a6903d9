//! Per-field extraction over a ready rendering session.
//!
//! A field is described by a [`SelectorChain`]: descriptors tried in order,
//! each a CSS selector, a node [`Source`] and a pure transform. The first
//! descriptor that matches at least one node *and* yields a value wins.
//! When every descriptor misses, the field is simply absent; extraction
//! never fails.
//!
//! Result shapes are fixed at compile time. [`FieldExtractor::one`] and
//! [`FieldExtractor::all`] pick single or collection semantics, and the
//! chain's transform type picks the value type:
//!
//! | transform            | value    |
//! |----------------------|----------|
//! | [`TextTransform`]    | `String` |
//! | [`DecimalTransform`] | `f64`    |
//! | [`CountTransform`]   | `u64`    |
//! | [`UrlTransform`]     | `Url`    |
//!
//! Key/value tables use [`PairChain`] with [`FieldExtractor::pairs`].

pub mod catalog;

use crate::engine::snapshot::select_nodes;
use crate::engine::{DomNode, RenderSession};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use url::Url;

/// Where a node's raw string comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Text content.
    Text,
    /// The named attribute; nodes without it are skipped.
    Attr(&'static str),
}

impl Source {
    fn read<'a>(&self, node: &'a DomNode) -> Option<&'a str> {
        match self {
            Source::Text => Some(node.text.as_str()),
            Source::Attr(name) => node.attr(name),
        }
    }
}

/// A pure conversion from one raw node string to zero or more values.
pub trait Transform: Send + Sync {
    type Output: PartialEq + Send;

    /// `base` is the page URL, used to resolve relative references.
    fn apply(&self, raw: &str, base: Option<&Url>) -> Vec<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTransform {
    /// Trimmed, whitespace-collapsed text; empty text is no value.
    Clean,
    /// Like `Clean`, but only text containing the needle.
    Containing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalTransform {
    /// First number in the text after thousands separators are removed:
    /// `"₹1,299.00"` → `1299.0`.
    Amount,
    /// Leading decimal of a rating label, within `0..=5`:
    /// `"4.3 out of 5 stars"` → `4.3`.
    Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountTransform {
    /// All digits in the text: `"1,234 ratings"` → `1234`.
    Digits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlTransform {
    /// The raw value as an absolute http(s) URL, resolved against the page.
    Resolve,
    /// Image URLs embedded in text (typically an inline script) that
    /// contains `marker`.
    Embedded { marker: &'static str },
}

/// Bidi and zero-width marks storefronts sprinkle into table cells.
const INVISIBLE_MARKS: &[char] = &['\u{200e}', '\u{200f}', '\u{200b}', '\u{feff}'];

/// Trim, collapse whitespace runs, and drop bidi/zero-width marks.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.replace(INVISIBLE_MARKS, ""))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex is valid"))
}

fn leading_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("leading decimal regex is valid"))
}

fn embedded_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https://[^"'\s]*?\.(?:jpg|jpeg|png|gif|webp)"#)
            .expect("embedded image regex is valid")
    })
}

/// Parse a price-like amount, ignoring currency symbols and thousands separators.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let stripped = raw.replace(',', "");
    number_re()
        .find(&stripped)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Parse the leading decimal of a rating label.
pub fn parse_rating(raw: &str) -> Option<f64> {
    leading_decimal_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|r| (0.0..=5.0).contains(r))
}

/// Parse a count by keeping only its digits.
pub fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u64>().ok()
}

fn resolve_url(raw: &str, base: Option<&Url>) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

impl Transform for TextTransform {
    type Output = String;

    fn apply(&self, raw: &str, _base: Option<&Url>) -> Vec<String> {
        let text = clean_text(raw);
        let keep = match self {
            TextTransform::Clean => !text.is_empty(),
            TextTransform::Containing(needle) => text.contains(needle),
        };
        if keep {
            vec![text]
        } else {
            Vec::new()
        }
    }
}

impl Transform for DecimalTransform {
    type Output = f64;

    fn apply(&self, raw: &str, _base: Option<&Url>) -> Vec<f64> {
        let value = match self {
            DecimalTransform::Amount => parse_amount(raw),
            DecimalTransform::Rating => parse_rating(raw),
        };
        value.into_iter().collect()
    }
}

impl Transform for CountTransform {
    type Output = u64;

    fn apply(&self, raw: &str, _base: Option<&Url>) -> Vec<u64> {
        match self {
            CountTransform::Digits => parse_count(raw).into_iter().collect(),
        }
    }
}

impl Transform for UrlTransform {
    type Output = Url;

    fn apply(&self, raw: &str, base: Option<&Url>) -> Vec<Url> {
        match self {
            UrlTransform::Resolve => resolve_url(raw, base).into_iter().collect(),
            UrlTransform::Embedded { marker } => {
                if !raw.contains(marker) {
                    return Vec::new();
                }
                embedded_image_re()
                    .find_iter(raw)
                    .filter_map(|m| Url::parse(m.as_str()).ok())
                    .collect()
            }
        }
    }
}

/// One structural query plus how to read and convert its matches.
#[derive(Debug, Clone)]
pub struct Descriptor<T> {
    pub selector: &'static str,
    pub source: Source,
    pub transform: T,
}

impl<T> Descriptor<T> {
    pub fn text(selector: &'static str, transform: T) -> Self {
        Self {
            selector,
            source: Source::Text,
            transform,
        }
    }

    pub fn attr(selector: &'static str, attribute: &'static str, transform: T) -> Self {
        Self {
            selector,
            source: Source::Attr(attribute),
            transform,
        }
    }
}

/// Ordered fallbacks for one logical field.
#[derive(Debug, Clone)]
pub struct SelectorChain<T> {
    pub field: &'static str,
    pub descriptors: Vec<Descriptor<T>>,
}

impl<T> SelectorChain<T> {
    pub fn new(field: &'static str, descriptors: Vec<Descriptor<T>>) -> Self {
        Self { field, descriptors }
    }
}

/// Table rows whose key and value live in sub-elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairDescriptor {
    pub rows: &'static str,
    pub key: &'static str,
    pub value: &'static str,
}

#[derive(Debug, Clone)]
pub struct PairChain {
    pub field: &'static str,
    pub descriptors: Vec<PairDescriptor>,
}

/// Key and value text of one table row, given its outer HTML.
fn row_pair(row_html: &str, key: &str, value: &str) -> Option<(String, String)> {
    // Rows parse only inside a table context.
    let wrapped = format!("<table>{row_html}</table>");
    let first_text = |selector: &str| {
        select_nodes(&wrapped, selector)
            .ok()?
            .into_iter()
            .map(|n| clean_text(&n.text))
            .find(|t| !t.is_empty())
    };
    Some((first_text(key)?, first_text(value)?))
}

/// Runs selector chains against one session.
pub struct FieldExtractor<'a> {
    session: &'a dyn RenderSession,
    base: Option<Url>,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(session: &'a dyn RenderSession) -> Self {
        Self {
            session,
            base: None,
        }
    }

    /// Resolve relative URLs against `base`.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    /// Matches of `selector`, or `None` when the query itself failed.
    async fn nodes(&self, field: &str, selector: &str) -> Option<Vec<DomNode>> {
        match self.session.query(selector).await {
            Ok(nodes) => Some(nodes),
            Err(e) => {
                tracing::debug!(field, selector, error = %format!("{e:#}"), "query failed");
                None
            }
        }
    }

    /// Single-valued field: the first value the first productive descriptor yields.
    pub async fn one<T: Transform>(&self, chain: &SelectorChain<T>) -> Option<T::Output> {
        for descriptor in &chain.descriptors {
            let Some(nodes) = self.nodes(chain.field, descriptor.selector).await else {
                continue;
            };
            let value = nodes
                .iter()
                .filter_map(|node| descriptor.source.read(node))
                .flat_map(|raw| descriptor.transform.apply(raw, self.base.as_ref()))
                .next();
            if let Some(value) = value {
                tracing::debug!(field = chain.field, selector = descriptor.selector, "field matched");
                return Some(value);
            }
        }
        tracing::debug!(field = chain.field, "no descriptor matched");
        None
    }

    /// Collection field: every distinct value of the first productive
    /// descriptor, in document order.
    pub async fn all<T: Transform>(&self, chain: &SelectorChain<T>) -> Vec<T::Output> {
        for descriptor in &chain.descriptors {
            let Some(nodes) = self.nodes(chain.field, descriptor.selector).await else {
                continue;
            };
            let mut values: Vec<T::Output> = Vec::new();
            for value in nodes
                .iter()
                .filter_map(|node| descriptor.source.read(node))
                .flat_map(|raw| descriptor.transform.apply(raw, self.base.as_ref()))
            {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            if !values.is_empty() {
                tracing::debug!(
                    field = chain.field,
                    selector = descriptor.selector,
                    count = values.len(),
                    "field matched"
                );
                return values;
            }
        }
        tracing::debug!(field = chain.field, "no descriptor matched");
        Vec::new()
    }

    /// Key/value table from the first descriptor that yields any complete row.
    /// Later rows overwrite earlier rows with the same key.
    pub async fn pairs(&self, chain: &PairChain) -> BTreeMap<String, String> {
        for descriptor in &chain.descriptors {
            let Some(rows) = self.nodes(chain.field, descriptor.rows).await else {
                continue;
            };
            let table: BTreeMap<String, String> = rows
                .iter()
                .filter_map(|row| row_pair(&row.html, descriptor.key, descriptor.value))
                .collect();
            if !table.is_empty() {
                return table;
            }
        }
        tracing::debug!(field = chain.field, "no descriptor matched");
        BTreeMap::new()
    }
}
