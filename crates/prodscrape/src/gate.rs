//! Sub-resource request policy.
//!
//! Documents, scripts, stylesheets and data requests always load so that
//! layout-dependent selectors keep working. Images and fonts load only from
//! the storefront itself or its configured image hosts; everything else in
//! those two classes is tracking or decoration and is aborted.

use crate::engine::ResourceKind;
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGate {
    storefront_domain: String,
    extra_hosts: Vec<String>,
}

impl RequestGate {
    pub fn new(storefront_domain: impl Into<String>, extra_hosts: &[String]) -> Self {
        Self {
            storefront_domain: normalize_host(&storefront_domain.into()),
            extra_hosts: extra_hosts.iter().map(|h| normalize_host(h)).collect(),
        }
    }

    /// Gate for the storefront serving `url`, unless `domain_override` names it.
    ///
    /// A domain taken from the URL is reduced to its registrable part, so a
    /// page on `m.amazon.in` still admits images from `www.amazon.in`.
    pub fn for_url(url: &Url, domain_override: Option<&str>, extra_hosts: &[String]) -> Self {
        let domain = match (domain_override, url.host()) {
            (Some(domain), _) => domain.to_string(),
            (None, Some(Host::Domain(host))) => registrable_domain(&normalize_host(host)),
            (None, Some(host)) => host.to_string(),
            (None, None) => String::new(),
        };
        Self::new(domain, extra_hosts)
    }

    /// The storefront's own domain, without a leading `www.`.
    pub fn storefront_domain(&self) -> &str {
        &self.storefront_domain
    }

    /// Decide whether a sub-resource request may proceed.
    pub fn allow(&self, kind: ResourceKind, url: &str) -> bool {
        match kind {
            ResourceKind::Image | ResourceKind::Font => self.is_first_party(url),
            _ => true,
        }
    }

    fn is_first_party(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };
        std::iter::once(&self.storefront_domain)
            .chain(self.extra_hosts.iter())
            .filter(|domain| !domain.is_empty())
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }
}

/// Second-level labels that sit under a country code, as in `amazon.co.uk`.
const COUNTRY_SECOND_LEVELS: &[&str] = &[
    "ac", "co", "com", "edu", "gob", "gov", "ne", "net", "or", "org",
];

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// The domain a storefront registered: the last two labels of `host`, or
/// three under a country-code second level.
fn registrable_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    let keep = match labels.as_slice() {
        [.., second, tld] if tld.len() == 2 && COUNTRY_SECOND_LEVELS.contains(second) => 3,
        _ => 2,
    };
    labels[labels.len().saturating_sub(keep)..].join(".")
}
