//! Offline engine that serves one saved HTML document.
//!
//! Every session renders the same document regardless of the URL it is
//! sent to. Structural queries run through the `scraper` crate, so a page
//! saved from a browser extracts the same way it would live, minus
//! anything its scripts would have rendered.

use super::{Cookie, DomNode, Engine, NavigateOptions, RenderSession};
use crate::gate::RequestGate;
use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Run `selector` against `html` and snapshot every match.
///
/// Synchronous because `scraper` documents are `!Send`; nothing parsed here
/// outlives the call.
pub fn select_nodes(html: &str, selector: &str) -> Result<Vec<DomNode>> {
    let parsed = Selector::parse(selector)
        .map_err(|e| anyhow::anyhow!("invalid selector {selector:?}: {e:?}"))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&parsed)
        .map(|el| DomNode {
            text: el.text().collect::<String>(),
            attributes: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            html: el.html(),
        })
        .collect())
}

/// Engine over a fixed HTML document.
pub struct SnapshotEngine {
    html: Arc<str>,
    active_count: Arc<AtomicUsize>,
}

impl SnapshotEngine {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: Arc::from(html.into()),
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Read the document from a file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        Ok(Self::new(html))
    }
}

#[async_trait]
impl Engine for SnapshotEngine {
    async fn new_session(&self) -> Result<Box<dyn RenderSession>> {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(SnapshotSession::new(
            Arc::clone(&self.html),
            Arc::clone(&self.active_count),
        )))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Session over a fixed document. Overrides are recorded but have no effect.
pub struct SnapshotSession {
    html: Arc<str>,
    url: Option<String>,
    user_agent: Option<String>,
    platform: Option<String>,
    headers: Vec<(String, String)>,
    init_scripts: Vec<String>,
    cookies: Vec<Cookie>,
    gate: Option<Arc<RequestGate>>,
    active_count: Arc<AtomicUsize>,
}

impl SnapshotSession {
    pub fn new(html: Arc<str>, active_count: Arc<AtomicUsize>) -> Self {
        Self {
            html,
            url: None,
            user_agent: None,
            platform: None,
            headers: Vec::new(),
            init_scripts: Vec::new(),
            cookies: Vec::new(),
            gate: None,
            active_count,
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Platform passed with the last user-agent override.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn init_scripts(&self) -> &[String] {
        &self.init_scripts
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn gate(&self) -> Option<&RequestGate> {
        self.gate.as_deref()
    }
}

#[async_trait]
impl RenderSession for SnapshotSession {
    async fn set_user_agent(
        &mut self,
        user_agent: &str,
        _accept_language: &str,
        platform: &str,
    ) -> Result<()> {
        self.user_agent = Some(user_agent.to_string());
        self.platform = Some(platform.to_string());
        Ok(())
    }

    async fn set_extra_headers(&mut self, headers: &[(String, String)]) -> Result<()> {
        self.headers = headers.to_vec();
        Ok(())
    }

    async fn add_init_script(&mut self, script: &str) -> Result<()> {
        if !self.init_scripts.iter().any(|s| s == script) {
            self.init_scripts.push(script.to_string());
        }
        Ok(())
    }

    async fn set_cookie(&mut self, cookie: &Cookie) -> Result<()> {
        self.cookies
            .retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
        self.cookies.push(cookie.clone());
        Ok(())
    }

    async fn install_request_gate(&mut self, gate: Arc<RequestGate>) -> Result<()> {
        self.gate = Some(gate);
        Ok(())
    }

    async fn navigate(&mut self, url: &str, _options: NavigateOptions) -> Result<()> {
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<DomNode>> {
        select_nodes(&self.html, selector)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.to_string())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn url(&self) -> Result<Option<String>> {
        Ok(self.url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
