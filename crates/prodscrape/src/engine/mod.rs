//! Browser engine boundary.
//!
//! The pipeline only directs a rendering engine through the [`Engine`] and
//! [`RenderSession`] traits; it never renders pages itself. Two engines ship
//! with the crate: [`chromium::ChromiumEngine`] drives a real browser over
//! CDP, [`snapshot::SnapshotEngine`] serves a saved HTML document.

pub mod chromium;
pub mod snapshot;

use crate::gate::RequestGate;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Kind of a sub-resource request, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    Xhr,
    Fetch,
    WebSocket,
    Other,
}

/// One element matched by a structural query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    /// Text content of the element and its descendants.
    pub text: String,
    /// Attribute name to value.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Outer HTML of the element.
    #[serde(default)]
    pub html: String,
}

impl DomNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The load event fired.
    Load,
    /// The load event fired and resource activity stayed quiet for a short window.
    NetworkIdle,
}

#[derive(Debug, Clone, Copy)]
pub struct NavigateOptions {
    pub timeout: Duration,
    pub wait_until: WaitUntil,
}

/// A cookie to plant before navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// The frame backing a session became unusable (detached, target closed,
/// execution context destroyed). Transient: a fresh session may succeed.
#[derive(thiserror::Error, Debug)]
#[error("frame detached: {0}")]
pub struct FrameDetached(pub String);

/// The engine gave up waiting for a navigation to finish.
#[derive(thiserror::Error, Debug)]
#[error("navigation timed out after {0:?}")]
pub struct NavigationTimedOut(pub Duration);

/// True when `err` carries a [`FrameDetached`] fault anywhere in its chain.
pub fn is_detachment(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<FrameDetached>())
}

/// True when `err` carries a [`NavigationTimedOut`] fault anywhere in its chain.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<NavigationTimedOut>())
}

/// A browser engine that can open rendering sessions.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Open a fresh rendering session (tab).
    async fn new_session(&self) -> Result<Box<dyn RenderSession>>;
    /// Shut the engine down, releasing the browser process.
    async fn shutdown(&self) -> Result<()>;
    /// Number of sessions opened and not yet closed.
    fn active_sessions(&self) -> usize;
}

/// One rendering session: a single document plus its loading policy.
///
/// All overrides must be applied before [`RenderSession::navigate`].
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Override the user agent, its Accept-Language and reported platform.
    async fn set_user_agent(
        &mut self,
        user_agent: &str,
        accept_language: &str,
        platform: &str,
    ) -> Result<()>;
    /// Send these headers with every request.
    async fn set_extra_headers(&mut self, headers: &[(String, String)]) -> Result<()>;
    /// Run `script` in every new document before page scripts. Registering
    /// the same script twice is a no-op.
    async fn add_init_script(&mut self, script: &str) -> Result<()>;
    async fn set_cookie(&mut self, cookie: &Cookie) -> Result<()>;
    /// Route every sub-resource request through `gate`. Replaces any gate
    /// installed earlier.
    async fn install_request_gate(&mut self, gate: Arc<RequestGate>) -> Result<()>;
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<()>;
    /// Run a CSS selector against the current document.
    async fn query(&self, selector: &str) -> Result<Vec<DomNode>>;
    /// Full rendered document as HTML.
    async fn content(&self) -> Result<String>;
    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Current document URL, if any.
    async fn url(&self) -> Result<Option<String>>;
    /// Close the session and release everything it holds.
    async fn close(self: Box<Self>) -> Result<()>;
}
