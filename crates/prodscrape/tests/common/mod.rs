//! Scripted engine shared by the integration suites.
//!
//! Sessions serve one HTML page. Navigation faults and challenge pages are
//! queued up front and consumed in order, across sessions, so a test can
//! script "detach twice, then load" or "challenge for two polls, then clear".

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use prodscrape::engine::snapshot::select_nodes;
use prodscrape::engine::{
    Cookie, DomNode, Engine, FrameDetached, NavigateOptions, NavigationTimedOut, RenderSession,
};
use prodscrape::{RequestGate, ScrapeConfig};

pub const PRODUCT_URL: &str = "https://www.amazon.in/dp/B0TEST1234";

pub const CHALLENGE_PAGE: &str = r#"<html><body>
    <h4>Enter the characters you see below</h4>
    <form action="/errors/validateCaptcha"></form>
</body></html>"#;

// ─────────────────────── faults ───────────────────────

/// What the next `navigate` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavFault {
    Detach,
    Timeout,
    Crash,
}

// ─────────────────────── engine ───────────────────────

#[derive(Default)]
struct Script {
    html: String,
    faults: Mutex<VecDeque<NavFault>>,
    challenge_polls: Mutex<usize>,
    fail_session: bool,
    created: AtomicUsize,
    closed: AtomicUsize,
    navigations: AtomicUsize,
    gates: Mutex<Vec<Arc<RequestGate>>>,
    cookies: Mutex<Vec<Cookie>>,
}

pub struct ScriptedEngine {
    script: Arc<Script>,
}

impl ScriptedEngine {
    pub fn serving(html: &str) -> Self {
        Self {
            script: Arc::new(Script {
                html: html.to_string(),
                ..Script::default()
            }),
        }
    }

    /// Queue navigation faults, consumed one per `navigate` call.
    pub fn with_faults(self, faults: &[NavFault]) -> Self {
        self.script
            .faults
            .lock()
            .unwrap()
            .extend(faults.iter().copied());
        self
    }

    /// Serve the challenge page for the first `polls` content reads.
    pub fn with_challenge(self, polls: usize) -> Self {
        *self.script.challenge_polls.lock().unwrap() = polls;
        self
    }

    /// Refuse to open any session.
    pub fn failing_sessions(html: &str) -> Self {
        Self {
            script: Arc::new(Script {
                html: html.to_string(),
                fail_session: true,
                ..Script::default()
            }),
        }
    }

    pub fn created(&self) -> usize {
        self.script.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.script.closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.script.navigations.load(Ordering::SeqCst)
    }

    pub fn gates(&self) -> Vec<Arc<RequestGate>> {
        self.script.gates.lock().unwrap().clone()
    }

    pub fn cookies(&self) -> Vec<Cookie> {
        self.script.cookies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn new_session(&self) -> Result<Box<dyn RenderSession>> {
        if self.script.fail_session {
            anyhow::bail!("browser refused to open a tab");
        }
        self.script.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.created() - self.closed()
    }
}

struct ScriptedSession {
    script: Arc<Script>,
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn set_user_agent(&mut self, _ua: &str, _lang: &str, _platform: &str) -> Result<()> {
        Ok(())
    }

    async fn set_extra_headers(&mut self, _headers: &[(String, String)]) -> Result<()> {
        Ok(())
    }

    async fn add_init_script(&mut self, _script: &str) -> Result<()> {
        Ok(())
    }

    async fn set_cookie(&mut self, cookie: &Cookie) -> Result<()> {
        self.script.cookies.lock().unwrap().push(cookie.clone());
        Ok(())
    }

    async fn install_request_gate(&mut self, gate: Arc<RequestGate>) -> Result<()> {
        self.script.gates.lock().unwrap().push(gate);
        Ok(())
    }

    async fn navigate(&mut self, _url: &str, options: NavigateOptions) -> Result<()> {
        self.script.navigations.fetch_add(1, Ordering::SeqCst);
        let fault = self.script.faults.lock().unwrap().pop_front();
        match fault {
            None => Ok(()),
            Some(NavFault::Detach) => {
                Err(FrameDetached("Navigating frame was detached".into()).into())
            }
            Some(NavFault::Timeout) => Err(NavigationTimedOut(options.timeout).into()),
            Some(NavFault::Crash) => anyhow::bail!("net::ERR_NAME_NOT_RESOLVED"),
        }
    }

    async fn query(&self, selector: &str) -> Result<Vec<DomNode>> {
        select_nodes(&self.script.html, selector)
    }

    async fn content(&self) -> Result<String> {
        let mut remaining = self.script.challenge_polls.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(CHALLENGE_PAGE.to_string());
        }
        Ok(self.script.html.clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Bool(true))
    }

    async fn url(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.script.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ─────────────────────── helpers ───────────────────────

/// Config with every delay at zero and deterministic fingerprints.
pub fn fast_config() -> ScrapeConfig {
    ScrapeConfig {
        navigation_timeout_ms: 2_000,
        retry_backoff_ms: 0,
        pre_navigation_jitter_ms: 0,
        challenge_poll_interval_ms: 0,
        selector_timeout_ms: 0,
        settle_delay_ms: 0,
        randomize_fingerprint: false,
        ..ScrapeConfig::default()
    }
}

pub fn fixture(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
}

pub const SHORT: Duration = Duration::from_secs(5);
