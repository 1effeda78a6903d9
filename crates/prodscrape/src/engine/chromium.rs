//! Chromium engine using chromiumoxide.

use super::{
    Cookie, DomNode, Engine, FrameDetached, NavigateOptions, NavigationTimedOut, RenderSession,
    ResourceKind, WaitUntil,
};
use crate::config::ScrapeConfig;
use crate::gate::RequestGate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, ErrorReason, Headers, ResourceType, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashSet;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Launch flags that strip the most visible automation and container artefacts.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--disable-extensions",
    "--disable-blink-features=AutomationControlled",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-features=TranslateUI",
    "--disable-ipc-flooding-protection",
    "--force-color-profile=srgb",
    "--password-store=basic",
    "--use-mock-keychain",
];

/// Substrings of CDP error messages that mean the frame is gone.
const DETACHMENT_HINTS: &[&str] = &[
    "detached",
    "target closed",
    "session closed",
    "execution context was destroyed",
    "cannot find context with specified id",
    "no target with given id",
];

/// Resource activity must stay flat this long to count as quiescent.
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const QUIESCENCE_POLL: Duration = Duration::from_millis(100);

const QUIESCENCE_PROBE: &str =
    "[document.readyState, performance.getEntriesByType('resource').length]";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
        tracing::warn!(path = %path.display(), "configured Chromium path does not exist");
    }

    // 2. PRODSCRAPE_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PRODSCRAPE_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. ~/.prodscrape/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".prodscrape/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".prodscrape/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            ]
        } else {
            vec![
                home.join(".prodscrape/chromium/chrome-linux64/chrome"),
                home.join(".prodscrape/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Wrap a CDP failure, tagging frame-detachment faults as [`FrameDetached`].
fn cdp_fault(action: &str, err: impl Display) -> anyhow::Error {
    let message = format!("{action}: {err}");
    let lower = message.to_ascii_lowercase();
    if DETACHMENT_HINTS.iter().any(|hint| lower.contains(hint)) {
        FrameDetached(message).into()
    } else {
        anyhow::anyhow!(message)
    }
}

fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Script => ResourceKind::Script,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Media => ResourceKind::Media,
        ResourceType::Xhr => ResourceKind::Xhr,
        ResourceType::Fetch => ResourceKind::Fetch,
        ResourceType::WebSocket => ResourceKind::WebSocket,
        _ => ResourceKind::Other,
    }
}

/// JavaScript that snapshots every element matching `selector`.
fn query_script(selector: &str) -> Result<String> {
    let literal = serde_json::to_string(selector)?;
    Ok(format!(
        "(() => Array.from(document.querySelectorAll({literal})).map(el => ({{\
            text: el.textContent || '',\
            attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),\
            html: el.outerHTML\
        }})))()"
    ))
}

/// Chromium-backed engine. One browser process, one tab per session.
pub struct ChromiumEngine {
    browser: Mutex<Browser>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumEngine {
    /// Launch Chromium configured for product scraping.
    pub async fn launch(config: &ScrapeConfig) -> Result<Self> {
        let chrome_path = find_chromium(config.chromium_path.as_ref()).context(
            "Chromium not found. Install Chrome/Chromium or set PRODSCRAPE_CHROMIUM_PATH.",
        )?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .no_sandbox()
            .window_size(1920, 1080)
            .viewport(None);
        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "CDP handler error");
                }
            }
        });

        tracing::info!(headless = config.headless, "Chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler: std::sync::Mutex::new(Some(handle)),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Engine for ChromiumEngine {
    async fn new_session(&self) -> Result<Box<dyn RenderSession>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumSession {
            page,
            active_count: Arc::clone(&self.active_count),
            init_scripts: HashSet::new(),
            fetch_enabled: false,
            gate_task: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                tracing::debug!(error = %e, "browser close failed (already closed?)");
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!(error = %e, "waiting for browser exit failed");
            }
        }
        let handle = self
            .handler
            .lock()
            .map_err(|_| anyhow::anyhow!("handler lock poisoned"))?
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        tracing::info!("Chromium shut down");
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium tab.
pub struct ChromiumSession {
    page: Page,
    active_count: Arc<AtomicUsize>,
    init_scripts: HashSet<String>,
    fetch_enabled: bool,
    gate_task: Option<JoinHandle<()>>,
}

impl ChromiumSession {
    /// Wait until the document is complete and resource activity stops growing.
    async fn wait_for_quiescence(&self, budget: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(budget);
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            let probe = self
                .page
                .evaluate(QUIESCENCE_PROBE)
                .await
                .map_err(|e| cdp_fault("quiescence probe failed", e))?;
            let (ready_state, resources): (String, u64) = probe
                .into_value()
                .map_err(|e| anyhow::anyhow!("unexpected quiescence probe result: {e:?}"))?;

            if ready_state == "complete" && last_count == Some(resources) {
                if quiet_since.elapsed() >= QUIET_WINDOW {
                    return Ok(());
                }
            } else {
                last_count = Some(resources);
                quiet_since = Instant::now();
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(NavigationTimedOut(budget).into());
            }
            tokio::time::sleep(QUIESCENCE_POLL).await;
        }
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn set_user_agent(
        &mut self,
        user_agent: &str,
        accept_language: &str,
        platform: &str,
    ) -> Result<()> {
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .accept_language(accept_language)
            .platform(platform)
            .build()
            .map_err(anyhow::Error::msg)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| cdp_fault("user agent override failed", e))?;
        Ok(())
    }

    async fn set_extra_headers(&mut self, headers: &[(String, String)]) -> Result<()> {
        let map: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .map_err(|e| cdp_fault("extra headers failed", e))?;
        Ok(())
    }

    async fn add_init_script(&mut self, script: &str) -> Result<()> {
        if self.init_scripts.contains(script) {
            return Ok(());
        }
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .map_err(|e| cdp_fault("init script injection failed", e))?;
        self.init_scripts.insert(script.to_string());
        Ok(())
    }

    async fn set_cookie(&mut self, cookie: &Cookie) -> Result<()> {
        let param = CookieParam::builder()
            .name(cookie.name.as_str())
            .value(cookie.value.as_str())
            .domain(cookie.domain.as_str())
            .path(cookie.path.as_str())
            .build()
            .map_err(anyhow::Error::msg)?;
        self.page
            .set_cookie(param)
            .await
            .map_err(|e| cdp_fault("set cookie failed", e))?;
        Ok(())
    }

    async fn install_request_gate(&mut self, gate: Arc<RequestGate>) -> Result<()> {
        if let Some(previous) = self.gate_task.take() {
            previous.abort();
        }

        // Listen before enabling interception so no paused request is missed.
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| cdp_fault("request listener failed", e))?;
        let page = self.page.clone();

        self.gate_task = Some(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let kind = resource_kind(&event.resource_type);
                let outcome = if gate.allow(kind, &event.request.url) {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                } else {
                    tracing::trace!(url = %event.request.url, ?kind, "request blocked");
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                };
                if let Err(e) = outcome {
                    tracing::trace!(error = %e, "failed to resolve paused request");
                }
            }
        }));

        if !self.fetch_enabled {
            self.page
                .execute(EnableParams::default())
                .await
                .map_err(|e| cdp_fault("request interception failed", e))?;
            self.fetch_enabled = true;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<()> {
        let start = Instant::now();

        match tokio::time::timeout(options.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(cdp_fault("navigation failed", e)),
            Err(_) => return Err(NavigationTimedOut(options.timeout).into()),
        }

        if options.wait_until == WaitUntil::NetworkIdle {
            let remaining = options.timeout.saturating_sub(start.elapsed());
            self.wait_for_quiescence(remaining)
                .await
                .map_err(|e| match e.downcast::<NavigationTimedOut>() {
                    Ok(_) => NavigationTimedOut(options.timeout).into(),
                    Err(other) => other,
                })?;
        }

        tracing::debug!(
            url,
            load_ms = start.elapsed().as_millis() as u64,
            "page loaded"
        );
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<DomNode>> {
        let result = self
            .page
            .evaluate(query_script(selector)?)
            .await
            .map_err(|e| cdp_fault("structural query failed", e))?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert query result: {e:?}"))
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| cdp_fault("failed to read document", e))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| cdp_fault("script evaluation failed", e))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn url(&self) -> Result<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|e| cdp_fault("failed to read url", e))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        if let Some(task) = this.gate_task {
            task.abort();
        }
        this.active_count.fetch_sub(1, Ordering::Relaxed);
        if let Err(e) = this.page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        Ok(())
    }
}
