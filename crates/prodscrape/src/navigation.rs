//! Navigation state machine.
//!
//! One attempt walks `Configuring → Navigating → ChallengeCheck →
//! (ChallengeWait)* → SelectorWait → Ready`. Frame detachment closes the
//! session and retries on a fresh one after a fixed backoff; every other
//! failure ends the run. The challenge wait has no upper bound: callers that
//! need a deadline wrap [`NavigationController::navigate`] in
//! `tokio::time::timeout`.

use crate::config::ScrapeConfig;
use crate::engine::{is_detachment, is_timeout, Engine, NavigateOptions, RenderSession, WaitUntil};
use crate::error::NavigationError;
use crate::fingerprint::{navigation_jitter, FingerprintConfigurator, FingerprintProfile};
use crate::gate::RequestGate;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Interval between probes of one readiness selector.
const SELECTOR_POLL: Duration = Duration::from_millis(250);

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight); true";

/// Where an attempt currently is. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Configuring,
    Navigating,
    ChallengeCheck,
    ChallengeWait,
    SelectorWait,
    Ready,
    Failed,
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationState::Configuring => "configuring",
            NavigationState::Navigating => "navigating",
            NavigationState::ChallengeCheck => "challenge_check",
            NavigationState::ChallengeWait => "challenge_wait",
            NavigationState::SelectorWait => "selector_wait",
            NavigationState::Ready => "ready",
            NavigationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a successful navigation reached readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// No challenge was shown.
    Ready,
    /// A challenge was shown and cleared after `polls` content polls.
    ChallengeResolved { polls: u32 },
}

/// A loaded session handed to the caller, who must close it.
pub struct ReadySession {
    pub session: Box<dyn RenderSession>,
    pub outcome: NavigationOutcome,
    /// Attempt (1-based) that produced this session.
    pub attempts: u32,
    /// Readiness selector that matched, if any did.
    pub ready_marker: Option<String>,
}

impl ReadySession {
    pub async fn close(self) -> anyhow::Result<()> {
        self.session.close().await
    }
}

/// Drives sessions of one engine to a ready product page.
pub struct NavigationController {
    engine: Arc<dyn Engine>,
    config: ScrapeConfig,
    profile: FingerprintProfile,
}

impl NavigationController {
    pub fn new(engine: Arc<dyn Engine>, config: ScrapeConfig) -> Self {
        let profile = if config.randomize_fingerprint {
            FingerprintProfile::randomized()
        } else {
            FingerprintProfile::default()
        };
        Self {
            engine,
            config,
            profile,
        }
    }

    /// Present `profile` instead of the one chosen from the config.
    pub fn with_profile(mut self, profile: FingerprintProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Load `url` until it is ready for extraction.
    pub async fn navigate(&self, url: &Url) -> Result<ReadySession, NavigationError> {
        let max_attempts = self.config.max_attempts.max(1);
        let gate = Arc::new(RequestGate::for_url(
            url,
            self.config.storefront_domain.as_deref(),
            &self.config.extra_allowed_hosts,
        ));
        let fingerprint =
            FingerprintConfigurator::new(self.profile.clone(), gate.storefront_domain());

        let mut last = None;
        for attempt in 1..=max_attempts {
            match self.attempt(url, &gate, &fingerprint, attempt).await {
                Ok(ready) => return Ok(ready),
                Err(e) if self.is_transient(&e) => {
                    tracing::warn!(
                        url = %url,
                        attempt,
                        max_attempts,
                        error = %e,
                        "navigation attempt failed; retrying on a fresh session"
                    );
                    last = Some(e);
                    if attempt < max_attempts && !self.config.retry_backoff().is_zero() {
                        tokio::time::sleep(self.config.retry_backoff()).await;
                    }
                }
                Err(e) => {
                    tracing::error!(url = %url, attempt, state = %NavigationState::Failed, error = %e, "navigation failed");
                    return Err(e);
                }
            }
        }

        let last = last.unwrap_or_else(|| NavigationError::Engine("no attempt was made".into()));
        tracing::error!(url = %url, attempts = max_attempts, state = %NavigationState::Failed, "retry budget exhausted");
        Err(NavigationError::ExhaustedRetries {
            attempts: max_attempts,
            last: Box::new(last),
        })
    }

    fn is_transient(&self, err: &NavigationError) -> bool {
        match err {
            NavigationError::Detachment(_) => true,
            NavigationError::Timeout(_) => self.config.retry_on_timeout,
            _ => false,
        }
    }

    /// One attempt on a fresh session. The session is closed on failure.
    async fn attempt(
        &self,
        url: &Url,
        gate: &Arc<RequestGate>,
        fingerprint: &FingerprintConfigurator,
        attempt: u32,
    ) -> Result<ReadySession, NavigationError> {
        tracing::info!(url = %url, attempt, state = %NavigationState::Configuring, "opening session");
        let mut session = self
            .engine
            .new_session()
            .await
            .map_err(|e| NavigationError::Setup(format!("failed to open session: {e:#}")))?;

        match self.drive(session.as_mut(), url, gate, fingerprint).await {
            Ok((outcome, ready_marker)) => Ok(ReadySession {
                session,
                outcome,
                attempts: attempt,
                ready_marker,
            }),
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    tracing::debug!(error = %format!("{close_err:#}"), "failed to close session");
                }
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
        gate: &Arc<RequestGate>,
        fingerprint: &FingerprintConfigurator,
    ) -> Result<(NavigationOutcome, Option<String>), NavigationError> {
        fingerprint.apply(session).await?;
        session
            .install_request_gate(Arc::clone(gate))
            .await
            .map_err(|e| NavigationError::Setup(format!("request gate: {e:#}")))?;

        let jitter = navigation_jitter(self.config.pre_navigation_jitter());
        if !jitter.is_zero() {
            tokio::time::sleep(jitter).await;
        }

        tracing::info!(url = %url, state = %NavigationState::Navigating, "loading page");
        let timeout = self.config.navigation_timeout();
        let options = NavigateOptions {
            timeout,
            wait_until: WaitUntil::NetworkIdle,
        };
        match tokio::time::timeout(timeout, session.navigate(url.as_str(), options)).await {
            Err(_) => return Err(NavigationError::Timeout(timeout)),
            Ok(Err(e)) => return Err(self.classify(e)),
            Ok(Ok(())) => {}
        }

        tracing::info!(state = %NavigationState::ChallengeCheck, "checking for challenge page");
        let polls = self.wait_out_challenge(session).await?;
        let outcome = if polls == 0 {
            NavigationOutcome::Ready
        } else {
            tracing::info!(polls, "challenge cleared");
            NavigationOutcome::ChallengeResolved { polls }
        };

        tracing::info!(state = %NavigationState::SelectorWait, "waiting for product content");
        let ready_marker = self.wait_for_readiness(session).await;
        match &ready_marker {
            Some(selector) => tracing::info!(selector = %selector, "product content rendered"),
            None => tracing::warn!(
                url = %url,
                "no readiness selector matched; extracting from the page as rendered"
            ),
        }

        self.settle(session).await;
        tracing::info!(state = %NavigationState::Ready, "page ready");
        Ok((outcome, ready_marker))
    }

    fn classify(&self, err: anyhow::Error) -> NavigationError {
        if is_detachment(&err) {
            NavigationError::Detachment(format!("{err:#}"))
        } else if is_timeout(&err) {
            NavigationError::Timeout(self.config.navigation_timeout())
        } else {
            NavigationError::Engine(format!("{err:#}"))
        }
    }

    /// Poll the document until no challenge marker remains; returns the poll count.
    async fn wait_out_challenge(&self, session: &dyn RenderSession) -> Result<u32, NavigationError> {
        let mut polls = 0u32;
        loop {
            let content = session.content().await.map_err(|e| self.classify(e))?;
            let Some(marker) = challenge_marker(&content, &self.config.challenge_markers) else {
                return Ok(polls);
            };
            if polls == 0 {
                tracing::warn!(marker, "challenge page shown; waiting for it to clear");
            }
            tracing::debug!(state = %NavigationState::ChallengeWait, polls, "challenge still shown");
            tokio::time::sleep(self.config.challenge_poll_interval()).await;
            polls += 1;
        }
    }

    /// First readiness selector that matches within its timeout.
    async fn wait_for_readiness(&self, session: &dyn RenderSession) -> Option<String> {
        for selector in &self.config.readiness_selectors {
            let deadline = Instant::now().checked_add(self.config.selector_timeout());
            loop {
                match session.query(selector).await {
                    Ok(nodes) if !nodes.is_empty() => return Some(selector.clone()),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(selector = %selector, error = %format!("{e:#}"), "readiness probe failed")
                    }
                }
                // No deadline means the timeout is too large to represent.
                let remaining = match deadline {
                    Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                    None => SELECTOR_POLL,
                };
                if remaining.is_zero() {
                    break;
                }
                tokio::time::sleep(SELECTOR_POLL.min(remaining)).await;
            }
        }
        None
    }

    /// Scroll to the bottom and let lazily rendered sections load.
    async fn settle(&self, session: &dyn RenderSession) {
        if let Err(e) = session.evaluate(SCROLL_TO_BOTTOM).await {
            tracing::debug!(error = %format!("{e:#}"), "scroll failed");
        }
        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// The first marker present in `content`, compared case-insensitively.
fn challenge_marker<'m>(content: &str, markers: &'m [String]) -> Option<&'m str> {
    let content = content.to_lowercase();
    markers
        .iter()
        .map(String::as_str)
        .filter(|m| !m.is_empty())
        .find(|m| content.contains(&m.to_lowercase()))
}
