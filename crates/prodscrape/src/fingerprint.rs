//! Browser fingerprint preparation.
//!
//! Patches the client-observable signals a storefront uses to tell an
//! automated browser from an ordinary one: user agent and client hints,
//! request headers, script-visible navigator/WebGL properties, and a
//! session cookie. Applied to every fresh session before it navigates.

use crate::engine::{Cookie, RenderSession};
use crate::error::NavigationError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Desktop identities: (user agent, navigator.platform, UA-CH platform).
const IDENTITIES: &[(&str, &str, &str)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        "Win32",
        "Windows",
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        "Win32",
        "Windows",
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        "MacIntel",
        "macOS",
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        "Linux x86_64",
        "Linux",
    ),
];

const SESSION_COOKIE_NAME: &str = "session-id";

/// Stealth patches, parameterised by `__PLACEHOLDER__` tokens.
const INIT_SCRIPT_TEMPLATE: &str = r#"
(() => {
  const define = (target, key, value) => {
    try {
      Object.defineProperty(target, key, { get: () => value, configurable: true });
    } catch (_) {}
  };

  define(Navigator.prototype, 'webdriver', false);
  define(Navigator.prototype, 'platform', __PLATFORM__);
  define(Navigator.prototype, 'languages', __LANGUAGES__);
  define(Navigator.prototype, 'hardwareConcurrency', __CORES__);
  define(Navigator.prototype, 'deviceMemory', __MEMORY__);
  define(Navigator.prototype, 'vendor', 'Google Inc.');
  define(Navigator.prototype, 'plugins', [1, 2, 3, 4, 5]);

  if (!window.chrome) { window.chrome = {}; }
  if (!window.chrome.runtime) {
    window.chrome.runtime = {
      connect: () => ({ onDisconnect: { addListener: () => {} }, postMessage: () => {} }),
      sendMessage: () => {},
    };
  }

  const permissions = window.navigator.permissions;
  if (permissions && permissions.query && !permissions.__patched) {
    const query = permissions.query.bind(permissions);
    permissions.query = (p) => p && p.name === 'notifications'
      ? Promise.resolve({ state: Notification.permission })
      : query(p);
    permissions.__patched = true;
  }

  const patchWebGl = (proto) => {
    if (!proto || proto.__patched) { return; }
    const getParameter = proto.getParameter;
    proto.getParameter = function (parameter) {
      if (parameter === 37445) { return __WEBGL_VENDOR__; }
      if (parameter === 37446) { return __WEBGL_RENDERER__; }
      return getParameter.apply(this, arguments);
    };
    proto.__patched = true;
  };
  patchWebGl(window.WebGLRenderingContext && WebGLRenderingContext.prototype);
  patchWebGl(window.WebGL2RenderingContext && WebGL2RenderingContext.prototype);

  for (const key of ['__webdriver_script_fn', '__puppeteer', '__playwright', 'callPhantom', '_phantom']) {
    try { delete window[key]; } catch (_) {}
  }
})();
"#;

/// The observable identity a session presents.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintProfile {
    pub user_agent: String,
    /// `navigator.platform`, also the platform of the user-agent override.
    pub platform: String,
    /// Client-hint platform, sent as `Sec-CH-UA-Platform`.
    pub ua_platform: String,
    pub accept_language: String,
    pub languages: Vec<String>,
    pub hardware_concurrency: u8,
    pub device_memory: u8,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    /// Value of the synthetic storefront session cookie.
    pub session_id: String,
}

impl Default for FingerprintProfile {
    fn default() -> Self {
        let (user_agent, platform, ua_platform) = IDENTITIES[0];
        Self {
            user_agent: user_agent.to_string(),
            platform: platform.to_string(),
            ua_platform: ua_platform.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            hardware_concurrency: 8,
            device_memory: 8,
            webgl_vendor: "Intel Inc.".to_string(),
            webgl_renderer: "Intel Iris OpenGL Engine".to_string(),
            session_id: "262-3010157-8374630".to_string(),
        }
    }
}

impl FingerprintProfile {
    /// A profile with a randomly drawn identity, core count and session id.
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();
        let (user_agent, platform, ua_platform) =
            *IDENTITIES.choose(&mut rng).unwrap_or(&IDENTITIES[0]);
        let hardware_concurrency = *[4u8, 8, 12, 16].choose(&mut rng).unwrap_or(&8);
        Self {
            user_agent: user_agent.to_string(),
            platform: platform.to_string(),
            ua_platform: ua_platform.to_string(),
            hardware_concurrency,
            session_id: format!(
                "{:03}-{:07}-{:07}",
                rng.gen_range(100..1000),
                rng.gen_range(0..10_000_000),
                rng.gen_range(0..10_000_000)
            ),
            ..Self::default()
        }
    }

    /// Headers an ordinary browser sends with a top-level navigation.
    pub fn headers(&self) -> Vec<(String, String)> {
        let ch_platform = format!("\"{}\"", self.ua_platform);
        [
            ("Accept-Language", self.accept_language.as_str()),
            ("Sec-CH-UA-Platform", ch_platform.as_str()),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("Upgrade-Insecure-Requests", "1"),
            ("Cache-Control", "max-age=0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Document-start script carrying this profile's property overrides.
    pub fn init_script(&self) -> String {
        INIT_SCRIPT_TEMPLATE
            .replace("__PLATFORM__", &js_literal(&self.platform))
            .replace("__LANGUAGES__", &js_literal(&self.languages))
            .replace("__CORES__", &self.hardware_concurrency.to_string())
            .replace("__MEMORY__", &self.device_memory.to_string())
            .replace("__WEBGL_VENDOR__", &js_literal(&self.webgl_vendor))
            .replace("__WEBGL_RENDERER__", &js_literal(&self.webgl_renderer))
    }

    /// Session cookie for `domain`, scoped to all of its subdomains.
    pub fn session_cookie(&self, domain: &str) -> Cookie {
        Cookie {
            name: SESSION_COOKIE_NAME.to_string(),
            value: self.session_id.clone(),
            domain: format!(".{}", domain.trim_start_matches('.')),
            path: "/".to_string(),
        }
    }
}

fn js_literal<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Random delay in `[0, max]` that desynchronises navigations from a fixed cadence.
pub fn navigation_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Applies a [`FingerprintProfile`] to rendering sessions.
#[derive(Debug, Clone)]
pub struct FingerprintConfigurator {
    profile: FingerprintProfile,
    cookie_domain: String,
}

impl FingerprintConfigurator {
    pub fn new(profile: FingerprintProfile, cookie_domain: impl Into<String>) -> Self {
        Self {
            profile,
            cookie_domain: cookie_domain.into(),
        }
    }

    pub fn profile(&self) -> &FingerprintProfile {
        &self.profile
    }

    /// Apply every override to `session`. Safe to call more than once.
    pub async fn apply(&self, session: &mut dyn RenderSession) -> Result<(), NavigationError> {
        let setup = |what: &str| {
            let what = what.to_string();
            move |e: anyhow::Error| NavigationError::Setup(format!("{what}: {e:#}"))
        };

        session
            .set_user_agent(
                &self.profile.user_agent,
                &self.profile.accept_language,
                &self.profile.platform,
            )
            .await
            .map_err(setup("user agent override"))?;
        session
            .set_extra_headers(&self.profile.headers())
            .await
            .map_err(setup("request headers"))?;
        session
            .add_init_script(&self.profile.init_script())
            .await
            .map_err(setup("property overrides"))?;
        if !self.cookie_domain.is_empty() {
            session
                .set_cookie(&self.profile.session_cookie(&self.cookie_domain))
                .await
                .map_err(setup("session cookie"))?;
        }

        tracing::debug!(user_agent = %self.profile.user_agent, "fingerprint applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::snapshot::SnapshotSession;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn session() -> SnapshotSession {
        SnapshotSession::new(
            Arc::from("<html><body><h1 id='productTitle'>T</h1></body></html>"),
            Arc::new(AtomicUsize::new(1)),
        )
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let configurator = FingerprintConfigurator::new(FingerprintProfile::default(), "amazon.in");
        let mut s = session();

        tokio_test::assert_ok!(configurator.apply(&mut s).await);
        tokio_test::assert_ok!(configurator.apply(&mut s).await);

        assert_eq!(s.init_scripts().len(), 1);
        assert_eq!(s.cookies().len(), 1);
        assert_eq!(s.cookies()[0].domain, ".amazon.in");
        assert!(s.user_agent().unwrap().contains("Chrome/"));
        assert_eq!(s.platform(), Some("Win32"));

        let nodes = s.query("#productTitle").await.unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_init_script_embeds_profile_values() {
        let profile = FingerprintProfile {
            platform: "Mac'Intel".into(),
            hardware_concurrency: 12,
            ..FingerprintProfile::default()
        };
        let script = profile.init_script();
        assert!(script.contains(r#"'platform', "Mac'Intel""#));
        assert!(script.contains("'hardwareConcurrency', 12"));
        assert!(script.contains(r#"["en-US","en"]"#));
        for placeholder in ["__PLATFORM__", "__LANGUAGES__", "__CORES__", "__WEBGL_VENDOR__"] {
            assert!(!script.contains(placeholder), "unreplaced {placeholder}");
        }
    }

    #[test]
    fn test_randomized_profile_is_plausible() {
        let profile = FingerprintProfile::randomized();
        assert!(IDENTITIES.iter().any(|(ua, _, _)| *ua == profile.user_agent));
        let parts: Vec<&str> = profile.session_id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 7);
    }

    #[tokio::test]
    async fn test_override_platform_matches_navigator() {
        for (_, platform, ua_platform) in IDENTITIES {
            let profile = FingerprintProfile {
                platform: platform.to_string(),
                ua_platform: ua_platform.to_string(),
                ..FingerprintProfile::default()
            };
            let configurator = FingerprintConfigurator::new(profile, "");
            let mut s = session();
            configurator.apply(&mut s).await.unwrap();

            assert_eq!(s.platform(), Some(*platform));
            let hint = s
                .headers()
                .iter()
                .find(|(k, _)| k == "Sec-CH-UA-Platform")
                .map(|(_, v)| v.clone());
            assert_eq!(hint, Some(format!("\"{ua_platform}\"")));
            assert!(s.cookies().is_empty());
        }
    }

    #[test]
    fn test_headers_carry_locale() {
        let headers = FingerprintProfile::default().headers();
        assert!(headers
            .iter()
            .any(|(k, v)| k == "Accept-Language" && v.starts_with("en-US")));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        assert_eq!(navigation_jitter(Duration::ZERO), Duration::ZERO);
        for _ in 0..50 {
            assert!(navigation_jitter(Duration::from_millis(30)) <= Duration::from_millis(30));
        }
    }
}
