//! Stealth Browser Factory (spec §4.8/§4.8a / C8).
//!
//! Produces a freshly constructed WebDriver session per batch, with
//! randomized fingerprint surface, optional proxy session scoping, and
//! resource-request blocking. Every session is released through a scoped
//! guard so teardown runs on every exit path, including early returns on
//! error.

use crate::config::ProxyConfig;
use crate::scraper::extension;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use thirtyfour::{DesiredCapabilities, WebDriver};
use tracing::{debug, warn};

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);
pub const SELECTOR_TIMEOUT: Duration = Duration::from_secs(3);
pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(5);

const VIEWPORTS: &[(u32, u32)] = &[(1366, 768), (1440, 900), (1536, 864), (1920, 1080), (1280, 720)];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
];

const LOCALE_TIMEZONES: &[(&str, &str)] = &[
    ("en-US", "America/New_York"),
    ("en-US", "America/Chicago"),
    ("en-US", "America/New_York"),
];

const RESOURCE_DENYLIST: &[&str] = &[
    "*.jpg", "*.jpeg", "*.png", "*.gif", "*.webp", "*.woff", "*.woff2", "*.ttf",
    "*.css", "*analytics*", "*doubleclick*", "*googletagmanager*", "*facebook.net*",
];

const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
const getContext = HTMLCanvasElement.prototype.getContext;
HTMLCanvasElement.prototype.getContext = function(type, ...args) {
    const ctx = getContext.call(this, type, ...args);
    if (ctx && type === '2d') {
        const orig = ctx.getImageData;
        ctx.getImageData = function(...a) {
            const data = orig.apply(this, a);
            for (let i = 0; i < data.data.length; i += 97) { data.data[i] ^= 1; }
            return data;
        };
    }
    return ctx;
};
"#;

/// A fingerprint profile chosen fresh for each batch.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub viewport: (u32, u32),
    pub user_agent: String,
    pub locale: String,
    pub timezone: String,
}

impl Fingerprint {
    pub fn randomize() -> Self {
        let mut rng = rand::rng();
        let viewport = *VIEWPORTS.choose(&mut rng).unwrap();
        let user_agent = USER_AGENTS.choose(&mut rng).unwrap().to_string();
        let (locale, timezone) = *LOCALE_TIMEZONES.choose(&mut rng).unwrap();
        Self {
            viewport,
            user_agent,
            locale: locale.to_string(),
            timezone: timezone.to_string(),
        }
    }
}

/// Randomized point somewhere within South Florida, used for geolocation
/// spoofing so the target site sees a plausible local visitor.
pub fn random_geolocation() -> (f64, f64) {
    let mut rng = rand::rng();
    let lat = 25.7 + rng.random::<f64>() * 1.0;
    let lon = -80.3 - rng.random::<f64>() * 1.0;
    (lat, lon)
}

/// An owned WebDriver session, released on drop via [`BrowserSession::close`]
/// (or, if the caller forgets, best-effort on drop).
pub struct BrowserSession {
    pub driver: WebDriver,
    extension_dir: Option<PathBuf>,
    closed: bool,
}

impl BrowserSession {
    /// Run the teardown sequence in order: close pages, close context
    /// (quit), short sleep (spec §4.8), then drop the generated extension.
    pub async fn close(mut self) {
        let _ = self.driver.clone().quit().await;
        self.closed = true;
        tokio::time::sleep(Duration::from_millis(200)).await;
        if let Some(dir) = &self.extension_dir {
            extension::cleanup(dir);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("browser session dropped without explicit close; teardown may be incomplete");
            if let Some(dir) = &self.extension_dir {
                extension::cleanup(dir);
            }
        }
    }
}

/// Build a new WebDriver session for one batch, applying the fingerprint
/// and (optionally) a proxy scoped to this batch's session id.
pub async fn acquire(
    webdriver_url: &str,
    proxy: Option<&ProxyConfig>,
    session_id: &str,
) -> anyhow::Result<BrowserSession> {
    let fingerprint = Fingerprint::randomize();
    let mut caps = DesiredCapabilities::chrome();

    caps.add_arg(&format!(
        "--window-size={},{}",
        fingerprint.viewport.0, fingerprint.viewport.1
    ))?;
    caps.add_arg(&format!("--user-agent={}", fingerprint.user_agent))?;
    caps.add_arg("--disable-blink-features=AutomationControlled")?;
    caps.add_arg("--lang=en-US")?;

    let scoped_proxy = proxy.map(|p| p.with_session(session_id));
    if let Some(scoped) = &scoped_proxy {
        caps.add_arg(&format!("--proxy-server=http://{}:{}", scoped.host, scoped.port))?;
    }
    let proxy_auth = scoped_proxy.as_ref().map(|p| (p.username.as_str(), p.password.as_str()));

    let extension_dir = extension::build(session_id, proxy_auth, RESOURCE_DENYLIST)?;
    caps.add_arg(&format!("--load-extension={}", extension_dir.display()))?;

    let driver = WebDriver::new(webdriver_url, caps).await?;
    driver
        .set_page_load_timeout(NAVIGATION_TIMEOUT)
        .await
        .ok();

    driver.execute(STEALTH_SCRIPT, vec![]).await.ok();

    let (lat, lon) = random_geolocation();
    driver.execute(&geolocation_override_script(lat, lon), vec![]).await.ok();

    debug!(?fingerprint.viewport, locale = %fingerprint.locale, lat, lon, "acquired stealth browser session");

    Ok(BrowserSession { driver, extension_dir: Some(extension_dir), closed: false })
}

/// Override `navigator.geolocation` so the target site sees the randomized
/// South Florida coordinates instead of the runner's real location.
fn geolocation_override_script(lat: f64, lon: f64) -> String {
    format!(
        r#"
const fakeCoords = {{ latitude: {lat}, longitude: {lon}, accuracy: 50 }};
if (navigator.geolocation) {{
    navigator.geolocation.getCurrentPosition = function(success) {{
        success({{ coords: fakeCoords, timestamp: Date.now() }});
    }};
    navigator.geolocation.watchPosition = function(success) {{
        success({{ coords: fakeCoords, timestamp: Date.now() }});
        return 0;
    }};
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_vary_across_calls() {
        let samples: Vec<Fingerprint> = (0..20).map(|_| Fingerprint::randomize()).collect();
        let distinct_viewports: std::collections::HashSet<_> =
            samples.iter().map(|f| f.viewport).collect();
        assert!(distinct_viewports.len() > 1);
    }

    #[test]
    fn geolocation_stays_within_south_florida_bounds() {
        for _ in 0..50 {
            let (lat, lon) = random_geolocation();
            assert!((25.7..=26.7).contains(&lat));
            assert!((-81.3..=-80.3).contains(&lon));
        }
    }
}
