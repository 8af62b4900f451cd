//! Generates a throwaway unpacked Chrome extension per browser session.
//!
//! Chrome's `--proxy-server` flag silently drops any userinfo embedded in
//! the URL, so a session-scoped proxy username/password (spec §4.8/§5) has
//! to be supplied some other way — `chrome.webRequest.onAuthRequired` is the
//! standard workaround. The same extension also enforces the resource
//! denylist via `chrome.webRequest.onBeforeRequest`, since Chrome has no
//! capability flag for blocking requests by URL pattern.

use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST: &str = r#"{
  "manifest_version": 2,
  "name": "session-proxy",
  "version": "1.0",
  "permissions": ["webRequest", "webRequestBlocking", "<all_urls>"],
  "background": { "scripts": ["background.js"], "persistent": true }
}"#;

fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn denylist_script(denylist: &[&str]) -> String {
    let patterns: Vec<String> = denylist.iter().map(|p| format!("\"{}\"", js_escape(p))).collect();
    format!(
        r#"
const BLOCKED = [{patterns}].map(p => new RegExp(
    '^' + p.split('*').map(s => s.replace(/[.+?^${{}}()|[\]\\]/g, '\\$&')).join('.*') + '$'
));
chrome.webRequest.onBeforeRequest.addListener(
    details => ({{ cancel: BLOCKED.some(re => re.test(details.url)) }}),
    {{ urls: ["<all_urls>"] }},
    ["blocking"]
);
"#,
        patterns = patterns.join(", ")
    )
}

fn auth_script(username: &str, password: &str) -> String {
    format!(
        r#"
chrome.webRequest.onAuthRequired.addListener(
    () => ({{ authCredentials: {{ username: "{}", password: "{}" }} }}),
    {{ urls: ["<all_urls>"] }},
    ["blocking"]
);
"#,
        js_escape(username),
        js_escape(password)
    )
}

/// Write `manifest.json` + `background.js` for one session into a fresh
/// temp directory and return its path, ready for `--load-extension=`.
pub fn build(session_id: &str, proxy_auth: Option<(&str, &str)>, denylist: &[&str]) -> anyhow::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("lead-enrich-ext-{session_id}"));
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("manifest.json"), MANIFEST)?;

    let mut background = denylist_script(denylist);
    if let Some((username, password)) = proxy_auth {
        background.push_str(&auth_script(username, password));
    }
    fs::write(dir.join("background.js"), background)?;

    Ok(dir)
}

/// Best-effort removal of a session's generated extension directory.
pub fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_manifest_and_background() {
        let dir = build("test-session-1", Some(("alice", "hunter2")), &["*.jpg", "*analytics*"]).unwrap();
        assert!(dir.join("manifest.json").exists());
        let background = fs::read_to_string(dir.join("background.js")).unwrap();
        assert!(background.contains("onAuthRequired"));
        assert!(background.contains("alice"));
        assert!(background.contains("onBeforeRequest"));
        cleanup(&dir);
        assert!(!dir.exists());
    }

    #[test]
    fn omits_auth_listener_without_credentials() {
        let dir = build("test-session-2", None, &["*.css"]).unwrap();
        let background = fs::read_to_string(dir.join("background.js")).unwrap();
        assert!(!background.contains("onAuthRequired"));
        cleanup(&dir);
    }
}
