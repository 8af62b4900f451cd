use anyhow::{anyhow, Result};

/// A single upstream proxy, parsed from the `BLAKE_PROXIES` environment
/// variable (comma-separated `host:port:user:pass` entries).
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ProxyConfig {
    pub fn parse(entry: &str) -> Result<Self> {
        let parts: Vec<&str> = entry.splitn(4, ':').collect();
        let [host, port, username, password] = parts.as_slice() else {
            return Err(anyhow!("malformed proxy entry: '{entry}' (expected host:port:user:pass)"));
        };
        Ok(Self {
            host: host.to_string(),
            port: port.parse().map_err(|_| anyhow!("invalid proxy port in '{entry}'"))?,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Rewrite the password to embed a per-batch session identifier, as
    /// required by §4.8/§5: upstream sessions must remain disjoint.
    pub fn with_session(&self, session_id: &str) -> Self {
        Self {
            password: format!("{}-session-{}", self.password, session_id),
            ..self.clone()
        }
    }

    pub fn proxy_url(&self) -> String {
        format!(
            "http://{}:{}@{}:{}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            self.host,
            self.port
        )
    }
}

/// Process-wide configuration, loaded from environment variables (optionally
/// via a `.env` file through `dotenvy`).
#[derive(Debug, Clone)]
pub struct Config {
    pub proxies: Vec<ProxyConfig>,
    pub llm_endpoint: String,
    pub llm_api_key: String,
    pub phone_classifier_endpoint: String,
    pub phone_classifier_api_key: String,
    pub workspace_root: std::path::PathBuf,
    pub webdriver_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let proxies = match std::env::var("BLAKE_PROXIES") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|entry| ProxyConfig::parse(entry.trim()))
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            proxies,
            llm_endpoint: std::env::var("LLM_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            phone_classifier_endpoint: std::env::var("PHONE_CLASSIFIER_ENDPOINT")
                .unwrap_or_else(|_| "https://api.phonevalidator.example/v1/classify".to_string()),
            phone_classifier_api_key: std::env::var("PHONE_CLASSIFIER_API_KEY").unwrap_or_default(),
            workspace_root: std::env::var("WORKSPACE_ROOT")
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|_| std::path::PathBuf::from("workspace")),
            webdriver_url: std::env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proxy_entry() {
        let p = ProxyConfig::parse("1.2.3.4:8080:alice:hunter2").unwrap();
        assert_eq!(p.host, "1.2.3.4");
        assert_eq!(p.port, 8080);
        assert_eq!(p.username, "alice");
        assert_eq!(p.password, "hunter2");
    }

    #[test]
    fn rejects_malformed_proxy_entry() {
        assert!(ProxyConfig::parse("not-a-proxy").is_err());
    }

    #[test]
    fn session_rewrite_embeds_identifier() {
        let p = ProxyConfig::parse("host:1:u:pass").unwrap();
        let scoped = p.with_session("abc123");
        assert!(scoped.password.contains("session-abc123"));
        assert_eq!(scoped.host, p.host);
    }
}
