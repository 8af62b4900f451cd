use reqwest::{Client, Proxy};

/// Build a `reqwest::Client` for outbound LLM/classifier calls, optionally
/// routed through an upstream proxy.
pub fn create_client(proxy_url: Option<&str>, user_agent: &str) -> anyhow::Result<Client> {
    let mut builder = Client::builder().user_agent(user_agent);
    if let Some(url) = proxy_url {
        builder = builder.proxy(Proxy::all(url)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_without_proxy() {
        assert!(create_client(None, "lead-enrich/0.1").is_ok());
    }

    #[test]
    fn builds_client_with_proxy() {
        assert!(create_client(Some("http://127.0.0.1:8080"), "lead-enrich/0.1").is_ok());
    }
}
