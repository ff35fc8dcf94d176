use std::net::SocketAddr;

use anyhow::Context;
use tracing::warn;

const PLACEHOLDER_SECRETS: &[&str] = &["dev_key", "change-me"];

pub struct WebConfig {
    pub api_url: String,
    pub secret: String,
    pub addr: SocketAddr,
}

impl WebConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = env_or("QUILL_API_URL", "http://localhost:5000");

        let secret = env_or("QUILL_WEB_SECRET", "dev_key");
        if PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
            warn!("QUILL_WEB_SECRET is unset or a placeholder; session cookies are forgeable");
        }

        let host = env_or("QUILL_WEB_HOST", "0.0.0.0");
        let port: u16 = env_or("QUILL_WEB_PORT", "5001")
            .parse()
            .context("QUILL_WEB_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

        Ok(Self { api_url, secret, addr })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}
