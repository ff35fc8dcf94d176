use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

/// Secrets that are fine on a laptop and nowhere else.
const PLACEHOLDER_SECRETS: &[&str] = &["default_secret", "change-me"];

pub struct ServerConfig {
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub addr: SocketAddr,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env_or("QUILL_SECRET_KEY", "default_secret");
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("QUILL_SECRET_KEY is unset or a placeholder; tokens are forgeable");
        }

        let db_path = PathBuf::from(env_or("QUILL_DB_PATH", "quill.db"));

        let token_ttl = parse_ttl(&env_or("QUILL_TOKEN_TTL_MINUTES", "15"))?;

        let host = env_or("QUILL_HOST", "0.0.0.0");
        let port: u16 = env_or("QUILL_PORT", "5000")
            .parse()
            .context("QUILL_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

        Ok(Self {
            db_path,
            jwt_secret,
            token_ttl,
            addr,
        })
    }
}

/// Token lifetime in whole minutes; must be positive and representable.
fn parse_ttl(raw: &str) -> anyhow::Result<chrono::Duration> {
    let minutes: i64 = raw
        .trim()
        .parse()
        .context("QUILL_TOKEN_TTL_MINUTES must be an integer")?;
    if minutes <= 0 {
        anyhow::bail!("QUILL_TOKEN_TTL_MINUTES must be positive, got {}", minutes);
    }
    chrono::Duration::try_minutes(minutes)
        .with_context(|| format!("QUILL_TOKEN_TTL_MINUTES is out of range: {}", minutes))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}
