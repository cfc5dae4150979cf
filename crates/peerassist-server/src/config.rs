use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub allowed_origin: String,
    pub request_timeout: Duration,
    pub store_timeout: Duration,
    pub otp_sweep_interval: Duration,
    pub sendgrid_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> Result<u64> {
            match var(key) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("{key} must be a whole number, got {raw:?}")),
                None => Ok(default),
            }
        };

        let jwt_secret = var("PEERASSIST_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PEERASSIST_JWT_SECRET is unset or still a placeholder");
        }

        let host = or("PEERASSIST_HOST", "0.0.0.0");
        let port = or("PEERASSIST_PORT", "8080");
        let addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;
        let otp_sweep_secs = number("PEERASSIST_OTP_SWEEP_SECS", 300)?;

        Ok(Self {
            addr,
            db_path: or("PEERASSIST_DB_PATH", "peerassist.db").into(),
            jwt_secret,
            allowed_origin: or("PEERASSIST_ALLOWED_ORIGIN", "http://localhost:3000"),
            request_timeout: Duration::from_secs(number("PEERASSIST_REQUEST_TIMEOUT_SECS", 10)?),
            store_timeout: Duration::from_millis(number("PEERASSIST_STORE_TIMEOUT_MS", 5000)?),
            otp_sweep_interval: Duration::from_secs(otp_sweep_secs.max(1)),
            sendgrid_api_key: var("SENDGRID_API_KEY").filter(|k| !k.is_empty()),
            mail_from: or("PEERASSIST_MAIL_FROM", "no-reply@peerassist.local"),
        })
    }
}
