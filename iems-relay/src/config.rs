//! Relay configuration, loaded once from the process environment.
//!
//! Handles:
//! - ThingsBoard endpoint, credentials and device identity
//! - Optional static JWT override (skips login entirely)
//! - Bind / probe / public-URL tuning for deployment and tests

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub tb_host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_id: String,
    pub jwt_token: Option<String>,
    pub bind_addr: String,
    pub probe_addr: String,
    pub public_url: Option<String>,
}

fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        let tb_host = env_opt("TB_HOST")
            .unwrap_or_else(|| "https://demo.thingsboard.io".to_string())
            .trim_end_matches('/')
            .to_string();
        let device_id = env_opt("TB_DEVICE_ID").context("TB_DEVICE_ID must be set")?;
        let username = env_opt("TB_USERNAME");
        let password = env_opt("TB_PASSWORD");
        let jwt_token = env_opt("TB_JWT_TOKEN");

        if jwt_token.is_none() && (username.is_none() || password.is_none()) {
            bail!("either TB_JWT_TOKEN or both TB_USERNAME and TB_PASSWORD must be set");
        }

        Ok(Self {
            tb_host,
            username,
            password,
            device_id,
            jwt_token,
            bind_addr: env_opt("RELAY_BIND").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            probe_addr: env_opt("RELAY_PROBE_ADDR").unwrap_or_else(|| "8.8.8.8:53".to_string()),
            public_url: env_opt("RELAY_PUBLIC_URL"),
        })
    }
}
