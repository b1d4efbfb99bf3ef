use anyhow::{Context, bail};
use std::env;

/// Deployment environment, selected by `APP_ENV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Self::Production,
            _ => Self::Development,
        }
    }

    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Optional: without it the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub cookie_secret: String,
    pub bind_addr: String,
    pub env: Environment,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let cookie_secret = env::var("COOKIE_SECRET").context("COOKIE_SECRET is not set")?;
        if cookie_secret.len() < 64 {
            bail!("COOKIE_SECRET must be at least 64 bytes");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            jwt_secret,
            cookie_secret,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            env: Environment::from_env(),
        })
    }
}
