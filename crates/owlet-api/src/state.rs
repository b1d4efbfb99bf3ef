use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use owlet_db::store::{ContentStore, EngineStore};

use crate::config::{ApiConfig, Environment};

/// Verification-side auth settings. Token issuance lives in the external
/// identity service; this service only verifies.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Shared application state: the injected persistence collaborators plus
/// auth/cookie configuration. Cloning is cheap (everything is `Arc` or
/// small).
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn EngineStore>,
    pub content: Arc<dyn ContentStore>,
    pub auth: AuthConfig,
    pub cookie_key: Key,
    pub environment: Environment,
}

impl ApiState {
    pub fn new(
        config: &ApiConfig,
        store: Arc<dyn EngineStore>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            store,
            content,
            auth: AuthConfig {
                jwt_secret: config.jwt_secret.clone(),
            },
            cookie_key: Key::from(config.cookie_secret.as_bytes()),
            environment: config.env,
        }
    }
}

impl FromRef<ApiState> for Key {
    fn from_ref(state: &ApiState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<ApiState> for AuthConfig {
    fn from_ref(state: &ApiState) -> Self {
        state.auth.clone()
    }
}
