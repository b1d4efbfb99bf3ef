use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use uuid::Uuid;

use super::jwt::verify_jwt_token;
use crate::{error::ApiError, state::AuthConfig};

/// Authenticated guardian extractor
///
/// Use this in route handlers to ensure the caller is signed in. It
/// validates the JWT token from the auth cookie and exposes the guardian
/// account id; acting as a child profile is an explicit `child_id`
/// parameter on the operation, checked against guardianship.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: Uuid,
    pub email: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_config = AuthConfig::from_ref(state);

        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Auth("Failed to read cookies".to_string()))?;

        let token = jar
            .get("auth_token")
            .ok_or(ApiError::Auth("Not authenticated".to_string()))?
            .value()
            .to_owned();

        let claims = verify_jwt_token(&token, &auth_config.jwt_secret)?;

        let account_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Auth("Invalid account ID in token".to_string()))?;

        Ok(AuthUser {
            account_id,
            email: claims.email,
        })
    }
}
