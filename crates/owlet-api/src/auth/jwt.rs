use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // guardian account id as string
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// Generate a JWT token for a guardian account.
///
/// Production tokens are minted by the identity service; this exists for
/// tests and local tooling, with the same claims layout.
pub fn generate_jwt_token(
    account_id: Uuid,
    email: String,
    jwt_secret: &str,
    expiry_hours: i64,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: account_id.to_string(),
        email,
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::hours(expiry_hours)).timestamp() as usize,
    };

    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify and decode a JWT token
pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> Result<Claims, ApiError> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Auth("Invalid or expired token".to_string()))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_jwt_token() {
        let account_id = Uuid::new_v4();
        let email = "guardian@example.com".to_string();
        let secret = "test_jwt_secret_minimum_32_characters_long";

        let token = generate_jwt_token(account_id, email.clone(), secret, 24)
            .expect("Failed to generate token");

        assert!(!token.is_empty(), "Token should not be empty");

        let claims = verify_jwt_token(&token, secret).expect("Failed to verify token");

        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.email, email);
        assert!(
            claims.exp > claims.iat,
            "Expiration should be after issued at"
        );
    }

    #[test]
    fn test_verify_jwt_token_with_wrong_secret() {
        let account_id = Uuid::new_v4();
        let secret = "test_jwt_secret_minimum_32_characters_long";
        let wrong_secret = "wrong_jwt_secret_minimum_32_characters_long";

        let token = generate_jwt_token(account_id, "guardian@example.com".to_string(), secret, 24)
            .expect("Failed to generate token");

        let result = verify_jwt_token(&token, wrong_secret);

        assert!(
            result.is_err(),
            "Verification should fail with wrong secret"
        );
        match result {
            Err(ApiError::Auth(msg)) => {
                assert!(msg.contains("Invalid or expired token"));
            }
            _ => panic!("Expected Auth error"),
        }
    }

    #[test]
    fn test_verify_invalid_jwt_token() {
        let secret = "test_jwt_secret_minimum_32_characters_long";

        let result = verify_jwt_token("invalid.jwt.token", secret);

        assert!(
            result.is_err(),
            "Verification should fail for invalid token"
        );
    }
}
