//! Session token verification.
//!
//! Sessions are issued elsewhere; this service only checks HS256 bearer tokens and
//! reads the user id from the `sub` claim.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use lectern_core::AppError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a token and return the session user id.
    pub fn verify(&self, token: &str) -> Result<String, AppError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!("Session token rejected: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Session has expired".to_string())
                }
                _ => AppError::Unauthorized("Invalid session token".to_string()),
            }
        })?;

        let user_id = data.claims.sub.trim();
        if user_id.is_empty() {
            return Err(AppError::Unauthorized(
                "Session token has no subject".to_string(),
            ));
        }
        Ok(user_id.to_string())
    }
}

/// Pull the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp: usize) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &SessionClaims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        4_102_444_800
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = SessionVerifier::new("secret");
        let user = verifier
            .verify(&token("secret", "user-1", far_future()))
            .unwrap();
        assert_eq!(user, "user-1");
    }

    #[test]
    fn test_verify_rejects_wrong_secret_and_expired() {
        let verifier = SessionVerifier::new("secret");
        assert!(matches!(
            verifier.verify(&token("other", "user-1", far_future())),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            verifier.verify(&token("secret", "user-1", 1)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(verifier.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
