//! Bearer-token authentication.
//!
//! Access tokens are issued by the platform's identity service, not by this server. They are HS256 JWTs whose claims
//! name the user and the single role they act under. [`JwtAuthMiddlewareFactory`](crate::middleware::JwtAuthMiddlewareFactory)
//! validates the token on every `/api` request and stores the [`JwtClaims`] in the request extensions, where
//! handlers pick them up as an extractor.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use haul_engine::db_types::{Actor, Role};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id.
    pub sub: i64,
    pub role: Role,
    /// Expiry, as a unix timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.sub, self.role)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("💻️ No JWT claims found in request extensions for {}", req.path());
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key, validation: Validation::new(Algorithm::HS256) }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        Ok(data.claims)
    }

    /// Pulls the bearer token out of the `Authorization` header and validates it.
    pub fn claims_from_request(&self, req: &HttpRequest) -> Result<JwtClaims, AuthError> {
        let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
        let value = header.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a bearer token".to_string()))?;
        self.validate(token.trim())
    }
}

/// Signs access tokens with the server's secret. Used by operators to mint tokens for service accounts, and by the
/// endpoint tests.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, actor: Actor, valid_for: Duration) -> Result<String, AuthError> {
        let claims = JwtClaims { sub: actor.id, role: actor.role, exp: (Utc::now() + valid_for).timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new("an-endpoint-test-secret-do-not-reuse")
    }

    #[test]
    fn issued_tokens_validate() {
        let token = TokenIssuer::new(&config()).issue_token(Actor::helper(12), Duration::hours(1)).unwrap();
        let claims = TokenValidator::new(&config()).validate(&token).unwrap();
        assert_eq!(claims.actor(), Actor::helper(12));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = TokenIssuer::new(&config()).issue_token(Actor::admin(1), Duration::hours(-2)).unwrap();
        let err = TokenValidator::new(&config()).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)), "was {err:?}");
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let other = AuthConfig::new("a-different-secret-entirely");
        let token = TokenIssuer::new(&other).issue_token(Actor::admin(1), Duration::hours(1)).unwrap();
        let err = TokenValidator::new(&config()).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)), "was {err:?}");
    }

    #[test]
    fn garbage_is_poorly_formatted() {
        let err = TokenValidator::new(&config()).validate("made up nonsense").unwrap_err();
        assert!(matches!(err, AuthError::PoorlyFormattedToken(_)), "was {err:?}");
    }
}
