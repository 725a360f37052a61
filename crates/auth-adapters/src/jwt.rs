//! HS256 bearer tokens.
//!
//! Claims: `sub` is the user's UUID, `name` the display name used for
//! attribution, `exp` the expiry in seconds since the epoch.

use chrono::{Duration, Utc};
use domains::{AuthError, Author, IdentityProvider, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

pub struct JwtIdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl JwtIdentityProvider {
    pub fn new(secret: &[u8], issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: issuer.map(str::to_string),
        }
    }

    /// Signs a token for `author` valid for `ttl`. Used by tooling and tests;
    /// production tokens come from the session service.
    pub fn issue(&self, author: &Author, ttl: Duration) -> Result<String, TokenError> {
        let claims = Claims {
            sub: author.id.to_string(),
            name: author.name.clone(),
            exp: (Utc::now() + ttl).timestamp(),
            iss: self.issuer.clone(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn authenticate(&self, token: &str) -> Result<Author, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::Invalid(e.to_string())
        })?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AuthError::Invalid("subject is not a user id".to_string()))?;
        let name = data.claims.name.trim();
        if name.is_empty() {
            return Err(AuthError::Invalid("token carries no display name".to_string()));
        }
        Ok(Author {
            id: UserId(id),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Author {
        Author {
            id: UserId(Uuid::new_v4()),
            name: "erin".into(),
        }
    }

    #[test]
    fn issued_token_authenticates() {
        let provider = JwtIdentityProvider::new(b"test-secret", Some("portal"));
        let a = author();
        let token = provider.issue(&a, Duration::minutes(5)).unwrap();
        assert_eq!(provider.authenticate(&token).unwrap(), a);
    }

    #[test]
    fn expired_token_is_rejected() {
        let provider = JwtIdentityProvider::new(b"test-secret", None);
        let token = provider.issue(&author(), Duration::minutes(-10)).unwrap();
        assert!(matches!(provider.authenticate(&token), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn foreign_secret_or_issuer_is_rejected() {
        let ours = JwtIdentityProvider::new(b"ours", Some("portal"));
        let theirs = JwtIdentityProvider::new(b"theirs", Some("portal"));
        let other_issuer = JwtIdentityProvider::new(b"ours", Some("elsewhere"));
        let a = author();

        let token = theirs.issue(&a, Duration::minutes(5)).unwrap();
        assert!(ours.authenticate(&token).is_err());
        let token = other_issuer.issue(&a, Duration::minutes(5)).unwrap();
        assert!(ours.authenticate(&token).is_err());
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let provider = JwtIdentityProvider::new(b"s", None);
        let claims = Claims {
            sub: "42".into(),
            name: "legacy".into(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            iss: None,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(b"s")).unwrap();
        assert!(matches!(provider.authenticate(&token), Err(AuthError::Invalid(_))));
    }
}
