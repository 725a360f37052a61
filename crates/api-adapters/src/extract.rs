//! Bearer-token extractors.
//!
//! A request without `Authorization` is anonymous; a request with a header
//! that does not verify is refused, even on routes that allow anonymous
//! readers.

use crate::error::HttpError;
use crate::state::AppState;
use auth_adapters::token_from_header;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domains::{AuthError, Author};
use tracing::warn;

/// The caller, if credentials were presented.
#[derive(Debug, Clone)]
pub struct MaybeAuthor(pub Option<Author>);

/// The caller; anonymous requests are refused with 401.
#[derive(Debug, Clone)]
pub struct RequireAuthor(pub Author);

fn resolve(parts: &Parts, state: &AppState) -> Result<Option<Author>, HttpError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let outcome = value
        .to_str()
        .map_err(|_| AuthError::Invalid("header is not ASCII".to_string()))
        .and_then(token_from_header)
        .and_then(|token| state.identity.authenticate(token));

    match outcome {
        Ok(author) => Ok(Some(author)),
        Err(err) => {
            warn!(error = %err, path = %parts.uri.path(), "credentials rejected");
            state.metrics.record_rejected_credentials();
            Err(err.into())
        }
    }
}

impl FromRequestParts<AppState> for MaybeAuthor {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state).map(MaybeAuthor)
    }
}

impl FromRequestParts<AppState> for RequireAuthor {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state)? {
            Some(author) => Ok(RequireAuthor(author)),
            None => {
                state.metrics.record_rejected_credentials();
                Err(AuthError::Missing.into())
            }
        }
    }
}

impl MaybeAuthor {
    pub fn user_id(&self) -> Option<domains::UserId> {
        self.0.as_ref().map(|a| a.id)
    }
}
