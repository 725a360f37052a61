//! `Authorization` header parsing.

use domains::AuthError;

/// Extracts the credential from an `Authorization: Bearer <token>` value.
/// The scheme is matched case-insensitively.
pub fn token_from_header(value: &str) -> Result<&str, AuthError> {
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::Invalid("expected 'Bearer <token>'".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Invalid(format!("unsupported scheme '{scheme}'")));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Missing);
    }
    Ok(token)
}
