//! # auth-adapters
//!
//! Identity providers. Session issuance belongs to an external service; this
//! crate only verifies the bearer credentials it hands out.

pub mod bearer;

#[cfg(feature = "auth-jwt")]
pub mod jwt;

pub use bearer::token_from_header;

#[cfg(feature = "auth-jwt")]
pub use jwt::{Claims, JwtIdentityProvider, TokenError};
