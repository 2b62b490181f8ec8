//! Session resolution
//!
//! Turns request headers into an authenticated identity. The pipeline
//! trusts whatever identity a valid token carries.

use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::HeaderMap;

use crate::auth::jwt::{extract_token_from_cookie, extract_token_from_header, JwtValidator};
use crate::types::PipelineError;

/// Authenticated caller as reported by the session provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

/// Resolves request credentials against the configured validator
#[derive(Clone)]
pub struct SessionResolver {
    validator: JwtValidator,
    cookie_name: String,
}

impl SessionResolver {
    pub fn new(validator: JwtValidator, cookie_name: impl Into<String>) -> Self {
        Self {
            validator,
            cookie_name: cookie_name.into(),
        }
    }

    /// Access the underlying validator
    pub fn validator(&self) -> &JwtValidator {
        &self.validator
    }

    /// Resolve the caller's identity from the Authorization header, falling
    /// back to the session cookie.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Identity, PipelineError> {
        let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let cookie_header = headers.get(COOKIE).and_then(|v| v.to_str().ok());

        let token = extract_token_from_header(auth_header)
            .or_else(|| extract_token_from_cookie(cookie_header, &self.cookie_name))
            .ok_or_else(|| PipelineError::Unauthorized("No session token provided".into()))?;

        let result = self.validator.verify_token(token);
        match result.claims {
            Some(claims) if result.valid => Ok(Identity {
                user_id: claims.sub,
                email: claims.email,
                name: claims.name,
            }),
            _ => Err(PipelineError::Unauthorized(
                result.error.unwrap_or_else(|| "Invalid token".to_string()),
            )),
        }
    }
}
