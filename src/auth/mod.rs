//! Authentication and authorization
//!
//! Provides:
//! - JWT session token validation (and minting, for tooling)
//! - Identity resolution from headers or the session cookie
//! - Roles, capabilities and the single authorization gate

pub mod jwt;
pub mod roles;
pub mod session;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use roles::{authorize, Capability, Role};
pub use session::{Identity, SessionResolver};
