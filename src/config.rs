//! Configuration for the template pipeline
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Template submission, review and publication service
#[derive(Parser, Debug, Clone)]
#[command(name = "template-pipeline")]
#[command(about = "Template submission, review and publication service")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (dev JWT secret, in-memory fallback, error details)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "templates")]
    pub mongodb_db: String,

    /// Use in-memory stores instead of MongoDB
    #[arg(long, env = "MEMORY_STORE", default_value = "false")]
    pub memory_store: bool,

    /// JWT secret shared with the session provider (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Expiry in seconds for tokens minted with `JwtValidator::generate_token`
    /// (tooling and tests). The server only verifies tokens, whose own `exp`
    /// claim decides their lifetime.
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Cookie carrying the session token when no Authorization header is sent
    #[arg(long, env = "SESSION_COOKIE", default_value = "session-token")]
    pub session_cookie: String,

    /// Allow users to promote themselves (bootstrap endpoint, self-service admin)
    #[arg(long, env = "ALLOW_SELF_PROMOTION", default_value = "false")]
    pub allow_self_promotion: bool,

    /// Include diagnostic details in error responses
    #[arg(long, env = "EXPOSE_ERROR_DETAILS", default_value = "false")]
    pub expose_error_details: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Append pipeline audit events to this JSONL file
    #[arg(long, env = "AUDIT_LOG_PATH")]
    pub audit_log_path: Option<PathBuf>,
}

impl Args {
    /// Whether error bodies carry `details`
    pub fn error_details_enabled(&self) -> bool {
        self.dev_mode || self.expose_error_details
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.session_cookie.trim().is_empty() {
            return Err("SESSION_COOKIE must not be empty".to_string());
        }

        Ok(())
    }
}
