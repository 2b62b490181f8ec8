//! Error types for the template pipeline
//!
//! Every failure a handler can produce maps to exactly one HTTP status and
//! one machine-stable code.

use hyper::StatusCode;

/// Input validation failures (all surface as 400)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Invalid URL format")]
    InvalidUrl,

    #[error("Only GitHub repository URLs are allowed")]
    NotGithub,

    #[error("URL must point to a repository (https://github.com/owner/repo)")]
    InvalidRepoFormat,

    #[error("Invalid GitHub owner name")]
    InvalidOwner,

    #[error("Invalid GitHub repository name")]
    InvalidRepoName,

    #[error("{field} must be between {min} and {max} characters")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
    },

    /// The title has no ASCII letter or digit to build a slug from
    #[error("Title must contain at least one letter or digit (a-z, 0-9)")]
    InvalidTitle,

    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("{field} may contain at most {max} items")]
    TooManyItems { field: &'static str, max: usize },

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error("Submission cannot be reviewed in status '{0}'")]
    InvalidState(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

impl ValidationError {
    /// Machine-stable code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::InvalidUrl => "INVALID_URL",
            Self::NotGithub => "NOT_GITHUB",
            Self::InvalidRepoFormat => "INVALID_REPO_FORMAT",
            Self::InvalidOwner => "INVALID_OWNER",
            Self::InvalidRepoName => "INVALID_REPO_NAME",
            Self::InvalidLength { .. } => "INVALID_LENGTH",
            Self::InvalidTitle => "INVALID_TITLE",
            Self::InvalidCategory(_) => "INVALID_CATEGORY",
            Self::TooManyItems { .. } => "TOO_MANY_ITEMS",
            Self::InvalidRating => "INVALID_RATING",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InvalidAction(_) => "INVALID_ACTION",
            Self::InvalidRole(_) => "INVALID_ROLE",
            Self::InvalidJson(_) => "INVALID_JSON",
        }
    }
}

/// Main error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller's session is valid but the directory has no record for it
    #[error("User not found")]
    UserNotFound {
        user_id: String,
        email: Option<String>,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("A template with this GitHub URL already exists")]
    DuplicateTemplate,

    #[error("You already have a submission awaiting review")]
    PendingSubmissionExists,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::UserNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateTemplate | Self::PendingSubmissionExists | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::Invalid(v) => v.code(),
            Self::DuplicateTemplate => "DUPLICATE_TEMPLATE",
            Self::PendingSubmissionExists => "PENDING_SUBMISSION_EXISTS",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) | Self::Internal(_) | Self::Config(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the caller.
    /// Server-side failures are replaced with a generic message.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(m) | Self::Forbidden(m) | Self::NotFound(m) | Self::Conflict(m) => {
                m.clone()
            }
            Self::Database(_) | Self::Internal(_) | Self::Config(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Diagnostic details, emitted only when error details are exposed
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::UserNotFound { user_id, email } => Some(serde_json::json!({
                "userId": user_id,
                "email": email,
                "lookup": "user_id, then email",
            })),
            _ => None,
        }
    }

    /// True if this is a duplicate-key style conflict
    pub fn is_conflict(&self) -> bool {
        self.status_code() == StatusCode::CONFLICT
    }
}

impl From<mongodb::error::Error> for PipelineError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Invalid(ValidationError::InvalidJson(err.to_string()))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<hyper::Error> for PipelineError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
