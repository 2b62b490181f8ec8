//! Roles and capabilities
//!
//! Roles form a closed set; every pipeline operation checks a capability
//! rather than comparing role names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{PipelineError, ValidationError};

/// User role stored in the directory
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Role {
    /// Signed-in user, may submit templates
    #[default]
    User = 0,
    /// Has had work accepted
    Contributor = 1,
    /// May review submissions
    Reviewer = 2,
    /// May publish templates and manage users
    Admin = 3,
}

/// Something a role may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Submit,
    Review,
    Publish,
    ManageUsers,
    ViewAllSubmissions,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Contributor, Role::Reviewer, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Contributor => "contributor",
            Role::Reviewer => "reviewer",
            Role::Admin => "admin",
        }
    }

    /// Whether this role grants the capability
    pub fn can(&self, capability: Capability) -> bool {
        match capability {
            Capability::Submit => true,
            Capability::Review => *self >= Role::Reviewer,
            Capability::Publish | Capability::ManageUsers | Capability::ViewAllSubmissions => {
                *self == Role::Admin
            }
        }
    }

    /// Roles with elevated capabilities
    pub fn is_privileged(&self) -> bool {
        *self >= Role::Reviewer
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "contributor" => Ok(Role::Contributor),
            "reviewer" => Ok(Role::Reviewer),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Submit => "submit",
            Capability::Review => "review",
            Capability::Publish => "publish",
            Capability::ManageUsers => "manage users",
            Capability::ViewAllSubmissions => "view all submissions",
        };
        f.write_str(s)
    }
}

/// Single authorization gate used by every handler
pub fn authorize(role: Role, capability: Capability) -> Result<(), PipelineError> {
    if role.can(capability) {
        Ok(())
    } else {
        Err(PipelineError::Forbidden(format!(
            "Role '{}' is not allowed to {}",
            role, capability
        )))
    }
}
