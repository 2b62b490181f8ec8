//! User document schema
//!
//! Directory record keyed by the session provider's stable user id.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stable identifier issued by the session provider
    pub user_id: String,

    pub email: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub role: Role,

    /// Only ever changed through the reputation ledger
    #[serde(default)]
    pub reputation_score: i64,

    #[serde(default)]
    pub profile: UserProfile,

    #[serde(default)]
    pub is_verified: bool,

    pub joined_date: DateTime,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime>,
}

/// Self-editable profile fields
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserDoc {
    /// Create the directory record for a first sign-in
    pub fn new(user_id: String, email: String, name: String, at: DateTime) -> Self {
        Self {
            _id: None,
            metadata: Metadata::stamped(at),
            user_id,
            email,
            name,
            role: Role::User,
            reputation_score: 0,
            profile: UserProfile::default(),
            is_verified: false,
            joined_date: at,
            last_active: Some(at),
        }
    }

    /// Name shown next to the user's pipeline actions
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .name("email_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "joined_date": -1 },
                Some(
                    IndexOptions::builder()
                        .name("joined_date_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
