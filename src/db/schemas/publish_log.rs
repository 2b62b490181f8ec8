//! Publication log schema
//!
//! Append-only audit of admin publish/reject decisions.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for the publication log
pub const PUBLISH_LOG_COLLECTION: &str = "publish_log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishAction {
    Published,
    Rejected,
}

impl PublishAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishAction::Published => "published",
            PublishAction::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublishLogDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Slug of the template acted on
    pub template_id: String,
    pub template_name: String,
    pub action: PublishAction,
    pub admin_id: String,
    pub admin_name: String,
    #[serde(default)]
    pub notes: String,
    pub timestamp: DateTime,
}

impl IntoIndexes for PublishLogDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "template_id": 1, "timestamp": -1 },
                Some(
                    IndexOptions::builder()
                        .name("template_timestamp_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "action": 1, "timestamp": -1 },
                Some(
                    IndexOptions::builder()
                        .name("action_timestamp_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PublishLogDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
