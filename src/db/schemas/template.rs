//! Template document schemas
//!
//! A reviewed submission becomes a pending template; an admin then either
//! publishes it into the catalog or rejects it in place.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Metadata, TemplateCategory};
use crate::types::ValidationError;

/// Collection name for templates awaiting publication
pub const PENDING_TEMPLATE_COLLECTION: &str = "pending_templates";

/// Collection name for the published catalog
pub const TEMPLATE_COLLECTION: &str = "templates";

/// Status written on every published template
pub const PUBLISHED_STATUS: &str = "Production-ready";

/// Content shared by pending and published templates
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TemplateContent {
    /// Lookup key derived from the title
    pub slug: String,
    pub name: String,
    pub category: TemplateCategory,
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub demo_url: Option<String>,
    pub code_url: String,
    #[serde(default)]
    pub deployment: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    /// Submitter user id, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

/// Pending template state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    #[default]
    Pending,
    Rejected,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Pending => "pending",
            PendingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PendingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PendingStatus::Pending),
            "rejected" => Ok(PendingStatus::Rejected),
            other => Err(ValidationError::InvalidState(other.to_string())),
        }
    }
}

/// Template that passed review, awaiting admin sign-off
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PendingTemplateDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub template: TemplateContent,

    #[serde(default)]
    pub status: PendingStatus,

    /// Submission this template was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,

    pub approved_by: String,
    pub approved_at: DateTime,

    #[serde(default = "default_version")]
    pub version: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_notes: Option<String>,
}

fn default_version() -> i32 {
    1
}

impl PendingTemplateDoc {
    pub fn slug(&self) -> &str {
        &self.template.slug
    }

    /// Build the catalog entry this template becomes when published
    pub fn into_published(self, published_by: String, at: DateTime) -> PublishedTemplateDoc {
        PublishedTemplateDoc {
            _id: None,
            metadata: Metadata::stamped(at),
            template: self.template,
            status: PUBLISHED_STATUS.to_string(),
            approved_by: Some(self.approved_by),
            approved_at: Some(self.approved_at),
            published_by,
            published_at: at,
            version: self.version + 1,
        }
    }
}

impl IntoIndexes for PendingTemplateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "template.slug": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("slug_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "approved_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("approved_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PendingTemplateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Live catalog entry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublishedTemplateDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub template: TemplateContent,

    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime>,

    pub published_by: String,
    pub published_at: DateTime,

    pub version: i32,
}

impl IntoIndexes for PublishedTemplateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One catalog entry per repository
            (
                doc! { "template.code_url": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("code_url_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "template.slug": 1 },
                Some(
                    IndexOptions::builder()
                        .name("slug_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "template.category": 1, "published_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("category_published_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PublishedTemplateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
