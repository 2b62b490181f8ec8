//! Submission document schema
//!
//! A template proposal awaiting human review. While a submission is open
//! (`submitted` or `under_review`) it carries `active_submitter_id`, which a
//! unique partial index uses to enforce one open submission per submitter.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Metadata, ReviewRecord};
use crate::types::ValidationError;

/// Collection name for submissions
pub const SUBMISSION_COLLECTION: &str = "submissions";

/// Submission lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    ChangesRequested,
}

impl SubmissionStatus {
    /// States a reviewer may still act on
    pub const OPEN: [SubmissionStatus; 2] =
        [SubmissionStatus::Submitted, SubmissionStatus::UnderReview];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::UnderReview => "under_review",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::ChangesRequested => "changes_requested",
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(SubmissionStatus::Submitted),
            "under_review" => Ok(SubmissionStatus::UnderReview),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            "changes_requested" => Ok(SubmissionStatus::ChangesRequested),
            other => Err(ValidationError::InvalidState(other.to_string())),
        }
    }
}

/// Fixed set of template categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateCategory {
    #[serde(rename = "auth")]
    Auth,
    #[serde(rename = "payment")]
    Payment,
    #[serde(rename = "AI projects")]
    AiProjects,
    #[serde(rename = "personal")]
    Personal,
    #[serde(rename = "Portfolio")]
    Portfolio,
    #[serde(rename = "github")]
    Github,
}

impl TemplateCategory {
    pub const ALL: [TemplateCategory; 6] = [
        TemplateCategory::Auth,
        TemplateCategory::Payment,
        TemplateCategory::AiProjects,
        TemplateCategory::Personal,
        TemplateCategory::Portfolio,
        TemplateCategory::Github,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::Auth => "auth",
            TemplateCategory::Payment => "payment",
            TemplateCategory::AiProjects => "AI projects",
            TemplateCategory::Personal => "personal",
            TemplateCategory::Portfolio => "Portfolio",
            TemplateCategory::Github => "github",
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidCategory(s.to_string()))
    }
}

/// Submission document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmissionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Public identifier (`submission_<millis>_<random>`)
    pub submission_id: String,

    pub submitter_id: String,
    pub submitter_name: String,

    pub status: SubmissionStatus,

    /// Present only while the submission is open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_submitter_id: Option<String>,

    pub submitted_at: DateTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime>,

    pub title: String,
    pub description: String,
    /// Canonical `https://github.com/<owner>/<repo>`
    pub github_url: String,
    pub category: TemplateCategory,

    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub deployment: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub use_cases: Vec<String>,

    #[serde(default)]
    pub review_notes: Vec<ReviewRecord>,

    #[serde(default = "default_version")]
    pub version: i32,
}

fn default_version() -> i32 {
    1
}

impl SubmissionDoc {
    /// Apply a review decision to an in-memory copy
    pub fn apply_review(&mut self, review: ReviewRecord) {
        self.status = review.action.resulting_status();
        self.active_submitter_id = None;
        self.last_reviewed_at = Some(review.reviewed_at);
        self.metadata.touch(review.reviewed_at);
        self.review_notes.push(review);
    }
}

impl IntoIndexes for SubmissionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "submission_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("submission_id_unique".to_string())
                        .build(),
                ),
            ),
            // At most one open submission per submitter
            (
                doc! { "active_submitter_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! {
                            "active_submitter_id": { "$exists": true }
                        })
                        .name("active_submitter_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "submitter_id": 1, "submitted_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("submitter_submitted_at_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SubmissionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
