//! Review ledger schema
//!
//! Append-only record of review decisions. Each record is also embedded in
//! the parent submission's `review_notes`.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Metadata, SubmissionStatus};
use crate::types::ValidationError;

/// Collection name for the review ledger
pub const REVIEW_COLLECTION: &str = "reviews";

/// Reviewer decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    RequestChanges,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::RequestChanges => "request_changes",
        }
    }

    /// Status the submission lands in after this decision
    pub fn resulting_status(&self) -> SubmissionStatus {
        match self {
            ReviewAction::Approve => SubmissionStatus::Approved,
            ReviewAction::Reject => SubmissionStatus::Rejected,
            ReviewAction::RequestChanges => SubmissionStatus::ChangesRequested,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ReviewAction::Approve),
            "reject" => Ok(ReviewAction::Reject),
            "request_changes" => Ok(ReviewAction::RequestChanges),
            other => Err(ValidationError::InvalidAction(other.to_string())),
        }
    }
}

/// Immutable review decision
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReviewRecord {
    pub review_id: String,
    pub submission_id: String,
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub action: ReviewAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(default)]
    pub notes: String,
    pub reviewed_at: DateTime,
}

/// Review ledger document
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReviewDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub review: ReviewRecord,
}

impl ReviewDoc {
    pub fn new(review: ReviewRecord) -> Self {
        Self {
            _id: None,
            metadata: Metadata::stamped(review.reviewed_at),
            review,
        }
    }
}

impl IntoIndexes for ReviewDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "review.review_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("review_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "review.submission_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("submission_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "review.action": 1, "review.reviewed_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("action_reviewed_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ReviewDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
