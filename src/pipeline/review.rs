//! Review stage
//!
//! A review decision is one atomic compare-and-set on the submission.
//! Approval then writes the pending template; if that write fails the
//! submission is put back the way it was.

use bson::DateTime;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::validation::{new_review_id, slugify, summarize};
use super::{required, Pipeline};
use crate::auth::{authorize, Capability, Identity};
use crate::db::schemas::{
    Metadata, PendingStatus, PendingTemplateDoc, ReviewAction, ReviewDoc, ReviewRecord,
    SubmissionDoc, SubmissionStatus, TemplateContent,
};
use crate::logging::{AuditEvent, AuditEventType};
use crate::store::ReputationReason;
use crate::types::{PipelineError, Result, ValidationError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub submission_id: Option<String>,
    pub action: Option<String>,
    pub notes: Option<String>,
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub message: String,
    pub status: SubmissionStatus,
    /// Slug of the pending template created by an approval
    pub template_slug: Option<String>,
}

/// Pending template derived from an approved submission
pub(crate) fn pending_from_submission(
    submission: &SubmissionDoc,
    approved_by: &str,
    at: DateTime,
) -> PendingTemplateDoc {
    PendingTemplateDoc {
        _id: None,
        metadata: Metadata::stamped(at),
        template: TemplateContent {
            slug: slugify(&submission.title),
            name: submission.title.clone(),
            category: submission.category,
            summary: summarize(&submission.description),
            description: submission.description.clone(),
            tech_stack: submission.tech_stack.clone(),
            features: submission.features.clone(),
            demo_url: None,
            code_url: submission.github_url.clone(),
            deployment: submission.deployment.clone(),
            use_cases: submission.use_cases.clone(),
            submitted_by: Some(submission.submitter_id.clone()),
        },
        status: PendingStatus::Pending,
        submission_id: Some(submission.submission_id.clone()),
        approved_by: approved_by.to_string(),
        approved_at: at,
        version: 1,
        rejected_by: None,
        rejected_at: None,
        rejection_notes: None,
    }
}

fn rating(value: Option<i64>) -> std::result::Result<Option<i32>, ValidationError> {
    match value {
        None => Ok(None),
        Some(r @ 1..=5) => Ok(Some(r as i32)),
        Some(_) => Err(ValidationError::InvalidRating),
    }
}

impl Pipeline {
    /// Record a reviewer's decision on an open submission
    pub async fn review(&self, identity: &Identity, request: &ReviewRequest) -> Result<ReviewOutcome> {
        let reviewer = self.caller(identity).await?;
        authorize(reviewer.role, Capability::Review)?;

        let [submission_id, action] = required([
            ("submissionId", request.submission_id.as_deref()),
            ("action", request.action.as_deref()),
        ])?;

        let submission = self
            .stores
            .submissions
            .find(submission_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound("Submission not found".into()))?;
        if !submission.status.is_open() {
            return Err(ValidationError::InvalidState(submission.status.to_string()).into());
        }

        let action: ReviewAction = action.parse()?;
        let rating = rating(request.rating)?;
        // Submissions stored before titles were checked can still lack a slug
        if action == ReviewAction::Approve && slugify(&submission.title).is_empty() {
            return Err(ValidationError::InvalidTitle.into());
        }

        let now = DateTime::now();
        let record = ReviewRecord {
            review_id: new_review_id(),
            submission_id: submission_id.to_string(),
            reviewer_id: reviewer.user_id.clone(),
            reviewer_name: reviewer.display_name().to_string(),
            action,
            rating,
            notes: request.notes.as_deref().unwrap_or_default().trim().to_string(),
            reviewed_at: now,
        };

        let previous = match self
            .stores
            .submissions
            .apply_review(submission_id, &record)
            .await?
        {
            Some(previous) => previous,
            // Another reviewer got there first
            None => {
                let current = self
                    .stores
                    .submissions
                    .find(submission_id)
                    .await?
                    .ok_or_else(|| PipelineError::NotFound("Submission not found".into()))?;
                return Err(ValidationError::InvalidState(current.status.to_string()).into());
            }
        };

        let mut template_slug = None;
        if action == ReviewAction::Approve {
            let pending = pending_from_submission(&previous, &reviewer.user_id, now);
            match self.stores.pending.upsert(&pending).await {
                Ok(replaced) => {
                    if replaced {
                        warn!(
                            slug = %pending.slug(),
                            submission_id,
                            "Pending template replaced an existing one with the same slug"
                        );
                    }
                    template_slug = Some(pending.slug().to_string());
                }
                Err(e) => {
                    if let Err(restore_err) = self.stores.submissions.restore(&previous).await {
                        error!(
                            submission_id,
                            error = %restore_err,
                            "Failed to restore submission after pending template write failed"
                        );
                    }
                    return Err(e);
                }
            }
        }

        info!(
            submission_id,
            reviewer_id = %reviewer.user_id,
            action = %action,
            "Review recorded"
        );

        if let Err(e) = self.stores.reviews.append(ReviewDoc::new(record)).await {
            warn!(submission_id, error = %e, "Failed to append review ledger entry");
        }

        match action {
            ReviewAction::Approve => {
                self.award(&reviewer.user_id, ReputationReason::ReviewApproved)
                    .await;
                self.award(&previous.submitter_id, ReputationReason::SubmissionApproved)
                    .await;
            }
            ReviewAction::Reject => {
                self.award(&reviewer.user_id, ReputationReason::ReviewRejected)
                    .await;
            }
            ReviewAction::RequestChanges => {
                self.award(&reviewer.user_id, ReputationReason::ChangesRequested)
                    .await;
            }
        }

        self.audit(
            AuditEvent::new(
                AuditEventType::ReviewRecorded,
                &reviewer.user_id,
                reviewer.role,
            )
            .with_subject(submission_id)
            .with_action(action.as_str()),
        )
        .await;

        let message = match action {
            ReviewAction::Approve => "Submission approved and queued for publication",
            ReviewAction::Reject => "Submission rejected",
            ReviewAction::RequestChanges => "Changes requested on submission",
        };

        Ok(ReviewOutcome {
            message: message.to_string(),
            status: action.resulting_status(),
            template_slug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::TemplateCategory;

    fn submission(title: &str, description: &str) -> SubmissionDoc {
        SubmissionDoc {
            _id: None,
            metadata: Metadata::new(),
            submission_id: "submission_1_abcdefghi".into(),
            submitter_id: "alice".into(),
            submitter_name: "Alice".into(),
            status: SubmissionStatus::Submitted,
            active_submitter_id: Some("alice".into()),
            submitted_at: DateTime::from_millis(1),
            last_reviewed_at: None,
            title: title.into(),
            description: description.into(),
            github_url: "https://github.com/acme/widget".into(),
            category: TemplateCategory::Payment,
            tech_stack: vec!["rust".into()],
            features: vec![],
            deployment: Default::default(),
            use_cases: vec![],
            review_notes: vec![],
            version: 1,
        }
    }

    #[test]
    fn test_pending_template_derivation() {
        let at = DateTime::from_millis(10);
        let long = "x".repeat(160);
        let pending = pending_from_submission(&submission("My Cool App!!", &long), "rev", at);

        assert_eq!(pending.slug(), "my-cool-app");
        assert_eq!(pending.template.name, "My Cool App!!");
        assert_eq!(pending.template.summary, format!("{}...", "x".repeat(150)));
        assert_eq!(pending.template.code_url, "https://github.com/acme/widget");
        assert_eq!(pending.template.demo_url, None);
        assert_eq!(pending.template.submitted_by.as_deref(), Some("alice"));
        assert_eq!(pending.status, PendingStatus::Pending);
        assert_eq!(pending.version, 1);
        assert_eq!(pending.approved_by, "rev");
        assert_eq!(pending.approved_at, at);
    }

    #[test]
    fn test_rating_bounds() {
        assert_eq!(rating(None), Ok(None));
        assert_eq!(rating(Some(5)), Ok(Some(5)));
        assert_eq!(rating(Some(0)), Err(ValidationError::InvalidRating));
        assert_eq!(rating(Some(6)), Err(ValidationError::InvalidRating));
    }
}
