//! Submission intake

use bson::DateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::validation::{
    canonical_github_url, check_length, new_submission_id, slugify, string_list, DESCRIPTION_LEN,
    MAX_FEATURES, MAX_ITEM_LEN, MAX_TECH_LEN, MAX_TECH_STACK, MAX_USE_CASES, TITLE_LEN,
};
use super::views::{Listing, SubmissionView};
use super::{required, Pipeline};
use crate::auth::{Capability, Identity};
use crate::db::schemas::{Metadata, SubmissionDoc, SubmissionStatus, TemplateCategory};
use crate::logging::{AuditEvent, AuditEventType};
use crate::store::{Page, ReputationReason};
use crate::types::{PipelineError, Result, ValidationError};

/// Submit payload as sent by clients
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub github_url: Option<String>,
    pub category: Option<String>,
    pub tech_stack: Option<Value>,
    pub features: Option<Value>,
    pub deployment: Option<Value>,
    pub use_cases: Option<Value>,
}

/// Submit payload after every input rule has passed
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub title: String,
    pub description: String,
    pub github_url: String,
    pub category: TemplateCategory,
    pub tech_stack: Vec<String>,
    pub features: Vec<String>,
    pub deployment: serde_json::Map<String, Value>,
    pub use_cases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub submission_id: String,
}

impl SubmitRequest {
    /// Apply the input rules in order; the first violation wins
    pub fn validate(&self) -> std::result::Result<ValidatedSubmission, ValidationError> {
        let [title, description, github_url, category] = required([
            ("title", self.title.as_deref()),
            ("description", self.description.as_deref()),
            ("githubUrl", self.github_url.as_deref()),
            ("category", self.category.as_deref()),
        ])?;

        let github_url = canonical_github_url(github_url)?;
        check_length("title", title, TITLE_LEN)?;
        if slugify(title).is_empty() {
            return Err(ValidationError::InvalidTitle);
        }
        check_length("description", description, DESCRIPTION_LEN)?;
        let category: TemplateCategory = category.parse()?;

        let tech_stack = string_list(
            "techStack",
            self.tech_stack.as_ref(),
            MAX_TECH_STACK,
            MAX_TECH_LEN,
        )?;
        let features = string_list(
            "features",
            self.features.as_ref(),
            MAX_FEATURES,
            MAX_ITEM_LEN,
        )?;
        let use_cases = string_list(
            "useCases",
            self.use_cases.as_ref(),
            MAX_USE_CASES,
            MAX_ITEM_LEN,
        )?;
        let deployment = match &self.deployment {
            Some(Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };

        Ok(ValidatedSubmission {
            title: title.to_string(),
            description: description.to_string(),
            github_url,
            category,
            tech_stack,
            features,
            deployment,
            use_cases,
        })
    }
}

impl Pipeline {
    /// Accept a new template submission
    pub async fn submit(&self, identity: &Identity, request: &SubmitRequest) -> Result<SubmitOutcome> {
        let caller = self.caller(identity).await?;
        let input = request.validate()?;

        if self
            .stores
            .catalog
            .code_url_exists(&input.github_url)
            .await?
        {
            return Err(PipelineError::DuplicateTemplate);
        }
        if self.stores.submissions.has_open(&caller.user_id).await? {
            return Err(PipelineError::PendingSubmissionExists);
        }

        let now = DateTime::now();
        let submission = SubmissionDoc {
            _id: None,
            metadata: Metadata::stamped(now),
            submission_id: new_submission_id(),
            submitter_id: caller.user_id.clone(),
            submitter_name: caller.display_name().to_string(),
            status: SubmissionStatus::Submitted,
            active_submitter_id: Some(caller.user_id.clone()),
            submitted_at: now,
            last_reviewed_at: None,
            title: input.title,
            description: input.description,
            github_url: input.github_url,
            category: input.category,
            tech_stack: input.tech_stack,
            features: input.features,
            deployment: input.deployment,
            use_cases: input.use_cases,
            review_notes: Vec::new(),
            version: 1,
        };
        let submission_id = submission.submission_id.clone();
        let github_url = submission.github_url.clone();

        // The unique index on active_submitter_id catches a racing submit
        self.stores.submissions.insert(submission).await?;

        info!(
            submission_id = %submission_id,
            submitter_id = %caller.user_id,
            github_url = %github_url,
            "Submission created"
        );

        self.award(&caller.user_id, ReputationReason::SubmissionCreated)
            .await;
        self.audit(
            AuditEvent::new(
                AuditEventType::SubmissionCreated,
                &caller.user_id,
                caller.role,
            )
            .with_subject(&submission_id)
            .with_metadata(serde_json::json!({ "githubUrl": github_url })),
        )
        .await;

        Ok(SubmitOutcome { submission_id })
    }

    /// Admins see every submission; everyone else sees their own
    pub async fn list_submissions(
        &self,
        identity: &Identity,
        status: Option<SubmissionStatus>,
        page: Page,
    ) -> Result<Listing<SubmissionView>> {
        let caller = self.caller(identity).await?;
        let submitter = if caller.role.can(Capability::ViewAllSubmissions) {
            None
        } else {
            Some(caller.user_id.as_str())
        };

        let (submissions, total) = self
            .stores
            .submissions
            .list(submitter, status, page)
            .await?;
        Ok(Listing::from_docs(
            submissions,
            total,
            page,
            SubmissionView::from,
        ))
    }

    /// One submission with its review notes, for its submitter or a reviewer
    pub async fn get_submission(
        &self,
        identity: &Identity,
        submission_id: &str,
    ) -> Result<SubmissionView> {
        let caller = self.caller(identity).await?;
        let submission = self
            .stores
            .submissions
            .find(submission_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound("Submission not found".into()))?;

        if submission.submitter_id != caller.user_id && !caller.role.can(Capability::Review) {
            return Err(PipelineError::Forbidden(
                "Not allowed to view this submission".into(),
            ));
        }

        Ok(submission.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> SubmitRequest {
        serde_json::from_value(value).unwrap()
    }

    fn valid() -> Value {
        json!({
            "title": "Widget Starter",
            "description": "A starter template for widgets",
            "githubUrl": "https://github.com/acme/widget/tree/main",
            "category": "auth",
            "techStack": ["rust", 7],
            "deployment": { "provider": "fly" },
        })
    }

    #[test]
    fn test_valid_submission_is_canonicalized() {
        let input = request(valid()).validate().unwrap();
        assert_eq!(input.github_url, "https://github.com/acme/widget");
        assert_eq!(input.category, TemplateCategory::Auth);
        assert_eq!(input.tech_stack, vec!["rust"]);
        assert_eq!(input.deployment["provider"], "fly");
        assert!(input.use_cases.is_empty());
    }

    #[test]
    fn test_missing_fields_first() {
        let mut body = valid();
        body["title"] = Value::Null;
        body["githubUrl"] = json!("https://gitlab.com/x/y");
        assert_eq!(
            request(body).validate().unwrap_err(),
            ValidationError::MissingFields("title".into())
        );
    }

    #[test]
    fn test_url_checked_before_lengths() {
        let mut body = valid();
        body["title"] = json!("ab");
        body["githubUrl"] = json!("https://gitlab.com/acme/widget");
        assert_eq!(
            request(body).validate().unwrap_err(),
            ValidationError::NotGithub
        );
    }

    #[test]
    fn test_short_title_rejected() {
        let mut body = valid();
        body["title"] = json!("ab");
        assert!(matches!(
            request(body).validate().unwrap_err(),
            ValidationError::InvalidLength { field: "title", .. }
        ));
    }

    #[test]
    fn test_title_without_slug_rejected() {
        for title in ["Приложение", "!!!", "* * *"] {
            let mut body = valid();
            body["title"] = json!(title);
            assert_eq!(
                request(body).validate().unwrap_err(),
                ValidationError::InvalidTitle
            );
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut body = valid();
        body["category"] = json!("crypto");
        assert_eq!(
            request(body).validate().unwrap_err(),
            ValidationError::InvalidCategory("crypto".into())
        );
    }

    #[test]
    fn test_oversize_arrays_rejected() {
        let mut body = valid();
        body["features"] = json!(vec!["f"; 21]);
        assert!(matches!(
            request(body).validate().unwrap_err(),
            ValidationError::TooManyItems { field: "features", max: 20 }
        ));
    }
}
