//! Publication stage and catalog reads

use bson::DateTime;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{error, info, warn};

use super::views::{Listing, PendingTemplateView, PublishLogView, PublishedTemplateView};
use super::{required, Pipeline};
use crate::auth::{authorize, Capability, Identity};
use crate::db::schemas::{
    PendingStatus, PendingTemplateDoc, PublishAction, PublishLogDoc, TemplateCategory, UserDoc,
};
use crate::logging::{AuditEvent, AuditEventType};
use crate::store::{Page, ReputationReason};
use crate::types::{PipelineError, Result, ValidationError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    /// Pending template slug
    pub template_id: Option<String>,
    pub action: Option<String>,
    pub notes: Option<String>,
}

/// Admin decision on a pending template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationDecision {
    Publish,
    Reject,
}

impl FromStr for PublicationDecision {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "publish" => Ok(PublicationDecision::Publish),
            "reject" => Ok(PublicationDecision::Reject),
            other => Err(ValidationError::InvalidAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublicationOutcome {
    pub message: String,
    /// The catalog entry, when published
    pub template: Option<PublishedTemplateView>,
}

fn pending_not_found() -> PipelineError {
    PipelineError::NotFound("Pending template not found".into())
}

impl Pipeline {
    /// Publish a pending template into the catalog, or reject it in place
    pub async fn publish_or_reject(
        &self,
        identity: &Identity,
        request: &PublishRequest,
    ) -> Result<PublicationOutcome> {
        let admin = self.caller(identity).await?;
        authorize(admin.role, Capability::Publish)?;

        let [slug, action] = required([
            ("templateId", request.template_id.as_deref()),
            ("action", request.action.as_deref()),
        ])?;

        if self.stores.pending.find(slug).await?.is_none() {
            return Err(pending_not_found());
        }
        let decision: PublicationDecision = action.parse()?;
        let notes = request.notes.as_deref().unwrap_or_default().trim();

        match decision {
            PublicationDecision::Publish => self.publish(&admin, slug, notes).await,
            PublicationDecision::Reject => self.reject(&admin, slug, notes).await,
        }
    }

    async fn publish(&self, admin: &UserDoc, slug: &str, notes: &str) -> Result<PublicationOutcome> {
        // Claiming removes the record, so a concurrent or repeated publish
        // finds nothing
        let claimed = self
            .stores
            .pending
            .claim(slug)
            .await?
            .ok_or_else(pending_not_found)?;

        let now = DateTime::now();
        let published = claimed.clone().into_published(admin.user_id.clone(), now);

        if let Err(e) = self.stores.catalog.insert(published.clone()).await {
            match self.stores.pending.upsert(&claimed).await {
                Ok(true) => warn!(
                    slug,
                    "Restored pending template replaced one approved while publishing"
                ),
                Ok(false) => {}
                Err(restore_err) => error!(
                    slug,
                    error = %restore_err,
                    "Failed to restore pending template after catalog insert failed"
                ),
            }
            return Err(e);
        }

        info!(
            slug,
            admin_id = %admin.user_id,
            version = published.version,
            "Template published"
        );

        if let Some(submitter) = &claimed.template.submitted_by {
            self.award(submitter, ReputationReason::TemplatePublished)
                .await;
        }
        self.log_decision(admin, &claimed, PublishAction::Published, notes, now)
            .await;
        self.audit(
            AuditEvent::new(AuditEventType::TemplatePublished, &admin.user_id, admin.role)
                .with_subject(slug),
        )
        .await;

        Ok(PublicationOutcome {
            message: "Template published successfully".to_string(),
            template: Some(published.into()),
        })
    }

    async fn reject(&self, admin: &UserDoc, slug: &str, notes: &str) -> Result<PublicationOutcome> {
        let now = DateTime::now();
        let rejected = self
            .stores
            .pending
            .mark_rejected(slug, &admin.user_id, now, notes)
            .await?
            .ok_or_else(pending_not_found)?;

        info!(slug, admin_id = %admin.user_id, "Pending template rejected");

        self.log_decision(admin, &rejected, PublishAction::Rejected, notes, now)
            .await;
        self.audit(
            AuditEvent::new(AuditEventType::TemplateRejected, &admin.user_id, admin.role)
                .with_subject(slug),
        )
        .await;

        Ok(PublicationOutcome {
            message: "Template rejected".to_string(),
            template: None,
        })
    }

    async fn log_decision(
        &self,
        admin: &UserDoc,
        template: &PendingTemplateDoc,
        action: PublishAction,
        notes: &str,
        at: DateTime,
    ) {
        let entry = PublishLogDoc {
            _id: None,
            metadata: Default::default(),
            template_id: template.slug().to_string(),
            template_name: template.template.name.clone(),
            action,
            admin_id: admin.user_id.clone(),
            admin_name: admin.display_name().to_string(),
            notes: notes.to_string(),
            timestamp: at,
        };
        if let Err(e) = self.stores.publish_log.append(entry).await {
            warn!(slug = %template.slug(), action = %action, error = %e, "Failed to append publish log entry");
        }
    }

    /// Admin view of templates awaiting sign-off
    pub async fn list_pending(
        &self,
        identity: &Identity,
        status: Option<PendingStatus>,
        page: Page,
    ) -> Result<Listing<PendingTemplateView>> {
        let admin = self.caller(identity).await?;
        authorize(admin.role, Capability::Publish)?;

        let (templates, total) = self.stores.pending.list(status, page).await?;
        Ok(Listing::from_docs(
            templates,
            total,
            page,
            PendingTemplateView::from,
        ))
    }

    pub async fn list_publish_log(
        &self,
        identity: &Identity,
        page: Page,
    ) -> Result<Listing<PublishLogView>> {
        let admin = self.caller(identity).await?;
        authorize(admin.role, Capability::Publish)?;

        let (entries, total) = self.stores.publish_log.list(page).await?;
        Ok(Listing::from_docs(entries, total, page, PublishLogView::from))
    }

    /// Public catalog, newest first
    pub async fn list_published(
        &self,
        category: Option<TemplateCategory>,
        page: Page,
    ) -> Result<Listing<PublishedTemplateView>> {
        let (templates, total) = self.stores.catalog.list(category, page).await?;
        Ok(Listing::from_docs(
            templates,
            total,
            page,
            PublishedTemplateView::from,
        ))
    }

    pub async fn get_published(&self, slug: &str) -> Result<PublishedTemplateView> {
        self.stores
            .catalog
            .find(slug)
            .await?
            .map(PublishedTemplateView::from)
            .ok_or_else(|| PipelineError::NotFound("Template not found".into()))
    }
}
