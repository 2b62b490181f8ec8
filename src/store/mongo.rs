//! MongoDB-backed stores
//!
//! Uniqueness rules live in the collection indexes; duplicate-key failures
//! come back from [`MongoCollection`] as `Conflict` and are narrowed here
//! to the pipeline's specific conflict errors.

use async_trait::async_trait;
use bson::{doc, DateTime, Document};
use mongodb::options::ReturnDocument;

use super::{
    Page, PendingStore, ProfileUpdate, PublishLog, ReputationLedger, ReputationReason,
    ReviewLedger, SubmissionStore, TemplateCatalog, UserDirectory,
};
use crate::auth::Role;
use crate::db::schemas::{
    PendingStatus, PendingTemplateDoc, PublishAction, PublishLogDoc, PublishedTemplateDoc,
    ReviewAction, ReviewDoc, ReviewRecord, SubmissionDoc, SubmissionStatus, TemplateCategory,
    UserDoc, PENDING_TEMPLATE_COLLECTION, PUBLISH_LOG_COLLECTION, REVIEW_COLLECTION,
    SUBMISSION_COLLECTION, TEMPLATE_COLLECTION, USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{PipelineError, Result};

/// Every pipeline store as a MongoDB collection
pub struct MongoStore {
    users: MongoCollection<UserDoc>,
    submissions: MongoCollection<SubmissionDoc>,
    reviews: MongoCollection<ReviewDoc>,
    pending: MongoCollection<PendingTemplateDoc>,
    templates: MongoCollection<PublishedTemplateDoc>,
    publish_log: MongoCollection<PublishLogDoc>,
}

impl MongoStore {
    /// Open every collection, creating indexes
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
            submissions: client.collection(SUBMISSION_COLLECTION).await?,
            reviews: client.collection(REVIEW_COLLECTION).await?,
            pending: client.collection(PENDING_TEMPLATE_COLLECTION).await?,
            templates: client.collection(TEMPLATE_COLLECTION).await?,
            publish_log: client.collection(PUBLISH_LOG_COLLECTION).await?,
        })
    }
}

/// Narrow an index violation on `index` to `specific`
fn narrow_conflict(err: PipelineError, index: &str, specific: PipelineError) -> PipelineError {
    match err {
        PipelineError::Conflict(msg) if msg.contains(index) => specific,
        other => other,
    }
}

fn to_bson<T: serde::Serialize>(value: &T) -> Result<bson::Bson> {
    bson::to_bson(value).map_err(|e| PipelineError::Internal(format!("BSON encode failed: {}", e)))
}

#[async_trait]
impl UserDirectory for MongoStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "user_id": user_id }).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "email": email }).await
    }

    async fn insert(&self, user: UserDoc) -> Result<()> {
        self.users.insert_one(user).await
    }

    async fn touch(&self, user_id: &str, at: DateTime) -> Result<()> {
        self.users
            .update_one(
                doc! { "user_id": user_id },
                doc! { "$set": { "last_active": at, "metadata.updated_at": at } },
            )
            .await?;
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: Role) -> Result<bool> {
        let result = self
            .users
            .update_one(
                doc! { "user_id": user_id },
                doc! { "$set": { "role": role.as_str(), "metadata.updated_at": DateTime::now() } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserDoc>> {
        let mut set = Document::new();
        if let Some(v) = &update.name {
            set.insert("name", v.as_str());
        }
        if let Some(v) = &update.bio {
            set.insert("profile.bio", v.as_str());
        }
        if let Some(v) = &update.website {
            set.insert("profile.website", v.as_str());
        }
        if let Some(v) = &update.location {
            set.insert("profile.location", v.as_str());
        }
        if let Some(v) = &update.skills {
            set.insert("profile.skills", v.clone());
        }
        if let Some(v) = &update.github_username {
            set.insert("profile.github_username", v.as_str());
        }
        if let Some(v) = &update.avatar_url {
            set.insert("profile.avatar_url", v.as_str());
        }
        set.insert("metadata.updated_at", DateTime::now());

        self.users
            .find_one_and_update(
                doc! { "user_id": user_id },
                doc! { "$set": set },
                ReturnDocument::After,
            )
            .await
    }

    async fn list(&self, page: Page) -> Result<(Vec<UserDoc>, u64)> {
        let users = self
            .users
            .find_page(
                doc! {},
                doc! { "joined_date": -1 },
                page.offset,
                page.limit as i64,
            )
            .await?;
        let total = self.users.count(doc! {}).await?;
        Ok((users, total))
    }

    async fn count(&self) -> Result<u64> {
        self.users.count(doc! {}).await
    }
}

#[async_trait]
impl ReputationLedger for MongoStore {
    async fn adjust(&self, user_id: &str, delta: i64, _reason: ReputationReason) -> Result<()> {
        let result = self
            .users
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$inc": { "reputation_score": delta },
                    "$set": { "metadata.updated_at": DateTime::now() },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(PipelineError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }
}

fn status_values(statuses: &[SubmissionStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

#[async_trait]
impl SubmissionStore for MongoStore {
    async fn insert(&self, submission: SubmissionDoc) -> Result<()> {
        self.submissions.insert_one(submission).await.map_err(|e| {
            narrow_conflict(
                e,
                "active_submitter_unique",
                PipelineError::PendingSubmissionExists,
            )
        })
    }

    async fn find(&self, submission_id: &str) -> Result<Option<SubmissionDoc>> {
        self.submissions
            .find_one(doc! { "submission_id": submission_id })
            .await
    }

    async fn has_open(&self, submitter_id: &str) -> Result<bool> {
        let open = self
            .submissions
            .count(doc! { "active_submitter_id": submitter_id })
            .await?;
        Ok(open > 0)
    }

    async fn list(
        &self,
        submitter_id: Option<&str>,
        status: Option<SubmissionStatus>,
        page: Page,
    ) -> Result<(Vec<SubmissionDoc>, u64)> {
        let mut filter = Document::new();
        if let Some(id) = submitter_id {
            filter.insert("submitter_id", id);
        }
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let submissions = self
            .submissions
            .find_page(
                filter.clone(),
                doc! { "submitted_at": -1 },
                page.offset,
                page.limit as i64,
            )
            .await?;
        let total = self.submissions.count(filter).await?;
        Ok((submissions, total))
    }

    async fn apply_review(
        &self,
        submission_id: &str,
        review: &ReviewRecord,
    ) -> Result<Option<SubmissionDoc>> {
        let at = review.reviewed_at;
        self.submissions
            .find_one_and_update(
                doc! {
                    "submission_id": submission_id,
                    "status": { "$in": status_values(&SubmissionStatus::OPEN) },
                },
                doc! {
                    "$set": {
                        "status": review.action.resulting_status().as_str(),
                        "last_reviewed_at": at,
                        "metadata.updated_at": at,
                    },
                    "$unset": { "active_submitter_id": "" },
                    "$push": { "review_notes": to_bson(review)? },
                },
                ReturnDocument::Before,
            )
            .await
    }

    async fn restore(&self, submission: &SubmissionDoc) -> Result<()> {
        self.submissions
            .upsert(
                doc! { "submission_id": submission.submission_id.as_str() },
                submission,
            )
            .await
            .map_err(|e| {
                narrow_conflict(
                    e,
                    "active_submitter_unique",
                    PipelineError::PendingSubmissionExists,
                )
            })?;
        Ok(())
    }

    async fn count(&self, statuses: &[SubmissionStatus]) -> Result<u64> {
        let filter = if statuses.is_empty() {
            doc! {}
        } else {
            doc! { "status": { "$in": status_values(statuses) } }
        };
        self.submissions.count(filter).await
    }
}

#[async_trait]
impl ReviewLedger for MongoStore {
    async fn append(&self, review: ReviewDoc) -> Result<()> {
        self.reviews.insert_one(review).await
    }

    async fn count_since(&self, action: ReviewAction, since: DateTime) -> Result<u64> {
        self.reviews
            .count(doc! {
                "review.action": action.as_str(),
                "review.reviewed_at": { "$gte": since },
            })
            .await
    }
}

fn pending_filter(status: Option<PendingStatus>) -> Document {
    match status {
        Some(status) => doc! { "status": status.as_str() },
        None => doc! {},
    }
}

#[async_trait]
impl PendingStore for MongoStore {
    async fn upsert(&self, template: &PendingTemplateDoc) -> Result<bool> {
        let result = self
            .pending
            .upsert(doc! { "template.slug": template.slug() }, template)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn find(&self, slug: &str) -> Result<Option<PendingTemplateDoc>> {
        self.pending.find_one(doc! { "template.slug": slug }).await
    }

    async fn claim(&self, slug: &str) -> Result<Option<PendingTemplateDoc>> {
        self.pending
            .find_one_and_delete(doc! { "template.slug": slug })
            .await
    }

    async fn mark_rejected(
        &self,
        slug: &str,
        rejected_by: &str,
        at: DateTime,
        notes: &str,
    ) -> Result<Option<PendingTemplateDoc>> {
        self.pending
            .find_one_and_update(
                doc! { "template.slug": slug },
                doc! {
                    "$set": {
                        "status": PendingStatus::Rejected.as_str(),
                        "rejected_by": rejected_by,
                        "rejected_at": at,
                        "rejection_notes": notes,
                        "metadata.updated_at": at,
                    }
                },
                ReturnDocument::After,
            )
            .await
    }

    async fn list(
        &self,
        status: Option<PendingStatus>,
        page: Page,
    ) -> Result<(Vec<PendingTemplateDoc>, u64)> {
        let filter = pending_filter(status);
        let templates = self
            .pending
            .find_page(
                filter.clone(),
                doc! { "approved_at": -1 },
                page.offset,
                page.limit as i64,
            )
            .await?;
        let total = self.pending.count(filter).await?;
        Ok((templates, total))
    }

    async fn count(&self, status: Option<PendingStatus>) -> Result<u64> {
        self.pending.count(pending_filter(status)).await
    }
}

#[async_trait]
impl TemplateCatalog for MongoStore {
    async fn code_url_exists(&self, code_url: &str) -> Result<bool> {
        let existing = self
            .templates
            .count(doc! { "template.code_url": code_url })
            .await?;
        Ok(existing > 0)
    }

    async fn insert(&self, template: PublishedTemplateDoc) -> Result<()> {
        self.templates
            .insert_one(template)
            .await
            .map_err(|e| narrow_conflict(e, "code_url_unique", PipelineError::DuplicateTemplate))
    }

    async fn find(&self, slug: &str) -> Result<Option<PublishedTemplateDoc>> {
        let found = self
            .templates
            .find_page(
                doc! { "template.slug": slug },
                doc! { "published_at": -1 },
                0,
                1,
            )
            .await?;
        Ok(found.into_iter().next())
    }

    async fn list(
        &self,
        category: Option<TemplateCategory>,
        page: Page,
    ) -> Result<(Vec<PublishedTemplateDoc>, u64)> {
        let filter = match category {
            Some(category) => doc! { "template.category": category.as_str() },
            None => doc! {},
        };
        let templates = self
            .templates
            .find_page(
                filter.clone(),
                doc! { "published_at": -1 },
                page.offset,
                page.limit as i64,
            )
            .await?;
        let total = self.templates.count(filter).await?;
        Ok((templates, total))
    }

    async fn count(&self) -> Result<u64> {
        self.templates.count(doc! {}).await
    }
}

#[async_trait]
impl PublishLog for MongoStore {
    async fn append(&self, entry: PublishLogDoc) -> Result<()> {
        self.publish_log.insert_one(entry).await
    }

    async fn list(&self, page: Page) -> Result<(Vec<PublishLogDoc>, u64)> {
        let entries = self
            .publish_log
            .find_page(
                doc! {},
                doc! { "timestamp": -1 },
                page.offset,
                page.limit as i64,
            )
            .await?;
        let total = self.publish_log.count(doc! {}).await?;
        Ok((entries, total))
    }

    async fn count_since(&self, action: PublishAction, since: DateTime) -> Result<u64> {
        self.publish_log
            .count(doc! {
                "action": action.as_str(),
                "timestamp": { "$gte": since },
            })
            .await
    }
}
