//! Storage capabilities used by the pipeline
//!
//! Each store is a trait with a MongoDB implementation ([`mongo`]) and an
//! in-memory implementation ([`memory`]) that enforces the same uniqueness
//! rules. The pipeline only ever sees `Arc<dyn ...>`.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::DateTime;
use std::fmt;
use std::sync::Arc;

use crate::auth::Role;
use crate::db::schemas::{
    PendingStatus, PendingTemplateDoc, PublishAction, PublishLogDoc, PublishedTemplateDoc,
    ReviewAction, ReviewDoc, ReviewRecord, SubmissionDoc, SubmissionStatus, TemplateCategory,
    UserDoc, UserProfile,
};
use crate::types::{PipelineError, Result};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Default page size
pub const DEFAULT_LIMIT: u64 = 20;
/// Largest page a caller may request
pub const MAX_LIMIT: u64 = 100;

/// Limit/offset pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    /// Build a page, clamping the limit into `1..=MAX_LIMIT`
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Apply this window to an already sorted list
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pipeline milestone that earns reputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationReason {
    SubmissionCreated,
    /// Reviewer approved a submission
    ReviewApproved,
    /// Submitter's submission was approved
    SubmissionApproved,
    ReviewRejected,
    ChangesRequested,
    TemplatePublished,
}

impl ReputationReason {
    pub fn delta(&self) -> i64 {
        match self {
            ReputationReason::SubmissionCreated => 5,
            ReputationReason::ReviewApproved => 10,
            ReputationReason::SubmissionApproved => 25,
            ReputationReason::ReviewRejected => 5,
            ReputationReason::ChangesRequested => 5,
            ReputationReason::TemplatePublished => 50,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationReason::SubmissionCreated => "submission_created",
            ReputationReason::ReviewApproved => "review_approved",
            ReputationReason::SubmissionApproved => "submission_approved",
            ReputationReason::ReviewRejected => "review_rejected",
            ReputationReason::ChangesRequested => "changes_requested",
            ReputationReason::TemplatePublished => "template_published",
        }
    }
}

impl fmt::Display for ReputationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-editable profile changes. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Vec<String>>,
    pub github_username: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    /// Apply the changes to a user record
    pub fn apply(&self, user: &mut UserDoc) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        let profile: &mut UserProfile = &mut user.profile;
        if let Some(v) = &self.bio {
            profile.bio = Some(v.clone());
        }
        if let Some(v) = &self.website {
            profile.website = Some(v.clone());
        }
        if let Some(v) = &self.location {
            profile.location = Some(v.clone());
        }
        if let Some(v) = &self.skills {
            profile.skills = v.clone();
        }
        if let Some(v) = &self.github_username {
            profile.github_username = Some(v.clone());
        }
        if let Some(v) = &self.avatar_url {
            profile.avatar_url = Some(v.clone());
        }
    }
}

/// Users, roles and profiles
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserDoc>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>>;

    /// Insert a new user; `Conflict` if the id is taken
    async fn insert(&self, user: UserDoc) -> Result<()>;

    async fn touch(&self, user_id: &str, at: DateTime) -> Result<()>;

    /// Returns false if no such user exists
    async fn set_role(&self, user_id: &str, role: Role) -> Result<bool>;

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate)
        -> Result<Option<UserDoc>>;

    /// Newest `joined_date` first
    async fn list(&self, page: Page) -> Result<(Vec<UserDoc>, u64)>;

    async fn count(&self) -> Result<u64>;

    /// Look a caller up by stable id, falling back to email
    async fn resolve(&self, user_id: &str, email: Option<&str>) -> Result<UserDoc> {
        if let Some(user) = self.find_by_id(user_id).await? {
            return Ok(user);
        }
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            if let Some(user) = self.find_by_email(email).await? {
                return Ok(user);
            }
        }
        Err(PipelineError::UserNotFound {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
        })
    }
}

/// The only writer of `reputation_score`
#[async_trait]
pub trait ReputationLedger: Send + Sync {
    async fn adjust(&self, user_id: &str, delta: i64, reason: ReputationReason) -> Result<()>;
}

/// Submissions in flight
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert; `PendingSubmissionExists` if the submitter already has an
    /// open submission
    async fn insert(&self, submission: SubmissionDoc) -> Result<()>;

    async fn find(&self, submission_id: &str) -> Result<Option<SubmissionDoc>>;

    async fn has_open(&self, submitter_id: &str) -> Result<bool>;

    /// Newest `submitted_at` first
    async fn list(
        &self,
        submitter_id: Option<&str>,
        status: Option<SubmissionStatus>,
        page: Page,
    ) -> Result<(Vec<SubmissionDoc>, u64)>;

    /// Atomically apply a review to a still-open submission. Returns the
    /// submission as it was before the write, or `None` if it is missing
    /// or no longer open.
    async fn apply_review(
        &self,
        submission_id: &str,
        review: &ReviewRecord,
    ) -> Result<Option<SubmissionDoc>>;

    /// Put a submission back exactly as given (compensation)
    async fn restore(&self, submission: &SubmissionDoc) -> Result<()>;

    async fn count(&self, statuses: &[SubmissionStatus]) -> Result<u64>;
}

/// Append-only review decisions
#[async_trait]
pub trait ReviewLedger: Send + Sync {
    async fn append(&self, review: ReviewDoc) -> Result<()>;

    async fn count_since(&self, action: ReviewAction, since: DateTime) -> Result<u64>;
}

/// Templates awaiting admin sign-off, keyed by slug
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Insert or replace by slug. Returns true if a record was replaced.
    async fn upsert(&self, template: &PendingTemplateDoc) -> Result<bool>;

    async fn find(&self, slug: &str) -> Result<Option<PendingTemplateDoc>>;

    /// Atomically remove and return the record
    async fn claim(&self, slug: &str) -> Result<Option<PendingTemplateDoc>>;

    /// Mark rejected in place, returning the updated record
    async fn mark_rejected(
        &self,
        slug: &str,
        rejected_by: &str,
        at: DateTime,
        notes: &str,
    ) -> Result<Option<PendingTemplateDoc>>;

    /// Newest `approved_at` first
    async fn list(
        &self,
        status: Option<PendingStatus>,
        page: Page,
    ) -> Result<(Vec<PendingTemplateDoc>, u64)>;

    async fn count(&self, status: Option<PendingStatus>) -> Result<u64>;
}

/// Published templates
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn code_url_exists(&self, code_url: &str) -> Result<bool>;

    /// Insert; `DuplicateTemplate` if the code URL is already published
    async fn insert(&self, template: PublishedTemplateDoc) -> Result<()>;

    /// Most recently published template with this slug
    async fn find(&self, slug: &str) -> Result<Option<PublishedTemplateDoc>>;

    /// Newest `published_at` first
    async fn list(
        &self,
        category: Option<TemplateCategory>,
        page: Page,
    ) -> Result<(Vec<PublishedTemplateDoc>, u64)>;

    async fn count(&self) -> Result<u64>;
}

/// Append-only admin publication decisions
#[async_trait]
pub trait PublishLog: Send + Sync {
    async fn append(&self, entry: PublishLogDoc) -> Result<()>;

    /// Newest first
    async fn list(&self, page: Page) -> Result<(Vec<PublishLogDoc>, u64)>;

    async fn count_since(&self, action: PublishAction, since: DateTime) -> Result<u64>;
}

/// Every store the pipeline needs
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserDirectory>,
    pub reputation: Arc<dyn ReputationLedger>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub reviews: Arc<dyn ReviewLedger>,
    pub pending: Arc<dyn PendingStore>,
    pub catalog: Arc<dyn TemplateCatalog>,
    pub publish_log: Arc<dyn PublishLog>,
    /// Backend name reported by the health endpoint
    pub backend: &'static str,
}

impl Stores {
    /// All stores backed by one in-memory instance
    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            reputation: store.clone(),
            submissions: store.clone(),
            reviews: store.clone(),
            pending: store.clone(),
            catalog: store.clone(),
            publish_log: store,
            backend: "memory",
        }
    }

    /// All stores backed by MongoDB collections
    pub async fn mongo(client: &crate::db::MongoClient) -> Result<Self> {
        let store = Arc::new(MongoStore::open(client).await?);
        Ok(Self {
            users: store.clone(),
            reputation: store.clone(),
            submissions: store.clone(),
            reviews: store.clone(),
            pending: store.clone(),
            catalog: store.clone(),
            publish_log: store,
            backend: "mongodb",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(None, None), Page { limit: 20, offset: 0 });
        assert_eq!(Page::new(Some(0), Some(5)).limit, 1);
        assert_eq!(Page::new(Some(1000), None).limit, MAX_LIMIT);
    }

    #[test]
    fn test_page_slice() {
        let page = Page::new(Some(2), Some(1));
        assert_eq!(page.slice(vec![1, 2, 3, 4]), vec![2, 3]);
        assert!(Page::new(Some(5), Some(10)).slice(vec![1, 2]).is_empty());
    }

    #[test]
    fn test_reputation_rules() {
        assert_eq!(ReputationReason::SubmissionCreated.delta(), 5);
        assert_eq!(ReputationReason::ReviewApproved.delta(), 10);
        assert_eq!(ReputationReason::SubmissionApproved.delta(), 25);
        assert_eq!(ReputationReason::ReviewRejected.delta(), 5);
        assert_eq!(ReputationReason::ChangesRequested.delta(), 5);
        assert_eq!(ReputationReason::TemplatePublished.delta(), 50);
    }

    #[test]
    fn test_profile_update_leaves_unset_fields() {
        let mut user = UserDoc::new("u1".into(), "a@b.c".into(), "Ann".into(), DateTime::now());
        user.profile.bio = Some("old".into());
        ProfileUpdate {
            location: Some("Oslo".into()),
            ..Default::default()
        }
        .apply(&mut user);
        assert_eq!(user.profile.bio.as_deref(), Some("old"));
        assert_eq!(user.profile.location.as_deref(), Some("Oslo"));
        assert_eq!(user.name, "Ann");
    }
}
