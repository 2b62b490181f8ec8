//! In-memory stores
//!
//! Backs dev mode and the test suite. Uniqueness rules match the MongoDB
//! indexes and are checked under the same write lock as the insert.

use async_trait::async_trait;
use bson::DateTime;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    Page, PendingStore, ProfileUpdate, PublishLog, ReputationLedger, ReputationReason,
    ReviewLedger, SubmissionStore, TemplateCatalog, UserDirectory,
};
use crate::auth::Role;
use crate::db::schemas::{
    PendingStatus, PendingTemplateDoc, PublishAction, PublishLogDoc, PublishedTemplateDoc,
    ReviewAction, ReviewDoc, ReviewRecord, SubmissionDoc, SubmissionStatus, TemplateCategory,
    UserDoc,
};
use crate::types::{PipelineError, Result};

/// Every pipeline store in process memory
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, UserDoc>,
    /// Insertion order
    submissions: RwLock<Vec<SubmissionDoc>>,
    reviews: RwLock<Vec<ReviewDoc>>,
    pending: RwLock<HashMap<String, PendingTemplateDoc>>,
    catalog: RwLock<Vec<PublishedTemplateDoc>>,
    publish_log: RwLock<Vec<PublishLogDoc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sort newest first by `key`, keeping later inserts ahead on ties
fn newest_first<T, F>(items: impl DoubleEndedIterator<Item = T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime,
{
    let mut items: Vec<T> = items.rev().collect();
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn insert(&self, user: UserDoc) -> Result<()> {
        match self.users.entry(user.user_id.clone()) {
            Entry::Occupied(_) => Err(PipelineError::Conflict(format!(
                "User {} already exists",
                user.user_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(())
            }
        }
    }

    async fn touch(&self, user_id: &str, at: DateTime) -> Result<()> {
        if let Some(mut user) = self.users.get_mut(user_id) {
            user.last_active = Some(at);
            user.metadata.touch(at);
        }
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: Role) -> Result<bool> {
        match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.role = role;
                user.metadata.touch(DateTime::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserDoc>> {
        Ok(self.users.get_mut(user_id).map(|mut user| {
            update.apply(&mut user);
            user.metadata.touch(DateTime::now());
            user.clone()
        }))
    }

    async fn list(&self, page: Page) -> Result<(Vec<UserDoc>, u64)> {
        let all: Vec<UserDoc> = self.users.iter().map(|u| u.clone()).collect();
        let total = all.len() as u64;
        let sorted = newest_first(all.into_iter(), |u| u.joined_date);
        Ok((page.slice(sorted), total))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.users.len() as u64)
    }
}

#[async_trait]
impl ReputationLedger for MemoryStore {
    async fn adjust(&self, user_id: &str, delta: i64, _reason: ReputationReason) -> Result<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| PipelineError::NotFound(format!("User {} not found", user_id)))?;
        user.reputation_score += delta;
        user.metadata.touch(DateTime::now());
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, submission: SubmissionDoc) -> Result<()> {
        let mut submissions = self.submissions.write().await;

        if submissions
            .iter()
            .any(|s| s.submission_id == submission.submission_id)
        {
            return Err(PipelineError::Conflict(format!(
                "Submission {} already exists",
                submission.submission_id
            )));
        }
        if let Some(active) = &submission.active_submitter_id {
            if submissions
                .iter()
                .any(|s| s.active_submitter_id.as_ref() == Some(active))
            {
                return Err(PipelineError::PendingSubmissionExists);
            }
        }

        submissions.push(submission);
        Ok(())
    }

    async fn find(&self, submission_id: &str) -> Result<Option<SubmissionDoc>> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .find(|s| s.submission_id == submission_id)
            .cloned())
    }

    async fn has_open(&self, submitter_id: &str) -> Result<bool> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .any(|s| s.submitter_id == submitter_id && s.status.is_open()))
    }

    async fn list(
        &self,
        submitter_id: Option<&str>,
        status: Option<SubmissionStatus>,
        page: Page,
    ) -> Result<(Vec<SubmissionDoc>, u64)> {
        let submissions = self.submissions.read().await;
        let matching = submissions
            .iter()
            .filter(|s| submitter_id.map_or(true, |id| s.submitter_id == id))
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned();
        let sorted = newest_first(matching, |s| s.submitted_at);
        let total = sorted.len() as u64;
        Ok((page.slice(sorted), total))
    }

    async fn apply_review(
        &self,
        submission_id: &str,
        review: &ReviewRecord,
    ) -> Result<Option<SubmissionDoc>> {
        let mut submissions = self.submissions.write().await;
        let Some(submission) = submissions
            .iter_mut()
            .find(|s| s.submission_id == submission_id && s.status.is_open())
        else {
            return Ok(None);
        };

        let previous = submission.clone();
        submission.apply_review(review.clone());
        Ok(Some(previous))
    }

    async fn restore(&self, submission: &SubmissionDoc) -> Result<()> {
        let mut submissions = self.submissions.write().await;

        if let Some(active) = &submission.active_submitter_id {
            if submissions.iter().any(|s| {
                s.submission_id != submission.submission_id
                    && s.active_submitter_id.as_ref() == Some(active)
            }) {
                return Err(PipelineError::PendingSubmissionExists);
            }
        }

        match submissions
            .iter_mut()
            .find(|s| s.submission_id == submission.submission_id)
        {
            Some(existing) => *existing = submission.clone(),
            None => submissions.push(submission.clone()),
        }
        Ok(())
    }

    async fn count(&self, statuses: &[SubmissionStatus]) -> Result<u64> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .filter(|s| statuses.is_empty() || statuses.contains(&s.status))
            .count() as u64)
    }
}

#[async_trait]
impl ReviewLedger for MemoryStore {
    async fn append(&self, review: ReviewDoc) -> Result<()> {
        let mut reviews = self.reviews.write().await;
        if reviews
            .iter()
            .any(|r| r.review.review_id == review.review.review_id)
        {
            return Err(PipelineError::Conflict(format!(
                "Review {} already recorded",
                review.review.review_id
            )));
        }
        reviews.push(review);
        Ok(())
    }

    async fn count_since(&self, action: ReviewAction, since: DateTime) -> Result<u64> {
        Ok(self
            .reviews
            .read()
            .await
            .iter()
            .filter(|r| r.review.action == action && r.review.reviewed_at >= since)
            .count() as u64)
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn upsert(&self, template: &PendingTemplateDoc) -> Result<bool> {
        Ok(self
            .pending
            .write()
            .await
            .insert(template.slug().to_string(), template.clone())
            .is_some())
    }

    async fn find(&self, slug: &str) -> Result<Option<PendingTemplateDoc>> {
        Ok(self.pending.read().await.get(slug).cloned())
    }

    async fn claim(&self, slug: &str) -> Result<Option<PendingTemplateDoc>> {
        Ok(self.pending.write().await.remove(slug))
    }

    async fn mark_rejected(
        &self,
        slug: &str,
        rejected_by: &str,
        at: DateTime,
        notes: &str,
    ) -> Result<Option<PendingTemplateDoc>> {
        Ok(self.pending.write().await.get_mut(slug).map(|template| {
            template.status = PendingStatus::Rejected;
            template.rejected_by = Some(rejected_by.to_string());
            template.rejected_at = Some(at);
            template.rejection_notes = Some(notes.to_string());
            template.metadata.touch(at);
            template.clone()
        }))
    }

    async fn list(
        &self,
        status: Option<PendingStatus>,
        page: Page,
    ) -> Result<(Vec<PendingTemplateDoc>, u64)> {
        let pending = self.pending.read().await;
        let matching: Vec<PendingTemplateDoc> = pending
            .values()
            .filter(|t| status.map_or(true, |st| t.status == st))
            .cloned()
            .collect();
        let sorted = newest_first(matching.into_iter(), |t| t.approved_at);
        let total = sorted.len() as u64;
        Ok((page.slice(sorted), total))
    }

    async fn count(&self, status: Option<PendingStatus>) -> Result<u64> {
        Ok(self
            .pending
            .read()
            .await
            .values()
            .filter(|t| status.map_or(true, |st| t.status == st))
            .count() as u64)
    }
}

#[async_trait]
impl TemplateCatalog for MemoryStore {
    async fn code_url_exists(&self, code_url: &str) -> Result<bool> {
        Ok(self
            .catalog
            .read()
            .await
            .iter()
            .any(|t| t.template.code_url == code_url))
    }

    async fn insert(&self, template: PublishedTemplateDoc) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        if catalog
            .iter()
            .any(|t| t.template.code_url == template.template.code_url)
        {
            return Err(PipelineError::DuplicateTemplate);
        }
        catalog.push(template);
        Ok(())
    }

    async fn find(&self, slug: &str) -> Result<Option<PublishedTemplateDoc>> {
        let catalog = self.catalog.read().await;
        let matching = catalog.iter().filter(|t| t.template.slug == slug).cloned();
        Ok(newest_first(matching, |t| t.published_at).into_iter().next())
    }

    async fn list(
        &self,
        category: Option<TemplateCategory>,
        page: Page,
    ) -> Result<(Vec<PublishedTemplateDoc>, u64)> {
        let catalog = self.catalog.read().await;
        let matching = catalog
            .iter()
            .filter(|t| category.map_or(true, |c| t.template.category == c))
            .cloned();
        let sorted = newest_first(matching, |t| t.published_at);
        let total = sorted.len() as u64;
        Ok((page.slice(sorted), total))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.catalog.read().await.len() as u64)
    }
}

#[async_trait]
impl PublishLog for MemoryStore {
    async fn append(&self, entry: PublishLogDoc) -> Result<()> {
        self.publish_log.write().await.push(entry);
        Ok(())
    }

    async fn list(&self, page: Page) -> Result<(Vec<PublishLogDoc>, u64)> {
        let log = self.publish_log.read().await;
        let sorted = newest_first(log.iter().cloned(), |e| e.timestamp);
        let total = sorted.len() as u64;
        Ok((page.slice(sorted), total))
    }

    async fn count_since(&self, action: PublishAction, since: DateTime) -> Result<u64> {
        Ok(self
            .publish_log
            .read()
            .await
            .iter()
            .filter(|e| e.action == action && e.timestamp >= since)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Metadata;

    fn submission(id: &str, submitter: &str, at: i64) -> SubmissionDoc {
        SubmissionDoc {
            _id: None,
            metadata: Metadata::stamped(DateTime::from_millis(at)),
            submission_id: id.into(),
            submitter_id: submitter.into(),
            submitter_name: submitter.into(),
            status: SubmissionStatus::Submitted,
            active_submitter_id: Some(submitter.into()),
            submitted_at: DateTime::from_millis(at),
            last_reviewed_at: None,
            title: "Widget".into(),
            description: "A widget template".into(),
            github_url: format!("https://github.com/acme/{}", id),
            category: TemplateCategory::Auth,
            tech_stack: vec![],
            features: vec![],
            deployment: Default::default(),
            use_cases: vec![],
            review_notes: vec![],
            version: 1,
        }
    }

    fn review(submission_id: &str, action: ReviewAction) -> ReviewRecord {
        ReviewRecord {
            review_id: format!("review_{}", submission_id),
            submission_id: submission_id.into(),
            reviewer_id: "rev".into(),
            reviewer_name: "Rev".into(),
            action,
            rating: None,
            notes: String::new(),
            reviewed_at: DateTime::from_millis(5_000),
        }
    }

    #[tokio::test]
    async fn test_one_open_submission_per_submitter() {
        let store = MemoryStore::new();
        let submissions: &dyn SubmissionStore = &store;

        submissions.insert(submission("s1", "alice", 1)).await.unwrap();
        let err = submissions
            .insert(submission("s2", "alice", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PendingSubmissionExists));

        // Other submitters are unaffected
        submissions.insert(submission("s3", "bob", 3)).await.unwrap();
        assert_eq!(submissions.count(&[]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_review_is_compare_and_set() {
        let store = MemoryStore::new();
        let submissions: &dyn SubmissionStore = &store;
        submissions.insert(submission("s1", "alice", 1)).await.unwrap();

        let previous = submissions
            .apply_review("s1", &review("s1", ReviewAction::Reject))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previous.status, SubmissionStatus::Submitted);

        // Second decision loses
        assert!(submissions
            .apply_review("s1", &review("s1", ReviewAction::Approve))
            .await
            .unwrap()
            .is_none());

        let stored = submissions.find("s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Rejected);
        assert_eq!(stored.review_notes.len(), 1);
        assert!(stored.active_submitter_id.is_none());
        assert!(!submissions.has_open("alice").await.unwrap());

        // Closing the submission frees the submitter
        submissions.insert(submission("s2", "alice", 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_undoes_review() {
        let store = MemoryStore::new();
        let submissions: &dyn SubmissionStore = &store;
        submissions.insert(submission("s1", "alice", 1)).await.unwrap();

        let previous = submissions
            .apply_review("s1", &review("s1", ReviewAction::Approve))
            .await
            .unwrap()
            .unwrap();
        submissions.restore(&previous).await.unwrap();

        let stored = submissions.find("s1").await.unwrap().unwrap();
        assert_eq!(stored, previous);
        assert!(submissions.has_open("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        let submissions: &dyn SubmissionStore = &store;
        submissions.insert(submission("old", "a", 1)).await.unwrap();
        submissions.insert(submission("new", "b", 9)).await.unwrap();
        submissions.insert(submission("mid", "c", 5)).await.unwrap();

        let (page, total) = submissions
            .list(None, None, Page::new(Some(2), None))
            .await
            .unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = page.iter().map(|s| s.submission_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);

        let (mine, total) = submissions
            .list(Some("a"), None, Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].submission_id, "old");
    }

    #[tokio::test]
    async fn test_user_insert_is_unique() {
        let store = MemoryStore::new();
        let users: &dyn UserDirectory = &store;
        let user = UserDoc::new("u1".into(), "a@b.c".into(), "A".into(), DateTime::now());
        users.insert(user.clone()).await.unwrap();
        assert!(users.insert(user).await.unwrap_err().is_conflict());

        let found = users.resolve("other-id", Some("a@b.c")).await.unwrap();
        assert_eq!(found.user_id, "u1");
        assert!(matches!(
            users.resolve("missing", None).await.unwrap_err(),
            PipelineError::UserNotFound { .. }
        ));
    }
}
