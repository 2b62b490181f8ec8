//! Dashboard aggregation
//!
//! Every counter is a fresh store query.

use bson::DateTime;

use super::views::{ActivityItem, DashboardStats};
use super::Pipeline;
use crate::auth::{Capability, Identity};
use crate::db::schemas::{PendingStatus, PublishAction, ReviewAction, SubmissionStatus};
use crate::store::Page;
use crate::types::Result;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
const RECENT_ACTIVITY: u64 = 10;

impl Pipeline {
    /// Counts for the dashboard; non-admins only get `total_templates`
    pub async fn dashboard(&self, identity: &Identity) -> Result<DashboardStats> {
        let caller = self.caller(identity).await?;
        let total_templates = self.stores.catalog.count().await?;

        if !caller.role.can(Capability::ViewAllSubmissions) {
            return Ok(DashboardStats {
                total_templates,
                ..Default::default()
            });
        }

        let since = DateTime::from_millis(DateTime::now().timestamp_millis() - DAY_MILLIS);
        let stores = &self.stores;

        let (
            total_users,
            total_submissions,
            pending_reviews,
            pending_templates,
            approvals,
            publications,
            (recent, _),
        ) = tokio::try_join!(
            stores.users.count(),
            stores.submissions.count(&[]),
            stores.submissions.count(&SubmissionStatus::OPEN),
            stores.pending.count(Some(PendingStatus::Pending)),
            stores.reviews.count_since(ReviewAction::Approve, since),
            stores.publish_log.count_since(PublishAction::Published, since),
            stores
                .submissions
                .list(None, None, Page::new(Some(RECENT_ACTIVITY), None)),
        )?;

        Ok(DashboardStats {
            total_templates,
            total_users: Some(total_users),
            total_submissions: Some(total_submissions),
            pending_reviews: Some(pending_reviews),
            pending_templates: Some(pending_templates),
            approvals_24h: Some(approvals),
            publications_24h: Some(publications),
            recent_activity: Some(recent.into_iter().map(ActivityItem::from).collect()),
        })
    }
}
