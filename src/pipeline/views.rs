//! API views of stored documents
//!
//! Documents are snake_case with BSON dates; views are camelCase with
//! ISO-8601 strings.

use bson::DateTime;
use chrono::SecondsFormat;
use serde::Serialize;

use crate::auth::Role;
use crate::db::schemas::{
    PendingTemplateDoc, PublishLogDoc, PublishedTemplateDoc, ReviewRecord, SubmissionDoc,
    TemplateContent, UserDoc,
};
use crate::store::Page;

/// ISO-8601 with millisecond precision, UTC
pub fn iso(at: DateTime) -> String {
    at.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One page of results plus the unpaged total
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: Page,
}

impl<T> Listing<T> {
    /// Convert stored documents into views
    pub fn from_docs<D, F: FnMut(D) -> T>(docs: Vec<D>, total: u64, page: Page, f: F) -> Self {
        Self {
            items: docs.into_iter().map(f).collect(),
            total,
            page,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: String,
    pub submission_id: String,
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    pub notes: String,
    pub reviewed_at: String,
}

impl From<&ReviewRecord> for ReviewView {
    fn from(review: &ReviewRecord) -> Self {
        Self {
            id: review.review_id.clone(),
            submission_id: review.submission_id.clone(),
            reviewer_id: review.reviewer_id.clone(),
            reviewer_name: review.reviewer_name.clone(),
            action: review.action.to_string(),
            rating: review.rating,
            notes: review.notes.clone(),
            reviewed_at: iso(review.reviewed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: String,
    pub submitter_id: String,
    pub submitter_name: String,
    pub status: String,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<String>,
    pub title: String,
    pub description: String,
    pub github_url: String,
    pub category: String,
    pub tech_stack: Vec<String>,
    pub features: Vec<String>,
    pub deployment: serde_json::Map<String, serde_json::Value>,
    pub use_cases: Vec<String>,
    pub review_notes: Vec<ReviewView>,
    pub version: i32,
}

impl From<SubmissionDoc> for SubmissionView {
    fn from(s: SubmissionDoc) -> Self {
        Self {
            id: s.submission_id,
            submitter_id: s.submitter_id,
            submitter_name: s.submitter_name,
            status: s.status.to_string(),
            submitted_at: iso(s.submitted_at),
            last_reviewed_at: s.last_reviewed_at.map(iso),
            title: s.title,
            description: s.description,
            github_url: s.github_url,
            category: s.category.to_string(),
            tech_stack: s.tech_stack,
            features: s.features,
            deployment: s.deployment,
            use_cases: s.use_cases,
            review_notes: s.review_notes.iter().map(ReviewView::from).collect(),
            version: s.version,
        }
    }
}

/// Template fields shared by pending and published views
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateContentView {
    pub slug: String,
    pub name: String,
    pub category: String,
    pub summary: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub features: Vec<String>,
    pub demo_url: Option<String>,
    pub code_url: String,
    pub deployment: serde_json::Map<String, serde_json::Value>,
    pub use_cases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

impl From<TemplateContent> for TemplateContentView {
    fn from(t: TemplateContent) -> Self {
        Self {
            slug: t.slug,
            name: t.name,
            category: t.category.to_string(),
            summary: t.summary,
            description: t.description,
            tech_stack: t.tech_stack,
            features: t.features,
            demo_url: t.demo_url,
            code_url: t.code_url,
            deployment: t.deployment,
            use_cases: t.use_cases,
            submitted_by: t.submitted_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingTemplateView {
    #[serde(flatten)]
    pub content: TemplateContentView,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    pub approved_by: String,
    pub approved_at: String,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_notes: Option<String>,
}

impl From<PendingTemplateDoc> for PendingTemplateView {
    fn from(t: PendingTemplateDoc) -> Self {
        Self {
            content: t.template.into(),
            status: t.status.to_string(),
            submission_id: t.submission_id,
            approved_by: t.approved_by,
            approved_at: iso(t.approved_at),
            version: t.version,
            rejected_by: t.rejected_by,
            rejected_at: t.rejected_at.map(iso),
            rejection_notes: t.rejection_notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishedTemplateView {
    #[serde(flatten)]
    pub content: TemplateContentView,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    pub published_by: String,
    pub published_at: String,
    pub version: i32,
}

impl From<PublishedTemplateDoc> for PublishedTemplateView {
    fn from(t: PublishedTemplateDoc) -> Self {
        Self {
            content: t.template.into(),
            status: t.status,
            approved_by: t.approved_by,
            approved_at: t.approved_at.map(iso),
            published_by: t.published_by,
            published_at: iso(t.published_at),
            version: t.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishLogView {
    pub template_id: String,
    pub template_name: String,
    pub action: String,
    pub admin_id: String,
    pub admin_name: String,
    pub notes: String,
    pub timestamp: String,
}

impl From<PublishLogDoc> for PublishLogView {
    fn from(e: PublishLogDoc) -> Self {
        Self {
            template_id: e.template_id,
            template_name: e.template_name,
            action: e.action.to_string(),
            admin_id: e.admin_id,
            admin_name: e.admin_name,
            notes: e.notes,
            timestamp: iso(e.timestamp),
        }
    }
}

/// Privacy-filtered directory entry for admin listings
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub reputation_score: i64,
    pub is_verified: bool,
    pub joined_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
}

impl From<&UserDoc> for UserSummary {
    fn from(u: &UserDoc) -> Self {
        Self {
            id: u.user_id.clone(),
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role,
            reputation_score: u.reputation_score,
            is_verified: u.is_verified,
            joined_date: iso(u.joined_date),
            last_active: u.last_active.map(iso),
        }
    }
}

/// The caller's own record
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub skills: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<UserDoc> for ProfileView {
    fn from(u: UserDoc) -> Self {
        Self {
            user: UserSummary::from(&u),
            bio: u.profile.bio,
            website: u.profile.website,
            location: u.profile.location,
            skills: u.profile.skills,
            github_username: u.profile.github_username,
            avatar_url: u.profile.avatar_url,
        }
    }
}

/// Submission feed entry on the dashboard
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: String,
    pub title: String,
    pub submitter: String,
    pub status: String,
    pub timestamp: String,
}

impl From<SubmissionDoc> for ActivityItem {
    fn from(s: SubmissionDoc) -> Self {
        Self {
            id: s.submission_id,
            title: s.title,
            submitter: s.submitter_name,
            status: s.status.to_string(),
            timestamp: iso(s.last_reviewed_at.unwrap_or(s.submitted_at)),
        }
    }
}

/// Dashboard counters. Everything except `totalTemplates` is admin-only
/// and omitted for other callers.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_templates: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_users: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_submissions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_reviews: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_templates: Option<u64>,
    #[serde(rename = "approvals24h", skip_serializing_if = "Option::is_none")]
    pub approvals_24h: Option<u64>,
    #[serde(rename = "publications24h", skip_serializing_if = "Option::is_none")]
    pub publications_24h: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_activity: Option<Vec<ActivityItem>>,
}
