//! Database schemas
//!
//! MongoDB document structures for the directory, the submission pipeline
//! and the template catalog.

mod metadata;
mod publish_log;
mod review;
mod submission;
mod template;
mod user;

pub use metadata::Metadata;
pub use publish_log::{PublishAction, PublishLogDoc, PUBLISH_LOG_COLLECTION};
pub use review::{ReviewAction, ReviewDoc, ReviewRecord, REVIEW_COLLECTION};
pub use submission::{SubmissionDoc, SubmissionStatus, TemplateCategory, SUBMISSION_COLLECTION};
pub use template::{
    PendingStatus, PendingTemplateDoc, PublishedTemplateDoc, TemplateContent,
    PENDING_TEMPLATE_COLLECTION, PUBLISHED_STATUS, TEMPLATE_COLLECTION,
};
pub use user::{UserDoc, UserProfile, USER_COLLECTION};
