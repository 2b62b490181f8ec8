//! Template submission pipeline
//!
//! Submission -> review -> pending publication -> published catalog, plus
//! user/role management and the dashboard read path. Every operation
//! re-resolves the caller in the user directory and checks capabilities
//! through [`authorize`](crate::auth::authorize).
//!
//! Multi-store operations write their primary record first. Review-approve
//! and publish compensate the primary write if the second store rejects
//! its write; everything after that (review ledger, reputation, publish
//! log, audit) is best-effort and only logged on failure.

mod dashboard;
mod intake;
mod publication;
mod review;
mod users;
pub mod validation;
pub mod views;

pub use intake::{SubmitOutcome, SubmitRequest, ValidatedSubmission};
pub use publication::{PublicationDecision, PublicationOutcome, PublishRequest};
pub use review::{ReviewOutcome, ReviewRequest};
pub use users::{BootstrapRequest, ProfileRequest, RoleUpdateRequest, SignIn};

use tracing::warn;

use crate::auth::Identity;
use crate::db::schemas::UserDoc;
use crate::logging::{AuditEvent, AuditLogger};
use crate::store::{ReputationReason, Stores};
use crate::types::{Result, ValidationError};

/// Permission switches that are deployment decisions
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    /// Users may raise their own role to reviewer/admin
    pub allow_self_promotion: bool,
}

/// The pipeline handlers over a set of stores
#[derive(Clone)]
pub struct Pipeline {
    stores: Stores,
    policy: Policy,
    audit: AuditLogger,
}

impl Pipeline {
    pub fn new(stores: Stores, policy: Policy, audit: AuditLogger) -> Self {
        Self {
            stores,
            policy,
            audit,
        }
    }

    /// Pipeline over fresh in-memory stores with no audit sink
    pub fn in_memory(policy: Policy) -> Self {
        Self::new(Stores::memory(), policy, AuditLogger::new())
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Directory record for the caller, by id then email
    async fn caller(&self, identity: &Identity) -> Result<UserDoc> {
        self.stores
            .users
            .resolve(&identity.user_id, Some(&identity.email))
            .await
    }

    /// Best-effort reputation adjustment
    async fn award(&self, user_id: &str, reason: ReputationReason) {
        if let Err(e) = self
            .stores
            .reputation
            .adjust(user_id, reason.delta(), reason)
            .await
        {
            warn!(user_id, reason = %reason, error = %e, "Reputation adjustment failed");
        }
    }

    async fn audit(&self, event: AuditEvent) {
        self.audit.log(event).await;
    }
}

/// Required string fields, trimmed; lists every missing name at once
fn required<'a, const N: usize>(
    fields: [(&'static str, Option<&'a str>); N],
) -> std::result::Result<[&'a str; N], ValidationError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, v)| v.map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing.join(", ")));
    }
    Ok(fields.map(|(_, v)| v.unwrap_or_default().trim()))
}
