//! Sign-in, profiles and role management

use bson::DateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::validation::{check_length, string_list};
use super::views::{Listing, ProfileView, UserSummary};
use super::{required, Pipeline};
use crate::auth::{authorize, Capability, Identity, Role};
use crate::db::schemas::UserDoc;
use crate::logging::{AuditEvent, AuditEventType};
use crate::store::{Page, ProfileUpdate};
use crate::types::{PipelineError, Result, ValidationError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateRequest {
    /// Target user id, or email
    pub user_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRequest {
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Value>,
    pub github_username: Option<String>,
    pub avatar_url: Option<String>,
}

/// Result of the sign-in adapter
#[derive(Debug, Clone, PartialEq)]
pub struct SignIn {
    pub profile: ProfileView,
    /// True when this call created the directory record
    pub created: bool,
}

const MAX_SKILLS: usize = 20;
const MAX_SKILL_LEN: usize = 50;

fn bounded(
    field: &'static str,
    value: &Option<String>,
    max: usize,
) -> std::result::Result<Option<String>, ValidationError> {
    match value {
        Some(v) => {
            let v = v.trim();
            check_length(field, v, (0, max))?;
            Ok(Some(v.to_string()))
        }
        None => Ok(None),
    }
}

impl ProfileRequest {
    pub fn validate(&self) -> std::result::Result<ProfileUpdate, ValidationError> {
        let skills = match &self.skills {
            Some(value) => Some(string_list("skills", Some(value), MAX_SKILLS, MAX_SKILL_LEN)?),
            None => None,
        };

        Ok(ProfileUpdate {
            name: bounded("name", &self.name, 100)?,
            bio: bounded("bio", &self.bio, 500)?,
            website: bounded("website", &self.website, 200)?,
            location: bounded("location", &self.location, 100)?,
            skills,
            github_username: bounded("githubUsername", &self.github_username, 39)?,
            avatar_url: bounded("avatarUrl", &self.avatar_url, 500)?,
        })
    }
}

impl Pipeline {
    /// Sign-in adapter: create the directory record on first sight,
    /// otherwise refresh `last_active`
    pub async fn sign_in(&self, identity: &Identity) -> Result<SignIn> {
        let now = DateTime::now();

        match self.caller(identity).await {
            Ok(mut user) => {
                self.stores.users.touch(&user.user_id, now).await?;
                user.last_active = Some(now);
                return Ok(SignIn {
                    profile: user.into(),
                    created: false,
                });
            }
            Err(PipelineError::UserNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let user = UserDoc::new(
            identity.user_id.clone(),
            identity.email.clone(),
            identity.name.clone().unwrap_or_default(),
            now,
        );
        match self.stores.users.insert(user.clone()).await {
            Ok(()) => {}
            // Lost a race with a concurrent first sign-in
            Err(e) if e.is_conflict() => {
                let existing = self.caller(identity).await?;
                return Ok(SignIn {
                    profile: existing.into(),
                    created: false,
                });
            }
            Err(e) => return Err(e),
        }

        info!(user_id = %user.user_id, "User registered");
        self.audit(AuditEvent::new(
            AuditEventType::UserRegistered,
            &user.user_id,
            user.role,
        ))
        .await;

        Ok(SignIn {
            profile: user.into(),
            created: true,
        })
    }

    pub async fn profile(&self, identity: &Identity) -> Result<ProfileView> {
        Ok(self.caller(identity).await?.into())
    }

    /// Update the caller's own profile. Role and reputation are not writable.
    pub async fn update_profile(
        &self,
        identity: &Identity,
        request: &ProfileRequest,
    ) -> Result<ProfileView> {
        let caller = self.caller(identity).await?;
        let update = request.validate()?;

        self.stores
            .users
            .update_profile(&caller.user_id, &update)
            .await?
            .map(ProfileView::from)
            .ok_or_else(|| PipelineError::UserNotFound {
                user_id: caller.user_id.clone(),
                email: Some(caller.email.clone()),
            })
    }

    /// Change a user's role.
    ///
    /// Admins may set any role on anyone. Other callers may only change
    /// their own role, and only to a privileged role when self-promotion
    /// is enabled.
    pub async fn update_user_role(
        &self,
        identity: &Identity,
        request: &RoleUpdateRequest,
    ) -> Result<String> {
        let actor = self.caller(identity).await?;

        let [target, role] = required([
            ("userId", request.user_id.as_deref()),
            ("role", request.role.as_deref()),
        ])?;
        let role: Role = role.parse()?;

        let is_self =
            target == actor.user_id || target == identity.user_id || target == actor.email;
        let is_admin = actor.role.can(Capability::ManageUsers);

        if !is_self && !is_admin {
            return Err(PipelineError::Forbidden(
                "Only admins can change another user's role".into(),
            ));
        }
        if !is_admin && role.is_privileged() && !self.policy.allow_self_promotion {
            return Err(PipelineError::Forbidden(format!(
                "Self-promotion to '{}' is disabled",
                role
            )));
        }

        let target_user = if is_self {
            actor.clone()
        } else {
            self.find_target(target).await?
        };

        self.set_role(&actor, &target_user, role).await?;
        Ok(format!("User role updated to {}", role))
    }

    /// Self-service promotion to reviewer or admin, for initial setup
    pub async fn bootstrap_role(
        &self,
        identity: &Identity,
        request: &BootstrapRequest,
    ) -> Result<String> {
        let actor = self.caller(identity).await?;

        if !self.policy.allow_self_promotion {
            return Err(PipelineError::Forbidden(
                "Role bootstrap is disabled".into(),
            ));
        }

        let [role] = required([("role", request.role.as_deref())])?;
        let role: Role = role.parse()?;
        if !role.is_privileged() {
            return Err(ValidationError::InvalidRole(role.to_string()).into());
        }

        warn!(user_id = %actor.user_id, role = %role, "Self-promotion via bootstrap");
        self.set_role(&actor, &actor, role).await?;
        Ok(format!("Role bootstrapped to {}", role))
    }

    /// Admin directory listing, newest members first
    pub async fn list_users(&self, identity: &Identity, page: Page) -> Result<Listing<UserSummary>> {
        let admin = self.caller(identity).await?;
        authorize(admin.role, Capability::ManageUsers)?;

        let (users, total) = self.stores.users.list(page).await?;
        Ok(Listing::from_docs(users, total, page, |u| {
            UserSummary::from(&u)
        }))
    }

    /// Target by stable id, then by email
    async fn find_target(&self, target: &str) -> Result<UserDoc> {
        if let Some(user) = self.stores.users.find_by_id(target).await? {
            return Ok(user);
        }
        if target.contains('@') {
            if let Some(user) = self.stores.users.find_by_email(target).await? {
                return Ok(user);
            }
        }
        Err(PipelineError::UserNotFound {
            user_id: target.to_string(),
            email: None,
        })
    }

    async fn set_role(&self, actor: &UserDoc, target: &UserDoc, role: Role) -> Result<()> {
        if !self.stores.users.set_role(&target.user_id, role).await? {
            return Err(PipelineError::UserNotFound {
                user_id: target.user_id.clone(),
                email: Some(target.email.clone()),
            });
        }

        info!(
            actor_id = %actor.user_id,
            target_id = %target.user_id,
            from = %target.role,
            to = %role,
            "Role changed"
        );
        self.audit(
            AuditEvent::new(AuditEventType::RoleChanged, &actor.user_id, actor.role)
                .with_subject(&target.user_id)
                .with_action(role.as_str())
                .with_metadata(serde_json::json!({ "previousRole": target.role })),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_request_validation() {
        let request: ProfileRequest = serde_json::from_value(json!({
            "name": "  Ann  ",
            "skills": ["rust", 3, ""],
        }))
        .unwrap();
        let update = request.validate().unwrap();
        assert_eq!(update.name.as_deref(), Some("Ann"));
        assert_eq!(update.skills, Some(vec!["rust".to_string()]));
        assert_eq!(update.bio, None);

        let request: ProfileRequest = serde_json::from_value(json!({
            "githubUsername": "x".repeat(40),
        }))
        .unwrap();
        assert!(matches!(
            request.validate().unwrap_err(),
            ValidationError::InvalidLength { field: "githubUsername", .. }
        ));
    }
}
