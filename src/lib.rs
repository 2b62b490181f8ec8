//! Template pipeline - community template submission, review and publication
//!
//! Contributors submit repository templates, reviewers approve, reject or
//! request changes, and admins publish approved templates into the public
//! catalog.
//!
//! ## Stages
//!
//! - **Intake**: validated submissions, one open submission per contributor
//! - **Review**: atomic decisions on open submissions, approvals queue a pending template
//! - **Publication**: admin publish/reject of pending templates into the catalog
//! - **Directory**: users, roles, reputation and profiles
//!
//! Storage is MongoDB, or in-memory for development and tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use pipeline::{Pipeline, Policy};
pub use server::{run, AppState};
pub use types::{PipelineError, Result};
