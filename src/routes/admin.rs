//! Admin routes
//!
//! - POST /admin/users        - change a user's role
//! - GET  /admin/users        - list users (admin)
//! - POST /admin/bootstrap    - self-service promotion, when enabled
//! - GET  /admin/dashboard    - dashboard counters
//! - GET  /admin/publish-log  - publication decisions (admin)

use bytes::Bytes;
use hyper::Request;

use super::{listing_body, ok, page_from_query, parse_json, query_params, RouteResult, SuccessResponse};
use crate::pipeline::{BootstrapRequest, RoleUpdateRequest};
use crate::server::AppState;

pub async fn handle_update_role(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let request: RoleUpdateRequest = parse_json(req)?;

    let message = state.pipeline.update_user_role(&identity, &request).await?;
    ok(&SuccessResponse::new(message))
}

pub async fn handle_list_users(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let params = query_params(req);

    let listing = state
        .pipeline
        .list_users(&identity, page_from_query(&params))
        .await?;
    ok(&listing_body("users", &listing))
}

pub async fn handle_bootstrap(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let request: BootstrapRequest = parse_json(req)?;

    let message = state.pipeline.bootstrap_role(&identity, &request).await?;
    ok(&SuccessResponse::new(message))
}

pub async fn handle_dashboard(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let stats = state.pipeline.dashboard(&identity).await?;
    ok(&stats)
}

pub async fn handle_publish_log(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let params = query_params(req);

    let listing = state
        .pipeline
        .list_publish_log(&identity, page_from_query(&params))
        .await?;
    ok(&listing_body("entries", &listing))
}
