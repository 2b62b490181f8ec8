//! Profile routes
//!
//! - GET /profile - the caller's profile
//! - PUT /profile - update the caller's profile fields

use bytes::Bytes;
use hyper::Request;
use serde::Serialize;

use super::{ok, parse_json, RouteResult};
use crate::pipeline::views::ProfileView;
use crate::pipeline::ProfileRequest;
use crate::server::AppState;

#[derive(Debug, Serialize)]
struct ProfileResponse {
    success: bool,
    user: ProfileView,
}

pub async fn handle_get_profile(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let user = state.pipeline.profile(&identity).await?;
    ok(&ProfileResponse {
        success: true,
        user,
    })
}

pub async fn handle_update_profile(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let request: ProfileRequest = parse_json(req)?;

    let user = state.pipeline.update_profile(&identity, &request).await?;
    ok(&ProfileResponse {
        success: true,
        user,
    })
}
