//! Session routes
//!
//! - POST /auth/session - register or refresh the caller's directory record

use bytes::Bytes;
use hyper::{Request, StatusCode};
use serde::Serialize;

use super::{json_response, RouteResult};
use crate::pipeline::views::ProfileView;
use crate::server::AppState;

#[derive(Debug, Serialize)]
struct SessionResponse {
    success: bool,
    created: bool,
    user: ProfileView,
}

pub async fn handle_session(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let sign_in = state.pipeline.sign_in(&identity).await?;

    let status = if sign_in.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(json_response(
        status,
        &SessionResponse {
            success: true,
            created: sign_in.created,
            user: sign_in.profile,
        },
    ))
}
