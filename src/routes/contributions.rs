//! Contribution routes
//!
//! - POST /contributions/submit       - submit a template
//! - GET  /contributions/submit       - list submissions (own, or all for admins)
//! - GET  /contributions/submit/{id}  - one submission with review notes
//! - POST /contributions/review       - record a review decision

use bytes::Bytes;
use hyper::Request;
use serde::Serialize;

use super::{
    listing_body, ok, page_from_query, param, parse_json, query_params,
    RouteResult,
};
use crate::db::schemas::SubmissionStatus;
use crate::pipeline::views::SubmissionView;
use crate::pipeline::{ReviewRequest, SubmitRequest};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    success: bool,
    submission_id: String,
    message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewResponse {
    success: bool,
    message: String,
    status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmissionResponse {
    submission: SubmissionView,
}

pub async fn handle_submit(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let request: SubmitRequest = parse_json(req)?;

    let outcome = state.pipeline.submit(&identity, &request).await?;
    ok(&SubmitResponse {
        success: true,
        submission_id: outcome.submission_id,
        message: "Template submitted successfully",
    })
}

pub async fn handle_list_submissions(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let params = query_params(req);
    let status = param(&params, "status")
        .map(str::parse::<SubmissionStatus>)
        .transpose()?;

    let listing = state
        .pipeline
        .list_submissions(&identity, status, page_from_query(&params))
        .await?;
    ok(&listing_body("submissions", &listing))
}

pub async fn handle_get_submission(
    state: &AppState,
    req: &Request<Bytes>,
    submission_id: &str,
) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let submission = state
        .pipeline
        .get_submission(&identity, submission_id)
        .await?;
    ok(&SubmissionResponse { submission })
}

pub async fn handle_review(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let request: ReviewRequest = parse_json(req)?;

    let outcome = state.pipeline.review(&identity, &request).await?;
    ok(&ReviewResponse {
        success: true,
        message: outcome.message,
        status: outcome.status,
        template_id: outcome.template_slug,
    })
}
