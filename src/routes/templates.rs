//! Template routes
//!
//! - POST /templates/publish  - publish or reject a pending template (admin)
//! - GET  /templates/publish  - list pending templates (admin)
//! - GET  /templates          - public catalog
//! - GET  /templates/{slug}   - one published template

use bytes::Bytes;
use hyper::Request;
use serde::Serialize;

use super::{listing_body, ok, page_from_query, param, parse_json, query_params, RouteResult};
use crate::db::schemas::{PendingStatus, TemplateCategory};
use crate::pipeline::views::PublishedTemplateView;
use crate::pipeline::PublishRequest;
use crate::server::AppState;

#[derive(Debug, Serialize)]
struct PublishResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<PublishedTemplateView>,
}

#[derive(Debug, Serialize)]
struct TemplateResponse {
    template: PublishedTemplateView,
}

pub async fn handle_publish(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let request: PublishRequest = parse_json(req)?;

    let outcome = state.pipeline.publish_or_reject(&identity, &request).await?;
    ok(&PublishResponse {
        success: true,
        message: outcome.message,
        template: outcome.template,
    })
}

pub async fn handle_list_pending(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let identity = state.sessions.resolve(req.headers())?;
    let params = query_params(req);
    let status = param(&params, "status")
        .map(str::parse::<PendingStatus>)
        .transpose()?;

    let listing = state
        .pipeline
        .list_pending(&identity, status, page_from_query(&params))
        .await?;
    ok(&listing_body("templates", &listing))
}

pub async fn handle_list_published(state: &AppState, req: &Request<Bytes>) -> RouteResult {
    let params = query_params(req);
    let category = param(&params, "category")
        .map(str::parse::<TemplateCategory>)
        .transpose()?;

    let listing = state
        .pipeline
        .list_published(category, page_from_query(&params))
        .await?;
    ok(&listing_body("templates", &listing))
}

pub async fn handle_get_published(state: &AppState, slug: &str) -> RouteResult {
    let template = state.pipeline.get_published(slug).await?;
    ok(&TemplateResponse { template })
}
