//! HTTP routes
//!
//! Handlers take a request whose body has already been collected, return
//! `Result<Response, PipelineError>`, and leave error rendering to
//! [`error_response`].

pub mod admin;
pub mod auth_routes;
pub mod contributions;
pub mod health;
pub mod profile;
pub mod templates;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

use crate::pipeline::views::Listing;
use crate::store::Page;
use crate::types::{PipelineError, ValidationError};

pub type FullBody = Full<Bytes>;

/// Result type for route handlers
pub type RouteResult = Result<Response<FullBody>, PipelineError>;

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn ok<T: Serialize>(body: &T) -> RouteResult {
    Ok(json_response(StatusCode::OK, body))
}

/// Render an error; `details` only when exposed by configuration
pub fn error_response(err: &PipelineError, expose_details: bool) -> Response<FullBody> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.public_message(),
            code: err.code(),
            details: if expose_details { err.details() } else { None },
        },
    )
}

/// Parse a JSON request body
pub fn parse_json<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T, PipelineError> {
    if req.body().is_empty() {
        return Err(ValidationError::InvalidJson("Request body is empty".into()).into());
    }
    Ok(serde_json::from_slice(req.body())?)
}

/// Decoded query parameters; later duplicates win
pub fn query_params(req: &Request<Bytes>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(query) = req.uri().query() {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let key = urlencoding::decode(key).unwrap_or_default();
                let value = urlencoding::decode(&value.replace('+', " "))
                    .unwrap_or_default()
                    .into_owned();
                params.insert(key.into_owned(), value);
            }
        }
    }
    params
}

/// Non-empty query parameter
pub fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// `limit`/`offset`; unparsable values fall back to defaults
pub fn page_from_query(params: &HashMap<String, String>) -> Page {
    Page::new(
        param(params, "limit").and_then(|v| v.parse().ok()),
        param(params, "offset").and_then(|v| v.parse().ok()),
    )
}

/// `{<key>: [...], total, limit, offset}`
pub fn listing_body<T: Serialize>(key: &str, listing: &Listing<T>) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(
        key.to_string(),
        serde_json::to_value(&listing.items).unwrap_or_default(),
    );
    body.insert("total".into(), listing.total.into());
    body.insert("limit".into(), listing.page.limit.into());
    body.insert("offset".into(), listing.page.offset.into());
    serde_json::Value::Object(body)
}
