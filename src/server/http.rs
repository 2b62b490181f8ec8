//! HTTP server implementation
//!
//! hyper http1 with TokioIo. Request bodies are collected up front and
//! dispatched by [`route`], which is also the entry point for tests.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::SessionResolver;
use crate::config::Args;
use crate::pipeline::Pipeline;
use crate::routes::{self, json_response, FullBody, RouteResult};
use crate::types::PipelineError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub pipeline: Pipeline,
    /// Resolves the caller from the session token
    pub sessions: SessionResolver,
}

impl AppState {
    pub fn new(args: Args, pipeline: Pipeline, sessions: SessionResolver) -> Self {
        Self {
            args,
            pipeline,
            sessions,
        }
    }
}

/// Accept connections until SIGINT or SIGTERM
pub async fn run(state: Arc<AppState>) -> Result<(), PipelineError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Template pipeline listening on {} ({} store)",
        state.args.listen,
        state.pipeline.stores().backend
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - dev JWT secret, error details exposed");
    }
    if state.pipeline.policy().allow_self_promotion {
        warn!("Self-promotion enabled - any user can become reviewer or admin");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = &mut shutdown => {
                info!("No longer accepting connections");
                return Ok(());
            }
        };

        match accepted {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());

    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let response = route(&state, Request::from_parts(parts, body)).await;

    Ok(to_boxed(response))
}

/// Dispatch a request with a collected body
pub async fn route(state: &AppState, req: Request<Bytes>) -> Response<FullBody> {
    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/').to_string();

    let result: RouteResult = match (method, path.as_str()) {
        (Method::OPTIONS, _) => return preflight_response(),

        (Method::GET, "/health") => routes::health::health_check(state).await,

        (Method::POST, "/auth/session") => routes::auth_routes::handle_session(state, &req).await,

        (Method::GET, "/profile") => routes::profile::handle_get_profile(state, &req).await,
        (Method::PUT, "/profile") => routes::profile::handle_update_profile(state, &req).await,

        (Method::POST, "/contributions/submit") => {
            routes::contributions::handle_submit(state, &req).await
        }
        (Method::GET, "/contributions/submit") => {
            routes::contributions::handle_list_submissions(state, &req).await
        }
        (Method::GET, p) if single_segment(p, "/contributions/submit/").is_some() => {
            let id = single_segment(p, "/contributions/submit/").unwrap_or_default();
            routes::contributions::handle_get_submission(state, &req, id).await
        }
        (Method::POST, "/contributions/review") => {
            routes::contributions::handle_review(state, &req).await
        }

        (Method::POST, "/templates/publish") => routes::templates::handle_publish(state, &req).await,
        (Method::GET, "/templates/publish") => {
            routes::templates::handle_list_pending(state, &req).await
        }
        (Method::GET, "/templates") => routes::templates::handle_list_published(state, &req).await,
        (Method::GET, p) if single_segment(p, "/templates/").is_some() => {
            let slug = single_segment(p, "/templates/").unwrap_or_default();
            routes::templates::handle_get_published(state, slug).await
        }

        (Method::POST, "/admin/users") => routes::admin::handle_update_role(state, &req).await,
        (Method::GET, "/admin/users") => routes::admin::handle_list_users(state, &req).await,
        (Method::POST, "/admin/bootstrap") => routes::admin::handle_bootstrap(state, &req).await,
        (Method::GET, "/admin/dashboard") => routes::admin::handle_dashboard(state, &req).await,
        (Method::GET, "/admin/publish-log") => routes::admin::handle_publish_log(state, &req).await,

        _ => return not_found_response(&path),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(path = %path, error = %err, "Request failed");
            }
            routes::error_response(&err, state.args.error_details_enabled())
        }
    }
}

/// `/prefix/{segment}` with exactly one non-empty segment
fn single_segment<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Headers",
        hyper::header::HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        hyper::header::HeaderValue::from_static("GET, POST, PUT, OPTIONS"),
    );
    response
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "code": "NOT_FOUND",
            "path": path,
        }),
    )
}
