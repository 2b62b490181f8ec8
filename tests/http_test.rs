//! HTTP routing tests
//!
//! Requests go through the dispatcher with collected bodies, so no socket
//! is bound.

use bytes::Bytes;
use clap::Parser;
use http_body_util::BodyExt;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

use template_pipeline::auth::{JwtValidator, Role, SessionResolver, TokenInput};
use template_pipeline::server::{route, AppState};
use template_pipeline::{Args, Pipeline, Policy};

fn state(extra: &[&str]) -> AppState {
    let mut argv = vec!["template-pipeline", "--dev-mode", "--memory-store"];
    argv.extend_from_slice(extra);
    let args = Args::parse_from(argv);
    let policy = Policy {
        allow_self_promotion: args.allow_self_promotion,
    };
    let sessions = SessionResolver::new(JwtValidator::new_dev(), args.session_cookie.clone());
    AppState::new(args, Pipeline::in_memory(policy), sessions)
}

fn token(state: &AppState, user_id: &str) -> String {
    state
        .sessions
        .validator()
        .generate_token(TokenInput {
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            name: None,
        })
        .unwrap()
}

/// Send a request, returning status and parsed JSON body
async fn send(
    state: &AppState,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = body.map(|b| Bytes::from(b.to_string())).unwrap_or_default();
    let response = route(state, builder.body(body).unwrap()).await;

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Sign in over HTTP and optionally raise the role directly in the store
async fn signed_in(state: &AppState, user_id: &str, role: Role) -> String {
    let token = token(state, user_id);
    let (status, _) = send(state, Method::POST, "/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    if role != Role::User {
        state
            .pipeline
            .stores()
            .users
            .set_role(user_id, role)
            .await
            .unwrap();
    }
    token
}

fn submission_body() -> Value {
    json!({
        "title": "Widget Starter",
        "description": "A starter template for building widgets",
        "githubUrl": "https://github.com/acme/widget/",
        "category": "payment",
        "techStack": ["rust", "hyper"],
        "deployment": { "provider": "fly" },
    })
}

#[tokio::test]
async fn test_health() {
    let state = state(&[]);
    let (status, body) = send(&state, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_unknown_route() {
    let state = state(&[]);
    let (status, body) = send(&state, Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["path"], "/nope");
}

#[tokio::test]
async fn test_missing_or_bad_token() {
    let state = state(&[]);
    let (status, body) = send(
        &state,
        Method::POST,
        "/contributions/submit",
        None,
        Some(submission_body()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(&state, Method::GET, "/profile", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie() {
    let state = state(&[]);
    let token = token(&state, "alice");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/session")
        .header(COOKIE, format!("theme=dark; session-token={}", token))
        .body(Bytes::new())
        .unwrap();
    let response = route(&state, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

    // Second sign-in refreshes the existing record
    let (status, body) = send(&state, Method::POST, "/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
    assert_eq!(body["user"]["role"], "user");
}

#[tokio::test]
async fn test_unregistered_user_details_in_dev_mode() {
    let state = state(&[]);
    let token = token(&state, "ghost");

    let (status, body) = send(&state, Method::GET, "/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "USER_NOT_FOUND");
    assert_eq!(body["details"]["userId"], "ghost");
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let state = state(&[]);
    let alice = signed_in(&state, "alice", Role::User).await;

    let (status, body) = send(&state, Method::POST, "/contributions/submit", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_JSON");

    let mut bad_url = submission_body();
    bad_url["githubUrl"] = json!("https://gitlab.com/acme/widget");
    let (status, body) = send(
        &state,
        Method::POST,
        "/contributions/submit",
        Some(&alice),
        Some(bad_url),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_GITHUB");

    let (status, body) = send(
        &state,
        Method::POST,
        "/contributions/submit",
        Some(&alice),
        Some(json!({ "title": "Widget" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELDS");

    let (status, body) = send(
        &state,
        Method::GET,
        "/contributions/submit?status=pending",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATE");
}

/// Submit, review and publish through the HTTP surface
#[tokio::test]
async fn test_publication_flow() {
    let state = state(&[]);
    let alice = signed_in(&state, "alice", Role::User).await;
    let adam = signed_in(&state, "adam", Role::Admin).await;

    let (status, body) = send(
        &state,
        Method::POST,
        "/contributions/submit",
        Some(&alice),
        Some(submission_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let submission_id = body["submissionId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &state,
        Method::POST,
        "/contributions/submit",
        Some(&alice),
        Some(submission_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PENDING_SUBMISSION_EXISTS");

    let (status, body) = send(
        &state,
        Method::GET,
        "/contributions/submit?limit=5",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 5);
    assert_eq!(body["submissions"][0]["githubUrl"], "https://github.com/acme/widget");

    let (status, body) = send(
        &state,
        Method::POST,
        "/contributions/review",
        Some(&adam),
        Some(json!({ "submissionId": submission_id, "action": "approve", "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["templateId"], "widget-starter");

    let (status, body) = send(
        &state,
        Method::GET,
        &format!("/contributions/submit/{}", submission_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["submission"]["reviewNotes"][0]["rating"], 5);

    let (status, body) = send(&state, Method::GET, "/templates/publish", Some(&adam), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["templates"][0]["slug"], "widget-starter");
    assert_eq!(body["templates"][0]["status"], "pending");

    let (status, body) = send(
        &state,
        Method::POST,
        "/templates/publish",
        Some(&adam),
        Some(json!({ "templateId": "widget-starter", "action": "publish" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["template"]["codeUrl"], "https://github.com/acme/widget");

    let (status, body) = send(&state, Method::GET, "/templates?category=payment", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = send(&state, Method::GET, "/templates/widget-starter", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["template"]["name"], "Widget Starter");

    let (status, _) = send(&state, Method::GET, "/templates/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&state, Method::GET, "/admin/publish-log", Some(&adam), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["action"], "published");

    let (status, body) = send(&state, Method::GET, "/admin/dashboard", Some(&adam), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalTemplates"], 1);
    assert_eq!(body["publications24h"], 1);

    let (_, body) = send(&state, Method::GET, "/profile", Some(&alice), None).await;
    assert_eq!(body["user"]["reputationScore"], 80);
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let state = state(&[]);
    let alice = signed_in(&state, "alice", Role::Reviewer).await;

    for uri in ["/admin/users", "/admin/publish-log", "/templates/publish"] {
        let (status, body) = send(&state, Method::GET, uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    // Non-admins get the reduced dashboard
    let (status, body) = send(&state, Method::GET, "/admin/dashboard", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "totalTemplates": 0 }));
}

#[tokio::test]
async fn test_role_update_and_bootstrap() {
    let state = state(&["--allow-self-promotion"]);
    let alice = signed_in(&state, "alice", Role::User).await;
    let bob = signed_in(&state, "bob", Role::User).await;

    let (status, _) = send(
        &state,
        Method::POST,
        "/admin/users",
        Some(&bob),
        Some(json!({ "userId": "alice", "role": "reviewer" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &state,
        Method::POST,
        "/admin/bootstrap",
        Some(&alice),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Role bootstrapped to admin");

    let (status, body) = send(
        &state,
        Method::POST,
        "/admin/users",
        Some(&alice),
        Some(json!({ "userId": "bob@example.com", "role": "reviewer" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&state, Method::GET, "/admin/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_profile_update() {
    let state = state(&[]);
    let alice = signed_in(&state, "alice", Role::User).await;

    let (status, body) = send(
        &state,
        Method::PUT,
        "/profile",
        Some(&alice),
        Some(json!({ "bio": "  Builds things  ", "skills": ["rust"], "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["bio"], "Builds things");
    assert_eq!(body["user"]["skills"], json!(["rust"]));
    assert_eq!(body["user"]["role"], "user");
}
