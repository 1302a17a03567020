// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication, route guards and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Tier guards reject signed-in users below the route's tier
//! 3. CORS preflight requests return correct headers

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use gym_ledger::db::GymStore;
use gym_ledger::models::ManagerType;
use serde_json::Value;
use tower::ServiceExt;

mod common;
use common::{bearer_token, create_test_app, individual_pt, manager, member, seed, trainer};

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _, _) = create_test_app();

    let response = app.oneshot(get("/api/me", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(get("/api/me", Some("Bearer invalid.token.here")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_user_acts_as_default_member() {
    let (app, _, _) = create_test_app();
    let token = bearer_token("u-new", "fresh@gym.test");

    let response = app.oneshot(get("/api/me", Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "fresh@gym.test");
    assert_eq!(body["role"], "MEMBER");
    assert_eq!(body["lvl"], 1);
    assert_eq!(body["registered"], false);
    assert_eq!(body["access"]["isManager"], false);
}

#[tokio::test]
async fn test_register_profile_persists_account() {
    let (app, _, store) = create_test_app();
    let token = bearer_token("u-new", "fresh@gym.test");

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/me")
                .header(header::AUTHORIZATION, &token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.get_account("u-new").await.unwrap().is_some());
}

#[tokio::test]
async fn test_deleted_account_is_forbidden() {
    let (app, _, store) = create_test_app();
    let mut gone = member("m1", "gone@gym.test", 0);
    gone.deleted_flag = true;
    seed(&store, &[gone], &[], &[]).await;

    let response = app
        .oneshot(get("/api/me", Some(&bearer_token("m1", "gone@gym.test"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_blocked_from_manager_routes() {
    let (app, _, store) = create_test_app();
    seed(&store, &[member("m1", "kim@gym.test", 2)], &[], &[]).await;
    let token = bearer_token("m1", "kim@gym.test");

    let response = app
        .clone()
        .oneshot(get("/api/trainers", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(get("/api/gyms/gym-1/manager-candidates", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_manager_lists_trainers_but_not_admin_routes() {
    let (app, _, store) = create_test_app();
    seed(
        &store,
        &[
            manager("boss", "boss@gym.test", "gym-1", ManagerType::Primary),
            trainer("t1", "coach@gym.test", Some("gym-1")),
        ],
        &[],
        &[],
    )
    .await;
    let token = bearer_token("boss", "boss@gym.test");

    let response = app
        .clone()
        .oneshot(get("/api/trainers?gymId=gym-1", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/gyms",
            &token,
            serde_json::json!({ "name": "Uptown" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_any_user_lists_gyms() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(get("/api/gyms", Some(&bearer_token("u1", "x@gym.test"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_complete_session_over_http() {
    let (app, _, store) = create_test_app();
    seed(
        &store,
        &[
            trainer("t1", "coach@gym.test", None),
            member("m1", "kim@gym.test", 3),
        ],
        &[],
        &[individual_pt("e1", "coach@gym.test", "kim@gym.test")],
    )
    .await;
    let token = bearer_token("t1", "coach@gym.test");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/schedules/e1/complete",
            &token,
            serde_json::json!({ "signatureUrl": "https://sig.test/e1.png" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deducted"][0]["remainingSessions"], 2);

    let again = app
        .oneshot(json_request(
            "POST",
            "/api/schedules/e1/complete",
            &token,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(again).await["error"], "already_completed");
}

#[tokio::test]
async fn test_complete_session_rejects_bad_signature_url() {
    let (app, _, store) = create_test_app();
    seed(
        &store,
        &[trainer("t1", "coach@gym.test", None)],
        &[],
        &[individual_pt("e1", "coach@gym.test", "kim@gym.test")],
    )
    .await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/schedules/e1/complete",
            &bearer_token("t1", "coach@gym.test"),
            serde_json::json!({ "signatureUrl": "not a url" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/me")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // OPTIONS should return 200 (CORS preflight success)
    assert_eq!(response.status(), StatusCode::OK);

    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let (app, _, _) = create_test_app();

    let response = app.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}
