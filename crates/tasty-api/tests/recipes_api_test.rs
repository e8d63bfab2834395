//! HTTP tests driving the router in-process over the in-memory backend.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use tasty_api::{app, config::parse_allowed_origins, error, AppState, MAX_BODY_BYTES};
use tasty_db::{MemoryBackend, RecipeStore};

fn router_with(backend: MemoryBackend, debug_enabled: bool) -> Router {
    let state = AppState::new(RecipeStore::new(backend), debug_enabled);
    app(state, parse_allowed_origins("http://localhost:3000"))
}

fn router() -> (MemoryBackend, Router) {
    let backend = MemoryBackend::new();
    (backend.clone(), router_with(backend, false))
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, headers, value)
}

fn pancakes() -> Value {
    json!({
        "name": "Pancakes",
        "description": "Fluffy",
        "portions": 4,
        "ingredients": [
            {"name": "flour", "quantity": 200.0, "unit": "g"},
            {"name": "milk", "quantity": 0.3, "unit": "l"}
        ],
        "tags": [{"name": "breakfast"}]
    })
}

#[tokio::test]
async fn test_ping() {
    let (_backend, router) = router();
    let (status, _, body) = send(&router, Method::GET, "/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("pong".to_string()));
}

#[tokio::test]
async fn test_ping_fails_when_store_unreachable() {
    let (backend, router) = router();
    backend.fail_ping(true);
    let (status, _, body) = send(&router, Method::GET, "/ping", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], error::SERVER_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_create_returns_201_with_location() {
    let (_backend, router) = router();
    let (status, headers, body) =
        send(&router, Method::POST, "/v1/recipes", Some(pancakes())).await;

    assert_eq!(status, StatusCode::CREATED);
    let id = body["recipe"]["id"].as_i64().unwrap();
    assert_eq!(
        headers.get(header::LOCATION).unwrap(),
        &format!("/v1/recipes/{}", id)
    );
    assert_eq!(body["recipe"]["name"], "Pancakes");
    assert_eq!(body["recipe"]["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(body["recipe"]["tags"][0]["name"], "breakfast");
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_create_rejects_unknown_fields_and_bad_json() {
    let (backend, router) = router();

    let (status, _, body) = send(
        &router,
        Method::POST,
        "/v1/recipes",
        Some(json!({"name": "x", "chef": "me"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/recipes")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(backend.stats().begins, 0);
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let (_backend, router) = router();
    let (status, _, body) =
        send(&router, Method::POST, "/v1/recipes", Some(json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (backend, router) = router();
    let huge = "x".repeat(MAX_BODY_BYTES + 1);
    let (status, _, _) = send(
        &router,
        Method::POST,
        "/v1/recipes",
        Some(json!({"name": "big", "description": huge})),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(backend.stats().begins, 0);
}

#[tokio::test]
async fn test_list_and_show() {
    let (_backend, router) = router();
    let (_, _, empty) = send(&router, Method::GET, "/v1/recipes", None).await;
    assert_eq!(empty, json!({"recipes": []}));

    send(&router, Method::POST, "/v1/recipes", Some(pancakes())).await;
    send(&router, Method::POST, "/v1/recipes", Some(json!({"name": "Toast"}))).await;

    let (status, _, body) = send(&router, Method::GET, "/v1/recipes", None).await;
    assert_eq!(status, StatusCode::OK);
    let recipes = body["recipes"].as_array().unwrap();
    assert_eq!(recipes.len(), 2);
    assert_eq!(recipes[0]["name"], "Pancakes");
    assert_eq!(recipes[1]["ingredients"], json!([]));

    let (status, _, body) = send(&router, Method::GET, "/v1/recipes/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipe"]["name"], "Toast");
}

#[tokio::test]
async fn test_invalid_ids_are_bad_requests() {
    let (_backend, router) = router();
    for uri in ["/v1/recipes/abc", "/v1/recipes/0", "/v1/recipes/-4"] {
        let (status, _, body) = send(&router, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "invalid id parameter");
    }
}

#[tokio::test]
async fn test_missing_recipe_is_404() {
    let (_backend, router) = router();
    for method in [Method::GET, Method::DELETE] {
        let (status, _, body) = send(&router, method, "/v1/recipes/77", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], error::NOT_FOUND_MESSAGE);
    }
    let (status, _, _) = send(
        &router,
        Method::PUT,
        "/v1/recipes/77",
        Some(json!({"name": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_partial_update_keeps_omitted_fields() {
    let (_backend, router) = router();
    send(&router, Method::POST, "/v1/recipes", Some(pancakes())).await;

    let (status, _, body) = send(
        &router,
        Method::PUT,
        "/v1/recipes/1",
        Some(json!({"portions": 2, "tags": [{"name": "weekend"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let recipe = &body["recipe"];
    assert_eq!(recipe["name"], "Pancakes");
    assert_eq!(recipe["description"], "Fluffy");
    assert_eq!(recipe["portions"], 2);
    assert_eq!(recipe["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(recipe["tags"].as_array().unwrap().len(), 1);
    assert_eq!(recipe["tags"][0]["name"], "weekend");
}

#[tokio::test]
async fn test_delete() {
    let (backend, router) = router();
    send(&router, Method::POST, "/v1/recipes", Some(pancakes())).await;

    let (status, _, body) = send(&router, Method::DELETE, "/v1/recipes/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "recipe successfully deleted");
    assert_eq!(backend.state().recipe_count(), 0);

    let (status, _, _) = send(&router, Method::GET, "/v1/recipes/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_failure_detail_only_in_debug_mode() {
    let backend = MemoryBackend::new();
    backend.fail_begin(true);

    let router = router_with(backend.clone(), false);
    let (status, _, body) = send(&router, Method::GET, "/v1/recipes", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], error::SERVER_ERROR_MESSAGE);

    let router = router_with(backend, true);
    let (status, _, body) = send(&router, Method::GET, "/v1/recipes", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Failed to begin transaction"));
}

#[tokio::test]
async fn test_unknown_route_is_404_json() {
    let (_backend, router) = router();
    let (status, _, body) = send(&router, Method::GET, "/v2/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], error::NOT_FOUND_MESSAGE);
}
