use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use millboard::{config::Config, db::Database, AppState};

/// Router over a pool that never connects; only routes that avoid the store can succeed
fn test_app() -> Router {
    let source = config::Config::builder()
        .set_override("database.url", "postgres://localhost/millboard_test")
        .unwrap()
        .build()
        .unwrap();
    let config = Config::from_source(source).unwrap();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .unwrap();

    millboard::app(AppState::new(Database::new(pool), config))
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
        "DENY"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_board_routes_require_session() {
    let response = test_app()
        .oneshot(Request::get("/api/v1/boards").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_foreign_token_rejected_before_lookup() {
    let response = test_app()
        .oneshot(
            Request::get("/api/v1/reports/sheets/boards.csv")
                .header(header::AUTHORIZATION, "Bearer abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stream_requires_session() {
    let response = test_app()
        .oneshot(Request::get("/api/v1/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_malformed_body() {
    let response = test_app()
        .oneshot(
            Request::post("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"admin@smw.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route() {
    let response = test_app()
        .oneshot(Request::get("/api/v1/nothing-here").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
