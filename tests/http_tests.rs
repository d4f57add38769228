// HTTP API tests driven through the router without binding a socket

mod common;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{meeting_page, test_settings, FakeSandboxFactory};
use loqa_meetbot::http::{create_router, AppState};
use loqa_meetbot::jobs::BotManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn router(temp_dir: &TempDir) -> axum::Router {
    let settings = test_settings(temp_dir.path());
    let page = meeting_page(&settings);
    let manager = BotManager::new(Arc::new(FakeSandboxFactory { page }), settings);
    create_router(AppState::new(manager))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test(start_paused = true)]
async fn test_health_check() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let response = router(&temp_dir).oneshot(get("/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_create_and_fetch_bot() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = router(&temp_dir);

    let response = app
        .clone()
        .oneshot(post_json(
            "/bots",
            json!({
                "job_id": "job-1",
                "meeting_url": "https://meet.google.com/abc-defg-hij",
                "bot_name": "Scribe"
            }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let job = json_body(response).await?;
    assert_eq!(job["id"], "job-1");
    assert_eq!(job["platform"], "google_meet");
    assert_eq!(job["bot_name"], "Scribe");

    let response = app.clone().oneshot(get("/bots/job-1")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["id"], "job-1");

    let response = app.clone().oneshot(get("/bots")).await?;
    let list = json_body(response).await?;
    assert_eq!(list["jobs"].as_array().map(Vec::len), Some(1));

    let response = app
        .oneshot(post_json("/bots/job-1/stop", json!({})))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["status"], "failed");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rejects_empty_meeting_url() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let response = router(&temp_dir)
        .oneshot(post_json("/bots", json!({ "meeting_url": "  " })))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await?["error"],
        "meeting_url is required"
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_job_conflicts() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = router(&temp_dir);
    let body = json!({ "job_id": "dup", "meeting_url": "https://meet.google.com/x" });

    let first = app.clone().oneshot(post_json("/bots", body.clone())).await?;
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = app.oneshot(post_json("/bots", body)).await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unknown_bot_is_not_found() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let app = router(&temp_dir);

    let response = app.clone().oneshot(get("/bots/nope")).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(post_json("/bots/nope/stop", json!({}))).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
