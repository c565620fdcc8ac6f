//! Report API Integration Tests
//!
//! Tests full HTTP request/response cycles for the session endpoints

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use reporter::notify::LogDispatcher;
use reporter::session_store::SqliteSessionStore;
use reporter::store::{SqliteLessonLookup, SqliteReportStore};
use reporter::{api, db, AppState, Engine};

/// Generate a unique test conversation ID
fn test_conversation_id() -> String {
    format!("test-chat-{}", uuid::Uuid::new_v4())
}

async fn setup_test_app() -> axum::Router {
    let pool = db::connect_in_memory().await.expect("in-memory db");
    sqlx::query("INSERT INTO students (id, full_name) VALUES (1, 'Ann Lee'), (2, 'Bo Park')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO lessons (id, kind, lesson_date, student_id) VALUES
            (10, 'individual', '2026-10-01', 1),
            (20, 'group', '2026-10-02', NULL),
            (30, 'group', '2026-10-03', NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO lesson_students (lesson_id, student_id, position) VALUES (20, 1, 0), (20, 2, 1)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let engine = Engine::new(
        Arc::new(SqliteReportStore::new(pool.clone())),
        Arc::new(SqliteLessonLookup::new(pool.clone())),
        Arc::new(LogDispatcher),
        Arc::new(SqliteSessionStore::new(pool, Duration::from_secs(3600))),
    );
    api::router().with_state(Arc::new(AppState::new(engine)))
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("Invalid JSON response")
    };
    (status, value)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bare(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;
    let (status, body) = json_response(&app, bare("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_individual_interview_over_http() {
    let app = setup_test_app().await;
    let chat = test_conversation_id();

    let (status, body) = json_response(
        &app,
        post(&format!("/sessions/{chat}"), json!({ "lesson_id": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["flow"], "individual");
    assert_eq!(body["prompt"]["state"], "AWAIT_ATTENDED");
    assert_eq!(body["prompt"]["expects"], "choice");

    let input_uri = format!("/sessions/{chat}/input");
    let answers = [
        json!({ "type": "token", "value": "yes" }),
        json!({ "type": "choice", "value": true }),
        json!({ "type": "choice", "value": false }),
        json!({ "type": "text", "value": "Solid work" }),
    ];
    let expected_states = [
        "AWAIT_PAID",
        "AWAIT_HOMEWORK",
        "AWAIT_STUDENT_NOTE",
        "AWAIT_PARENT_NOTE",
    ];
    for (answer, expected) in answers.into_iter().zip(expected_states) {
        let (status, body) = json_response(&app, post(&input_uri, answer)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "prompt");
        assert_eq!(body["state"], expected);
    }

    let (status, body) = json_response(
        &app,
        post(&input_uri, json!({ "type": "text", "value": "-" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "completed");
    assert_eq!(body["reports"].as_array().unwrap().len(), 1);
    assert_eq!(body["reports"][0]["student_note"], "Solid work");
    assert_eq!(body["failed_deliveries"], json!([]));

    let (status, body) = json_response(&app, bare("GET", &format!("/sessions/{chat}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_active_session");
}

#[tokio::test]
async fn test_group_student_advance_over_http() {
    let app = setup_test_app().await;
    let chat = test_conversation_id();
    let input_uri = format!("/sessions/{chat}/input");

    let (_, body) = json_response(
        &app,
        post(&format!("/sessions/{chat}"), json!({ "lesson_id": 20 })),
    )
    .await;
    assert_eq!(body["prompt"]["state"], "AWAIT_GROUP_HELD");

    json_response(&app, post(&input_uri, json!({ "type": "token", "value": "1" }))).await;
    for answer in [
        json!({ "type": "choice", "value": true }),
        json!({ "type": "choice", "value": true }),
        json!({ "type": "choice", "value": true }),
        json!({ "type": "text", "value": "-" }),
    ] {
        json_response(&app, post(&input_uri, answer)).await;
    }

    let (status, body) = json_response(
        &app,
        post(&input_uri, json!({ "type": "text", "value": "-" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "student_advanced");
    assert_eq!(body["prior_student_id"], 1);
    assert_eq!(body["next"]["student"]["student_id"], 2);

    let (status, body) = json_response(&app, bare("GET", &format!("/sessions/{chat}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["current_index"], 1);
    assert_eq!(body["prompt"]["state"], "AWAIT_ATTENDED");
}

#[tokio::test]
async fn test_reprompt_and_bad_token() {
    let app = setup_test_app().await;
    let chat = test_conversation_id();
    let input_uri = format!("/sessions/{chat}/input");
    json_response(
        &app,
        post(&format!("/sessions/{chat}"), json!({ "lesson_id": 10 })),
    )
    .await;

    let (status, body) = json_response(
        &app,
        post(&input_uri, json!({ "type": "text", "value": "he was there" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "prompt");
    assert_eq!(body["reprompt"], true);
    assert_eq!(body["state"], "AWAIT_ATTENDED");

    let (status, body) = json_response(
        &app,
        post(&input_uri, json!({ "type": "token", "value": "perhaps" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_error_mapping() {
    let app = setup_test_app().await;
    let chat = test_conversation_id();

    let (status, body) = json_response(
        &app,
        post(&format!("/sessions/{chat}"), json!({ "lesson_id": 404 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "lesson_not_found");

    let (status, body) = json_response(
        &app,
        post(&format!("/sessions/{chat}"), json!({ "lesson_id": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "empty_group");

    let (status, body) = json_response(
        &app,
        post(
            &format!("/sessions/{chat}/input"),
            json!({ "type": "choice", "value": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_active_session");
}

#[tokio::test]
async fn test_cancel_session() {
    let app = setup_test_app().await;
    let chat = test_conversation_id();
    json_response(
        &app,
        post(&format!("/sessions/{chat}"), json!({ "lesson_id": 10 })),
    )
    .await;

    let (status, _) = json_response(&app, bare("DELETE", &format!("/sessions/{chat}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = json_response(&app, bare("GET", &format!("/sessions/{chat}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
