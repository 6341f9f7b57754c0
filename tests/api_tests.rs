//! HTTP API tests against the router, driven with `tower::ServiceExt::oneshot`.
mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{FakeLlm, rag_system, rag_system_at, text, tool_use, write_docs};
use coursebot::server::{AppState, create_router};

fn router(llm: Arc<FakeLlm>) -> (Router, AppState) {
    let state = AppState::new(Arc::new(rag_system(llm)));
    let router = create_router(state.clone(), &["*".to_string()], None);
    (router, state)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_query(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/query")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// POST /api/query
// =============================================================================

#[tokio::test]
async fn test_query_creates_session() {
    let (router, _) = router(Arc::new(FakeLlm::new(vec![Ok(text("Hello there."))])));

    let (status, body) = send(&router, post_query(r#"{"query": "What is MCP?"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Hello there.");
    assert_eq!(body["sources"], json!([]));
    assert_eq!(body["session_id"], "session_1");
}

#[tokio::test]
async fn test_query_reuses_session_and_history() {
    let llm = Arc::new(FakeLlm::new(vec![Ok(text("first answer")), Ok(text("second answer"))]));
    let (router, _) = router(llm.clone());

    let (_, first) = send(&router, post_query(r#"{"query": "first question"}"#)).await;
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let body = json!({"query": "second question", "session_id": session_id}).to_string();
    let (status, second) = send(&router, post_query(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["session_id"], session_id.as_str());
    let system = llm.requests()[1].system.clone().unwrap();
    assert!(system.contains("User: first question\nAssistant: first answer"));
}

#[tokio::test]
async fn test_query_returns_sources_with_links() {
    let llm = Arc::new(FakeLlm::new(vec![
        Ok(tool_use(
            "toolu_1",
            "search_course_content",
            json!({"query": "desktop", "course_name": "Computer Use", "lesson_number": 0}),
        )),
        Ok(text("It drives a desktop.")),
    ]));
    let (router, state) = router(llm);
    let docs = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    state.rag.add_course_folder(docs.path(), false).await.unwrap();

    let (status, body) = send(&router, post_query(r#"{"query": "What is computer use?"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "It drives a desktop.");
    assert_eq!(
        body["sources"],
        json!([{
            "text": "Building Towards Computer Use with Anthropic - Lesson 0",
            "link": "https://example.com/computer-use/0"
        }])
    );
}

#[tokio::test]
async fn test_query_missing_field_is_422() {
    let (router, _) = router(Arc::new(FakeLlm::default()));
    let (status, body) = send(&router, post_query(r#"{"session_id": "abc"}"#)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_query_malformed_json_is_422() {
    let (router, _) = router(Arc::new(FakeLlm::default()));
    let (status, body) = send(&router, post_query("{not json")).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_query_wrong_method_is_405() {
    let (router, _) = router(Arc::new(FakeLlm::default()));
    let (status, _) = send(&router, get("/api/query")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_query_failure_is_reported_in_answer() {
    let llm = Arc::new(FakeLlm::new(vec![Err(common::auth_error())]));
    let (router, _) = router(llm);

    let (status, body) = send(&router, post_query(r#"{"query": "hi"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().starts_with("Query failed: Invalid API key"));
}

// =============================================================================
// GET /api/courses
// =============================================================================

#[tokio::test]
async fn test_courses_empty_and_loaded() {
    let (router, state) = router(Arc::new(FakeLlm::default()));

    let (status, body) = send(&router, get("/api/courses")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"total_courses": 0, "course_titles": []}));

    let docs = tempfile::tempdir().unwrap();
    write_docs(docs.path());
    state.rag.add_course_folder(docs.path(), false).await.unwrap();

    let (_, body) = send(&router, get("/api/courses")).await;
    assert_eq!(body["total_courses"], 2);
    assert_eq!(
        body["course_titles"],
        json!(["Building Towards Computer Use with Anthropic", "Prompt Caching"])
    );
}

#[tokio::test]
async fn test_courses_wrong_method_is_405() {
    let (router, _) = router(Arc::new(FakeLlm::default()));
    let request = Request::builder()
        .method("POST")
        .uri("/api/courses")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_courses_store_failure_is_500() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("vectors.db");
    let state = AppState::new(Arc::new(rag_system_at(
        Arc::new(FakeLlm::default()),
        &db_path,
    )));
    let router = create_router(state, &["*".to_string()], None);

    // Break the catalog behind the server's back.
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch("PRAGMA foreign_keys = OFF; DROP TABLE courses;")
        .unwrap();
    drop(conn);

    let (status, body) = send(&router, get("/api/courses")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("courses"));
}

// =============================================================================
// CORS
// =============================================================================

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method("OPTIONS")
        .uri("/api/query")
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let (router, _) = router(Arc::new(FakeLlm::default()));
    let response = router
        .clone()
        .oneshot(preflight("http://localhost:3000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn test_cors_origin_list() {
    let state = AppState::new(Arc::new(rag_system(Arc::new(FakeLlm::default()))));
    let router = create_router(state, &["http://localhost:3000".to_string()], None);

    let allowed = router
        .clone()
        .oneshot(preflight("http://localhost:3000"))
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );

    let denied = router
        .clone()
        .oneshot(preflight("http://evil.example"))
        .await
        .unwrap();
    assert!(
        denied
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

// =============================================================================
// DELETE /api/session/:id
// =============================================================================

#[tokio::test]
async fn test_clear_session() {
    let (router, state) = router(Arc::new(FakeLlm::default()));
    let id = state.rag.sessions().create_session();
    state.rag.sessions().add_exchange(&id, "q", "a");

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/session/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Session cleared successfully"}));
    assert_eq!(state.rag.sessions().get_conversation_history(&id), None);
}

// =============================================================================
// Root and static files
// =============================================================================

#[tokio::test]
async fn test_root_without_frontend() {
    let (router, _) = router(Arc::new(FakeLlm::default()));
    let (status, body) = send(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "RAG System API is running"}));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (router, _) = router(Arc::new(FakeLlm::default()));
    let (status, _) = send(&router, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_serves_frontend_dir() {
    let frontend = tempfile::tempdir().unwrap();
    std::fs::write(frontend.path().join("index.html"), "<h1>Course Materials</h1>").unwrap();

    let state = AppState::new(Arc::new(rag_system(Arc::new(FakeLlm::default()))));
    let router = create_router(state, &["*".to_string()], Some(frontend.path()));

    let response = router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"<h1>Course Materials</h1>");

    // API routes still win over the static fallback.
    let (status, body) = send(&router, get("/api/courses")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_courses"], 0);
}
