//! Route handlers and error mapping.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lectern_agent::QueryResponse;
use lectern_core::error::LecternError;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::server::AppState;

/// Engine error rendered as `{error, message}` with a matching status.
pub struct ApiError(pub LecternError);

impl From<LecternError> for ApiError {
    fn from(e: LecternError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LecternError::InvalidArgument(rejection.body_text()))
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            LecternError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            LecternError::UnknownSession(_) => (StatusCode::NOT_FOUND, "unknown_session"),
            LecternError::BackendUnavailable { .. }
            | LecternError::Provider(_)
            | LecternError::ProviderNotFound(_)
            | LecternError::ApiKeyMissing(_)
            | LecternError::Http(_)
            | LecternError::Store(_) => (StatusCode::BAD_GATEWAY, "backend_unavailable"),
            LecternError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!("❌ {}", self.0);
        }
        (status, Json(json!({ "error": kind, "message": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearSessionRequest {
    pub session_id: String,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(req) = payload?;
    let resp = state
        .engine
        .submit_query(&req.query, req.session_id.as_deref())
        .await?;
    Ok(Json(resp))
}

pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClearSessionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    state.engine.clear_session(&req.session_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Session cleared successfully",
    })))
}

pub async fn course_stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let stats = state.engine.stats().await?;
    let titles: Vec<&str> = stats.per_source.iter().map(|s| s.title.as_str()).collect();
    Ok(Json(json!({
        "total_courses": stats.total_sources,
        "course_titles": titles,
        "total_lessons": stats.total_sections,
        "total_chunks": stats.total_chunks,
        "courses": stats.per_source,
    })))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let provider_ok = state.engine.health_check().await.unwrap_or(false);
    Json(json!({
        "status": "ok",
        "service": "lectern-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "provider": state.engine.provider_name(),
        "provider_ready": provider_ok,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use lectern_agent::{IngestOptions, QueryEngine};
    use lectern_core::config::RagConfig;
    use lectern_core::error::Result;
    use lectern_core::traits::{GenerateParams, Provider, VectorIndex};
    use lectern_core::types::{
        Chunk, IndexStats, Message, ProviderResponse, SearchFilter, SearchResults, SourceRecord,
        ToolCall, ToolDefinition,
    };
    use lectern_knowledge::{RawDocument, SqliteVectorStore};
    use lectern_providers::HashingEmbedder;
    use tower::ServiceExt;

    /// Searches once, then answers; errors if asked about "outage".
    struct TwoStep;

    #[async_trait]
    impl Provider for TwoStep {
        fn name(&self) -> &str {
            "two-step"
        }
        async fn chat(
            &self,
            messages: &[Message],
            _: &[ToolDefinition],
            _: &GenerateParams,
        ) -> Result<ProviderResponse> {
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            if last == "outage" {
                return Err(LecternError::backend("two-step", "503 from upstream"));
            }
            if messages.iter().any(|m| m.tool_call_id.is_some()) {
                return Ok(ProviderResponse::text("Lesson 1 introduces MCP."));
            }
            Ok(ProviderResponse::tool_calls(vec![ToolCall::new(
                "c1",
                "search_course_content",
                r#"{"query": "intro"}"#,
            )]))
        }
    }

    /// Index whose database is gone.
    struct BrokenIndex;

    fn broken() -> LecternError {
        LecternError::backend("index", "database disk image is malformed")
    }

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        async fn upsert_source(&self, _: &SourceRecord) -> Result<()> {
            Err(broken())
        }
        async fn upsert_chunks(&self, _: &[Chunk]) -> Result<usize> {
            Err(broken())
        }
        async fn replace_source(&self, _: &SourceRecord, _: &[Chunk]) -> Result<usize> {
            Err(broken())
        }
        async fn query(&self, _: &str, _: usize, _: &SearchFilter) -> Result<SearchResults> {
            Err(broken())
        }
        async fn stats(&self) -> Result<IndexStats> {
            Err(broken())
        }
        async fn source_titles(&self) -> Result<Vec<String>> {
            Err(broken())
        }
        async fn resolve_source(&self, _: &str) -> Result<Option<SourceRecord>> {
            Err(broken())
        }
        async fn remove_source(&self, _: &str) -> Result<bool> {
            Err(broken())
        }
        async fn clear(&self) -> Result<()> {
            Err(broken())
        }
    }

    async fn app() -> axum::Router {
        let index = SqliteVectorStore::open_in_memory(Arc::new(HashingEmbedder::new(64).unwrap())).unwrap();
        let engine = QueryEngine::new(
            RagConfig::default(),
            GenerateParams::default(),
            Box::new(TwoStep),
            Arc::new(index),
        )
        .unwrap();
        engine
            .ingest_documents(
                &[RawDocument {
                    name: "mcp".into(),
                    text: "Course Title: Intro to MCP\nLesson 1: Start\nThe intro to MCP.".into(),
                }],
                IngestOptions::default(),
            )
            .await
            .unwrap();
        build_router(AppState::new(Arc::new(engine)))
    }

    async fn send(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_query_returns_answer_and_sources() {
        let (status, body) = send(app().await, "POST", "/api/query", Some(json!({"query": "What is MCP?"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Lesson 1 introduces MCP.");
        assert_eq!(body["sources"], json!(["Intro to MCP - Lesson 1"]));
        assert!(body["session_id"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let (status, body) = send(app().await, "POST", "/api/query", Some(json!({"query": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_argument");
    }

    #[tokio::test]
    async fn test_backend_failure_is_bad_gateway() {
        let (status, body) = send(app().await, "POST", "/api/query", Some(json!({"query": "outage"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap().contains("503 from upstream"));
    }

    #[tokio::test]
    async fn test_index_failure_is_bad_gateway() {
        let engine = QueryEngine::new(
            RagConfig::default(),
            GenerateParams::default(),
            Box::new(TwoStep),
            Arc::new(BrokenIndex),
        )
        .unwrap();
        let app = build_router(AppState::new(Arc::new(engine)));
        let (status, body) = send(app, "GET", "/api/courses", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "backend_unavailable");
        assert!(body["message"].as_str().unwrap().contains("disk image is malformed"));
    }

    #[test]
    fn test_store_errors_map_to_bad_gateway() {
        let err = ApiError(LecternError::Store("embedding dimension mismatch".into()));
        assert_eq!(err.status_and_kind(), (StatusCode::BAD_GATEWAY, "backend_unavailable"));
        let err = ApiError(LecternError::Other("boom".into()));
        assert_eq!(err.status_and_kind().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_body_is_structured_bad_request() {
        let app = app().await;
        let req = Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from("{\"query\": "))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "invalid_argument");
        assert!(!body["message"].as_str().unwrap().is_empty());

        let (status, body) = send(app, "POST", "/api/clear-session", Some(json!({"id": 7}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_argument");
    }

    #[tokio::test]
    async fn test_clear_unknown_session_is_not_found() {
        let (status, body) = send(
            app().await,
            "POST",
            "/api/clear-session",
            Some(json!({"session_id": "missing"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown_session");
    }

    #[tokio::test]
    async fn test_clear_known_session() {
        let app = app().await;
        let (_, body) = send(app.clone(), "POST", "/api/query", Some(json!({"query": "hi"}))).await;
        let id = body["session_id"].clone();
        let (status, body) = send(app, "POST", "/api/clear-session", Some(json!({"session_id": id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_courses() {
        let (status, body) = send(app().await, "GET", "/api/courses", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_courses"], 1);
        assert_eq!(body["course_titles"], json!(["Intro to MCP"]));
        assert_eq!(body["total_lessons"], 1);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app().await, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "two-step");
    }
}
