//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/evaluation", get(http::http_get_evaluation))
        .route("/api/v1/evaluation/generate", post(http::http_generate_evaluation))
        .route("/api/v1/session", post(http::http_start_session))
        .route("/api/v1/session/answer", post(http::http_submit_answer))
        .route("/api/v1/session/next", post(http::http_next))
        .route("/api/v1/session/prev", post(http::http_prev))
        .route("/api/v1/session/finish", post(http::http_finish))
        .route("/api/v1/short_answer/judge", post(http::http_judge_short_answer))
        .route("/api/v1/results", post(http::http_post_results))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(Arc::new(AppState::from_config(None, None)))
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let res = app()
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_evaluation_is_not_ready() {
        let res = app()
            .oneshot(
                Request::get("/api/v1/evaluation?mediaId=nothing-here")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn seeded_evaluation_is_served() {
        let res = app()
            .oneshot(
                Request::get("/api/v1/evaluation?mediaId=demo-article-001&personalizationId=demo-user")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["mediaId"], "demo-article-001");
        assert!(v["evaluationData"]["evaluation"].is_array());
    }

    #[tokio::test]
    async fn session_flow_over_http() {
        let app = app();

        let res = app
            .clone()
            .oneshot(post_json(
                "/api/v1/session",
                r#"{"mediaId":"demo-article-001","personalizationId":"demo-user"}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let session = json_body(res).await;
        let sid = session["sessionId"].as_str().unwrap().to_string();
        assert_eq!(session["position"]["phaseIndex"], 0);
        assert_eq!(session["position"]["itemIndex"], 0);

        // Wrong-kind answer is rejected without writing feedback.
        let res = app
            .clone()
            .oneshot(post_json(
                "/api/v1/session/answer",
                format!(r#"{{"sessionId":"{sid}","itemId":"fc1","answer":{{"kind":"multiple_choice","index":0}}}}"#),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        // A matching answer produces feedback.
        let res = app
            .clone()
            .oneshot(post_json(
                "/api/v1/session/answer",
                format!(r#"{{"sessionId":"{sid}","itemId":"mc1","answer":{{"kind":"multiple_choice","index":2}}}}"#),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["feedback"]["correct"], true);

        // Resubmission conflicts.
        let res = app
            .clone()
            .oneshot(post_json(
                "/api/v1/session/answer",
                format!(r#"{{"sessionId":"{sid}","itemId":"mc1","answer":{{"kind":"multiple_choice","index":0}}}}"#),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        // Finishing mid-document conflicts too.
        let res = app
            .clone()
            .oneshot(post_json(
                "/api/v1/session/finish",
                format!(r#"{{"sessionId":"{sid}"}}"#),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn judge_endpoint_uses_local_fallback_without_openai() {
        let res = app()
            .oneshot(post_json(
                "/api/v1/short_answer/judge",
                r#"{"question":"Wo wohnst du?","answer":"ich wohne in berlin","modelAnswer":"Ich wohne in Berlin"}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["correct"], true);
        assert!(v["modelAnswer"].is_string());
    }

    #[tokio::test]
    async fn results_endpoint_records() {
        let res = app()
            .oneshot(post_json(
                "/api/v1/results",
                r#"{"evaluationId":"e1","personalizationId":"p1","correctNumbers":[1,2],"incorrectNumbers":[3],"score":67}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["ok"], true);
    }
}
