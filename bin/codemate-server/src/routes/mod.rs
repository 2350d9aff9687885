//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - CORS and per-request trace-ID middleware
//! - `/` and `/health`
//! - the user routes (`/chat`, `/history`, `/save`, `/suggest`, `/download`),
//!   behind bearer-token authentication when it is enabled
//! - `/auth/*` when authentication is enabled
//! - the OpenAPI document, plus Swagger UI with the `swagger-ui` feature

mod auth;
mod chat;
pub mod doc;
mod download;
mod health;
mod history;
mod suggest;

use std::sync::Arc;

use axum::{Router, middleware};
use tower::ServiceBuilder;

use crate::error::ServerError;
use crate::middleware::{auth::authenticate, cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut user_routes = Router::new()
        .merge(chat::router(state.clone()))
        .merge(history::router(state.clone()))
        .merge(suggest::router(state.clone()))
        .merge(download::router());

    let mut app = Router::new().merge(health::router());
    if state.config.enable_auth {
        user_routes =
            user_routes.route_layer(middleware::from_fn_with_state(state.clone(), authenticate));
        app = app.merge(auth::router());
    }
    app = app.merge(user_routes);

    #[cfg(feature = "swagger-ui")]
    {
        app = app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", doc::get_docs()),
        );
    }
    #[cfg(not(feature = "swagger-ui"))]
    {
        app = app.route("/api-docs/openapi.json", axum::routing::get(doc::openapi_json));
    }

    app.fallback(not_found)
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state.config)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

async fn not_found() -> ServerError {
    ServerError::NotFound("endpoint not found".into())
}

#[cfg(test)]
mod test {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use codemate_core::{ModelError, TextGenerator};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::entities::SqliteStore;

    /// Model that never loaded; every turn takes the fallback path.
    struct Offline;

    #[async_trait]
    impl TextGenerator for Offline {
        async fn generate(&self, _: &str, _: usize, _: f64) -> Result<String, ModelError> {
            Err(ModelError::NotLoaded)
        }

        fn is_loaded(&self) -> bool {
            false
        }
    }

    /// Always answers with one Python block.
    struct Scripted;

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _: &str, _: usize, _: f64) -> Result<String, ModelError> {
            Ok("Here you go:\n```python\ndef add(a, b):\n    return a + b\n```".into())
        }

        fn is_loaded(&self) -> bool {
            true
        }
    }

    fn test_config() -> Config {
        Config {
            bcrypt_cost: 4,
            ..Config::default()
        }
    }

    fn app_without_db(config: Config, generator: Arc<dyn TextGenerator>) -> Router {
        build(AppState::new(config, generator, None))
    }

    async fn app_with_db(config: Config, generator: Arc<dyn TextGenerator>) -> Router {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        build(AppState::new(config, generator, Some(Arc::new(store))))
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, username: &str) -> Value {
        let res = send(
            app,
            post_json(
                "/auth/register",
                json!({"username": username, "password": "correct-horse"}),
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        json_body(res).await
    }

    #[tokio::test]
    async fn health_reports_model_and_database() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(&app, get("/health", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(trace::X_TRACE_ID));
        let body = json_body(res).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_loaded"], false);
        assert_eq!(body["database_connected"], false);
    }

    #[tokio::test]
    async fn root_lists_auth_endpoints_when_enabled() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let body = json_body(send(&app, get("/", None)).await).await;
        let endpoints = body["endpoints"].as_array().unwrap();
        assert!(endpoints.iter().any(|e| e == "POST /auth/login"));
    }

    #[tokio::test]
    async fn chat_falls_back_to_mock_without_model() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(
            &app,
            post_json("/chat", json!({"message": "hello there"}), None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["mock_response"], true);
        assert!(!body["response"].as_str().unwrap().is_empty());
        assert!(body["suggestions"].is_array());
    }

    #[tokio::test]
    async fn malformed_chat_body_is_unprocessable() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(&app, post_json("/chat", json!({"text": "hi"}), None)).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_body(res).await["error"].is_string());

        let res = send(&app, post_json("/chat", json!({"message": "   "}), None)).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn oversized_chat_message_is_unprocessable() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(
            &app,
            post_json("/chat", json!({"message": "a".repeat(16_385)}), None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let res = send(
            &app,
            post_json("/chat", json!({"message": "a".repeat(16_384)}), None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_is_rate_limited_per_client() {
        let mut config = test_config();
        config.rate_limits.chat = 2;
        let app = app_without_db(config, Arc::new(Offline));
        for _ in 0..2 {
            let res = send(&app, post_json("/chat", json!({"message": "hi"}), None)).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = send(&app, post_json("/chat", json!({"message": "hi"}), None)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key(header::RETRY_AFTER));

        // Other route groups keep their own budget.
        let res = send(&app, get("/history/someone", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_user_has_empty_history() {
        let app = app_with_db(test_config(), Arc::new(Offline)).await;
        let res = send(&app, get("/history/nobody", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["history"], json!([]));
        assert_eq!(body["database_connected"], true);
    }

    #[tokio::test]
    async fn save_then_read_history() {
        let app = app_with_db(test_config(), Arc::new(Offline)).await;
        let messages = json!([
            {"role": "user", "content": "How do I sort a list?", "timestamp": "2026-01-01T00:00:00Z", "code_blocks": []},
            {"role": "assistant", "content": "Use sorted().", "timestamp": "2026-01-01T00:00:01Z", "code_blocks": []}
        ]);
        let res = send(
            &app,
            post_json("/save/u-42", json!({"messages": messages}), None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["saved"], true);
        assert_eq!(body["count"], 2);

        let body = json_body(send(&app, get("/history/u-42?limit=1", None)).await).await;
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["content"], "Use sorted().");
    }

    #[tokio::test]
    async fn save_without_database_reports_failure() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let messages = json!([
            {"role": "user", "content": "hi", "timestamp": "2026-01-01T00:00:00Z", "code_blocks": []}
        ]);
        let body = json_body(
            send(&app, post_json("/save/u-1", json!({"messages": messages}), None)).await,
        )
        .await;
        assert_eq!(body["saved"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn register_login_and_duplicate() {
        let app = app_with_db(test_config(), Arc::new(Offline)).await;
        let registered = register(&app, "alice").await;
        assert_eq!(registered["token_type"], "bearer");
        assert!(registered["access_token"].is_string());

        let res = send(
            &app,
            post_json(
                "/auth/register",
                json!({"username": "alice", "password": "another-secret"}),
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = send(
            &app,
            post_json(
                "/auth/login",
                json!({"username": "alice", "password": "correct-horse"}),
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["user_id"], registered["user_id"]);

        let res = send(
            &app,
            post_json(
                "/auth/login",
                json!({"username": "alice", "password": "wrong-password"}),
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_without_database_is_unavailable() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(
            &app,
            post_json(
                "/auth/register",
                json!({"username": "bob", "password": "correct-horse"}),
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn tokens_guard_user_routes() {
        let app = app_with_db(test_config(), Arc::new(Offline)).await;
        let alice = register(&app, "alice").await;
        let token = alice["access_token"].as_str().unwrap();
        let user_id = alice["user_id"].as_str().unwrap();

        let res = send(&app, get(&format!("/history/{user_id}"), Some(token))).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(&app, get("/history/someone-else", Some(token))).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = send(&app, get(&format!("/history/{user_id}"), Some("not-a-jwt"))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn required_auth_rejects_anonymous_calls() {
        let mut config = test_config();
        config.require_auth = true;
        let app = app_without_db(config, Arc::new(Offline));
        let res = send(&app, post_json("/chat", json!({"message": "hi"}), None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        // Public routes stay open.
        let res = send(&app, get("/health", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn authenticated_chat_is_persisted() {
        let app = app_with_db(test_config(), Arc::new(Scripted)).await;
        let alice = register(&app, "alice").await;
        let token = alice["access_token"].as_str().unwrap();
        let user_id = alice["user_id"].as_str().unwrap();

        let res = send(
            &app,
            post_json("/chat", json!({"message": "write an add function"}), Some(token)),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = json_body(send(&app, get(&format!("/history/{user_id}"), Some(token))).await).await;
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[1]["role"], "assistant");

        let body = json_body(send(&app, get(&format!("/suggest/{user_id}"), Some(token))).await).await;
        assert_eq!(body["user_id"], user_id);
    }

    #[tokio::test]
    async fn download_serves_last_generated_block() {
        let app = app_without_db(test_config(), Arc::new(Scripted));
        let res = send(
            &app,
            post_json("/chat", json!({"message": "write an add function"}), None),
        )
        .await;
        let body = json_body(res).await;
        assert_eq!(body["code_blocks"][0]["language"], "python");

        let res = send(&app, get("/download/code", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"code.py\""
        );
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.starts_with(b"def add(a, b):"));
    }

    #[tokio::test]
    async fn download_with_explicit_code_and_name() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(
            &app,
            get("/download/code?code=fn%20main()%20%7B%7D&filename=main.rs", None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"main.rs\""
        );
    }

    #[tokio::test]
    async fn download_without_code_is_not_found() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(&app, get("/download/code", None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(&app, get("/nope", None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"], "endpoint not found");
    }

    #[tokio::test]
    async fn openapi_document_lists_chat() {
        let app = app_without_db(test_config(), Arc::new(Offline));
        let res = send(&app, get("/api-docs/openapi.json", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert!(body["paths"]["/chat"].is_object());
        assert!(body["paths"]["/download/code"].is_object());
    }
}
