//! API layer - HTTP handlers and routing
//!
//! - `/api/v1/...` JSON API (auth, support, news, stories, journal,
//!   wellness, site, admin)
//! - `/api/gemini-chat` streaming chat proxy
//! - `/api/contact` contact form with its own CORS policy

pub mod admin;
pub mod auth;
pub mod chat;
pub mod common;
pub mod contact;
pub mod journal;
pub mod middleware;
pub mod news;
pub mod site;
pub mod stories;
pub mod support;
pub mod wellness;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    response::IntoResponse,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .nest("/admin/support", support::admin_router())
        .nest("/admin/news", news::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/journal", journal::router())
        .nest("/stories", stories::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/site", site::router())
        .nest("/news", news::public_router())
        .nest("/stories", stories::public_router())
        .nest("/support", support::public_router())
        .nest("/wellness", wellness::router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// CORS for the JSON API and chat; `*` disables credentials
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if cors_origin == "*" {
        return base.allow_origin(Any);
    }
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => base.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            tracing::warn!(cors_origin, "Invalid CORS origin, allowing any origin");
            base.allow_origin(Any)
        }
    }
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Route not found")
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors_routes = Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(chat::router())
        .layer(cors_layer(cors_origin));

    // The contact route answers its own preflight, so it stays outside the CORS layer
    Router::new()
        .merge(cors_routes)
        .merge(contact::router())
        .fallback(not_found)
        // Demo mode guard (blocks admin writes when compiled with --features demo)
        .layer(axum_middleware::from_fn(middleware::demo_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::ScriptedProvider;
    use crate::chat::ChatService;
    use crate::config::{Config, CrisisLine};
    use crate::db::{create_test_pool, migrations};
    use crate::services::email::testing::RecordingMailer;
    use crate::services::Mailer;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.resources.crisis_lines = vec![CrisisLine {
            name: "Test line".to_string(),
            phone: "000".to_string(),
            description: None,
            hours: Some("24/7".to_string()),
        }];
        config
    }

    async fn test_state(config: &Config, chat: ChatService) -> AppState {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let mailer: Arc<dyn Mailer> = Arc::new(RecordingMailer::default());
        AppState::new(pool, config, Some(mailer), chat).unwrap()
    }

    async fn server_with(chat: ChatService) -> TestServer {
        let state = test_state(&test_config(), chat).await;
        TestServer::new(build_router(state, "*")).unwrap()
    }

    async fn server() -> TestServer {
        server_with(ChatService::new(Arc::new(ScriptedProvider::replying(&["Hi", " friend"])), 20)).await
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    async fn register(server: &TestServer, email: &str) -> (String, Value) {
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({"email": email, "password": "password123", "display_name": "Aminata"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: Value = response.json();
        (body["token"].as_str().unwrap().to_string(), body["user"].clone())
    }

    #[tokio::test]
    async fn test_contact_missing_field() {
        let server = server().await;
        let response = server
            .post("/api/contact")
            .json(&json!({"city": "Freetown", "phone": "+23276000000"}))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        let body: Value = response.json();
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("message"));
    }

    #[tokio::test]
    async fn test_contact_success() {
        let server = server().await;
        let response = server
            .post("/api/contact")
            .json(&json!({"city": "Bo", "phone": "076000000", "message": "Please call", "name": "Musa"}))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_contact_invalid_json() {
        let server = server().await;
        let response = server.post("/api/contact").text("{not json").await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>(), json!({"ok": false, "error": "Invalid JSON"}));
    }

    #[tokio::test]
    async fn test_contact_preflight() {
        let server = server().await;
        let response = server.method(Method::OPTIONS, "/api/contact").await;

        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_METHODS), "POST, OPTIONS");
        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_HEADERS), "Content-Type");
    }

    #[tokio::test]
    async fn test_chat_streams_frames() {
        let server = server().await;
        let response = server
            .post("/api/gemini-chat")
            .json(&json!({"messages": [{"role": "user", "content": "hello"}]}))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.header(header::CONTENT_TYPE), "text/plain; charset=utf-8");
        assert_eq!(response.text(), "0:\"Hi\"\n0:\" friend\"\n");
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_conversation() {
        let server = server().await;
        let response = server.post("/api/gemini-chat").json(&json!({"messages": []})).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_upstream_failure_is_json_error() {
        let provider = ScriptedProvider {
            fail_before_start: true,
            ..Default::default()
        };
        let server = server_with(ChatService::new(Arc::new(provider), 20)).await;
        let response = server
            .post("/api/gemini-chat")
            .json(&json!({"messages": [{"role": "user", "content": "hello"}]}))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.json::<Value>()["error"]["code"], "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn test_chat_disabled() {
        let server = server_with(ChatService::disabled()).await;
        let response = server
            .post("/api/gemini-chat")
            .json(&json!({"messages": [{"role": "user", "content": "hello"}]}))
            .await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let server = server().await;
        let (token, user) = register(&server, "first@example.com").await;
        assert_eq!(user["role"], "admin");

        let me = server
            .get("/api/v1/auth/me")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        assert_eq!(me.status_code(), StatusCode::OK);
        assert_eq!(me.json::<Value>()["email"], "first@example.com");

        let login = server
            .post("/api/v1/auth/login")
            .json(&json!({"email": "first@example.com", "password": "wrong-password"}))
            .await;
        assert_eq!(login.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let server = server().await;
        let response = server.get("/api/v1/journal").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_journal_round_trip() {
        let server = server().await;
        let (token, _) = register(&server, "writer@example.com").await;

        let created = server
            .post("/api/v1/journal")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({"mood": 4, "content": "A calmer day"}))
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);

        let entries = server
            .get("/api/v1/journal")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .json::<Value>();
        assert_eq!(entries.as_array().unwrap().len(), 1);

        let stats = server
            .get("/api/v1/journal/stats")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .json::<Value>();
        assert_eq!(stats["total_entries"], 1);
        assert_eq!(stats["current_streak"], 1);
    }

    #[tokio::test]
    async fn test_admin_routes_forbid_members() {
        let server = server().await;
        let (admin_token, _) = register(&server, "admin@example.com").await;
        let (member_token, member) = register(&server, "member@example.com").await;
        assert_eq!(member["role"], "member");

        let forbidden = server
            .get("/api/v1/admin/dashboard")
            .add_header(header::AUTHORIZATION, bearer(&member_token))
            .await;
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let allowed = server
            .get("/api/v1/admin/dashboard")
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .await;
        assert_eq!(allowed.status_code(), StatusCode::OK);
        let dashboard = allowed.json::<Value>();
        assert_eq!(dashboard["total_users"], 2);
        assert_eq!(dashboard["database"]["driver"], "sqlite");
        assert_eq!(dashboard["database"]["healthy"], true);
    }

    #[tokio::test]
    async fn test_support_ticket_flow() {
        let server = server().await;
        let (admin_token, _) = register(&server, "admin@example.com").await;

        let created = server
            .post("/api/v1/support")
            .json(&json!({
                "name": "Fatmata",
                "email": "fatmata@example.com",
                "subject": "Need someone to talk to",
                "message": "Is there a counselor in Kenema?"
            }))
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);
        let id = created.json::<Value>()["id"].as_i64().unwrap();

        let updated = server
            .put(&format!("/api/v1/admin/support/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .json(&json!({"status": "resolved"}))
            .await;
        assert_eq!(updated.status_code(), StatusCode::OK);
        assert_eq!(updated.json::<Value>()["status"], "resolved");
    }

    #[tokio::test]
    async fn test_site_resources() {
        let server = server().await;
        let body = server.get("/api/v1/site/resources").await.json::<Value>();
        assert_eq!(body["crisis_lines"][0]["name"], "Test line");

        let info = server.get("/api/v1/site/info").await.json::<Value>();
        assert_eq!(info["chat_enabled"], true);
    }

    #[tokio::test]
    async fn test_wellness_breathing() {
        let server = server().await;
        let body = server
            .get("/api/v1/wellness/breathing")
            .add_query_param("elapsed", 5)
            .await
            .json::<Value>();
        assert_eq!(body["phase"], "hold");
        assert_eq!(body["remaining"], 4);

        let pose = server
            .get("/api/v1/wellness/pose")
            .add_query_param("t", 1.5)
            .await
            .json::<Value>();
        assert_eq!(pose["keypoints"].as_array().unwrap().len(), 17);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let server = server().await;
        let response = server.get("/api/v1/nothing-here").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_news_drafts_stay_private_until_published() {
        let server = server().await;
        let (admin_token, _) = register(&server, "admin@example.com").await;

        let draft = server
            .post("/api/v1/admin/news")
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .json(&json!({"title": "Clinic hours", "content": "Open **Saturday**", "published": false}))
            .await;
        assert_eq!(draft.status_code(), StatusCode::CREATED);
        let id = draft.json::<Value>()["id"].as_i64().unwrap();

        // Warm the cached public listing while the post is still a draft
        let listed = server.get("/api/v1/news").await.json::<Value>();
        assert_eq!(listed["total"], 0);
        let hidden = server.get(&format!("/api/v1/news/{}", id)).await;
        assert_eq!(hidden.status_code(), StatusCode::NOT_FOUND);

        let admin_view = server
            .get("/api/v1/admin/news")
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .await
            .json::<Value>();
        assert_eq!(admin_view["total"], 1);

        let published = server
            .put(&format!("/api/v1/admin/news/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .json(&json!({"published": true}))
            .await;
        assert_eq!(published.status_code(), StatusCode::OK);

        let listed = server.get("/api/v1/news").await.json::<Value>();
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["items"][0]["title"], "Clinic hours");
        assert!(listed["items"][0]["content_html"]
            .as_str()
            .unwrap()
            .contains("<strong>Saturday</strong>"));

        let deleted = server
            .delete(&format!("/api/v1/admin/news/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .await;
        assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(server.get("/api/v1/news").await.json::<Value>()["total"], 0);
    }

    #[tokio::test]
    async fn test_news_admin_routes_need_admin() {
        let server = server().await;
        let _ = register(&server, "admin@example.com").await;
        let (member_token, _) = register(&server, "member@example.com").await;

        let response = server
            .post("/api/v1/admin/news")
            .add_header(header::AUTHORIZATION, bearer(&member_token))
            .json(&json!({"title": "Nope", "content": "x", "published": true}))
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_story_delete_owner_or_admin_only() {
        let server = server().await;
        let (admin_token, _) = register(&server, "admin@example.com").await;
        let (author_token, _) = register(&server, "author@example.com").await;
        let (other_token, _) = register(&server, "other@example.com").await;

        let story = |title: &str| {
            json!({"category": "Recovery", "title": title, "content": "Talking to someone helped me."})
        };

        let created = server
            .post("/api/v1/stories")
            .add_header(header::AUTHORIZATION, bearer(&author_token))
            .json(&story("First step"))
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);
        let body = created.json::<Value>();
        let id = body["id"].as_i64().unwrap();
        assert_eq!(body["excerpt"], "Talking to someone helped me.");

        let anonymous = server.post("/api/v1/stories").json(&story("Anon")).await;
        assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

        let forbidden = server
            .delete(&format!("/api/v1/stories/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&other_token))
            .await;
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(server.get(&format!("/api/v1/stories/{}", id)).await.status_code(), StatusCode::OK);

        let by_owner = server
            .delete(&format!("/api/v1/stories/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&author_token))
            .await;
        assert_eq!(by_owner.status_code(), StatusCode::NO_CONTENT);

        let second = server
            .post("/api/v1/stories")
            .add_header(header::AUTHORIZATION, bearer(&author_token))
            .json(&story("Second step"))
            .await
            .json::<Value>();
        let by_admin = server
            .delete(&format!("/api/v1/stories/{}", second["id"].as_i64().unwrap()))
            .add_header(header::AUTHORIZATION, bearer(&admin_token))
            .await;
        assert_eq!(by_admin.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(server.get("/api/v1/stories").await.json::<Value>()["total"], 0);
    }

    fn login_from(peer: SocketAddr, forwarded_for: &str, attempt: usize) -> Request<Body> {
        let body = json!({"email": format!("nobody{}@example.com", attempt), "password": "password123"});
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::from(body.to_string()))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_dodge_ip_limit() {
        let state = test_state(&test_config(), ChatService::disabled()).await;
        let app = build_router(state, "*");
        let peer = SocketAddr::from(([192, 0, 2, 7], 5000));

        for attempt in 0..10 {
            let forwarded = format!("203.0.113.{}", attempt);
            let response = app.clone().oneshot(login_from(peer, &forwarded, attempt)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app.oneshot(login_from(peer, "203.0.113.99", 10)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_forwarded_for_counts_behind_trusted_proxy() {
        let mut config = test_config();
        config.server.trust_proxy = true;
        let state = test_state(&config, ChatService::disabled()).await;
        let app = build_router(state, "*");
        let proxy = SocketAddr::from(([10, 0, 0, 1], 5000));

        for attempt in 0..10 {
            let response = app.clone().oneshot(login_from(proxy, "203.0.113.1", attempt)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        // Another client behind the same proxy is still allowed
        let other = app.clone().oneshot(login_from(proxy, "203.0.113.2", 10)).await.unwrap();
        assert_eq!(other.status(), StatusCode::UNAUTHORIZED);

        let limited = app.oneshot(login_from(proxy, "203.0.113.1", 11)).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
