//! Service graph and HTTP router assembly.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::core::config::Config;
use crate::core::middleware::{self, AuthState};
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::features::admin::{routes as admin_routes, AdminService};
use crate::features::audit::AuditService;
use crate::features::auth::JwtValidator;
use crate::features::community::{routes as community_routes, CommunityService};
use crate::features::notifications::{routes as notifications_routes, NotificationService};
use crate::features::reports::{routes as reports_routes, ReportService};
use crate::features::session::{routes as session_routes, SessionRegistry};
use crate::features::users::{routes as users_routes, UserService};
use crate::modules::backend::Backend;
use crate::modules::storage::ObjectStorage;

/// Every service of the application, wired over one backend and one object
/// store.
#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn Backend>,
    pub storage: Arc<dyn ObjectStorage>,
    pub validator: Arc<JwtValidator>,
    pub sessions: Arc<SessionRegistry>,
    pub users: Arc<UserService>,
    pub notifications: Arc<NotificationService>,
    pub audit: Arc<AuditService>,
    pub reports: Arc<ReportService>,
    pub admin: Arc<AdminService>,
    pub community: Arc<CommunityService>,
}

impl Services {
    pub fn new(
        config: &Config,
        backend: Arc<dyn Backend>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let validator = Arc::new(JwtValidator::new(&config.auth));
        let sessions = Arc::new(SessionRegistry::new(config.session.idle_timeout));
        let users = Arc::new(UserService::new(backend.clone()));
        let notifications = Arc::new(NotificationService::new(backend.clone(), users.clone()));
        let audit = Arc::new(AuditService::new(backend.clone()));
        let reports = Arc::new(ReportService::new(
            backend.clone(),
            users.clone(),
            notifications.clone(),
            storage.clone(),
        ));
        let admin = Arc::new(AdminService::new(
            backend.clone(),
            storage.clone(),
            users.clone(),
            notifications.clone(),
            audit.clone(),
            sessions.clone(),
        ));
        let community = Arc::new(CommunityService::new(
            backend.clone(),
            users.clone(),
            audit.clone(),
        ));

        Self {
            backend,
            storage,
            validator,
            sessions,
            users,
            notifications,
            audit,
            reports,
            admin,
            community,
        }
    }
}

/// Simple health check endpoint (no auth required)
async fn health_check() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}

/// Routes behind JWT authentication and session tracking.
pub fn api_router(services: &Services, config: &Config) -> Router {
    let auth_state = AuthState {
        validator: services.validator.clone(),
        sessions: services.sessions.clone(),
    };

    Router::new()
        .merge(users_routes::routes(services.users.clone()))
        .merge(session_routes::routes(
            services.sessions.clone(),
            services.users.clone(),
        ))
        .merge(reports_routes::routes(services.reports.clone()))
        .merge(notifications_routes::routes(
            services.notifications.clone(),
            services.sessions.clone(),
        ))
        .merge(community_routes::routes(services.community.clone()))
        .nest(
            "/api/admin",
            admin_routes::routes(
                services.admin.clone(),
                services.sessions.clone(),
                config.admin.clone(),
            ),
        )
        .route_layer(from_fn_with_state(auth_state, middleware::auth_middleware))
}

fn swagger_router(config: &Config) -> Router {
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger =
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi));

    if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        swagger.layer(from_fn(middleware::basic_auth_middleware(Arc::new(
            credentials,
        ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        swagger
    }
}

/// Full application: API, swagger, health check and the HTTP layers.
pub fn build_router(services: &Services, config: &Config) -> Router {
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(swagger_router(config))
        .merge(api_router(services, config))
        .merge(health_route)
        .layer(DefaultBodyLimit::max(config.app.max_request_body_size))
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use std::future::IntoFuture;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestWebSocket;
    use serde_json::{json, Value};

    use crate::features::auth::model::{AuthenticatedUser, Role};
    use crate::features::notifications::models::{NewNotification, NotificationType};
    use crate::features::reports::dtos::SubmitReportDto;
    use crate::features::reports::models::FraudType;
    use crate::shared::test_helpers::{auth_user, data, mint_token, TestContext, TokenSpec};

    fn report_body() -> Value {
        json!({
            "title": "Fake courier KYC call",
            "description": "Caller asked me to install a screen sharing app",
            "fraud_type": "phishing",
            "amount_involved": "15000"
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let ctx = TestContext::new();
        let server = ctx.server();
        server.get("/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn api_requires_a_valid_token() {
        let ctx = TestContext::new();
        let server = ctx.server();

        server
            .get("/api/reports")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/reports")
            .authorization_bearer("not-a-token")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn citizen_submits_and_staff_reviews() {
        let ctx = TestContext::new();
        let server = ctx.server();
        let citizen = auth_user(Role::Citizen);
        let admin = auth_user(Role::Admin);

        let response = server
            .post("/api/reports")
            .authorization_bearer(ctx.token_for(&citizen))
            .json(&report_body())
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        let report_id = data(&body)["id"].as_str().unwrap().to_string();
        assert_eq!(data(&body)["status"], "pending");
        assert_eq!(data(&body)["priority"], "medium");

        // Citizens cannot reach the console
        server
            .get("/api/admin/reports")
            .authorization_bearer(ctx.token_for(&citizen))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = server
            .get("/api/admin/reports")
            .add_query_param("status", "pending")
            .add_query_param("page_size", 10)
            .authorization_bearer(ctx.token_for(&admin))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["meta"]["total"], 1);

        let response = server
            .patch(&format!("/api/admin/reports/{}/status", report_id))
            .authorization_bearer(ctx.token_for(&admin))
            .json(&json!({ "status": "resolved", "admin_notes": "Bank notified" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(data(&body)["status"], "resolved");

        // Terminal: no further transitions
        server
            .patch(&format!("/api/admin/reports/{}/status", report_id))
            .authorization_bearer(ctx.token_for(&admin))
            .json(&json!({ "status": "under_review" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .get("/api/notifications/unread-count")
            .authorization_bearer(ctx.token_for(&citizen))
            .await;
        let body: Value = response.json();
        assert_eq!(data(&body)["unread"], 2);
    }

    #[tokio::test]
    async fn moderators_cannot_manage_users() {
        let ctx = TestContext::new();
        let server = ctx.server();
        let moderator = auth_user(Role::Moderator);

        server
            .get("/api/admin/users")
            .authorization_bearer(ctx.token_for(&moderator))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get("/api/admin/stats")
            .authorization_bearer(ctx.token_for(&moderator))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn signed_out_session_is_rejected() {
        let ctx = TestContext::new();
        let server = ctx.server();
        let citizen = auth_user(Role::Citizen);
        let token = ctx.token_for(&citizen);

        server
            .post("/api/session/cleanup")
            .authorization_bearer(&token)
            .await
            .assert_status_success();
        server
            .get("/api/users/me")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let ctx = TestContext::new();
        let server = ctx.server();
        let citizen = auth_user(Role::Citizen);
        let token = mint_token(
            &ctx.config.auth,
            &TokenSpec::new(citizen.user_id, Role::Citizen).expires_in(-60),
        );

        server
            .get("/api/users/me")
            .authorization_bearer(token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn community_round_trip() {
        let ctx = TestContext::new();
        let server = ctx.server();
        let citizen = auth_user(Role::Citizen);

        let response = server
            .post("/api/community/posts")
            .authorization_bearer(ctx.token_for(&citizen))
            .json(&json!({ "title": "Loan app harassment", "body": "Anyone else?", "city": "Pune" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        let post_id = data(&body)["id"].as_str().unwrap().to_string();

        server
            .post(&format!("/api/community/posts/{}/comments", post_id))
            .authorization_bearer(ctx.token_for(&citizen))
            .json(&json!({ "body": "Yes, reported it" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get(&format!("/api/community/posts/{}", post_id))
            .authorization_bearer(ctx.token_for(&citizen))
            .await;
        let body: Value = response.json();
        assert_eq!(data(&body)["comment_count"], 1);
        assert_eq!(data(&body)["comments"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn huge_page_numbers_return_empty_pages() {
        let ctx = TestContext::new();
        let server = ctx.server();
        let citizen = auth_user(Role::Citizen);
        let admin = auth_user(Role::Admin);

        server
            .post("/api/reports")
            .authorization_bearer(ctx.token_for(&citizen))
            .json(&report_body())
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get("/api/reports")
            .add_query_param("page", i64::MAX)
            .authorization_bearer(ctx.token_for(&citizen))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(data(&body).as_array().map(Vec::len), Some(0));

        let response = server
            .get("/api/admin/reports")
            .add_query_param("page", i64::MAX)
            .authorization_bearer(ctx.token_for(&admin))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(data(&body).as_array().map(Vec::len), Some(0));
    }

    async fn submit(ctx: &TestContext, citizen: &AuthenticatedUser, title: &str) {
        ctx.reports
            .submit_report(citizen, SubmitReportDto::new(title, "Details", FraudType::Phishing))
            .await
            .unwrap();
    }

    async fn open_console(
        ctx: &TestContext,
        server: &axum_test::TestServer,
        user: &AuthenticatedUser,
    ) -> TestWebSocket {
        server
            .get_websocket("/api/admin/live")
            .authorization_bearer(ctx.token_for(user))
            .await
            .into_websocket()
            .await
    }

    /// Read frames until one of the given type arrives.
    async fn next_frame(ws: &mut TestWebSocket, kind: &str) -> Value {
        for _ in 0..20 {
            let frame: Value = tokio::time::timeout(Duration::from_secs(5), ws.receive_json())
                .await
                .expect("console frame arrives");
            if frame["type"] == kind {
                return frame;
            }
        }
        panic!("no {} frame received", kind);
    }

    #[tokio::test]
    async fn console_streams_snapshots_and_answers_commands() {
        let ctx = TestContext::new();
        let server = ctx.http_server();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        submit(&ctx, &citizen, "Fake refund call").await;

        let hub = ctx.backend.realtime();
        let before = hub.subscriber_count();

        let mut ws = open_console(&ctx, &server, &admin).await;
        let snapshot = next_frame(&mut ws, "snapshot").await;
        assert_eq!(snapshot["state"]["reports"]["total"], 1);
        assert_eq!(hub.subscriber_count(), before + 1);

        // A realtime insert reaches the console without a command
        submit(&ctx, &citizen, "Lottery prize SMS").await;
        loop {
            let snapshot = next_frame(&mut ws, "snapshot").await;
            if snapshot["state"]["reports"]["total"] == 2 {
                break;
            }
        }

        ws.send_json(&json!({ "type": "set_report_page", "page": i64::MAX }))
            .await;
        let ack = next_frame(&mut ws, "ack").await;
        assert_eq!(ack["command"], "set_report_page");

        ws.send_json(&json!({ "type": "drop_tables" })).await;
        let error = next_frame(&mut ws, "error").await;
        assert!(error["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("Invalid command")));

        ws.close().await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.subscriber_count() != before {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("console releases its realtime channel");
    }

    #[tokio::test]
    async fn console_closes_once_its_session_is_signed_out() {
        let ctx = TestContext::new();
        let server = ctx.http_server();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);

        let mut ws = open_console(&ctx, &server, &admin).await;
        next_frame(&mut ws, "snapshot").await;

        server
            .post("/api/session/cleanup")
            .authorization_bearer(ctx.token_for(&admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        // The next change must not be streamed to the signed-out console
        submit(&ctx, &citizen, "Investment group scam").await;
        let error = next_frame(&mut ws, "error").await;
        assert!(error["message"]
            .as_str()
            .is_some_and(|m| m.contains("Session has ended")));

        let message = tokio::time::timeout(Duration::from_secs(5), ws.receive_message())
            .await
            .expect("close frame arrives");
        assert!(message.is_close());
    }

    #[tokio::test]
    async fn notification_feed_stops_after_sign_out() {
        let ctx = TestContext::new();
        let server = ctx.http_server();
        let citizen = auth_user(Role::Citizen);
        ctx.users.ensure_profile(&citizen).await.unwrap();
        let token = ctx.token_for(&citizen);

        let alert = |title: &str| {
            NewNotification::new(
                citizen.user_id,
                NotificationType::FraudWarning,
                title,
                "Do not share OTPs",
            )
        };

        let (response, ()) = tokio::join!(
            server
                .get("/api/notifications/stream")
                .authorization_bearer(&token)
                .into_future(),
            async {
                // Let the handler subscribe first
                tokio::time::sleep(Duration::from_millis(300)).await;
                ctx.notifications
                    .notify(alert("Delivered while signed in"))
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
                ctx.sessions.sign_out(&citizen.session_id).await;
                ctx.notifications
                    .notify(alert("Sent after sign out"))
                    .await
                    .unwrap();
            }
        );

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("event: notification"));
        assert!(body.contains("Delivered while signed in"));
        assert!(!body.contains("Sent after sign out"));
    }
}
