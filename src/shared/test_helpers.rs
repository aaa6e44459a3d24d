//! Fixtures shared by unit and route tests: tokens, users and a fully wired
//! in-memory application.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::config::{
    AdminConfig, AppConfig, AuthConfig, BackendConfig, BackendKind, Config, DemoConfig,
    SessionConfig, StorageConfig, StorageKind, SwaggerConfig,
};
use crate::core::router::{build_router, Services};
use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::modules::backend::{Backend, MemoryBackend};
use crate::modules::storage::{MemoryStorage, ObjectStorage};

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret-test-secret-test-sec".to_string(),
        audience: "authenticated".to_string(),
        jwt_leeway: Duration::from_secs(0),
    }
}

pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_allowed_origins: vec!["*".to_string()],
            max_request_body_size: 12 * 1024 * 1024,
        },
        backend: BackendConfig {
            kind: BackendKind::Memory,
            database: None,
        },
        auth: test_auth_config(),
        session: SessionConfig {
            idle_timeout: Duration::from_secs(30 * 60),
            check_interval: Duration::from_secs(60),
        },
        admin: AdminConfig {
            poll_interval: Duration::from_secs(30),
            page_size: 20,
        },
        storage: StorageConfig {
            kind: StorageKind::Memory,
            minio: None,
        },
        demo: DemoConfig {
            enabled: false,
            notification_interval: Duration::from_secs(45),
        },
        swagger: SwaggerConfig {
            username: None,
            password: None,
            title: "Chakshu API".to_string(),
            version: "test".to_string(),
            description: "test".to_string(),
        },
    }
}

/// Claims of a provider-style access token
pub struct TokenSpec {
    user_id: Uuid,
    role: Role,
    session_id: Option<String>,
    with_role: bool,
    expires_in: i64,
}

impl TokenSpec {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            session_id: None,
            with_role: true,
            expires_in: 3600,
        }
    }

    pub fn session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Omit `app_metadata.role`, as for accounts that never got one
    pub fn no_role(mut self) -> Self {
        self.with_role = false;
        self
    }

    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expires_in = secs;
        self
    }
}

pub fn mint_token(config: &AuthConfig, spec: &TokenSpec) -> String {
    let app_metadata = if spec.with_role {
        json!({ "role": spec.role.as_str() })
    } else {
        json!({})
    };
    let claims = json!({
        "sub": spec.user_id.to_string(),
        "aud": config.audience,
        "exp": Utc::now().timestamp() + spec.expires_in,
        "email": format!("{}@example.test", spec.user_id.simple()),
        "session_id": spec.session_id,
        "app_metadata": app_metadata,
    });

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .expect("token encodes")
}

pub fn auth_user(role: Role) -> AuthenticatedUser {
    let user_id = Uuid::new_v4();
    AuthenticatedUser {
        user_id,
        email: Some(format!("{}@example.test", user_id.simple())),
        session_id: Uuid::new_v4().to_string(),
        role,
    }
}

pub fn memory_backend() -> Arc<dyn Backend> {
    Arc::new(MemoryBackend::new())
}

/// The whole service graph over the in-memory backend and storage.
pub struct TestContext {
    pub config: Config,
    services: Services,
}

impl TestContext {
    pub fn new() -> Self {
        let config = test_config();
        let storage: Arc<dyn ObjectStorage> = Arc::new(MemoryStorage::new());
        let services = Services::new(&config, memory_backend(), storage);
        Self { config, services }
    }

    /// HTTP server over the full router, middleware included.
    pub fn server(&self) -> TestServer {
        TestServer::new(build_router(&self.services, &self.config)).expect("test server starts")
    }

    /// Server over a real socket, for WebSocket and streaming routes.
    pub fn http_server(&self) -> TestServer {
        TestServer::builder()
            .http_transport()
            .build(build_router(&self.services, &self.config))
            .expect("http test server starts")
    }

    /// Bearer token carrying this user's id, role and session.
    pub fn token_for(&self, user: &AuthenticatedUser) -> String {
        mint_token(
            &self.config.auth,
            &TokenSpec::new(user.user_id, user.role).session(&user.session_id),
        )
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestContext {
    type Target = Services;

    fn deref(&self) -> &Services {
        &self.services
    }
}

/// The `data` member of an `ApiResponse` body.
pub fn data(body: &Value) -> &Value {
    &body["data"]
}
