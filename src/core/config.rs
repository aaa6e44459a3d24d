use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub admin: AdminConfig,
    pub storage: StorageConfig,
    pub demo: DemoConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Present only for the Postgres backend
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Validation settings for HS256 access tokens issued by the hosted auth provider.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub audience: String,
    pub jwt_leeway: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("jwt_leeway", &self.jwt_leeway)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle period after which a session is signed out
    pub idle_timeout: Duration,
    /// How often the sweeper looks for idle sessions
    pub check_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Period of the admin console's full refresh
    pub poll_interval: Duration,
    pub page_size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Minio,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Present only for MinIO storage
    pub minio: Option<MinIOConfig>,
}

/// MinIO/S3 storage configuration for evidence uploads
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Presigned URL expiry time in seconds
    pub presigned_url_expiry_secs: u32,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Generate synthetic notifications for users with live sessions
    pub enabled: bool,
    pub notification_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// Read `name`, falling back to `default` when unset, and parse it.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid value", name)),
        _ => Ok(default),
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            backend: BackendConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            session: SessionConfig::from_env()?,
            admin: AdminConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            demo: DemoConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 12 * 1024 * 1024; // evidence limit plus multipart overhead

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("PORT", 3000u16)?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size =
            env_or("MAX_REQUEST_BODY_SIZE", Self::DEFAULT_MAX_REQUEST_BODY_SIZE)?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("Unknown BACKEND '{}', expected postgres or memory", other)),
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, String> {
        let kind = env::var("BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<BackendKind>()?;

        let database = match kind {
            BackendKind::Postgres => Some(DatabaseConfig::from_env()?),
            BackendKind::Memory => None,
        };

        Ok(Self { kind, database })
    }
}

impl DatabaseConfig {
    // Conservative pool defaults for small-medium deployments
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: env_or("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: env_or("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: env_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl AuthConfig {
    const DEFAULT_AUDIENCE: &'static str = "authenticated";
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "JWT_SECRET environment variable is required".to_string())?;

        let audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| Self::DEFAULT_AUDIENCE.to_string());

        let jwt_leeway_secs = env_or("JWT_LEEWAY", Self::DEFAULT_JWT_LEEWAY_SECS)?;

        Ok(Self {
            jwt_secret,
            audience,
            jwt_leeway: Duration::from_secs(jwt_leeway_secs),
        })
    }
}

impl SessionConfig {
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;
    const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let idle = env_or("SESSION_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?;
        let check = env_or(
            "SESSION_CHECK_INTERVAL_SECS",
            Self::DEFAULT_CHECK_INTERVAL_SECS,
        )?;
        if idle == 0 || check == 0 {
            return Err("Session timeouts must be greater than zero".to_string());
        }

        Ok(Self {
            idle_timeout: Duration::from_secs(idle),
            check_interval: Duration::from_secs(check),
        })
    }
}

impl AdminConfig {
    const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
    const DEFAULT_PAGE_SIZE: i64 = 20;

    pub fn from_env() -> Result<Self, String> {
        let poll = env_or("ADMIN_POLL_INTERVAL_SECS", Self::DEFAULT_POLL_INTERVAL_SECS)?;
        if poll == 0 {
            return Err("ADMIN_POLL_INTERVAL_SECS must be greater than zero".to_string());
        }
        let page_size = env_or("ADMIN_PAGE_SIZE", Self::DEFAULT_PAGE_SIZE)?;
        if !(1..=crate::shared::constants::MAX_PAGE_SIZE).contains(&page_size) {
            return Err(format!(
                "ADMIN_PAGE_SIZE must be between 1 and {}",
                crate::shared::constants::MAX_PAGE_SIZE
            ));
        }

        Ok(Self {
            poll_interval: Duration::from_secs(poll),
            page_size,
        })
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minio" | "s3" => Ok(StorageKind::Minio),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("Unknown STORAGE '{}', expected minio or memory", other)),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let kind = env::var("STORAGE")
            .unwrap_or_else(|_| "minio".to_string())
            .parse::<StorageKind>()?;

        let minio = match kind {
            StorageKind::Minio => Some(MinIOConfig::from_env()?),
            StorageKind::Memory => None,
        };

        Ok(Self { kind, minio })
    }
}

impl MinIOConfig {
    const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u32 = 3600; // 1 hour

    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());
        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "chakshu-evidence".to_string());
        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let presigned_url_expiry_secs = env_or(
            "MINIO_PRESIGNED_URL_EXPIRY_SECS",
            Self::DEFAULT_PRESIGNED_URL_EXPIRY_SECS,
        )?;

        Ok(Self {
            endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            presigned_url_expiry_secs,
        })
    }
}

impl DemoConfig {
    const DEFAULT_NOTIFICATION_INTERVAL_SECS: u64 = 45;

    pub fn from_env() -> Result<Self, String> {
        let interval = env_or(
            "DEMO_NOTIFICATION_INTERVAL_SECS",
            Self::DEFAULT_NOTIFICATION_INTERVAL_SECS,
        )?;

        Ok(Self {
            enabled: env_flag("DEMO_MODE"),
            notification_interval: Duration::from_secs(interval.max(1)),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Chakshu API".to_string());
        let version =
            env::var("SWAGGER_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Citizen fraud reporting and admin console API".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}
