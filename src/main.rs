mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::{BackendKind, Config, StorageKind};
use crate::core::database;
use crate::core::router::{build_router, Services};
use crate::features::notifications::DemoNotificationGenerator;
use crate::features::session::SessionSweeper;
use crate::modules::backend::{Backend, MemoryBackend, PostgresBackend};
use crate::modules::storage::{MemoryStorage, MinIOClient, ObjectStorage};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn create_backend(config: &Config) -> anyhow::Result<Arc<dyn Backend>> {
    match (config.backend.kind, &config.backend.database) {
        (BackendKind::Postgres, Some(db)) => {
            let pool = database::create_pool(db).await?;
            tracing::info!("Database connection pool created");

            database::run_migrations(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

            Ok(Arc::new(PostgresBackend::new(pool)))
        }
        (BackendKind::Postgres, None) => Err(anyhow::anyhow!("DATABASE_URL must be set")),
        (BackendKind::Memory, _) => {
            tracing::warn!("Using the in-memory backend; data is lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

async fn create_storage(config: &Config) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    match (config.storage.kind, &config.storage.minio) {
        (StorageKind::Minio, Some(minio)) => {
            let client = MinIOClient::new(minio.clone())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?;
            tracing::info!("MinIO client initialized for bucket: {}", minio.bucket);
            Ok(Arc::new(client))
        }
        (StorageKind::Minio, None) => Err(anyhow::anyhow!("MinIO configuration missing")),
        (StorageKind::Memory, _) => {
            tracing::warn!("Using in-memory evidence storage; uploads are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Log system info
    let available_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        available_cpus,
        worker_threads,
        std::process::id()
    );

    tracing::info!("Configuration loaded successfully");

    let backend = create_backend(&config).await?;
    tracing::info!("Backend '{}' ready", backend.name());

    let storage = create_storage(&config).await?;
    tracing::info!("Object storage '{}' ready", storage.name());

    let services = Services::new(&config, backend, storage);
    tracing::info!("Services initialized");

    // Background workers
    let sweeper = SessionSweeper::new(
        Arc::clone(&services.sessions),
        config.session.check_interval,
    );
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run().await;
    });
    tracing::info!("Session sweeper spawned");

    let demo_handle = if config.demo.enabled {
        let generator = DemoNotificationGenerator::new(
            Arc::clone(&services.notifications),
            Arc::clone(&services.sessions),
            config.demo.notification_interval,
        );
        tracing::info!("Demo notification generator spawned");
        Some(tokio::spawn(async move {
            generator.run().await;
        }))
    } else {
        None
    };

    let app = build_router(&services, &config);

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper_handle.abort();
    if let Some(handle) = demo_handle {
        handle.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}
