use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware, routing::get, routing::post};
use sqlx_core::pool::PoolOptions;
use sqlx_postgres::Postgres;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use darkroom_drive::{AccessTokenProvider, DriveClient, StaticTokenProvider};
use darkroom_store::{MemoryWatchStore, PgWatchStore, WatchStore};

use crate::cache::{CacheInvalidator, TagCache};
use crate::config::{AppConfig, StorageBackend};
use crate::debounce::Debouncer;
use crate::hooks::GalleryWriteHook;
use crate::watch::{WatchRegistry, WatchRenewer};
use crate::{handlers, middleware as app_middleware};

/// Shared handles threaded through every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<TagCache>,
    pub invalidator: CacheInvalidator,
    pub debouncer: Arc<Debouncer>,
    pub registry: Arc<WatchRegistry>,
    pub renewer: Arc<WatchRenewer>,
    pub hook: Arc<GalleryWriteHook>,
}

impl AppState {
    /// Wire the component graph from its leaf dependencies. Tests inject an
    /// in-memory store and a mocked drive here.
    pub fn new(
        config: Arc<AppConfig>,
        cache: Arc<TagCache>,
        store: Arc<dyn WatchStore>,
        drive: Arc<DriveClient>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let registry = Arc::new(WatchRegistry::new(
            store,
            drive,
            config.webhook_address(),
            config.watch_ttl(),
        ));
        let renewer = Arc::new(WatchRenewer::new(
            Arc::clone(&registry),
            tokens,
            config.renew_window(),
        ));
        let invalidator = CacheInvalidator::new(Arc::clone(&cache));
        let debouncer = Arc::new(Debouncer::new(config.debounce_quiet_period()));
        let hook = Arc::new(GalleryWriteHook::new(
            invalidator.clone(),
            Arc::clone(&registry),
        ));

        Self {
            config,
            cache,
            invalidator,
            debouncer,
            registry,
            renewer,
            hook,
        }
    }
}

pub struct DarkroomServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::prometheus_metrics))
        // Inbound change notifications from the remote store
        .route("/hooks/drive", post(handlers::drive_webhook))
        // Renewal sweep trigger for the external scheduler. GET for plain
        // cron pingers, POST for schedulers that insist on it.
        .route(
            "/tasks/renew-watches",
            get(handlers::renew_watches).post(handlers::renew_watches),
        )
        // Middleware stack (order: request id -> metrics -> cors/compression/trace -> timeout -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(middleware::from_fn(app_middleware::track_metrics))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %method,
                        http.target = %uri,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<DarkroomServer> {
        let config = Arc::new(self.config);

        let store = create_store(&config).await?;
        let cache = crate::create_tag_cache(&config.redis).await;
        let drive = Arc::new(DriveClient::new(config.drive.api_base_url.clone()));
        let tokens: Arc<dyn AccessTokenProvider> = Arc::new(StaticTokenProvider::new(
            config.drive.user_tokens.clone(),
        ));

        let state = AppState::new(config, cache, store, drive, tokens);
        let app = build_app(state);

        Ok(DarkroomServer {
            addr: self.addr,
            app,
        })
    }
}

async fn create_store(config: &AppConfig) -> anyhow::Result<Arc<dyn WatchStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory watch store");
            Ok(Arc::new(MemoryWatchStore::new()))
        }
        StorageBackend::Postgres => {
            let pg = config
                .storage
                .postgres
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("postgres storage configuration missing"))?;

            tracing::info!(
                host = %pg.host,
                database = %pg.database,
                pool_size = pg.pool_size,
                "connecting to PostgreSQL"
            );
            let pool = PoolOptions::<Postgres>::new()
                .max_connections(pg.pool_size)
                .acquire_timeout(Duration::from_millis(pg.connect_timeout_ms))
                .connect(&pg.connection_url())
                .await?;

            let store = PgWatchStore::new(pool);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

impl DarkroomServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
