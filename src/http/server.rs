//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared [`AppState`] from configuration
//! - Assemble application and operational routes behind the request pipeline
//! - Serve plain HTTP or TLS with graceful shutdown bounded by the grace period
//! - Run the rate limiter's idle partition sweeper for the server's lifetime

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

use crate::api;
use crate::config::ServiceConfig;
use crate::health::{HealthAggregator, RateLimiterProbe, SelfProbe, LIVE_TAG};
use crate::http::compression::CompressionNegotiator;
use crate::http::endpoints;
use crate::http::pipeline::build_pipeline;
use crate::http::request::Scheme;
use crate::http::response::ErrorMapper;
use crate::observability::metrics::{init_prometheus_recorder, MetricsInstrument};
use crate::security::{ForwardedHeaderNormalizer, PolicyRoutes, RateLimitError, RateLimiter};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("failed to load TLS material: {0}")]
    Tls(std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

/// Application state shared by handlers and pipeline stages.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub forwarded: Arc<ForwardedHeaderNormalizer>,
    pub errors: Arc<ErrorMapper>,
    pub rate_limiter: Arc<RateLimiter>,
    pub rate_limit_routes: Arc<PolicyRoutes>,
    pub compression: Arc<CompressionNegotiator>,
    pub health: HealthAggregator,
    pub instrument: Arc<MetricsInstrument>,
    pub metrics: Option<PrometheusHandle>,
    pub log_threshold: Duration,
    pub request_timeout: Duration,
    pub transport_scheme: Scheme,
}

impl AppState {
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServerError> {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit)?);

        let mut health = HealthAggregator::new(config.health.probe_timeout());
        health
            .register("self", &[LIVE_TAG], SelfProbe)
            .register("rate_limiter", &[], RateLimiterProbe::new(Arc::clone(&rate_limiter)));

        let metrics = config
            .observability
            .metrics_enabled
            .then(init_prometheus_recorder);

        let transport_scheme = if config.listener.tls.is_some() {
            Scheme::Https
        } else {
            Scheme::Http
        };

        Ok(Self {
            forwarded: Arc::new(ForwardedHeaderNormalizer::from_config(&config.forwarded_headers)),
            errors: Arc::new(ErrorMapper::new(
                config.server.resolve_node_id(),
                config.server.expose_error_details,
            )),
            rate_limit_routes: Arc::new(PolicyRoutes::from_config(&config.rate_limit.routes)),
            rate_limiter,
            compression: Arc::new(CompressionNegotiator::from_config(&config.compression)),
            health,
            instrument: Arc::new(MetricsInstrument::new()),
            metrics,
            log_threshold: config.server.request_log_threshold(),
            request_timeout: config.timeouts.request_timeout(),
            transport_scheme,
            config: Arc::new(config),
        })
    }
}

/// Sample routes plus operational endpoints, wrapped in the request pipeline.
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, api::routes())
}

/// Like [`build_router`], with caller-supplied application routes.
pub fn build_router_with(state: AppState, application: Router<AppState>) -> Router {
    let routes = Router::new()
        .merge(endpoints::routes())
        .merge(application)
        .with_state(state.clone());

    build_pipeline(routes, &state)
}

pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        Ok(Self::with_state(AppState::from_config(config)?))
    }

    pub fn with_state(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn serve(self, shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let bind_address = &self.state.config.listener.bind_address;
        let addr: SocketAddr = bind_address
            .parse()
            .map_err(|_| ServerError::BindAddress(bind_address.clone()))?;

        match self.state.config.listener.tls.clone() {
            Some(tls) => self.run_tls(addr, &tls.cert_path, &tls.key_path, shutdown).await,
            None => {
                let listener = TcpListener::bind(addr).await?;
                self.run(listener, shutdown).await
            }
        }
    }

    /// Serve plain HTTP on an already bound listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, scheme = "http", "HTTP server starting");

        let sweeper = self.start_sweeper(shutdown.resubscribe());
        let grace = self.state.config.timeouts.shutdown_grace();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
                let _ = draining_tx.send(());
            })
            .into_future();
        tokio::pin!(server);

        // Stop waiting on connections still open once the grace period ends;
        // they are left to the runtime and end with the process.
        let grace_elapsed = async move {
            match draining_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                Err(_) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = &mut server => result?,
            _ = grace_elapsed => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Shutdown grace period elapsed, no longer waiting for open connections"
                );
            }
        }

        sweeper.abort();
        self.state.instrument.dispose();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn run_tls(
        self,
        addr: SocketAddr,
        cert_path: &str,
        key_path: &str,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let tls = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(ServerError::Tls)?;
        tracing::info!(address = %addr, scheme = "https", "HTTP server starting");

        let sweeper = self.start_sweeper(shutdown.resubscribe());
        let grace = self.state.config.timeouts.shutdown_grace();
        let handle = axum_server::Handle::new();

        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server received shutdown signal");
            signal_handle.graceful_shutdown(Some(grace));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        sweeper.abort();
        self.state.instrument.dispose();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn start_sweeper(&self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_secs(self.state.config.rate_limit.cleanup_interval_secs.max(1));
        self.state.rate_limiter.start_cleanup_task(interval, shutdown)
    }
}
