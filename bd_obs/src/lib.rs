//! ABOUTME: Observability services including health checks and metrics
//! ABOUTME: Exposes connection readiness, Prometheus metrics and the live dashboard frame

use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    middleware::Logger,
    web, App, HttpResponse, HttpServer, Result as ActixResult,
};
use bd_core::{Error, Result};
use bd_stream::ClientMetrics;
use bd_view::DashboardFrame;
use prometheus_client::{encoding::text::encode, registry::Registry};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Prometheus registry holding the stream client metrics
#[derive(Debug)]
pub struct Metrics {
    registry: Arc<Mutex<Registry>>,
}

impl Metrics {
    pub fn new(client: &ClientMetrics) -> Self {
        let mut registry = Registry::default();
        client.register(&mut registry);

        Self {
            registry: Arc::new(Mutex::new(registry)),
        }
    }

    pub fn encode(&self) -> Result<String> {
        let registry = self
            .registry
            .lock()
            .map_err(|e| Error::External(format!("Failed to lock metrics registry: {}", e)))?;

        let mut buffer = String::new();
        encode(&mut buffer, &registry)
            .map_err(|e| Error::External(format!("Failed to encode metrics: {}", e)))?;

        Ok(buffer)
    }
}

/// Application state for observability endpoints
#[derive(Debug, Clone)]
pub struct ObsState {
    pub frames: watch::Receiver<DashboardFrame>,
    pub metrics: Arc<Metrics>,
}

impl ObsState {
    pub fn new(frames: watch::Receiver<DashboardFrame>, client: &ClientMetrics) -> Self {
        Self {
            frames,
            metrics: Arc::new(Metrics::new(client)),
        }
    }

    /// Ready while the metrics stream is live
    pub fn is_ready(&self) -> bool {
        self.frames.borrow().status.ok
    }
}

/// Health endpoint handler
async fn health() -> ActixResult<HttpResponse> {
    tracing::debug!("Health check requested");
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}

/// Readiness endpoint handler
async fn readiness(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    let status = state.frames.borrow().status.clone();
    tracing::debug!(state = %status.state, "Readiness check requested");

    if state.is_ready() {
        Ok(HttpResponse::Ok().json(json!({
            "status": "ready",
            "stream": status.state,
        })))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "not ready",
            "stream": status.state,
            "detail": status.text,
        })))
    }
}

/// Metrics endpoint handler
async fn metrics(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    tracing::debug!("Metrics scrape requested");

    match state.metrics.encode() {
        Ok(metrics_text) => Ok(HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(metrics_text)),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to encode metrics"
            })))
        }
    }
}

/// Current dashboard frame as JSON
async fn dashboard(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    let frame = state.frames.borrow().clone();
    Ok(HttpResponse::Ok().json(frame))
}

/// Create observability service factory
pub fn create_service(
    state: ObsState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .wrap(Logger::default())
        .service(
            web::scope("")
                .route("/healthz", web::get().to(health))
                .route("/readyz", web::get().to(readiness))
                .route("/metrics", web::get().to(metrics))
                .route("/api/dashboard", web::get().to(dashboard)),
        )
}

/// Start observability server and serve until `shutdown` is cancelled
pub async fn start_server(
    bind_addr: &str,
    state: ObsState,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!("Starting observability server on {}", bind_addr);

    let server = HttpServer::new(move || create_service(state.clone()))
        .workers(1)
        .disable_signals()
        .bind(bind_addr)
        .map_err(|e| Error::Config(format!("Failed to bind server: {}", e)))?
        .run();
    let handle = server.handle();
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        _ = shutdown.cancelled() => {
            tracing::info!("Stopping observability server");
            // The server future has to keep running for the stop to complete
            let ((), result) = tokio::join!(handle.stop(true), &mut server);
            result
        }
    };

    result.map_err(|e| Error::External(format!("Server error: {}", e)))
}
