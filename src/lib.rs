//! Box transfer API
//!
//! Cross-organisation transfer agreements and the shipments that move aid boxes
//! between the bases those agreements cover.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::consts as perm;
use crate::auth::{AuthConfig, AuthRouterExt, AuthService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub auth: Arc<AuthService>,
    pub transfer_agreements: services::TransferAgreementService,
    pub shipments: services::ShipmentService,
}

impl AppState {
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let event_sender = Arc::new(event_sender);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let transfer_agreements = services::TransferAgreementService::new(
            db.clone(),
            event_sender.clone(),
            config.default_tz(),
        );
        let shipments = services::ShipmentService::new(db.clone(), event_sender.clone());

        Self {
            db,
            config,
            event_sender,
            auth,
            transfer_agreements,
            shipments,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let agreements_read = Router::new()
        .route(
            "/transfer-agreements",
            get(handlers::transfer_agreements::list_transfer_agreements),
        )
        .route(
            "/transfer-agreements/:id",
            get(handlers::transfer_agreements::get_transfer_agreement),
        )
        .with_permission(perm::TRANSFER_AGREEMENT_READ);

    let agreements_write = Router::new()
        .route(
            "/transfer-agreements",
            post(handlers::transfer_agreements::create_transfer_agreement),
        )
        .route(
            "/transfer-agreements/:id/accept",
            post(handlers::transfer_agreements::accept_transfer_agreement),
        )
        .route(
            "/transfer-agreements/:id/reject",
            post(handlers::transfer_agreements::reject_transfer_agreement),
        )
        .route(
            "/transfer-agreements/:id/cancel",
            post(handlers::transfer_agreements::cancel_transfer_agreement),
        )
        .with_permission(perm::TRANSFER_AGREEMENT_WRITE);

    let shipments_read = Router::new()
        .route("/shipments", get(handlers::shipments::list_shipments))
        .route("/shipments/:id", get(handlers::shipments::get_shipment))
        .with_permission(perm::SHIPMENT_READ);

    let shipments_write = Router::new()
        .route("/shipments", post(handlers::shipments::create_shipment))
        .route(
            "/shipments/:id",
            axum::routing::patch(handlers::shipments::update_shipment),
        )
        .route(
            "/shipments/:id/send",
            post(handlers::shipments::send_shipment),
        )
        .route(
            "/shipments/:id/cancel",
            post(handlers::shipments::cancel_shipment),
        )
        .with_permission(perm::SHIPMENT_WRITE);

    Router::new()
        .merge(agreements_read)
        .merge(agreements_write)
        .merge(shipments_read)
        .merge(shipments_write)
}

/// Full HTTP application: API routes, health check and the shared middleware stack
pub fn app(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::<AppState>::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |State(auth): State<Arc<AuthService>>,
             mut req: axum::http::Request<axum::body::Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(ApiResponse::success(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}

// Request logging middleware
async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    tracing::info!(method = %method, uri = %uri, "Incoming request");

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
