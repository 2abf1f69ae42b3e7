pub mod adapters;
pub mod casino;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod ports;
pub mod services;
pub mod startup;
pub mod status;
pub mod timeline;
pub mod use_cases;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::casino::CasinoClient;
use crate::ports::TransactionStore;
use crate::services::WebhookService;
use crate::use_cases::CreateDeposit;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub store: Arc<dyn TransactionStore>,
    pub webhooks: Arc<WebhookService>,
    pub deposits: Arc<CreateDeposit>,
    pub casino: CasinoClient,
    pub webhook_secret: String,
    pub started_at: Instant,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/payment", post(handlers::webhook::payment_callback))
        .route("/transactions", post(handlers::transactions::create_deposit))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
