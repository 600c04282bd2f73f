//! WebSocket handlers for the two client-facing exchanges:
//! - `register`: long-lived connection streaming registration upserts
//! - `list`: one-shot snapshot of all known services

pub mod list;
pub mod messages;
pub mod register;

use axum::Router;
use axum::routing::get;

use crate::config::ServerConfig;
use crate::services::registry::SharedRegistry;

pub use list::{run_listing_session, services_handler};
pub use messages::{ListingError, RegistrationError};
pub use register::{SessionSummary, register_handler, run_registration_session};

// 处理器共享状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub max_message_size: usize,
}

pub fn app_state(registry: SharedRegistry, config: &ServerConfig) -> AppState {
    AppState {
        registry,
        max_message_size: config.max_message_size,
    }
}

pub fn router(registry: SharedRegistry, config: &ServerConfig) -> Router {
    let state = app_state(registry, config);

    Router::new()
        .route(&config.register_path, get(register_handler))
        .route(&config.services_path, get(services_handler))
        .with_state(state)
}
