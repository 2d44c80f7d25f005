pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod roster;
pub mod routing;
pub mod state;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use axum::Router;

use crate::routing::Dispatcher;
use crate::state::AppState;

/// The HTTP application over `state` with the full route table.
pub fn app(state: AppState) -> Router {
    routing::app(Arc::new(Dispatcher::new(handlers::routes(), state)))
}
