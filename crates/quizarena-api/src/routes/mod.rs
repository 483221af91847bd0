//! Route modules organized by bounded context.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod payouts;
pub mod rooms;
pub mod tournaments;

/// All routes, as mounted by the server.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/tournaments", tournaments::router())
        .nest("/api/v1/rooms", rooms::router())
        .nest("/api/v1/payouts", payouts::router())
}
