pub mod bots;
pub mod health;
pub mod listener;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// 创建所有路由 / Create all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(bots::routes())
        .merge(listener::routes())
        .merge(crate::ws::handler::routes())
        .with_state(state)
}
