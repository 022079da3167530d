use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod image;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
