use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod service;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
