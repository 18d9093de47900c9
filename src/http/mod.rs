//! HTTP surface: health, websocket upgrade and operator routes

pub mod middleware;
pub mod routes;

pub use routes::build_router;
