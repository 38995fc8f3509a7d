//! Axum HTTP and WebSocket surface for the LLM gateway (`§6`).
//!
//! Everything here is glue: it resolves a request to a [`state::AppState`],
//! runs it through the shared middleware stack, and hands off to
//! `gateway-cache`/`gateway-ratelimit`/`gateway-auth`/`gateway-realtime`
//! for the actual policy decisions.

pub mod app;
pub mod cache_backend;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod routes;
pub mod state;

pub use app::create_app;
pub use config::GatewayConfig;
pub use state::AppState;
