//! HTTP adapter: routes every inbound dialect onto the coordinator.
//!
//! The adapter owns nothing stateful beyond [`state::ServerContext`]; all
//! admission, cancellation, and engine access goes through `grimoire-core`.

#![deny(unsafe_code)]

pub mod auth;
pub mod handlers;
pub mod models;
pub mod server;
pub mod sse;
pub mod state;

pub use server::{router, serve};
pub use state::{AppState, ServerConfig, ServerContext};
