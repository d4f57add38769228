//! HTTP API server for external control (scheduler / orchestration service)
//!
//! This module provides a REST API for bot jobs:
//! - POST /bots - Send a bot into a meeting
//! - GET /bots - List jobs
//! - GET /bots/:id - Query one job
//! - POST /bots/:id/stop - Make the bot leave
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
