//! HTTP server for the rich-get-richer simulation.
//!
//! This crate exposes the [`SimulationRegistry`] over REST so dashboards
//! and automation can create simulations, run them, and fetch per-epoch
//! histograms. Error responses share one JSON shape,
//! `{"error": <message>, "status": <code>}`.
//!
//! [`SimulationRegistry`]: rgrr_core::registry::SimulationRegistry

pub mod error;
pub mod handlers;
pub mod openapi;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, bind, serve, start_server};
pub use state::AppState;
