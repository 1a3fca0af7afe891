//! Shared type definitions for the rich-get-richer simulation.
//!
//! This crate is the single source of truth for the payloads exchanged
//! between the simulation server and its clients. Types flow downstream
//! to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for simulation identifiers
//! - [`enums`] -- Lifecycle status and histogram normalization
//! - [`structs`] -- Request/response payloads (config, views, histograms)

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Normalization, SimulationStatus};
pub use ids::SimulationId;
pub use structs::{
    CreatedResponse, EpochStats, HistogramResult, OperationSpec, RunResponse, SimulationRequest,
    SimulationView,
};
