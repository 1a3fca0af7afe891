//! Configuration and simulation lifecycle for the rich-get-richer server.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `rgrr-config.yaml` into
//!   strongly-typed structs.
//! - [`registry`] -- [`SimulationRegistry`]: concurrent, id-addressed
//!   simulations with a `created -> running -> completed | failed`
//!   lifecycle.
//! - [`error`] -- [`RegistryError`].
//!
//! [`SimulationRegistry`]: registry::SimulationRegistry
//! [`RegistryError`]: error::RegistryError

pub mod config;
pub mod error;
pub mod registry;
