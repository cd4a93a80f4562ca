//! Shared types, errors, and configuration for Obra.
//!
//! This crate provides common types used across all other crates:
//! - Monetary primitives with decimal precision
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management, including the engine configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, EngineConfig};
pub use error::{AppError, AppResult};
