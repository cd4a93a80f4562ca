//! Core budgeting engine for Obra.
//!
//! This crate contains the computation, versioning and merge logic with ZERO
//! web or database dependencies. Persistence is reached through the
//! repository traits each module declares; `obra-db` implements them.
//!
//! # Modules
//!
//! - `budget` - Budget → Partida → Concepto model, defaults resolution,
//!   line-item computation, aggregation and the editing service
//! - `pricing` - Price observations, window statistics and deviation alerts
//! - `snapshot` - Publish lifecycle, immutable snapshots and comparison
//! - `template` - Reusable templates and the delta/merge algorithm

pub mod budget;
pub mod pricing;
pub mod snapshot;
pub mod template;

#[cfg(test)]
mod testing;
