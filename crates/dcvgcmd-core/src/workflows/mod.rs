//! # Workflows Module
//!
//! High-level entry points that assemble the engine into complete procedures.
//!
//! ## Architecture
//!
//! - **Flux Workflow** ([`flux`]) - Runs the hybrid scheduler for a number of
//!   steps and reports the net exchange, flux and occupancy of every control
//!   region, together with acceptance statistics.

pub mod flux;
