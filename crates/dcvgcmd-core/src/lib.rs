//! # DCV-GCMD Core Library
//!
//! Dual control-volume grand canonical molecular dynamics: a hybrid method
//! that sustains a steady concentration gradient, and the mass flux it drives,
//! across a slit box by alternating restricted grand-canonical Monte Carlo
//! exchange in two boundary slabs with ordinary molecular dynamics in the bulk.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MolecularSystem`,
//!   `Species`, `SimulationBox`) and the pure potential functions.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer: neighbor engines and
//!   the switch between them, the energy evaluator, the exchange moves, the
//!   integrators and the `HybridStepScheduler` that alternates them.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the
//!   engine, such as a flux measurement run with progress reporting.

pub mod core;
pub mod engine;
pub mod workflows;
