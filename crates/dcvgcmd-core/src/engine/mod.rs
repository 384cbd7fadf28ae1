//! # Engine Module
//!
//! This module implements the stateful simulation engine of DCV-GCMD: the
//! samplers that act on a [`MolecularSystem`](crate::core::models::system::MolecularSystem)
//! and the machinery that keeps their shared view of it consistent.
//!
//! ## Overview
//!
//! A run alternates between two kinds of bursts over one configuration. During
//! an MC burst, restricted grand-canonical exchange moves insert and delete
//! molecules inside the two control regions at the ends of the box. During an
//! MD burst, the whole configuration is advanced with velocity Verlet. The
//! [`scheduler`] owns the configuration and decides which burst runs.
//!
//! ## Architecture
//!
//! - **Scheduling** ([`scheduler`]) - The MC/MD state machine and its safety checks
//! - **Exchange** ([`exchange`]) - Control regions, reservoir templates and the insertion/deletion move
//! - **Integrators** ([`integrators`]) - The Monte Carlo sampler and the velocity-Verlet stepper
//! - **Energy** ([`energy`]) - Energies and forces of the live configuration
//! - **Neighbors** ([`neighbors`]) - Criterion chains, the cell list, the Verlet list and the switch between them
//! - **Configuration** ([`config`]) - Run parameters and their builder
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! ## Key Capabilities
//!
//! - **Incremental neighbor bookkeeping** with explicit staleness, so a query
//!   against an out-of-date engine fails instead of answering wrongly
//! - **Incremental energy cache** maintained across accepted exchange trials
//! - **Fatal bound checks** reporting the offending atom, molecule and species
//! - **Parallel energy summation** behind the `parallel` feature

pub mod config;
pub mod energy;
pub mod error;
pub mod exchange;
pub mod integrators;
pub mod neighbors;
pub mod progress;
pub mod scheduler;
pub mod utils;
