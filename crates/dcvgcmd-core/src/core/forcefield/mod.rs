//! # Force Field Module
//!
//! The minimal set of potentials needed to drive the exchange moves and the
//! MD stepper.
//!
//! ## Key Components
//!
//! - [`potentials`] - Pure functions: truncated and force-shifted Lennard-Jones, WCA, harmonic forms
//! - [`params`] - Parameter structs and the TOML pair-parameter loader
//! - [`bonded`] - Bond, angle and tether energies and forces of one molecule

pub mod bonded;
pub mod params;
pub mod potentials;
