//! # Core Models Module
//!
//! Data structures describing the particle configuration shared by the Monte
//! Carlo and molecular dynamics samplers.
//!
//! ## Key Components
//!
//! - [`atom`] - Atom types and atoms with position, velocity and tether site
//! - [`molecule`] - Ordered atom lists tagged with their species
//! - [`species`] - Shared topology: template geometry, bonds, angles, tether
//! - [`simulation_box`] - The slit box and its minimum-image convention
//! - [`system`] - Slot-map storage of every live atom and molecule
//! - [`ids`] - Stable identifiers for atoms, molecules, types and species

pub mod atom;
pub mod ids;
pub mod molecule;
pub mod simulation_box;
pub mod species;
pub mod system;
