//! # Core Module
//!
//! This module provides the stateless building blocks of the simulation: the
//! particle configuration, the potentials acting on it, and geometric helpers.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, molecules, species, the slit box and the live system
//! - **Potentials** ([`forcefield`]) - Lennard-Jones pairs, bonded terms, site tethers and walls
//! - **Geometry** ([`utils`]) - Random rotations and rigid-body helpers
//!
//! ## Conventions
//!
//! Energies and temperatures share one unit (Boltzmann's constant is 1). The
//! box is centred on the origin, periodic along x and y and walled along z,
//! the axis across which the concentration gradient is sustained.

pub mod forcefield;
pub mod models;
pub mod utils;
