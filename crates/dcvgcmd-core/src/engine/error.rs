use nalgebra::{Point3, Vector3};
use std::fmt;
use thiserror::Error;

use super::config::ConfigError;
use super::exchange::region::Side;
use super::neighbors::switch::BackendKind;
use super::utils::sampling::SamplingError;
use crate::core::models::ids::{AtomId, MoleculeId, SpeciesId};

/// Which safety bound an atom crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// `|z|` exceeded half the box length along the constrained axis.
    Position,
    /// `|v_z|` exceeded the configured velocity limit.
    Velocity,
}

impl fmt::Display for BoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundKind::Position => write!(f, "position"),
            BoundKind::Velocity => write!(f, "velocity"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "Atom {atom:?} (molecule {molecule:?}, {species}) violated the {kind} bound at step {step}: position {position}, velocity {velocity}"
    )]
    BoundViolation {
        step: u64,
        kind: BoundKind,
        atom: AtomId,
        molecule: MoleculeId,
        species: SpeciesId,
        position: Point3<f64>,
        velocity: Vector3<f64>,
    },

    #[error("Invalid control region on the {side} side: {reason}")]
    InvalidRegion { side: Side, reason: String },

    #[error("The {backend} neighbor backend is stale and must be rebuilt before use")]
    StaleNeighborBackend { backend: BackendKind },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Random sampling failed: {source}")]
    Sampling {
        #[from]
        source: SamplingError,
    },

    #[error("Species not found in system: {0}")]
    SpeciesNotFound(SpeciesId),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
