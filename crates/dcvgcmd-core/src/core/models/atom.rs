use super::ids::{AtomTypeId, MoleculeId};
use nalgebra::{Point3, Vector3};

/// A named interaction site class with a fixed mass.
///
/// Pair potentials are registered per pair of atom types, so two chemically
/// identical groups belonging to different species (e.g. the CH3 of propane and
/// the CH3 of propene) are usually given distinct types.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomType {
    /// Human readable name (e.g. "propaneCH3").
    pub name: String,
    /// Mass in simulation units. `f64::INFINITY` marks an immobile site.
    pub mass: f64,
}

impl AtomType {
    pub fn new(name: &str, mass: f64) -> Self {
        Self {
            name: name.to_string(),
            mass,
        }
    }

    #[inline]
    pub fn is_mobile(&self) -> bool {
        self.mass.is_finite() && self.mass > 0.0
    }
}

/// A live atom in the configuration.
///
/// Atoms never exist on their own: every atom belongs to exactly one molecule
/// and carries its index inside that molecule so that bonded topology, which
/// is stored on the species, can be resolved without a lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The atom type, indexing into the system's type table.
    pub type_id: AtomTypeId,
    /// The parent molecule.
    pub molecule_id: MoleculeId,
    /// Position of this atom within the parent molecule's atom list.
    pub index_in_molecule: usize,
    /// Cartesian position.
    pub position: Point3<f64>,
    /// Cartesian velocity.
    pub velocity: Vector3<f64>,
    /// Anchor of the harmonic site tether, captured when the atom is added.
    pub site: Point3<f64>,
}

impl Atom {
    pub fn new(
        type_id: AtomTypeId,
        molecule_id: MoleculeId,
        index_in_molecule: usize,
        position: Point3<f64>,
    ) -> Self {
        Self {
            type_id,
            molecule_id,
            index_in_molecule,
            position,
            velocity: Vector3::zeros(),
            site: position,
        }
    }
}
