use super::ids::{AtomId, SpeciesId};

/// A molecule is an ordered list of atoms sharing one species topology.
///
/// The order of `atoms` matches the order of the species template, so
/// `atoms[i]` is the atom that bond and angle terms refer to as index `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub species: SpeciesId,
    atoms: Vec<AtomId>,
}

impl Molecule {
    pub(crate) fn new(species: SpeciesId) -> Self {
        Self {
            species,
            atoms: Vec::new(),
        }
    }

    pub(crate) fn push_atom(&mut self, atom_id: AtomId) {
        self.atoms.push(atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
