use super::criterion::NeighborCriterion;
use crate::core::forcefield::params::PairPotential;
use crate::core::models::ids::{AtomId, AtomTypeId};
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::system::MolecularSystem;
use std::collections::HashMap;

/// A registered pair potential together with the criterion chain deciding
/// which atom pairs it applies to.
#[derive(Debug)]
pub struct PotentialEntry {
    pub types: (AtomTypeId, AtomTypeId),
    pub potential: PairPotential,
    pub criterion: Box<dyn NeighborCriterion>,
}

/// Pair potentials indexed by unordered atom-type pair.
///
/// Both neighbor engines consult the same registry, so a pair is listed by
/// either engine exactly when one of the entries for its type pair accepts it.
#[derive(Debug, Default)]
pub struct PotentialRegistry {
    entries: Vec<PotentialEntry>,
    by_types: HashMap<(AtomTypeId, AtomTypeId), Vec<usize>>,
}

/// A pair listed by a neighbor engine: the partner atom and the index of the
/// potential entry that accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interaction {
    pub other: AtomId,
    pub entry: usize,
}

#[inline]
fn ordered(a: AtomTypeId, b: AtomTypeId) -> (AtomTypeId, AtomTypeId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl PotentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry and returns its index.
    pub fn add(&mut self, entry: PotentialEntry) -> usize {
        let index = self.entries.len();
        self.by_types
            .entry(ordered(entry.types.0, entry.types.1))
            .or_default()
            .push(index);
        self.entries.push(entry);
        index
    }

    pub fn entry(&self, index: usize) -> &PotentialEntry {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[PotentialEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest neighbor radius over all entries; zero if none are registered.
    pub fn max_neighbor_radius(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.criterion.neighbor_radius())
            .fold(0.0, f64::max)
    }

    pub fn set_box(&mut self, sim_box: &SimulationBox) {
        for entry in &mut self.entries {
            entry.criterion.set_box(sim_box);
        }
    }

    /// Calls `f` with the index of every entry that accepts the pair.
    pub fn for_each_accepting(
        &self,
        system: &MolecularSystem,
        a: AtomId,
        b: AtomId,
        mut f: impl FnMut(usize),
    ) {
        let (Some(atom_a), Some(atom_b)) = (system.atom(a), system.atom(b)) else {
            return;
        };
        let Some(candidates) = self.by_types.get(&ordered(atom_a.type_id, atom_b.type_id)) else {
            return;
        };
        for &index in candidates {
            if self.entries[index].criterion.accept(system, a, b) {
                f(index);
            }
        }
    }

    /// Returns `true` if any entry's criteria report that `atom` drifted
    /// beyond its safe displacement. The second flag reports whether any of
    /// those displacements was unsafe.
    pub fn need_update(&mut self, system: &MolecularSystem, atom: AtomId) -> (bool, bool) {
        let mut needed = false;
        let mut unsafe_move = false;
        for entry in &mut self.entries {
            if entry.criterion.need_update(system, atom) {
                needed = true;
                unsafe_move |= entry.criterion.is_unsafe();
            }
        }
        (needed, unsafe_move)
    }

    pub fn reset(&mut self, system: &MolecularSystem, atom: AtomId) {
        for entry in &mut self.entries {
            entry.criterion.reset(system, atom);
        }
    }
}
