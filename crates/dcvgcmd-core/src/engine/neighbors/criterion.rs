use crate::core::models::ids::{AtomId, AtomTypeId};
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::system::MolecularSystem;
use nalgebra::Point3;
use slotmap::SecondaryMap;
use std::fmt;

/// Decides which atom pairs are neighbors and when neighbor data go stale.
///
/// Criteria compose: a filter wraps an inner criterion, rejects the pairs it
/// is responsible for and delegates everything else, including the update
/// bookkeeping, to the criterion it wraps. The innermost criterion of every
/// chain is a [`DistanceCriterion`].
pub trait NeighborCriterion: fmt::Debug + Send + Sync {
    /// Returns `true` if `a` and `b` should be listed as neighbors.
    fn accept(&self, system: &MolecularSystem, a: AtomId, b: AtomId) -> bool;

    /// Returns `true` if `atom` moved far enough that lists built from its
    /// baseline position may miss a pair.
    fn need_update(&mut self, system: &MolecularSystem, atom: AtomId) -> bool;

    /// Returns `true` if the displacement seen by the last [`need_update`]
    /// was large enough that a pair may already have been missed.
    ///
    /// [`need_update`]: NeighborCriterion::need_update
    fn is_unsafe(&self) -> bool;

    /// Records the current position of `atom` as its baseline.
    fn reset(&mut self, system: &MolecularSystem, atom: AtomId);

    fn set_box(&mut self, sim_box: &SimulationBox);

    /// Radius inside which pairs are listed.
    fn neighbor_radius(&self) -> f64;
}

/// Accepts pairs closer than the neighbor radius and tracks per-atom drift.
#[derive(Debug, Clone)]
pub struct DistanceCriterion {
    interaction_range: f64,
    neighbor_radius: f64,
    safety_factor: f64,
    sim_box: Option<SimulationBox>,
    baselines: SecondaryMap<AtomId, Point3<f64>>,
    last_displacement_sq: f64,
}

impl DistanceCriterion {
    pub const DEFAULT_SAFETY_FACTOR: f64 = 0.4;

    pub fn new(interaction_range: f64, neighbor_radius: f64) -> Self {
        Self {
            interaction_range,
            neighbor_radius,
            safety_factor: Self::DEFAULT_SAFETY_FACTOR,
            sim_box: None,
            baselines: SecondaryMap::new(),
            last_displacement_sq: 0.0,
        }
    }

    pub fn with_safety_factor(mut self, safety_factor: f64) -> Self {
        self.safety_factor = safety_factor;
        self
    }

    pub fn interaction_range(&self) -> f64 {
        self.interaction_range
    }

    #[inline]
    fn skin(&self) -> f64 {
        self.neighbor_radius - self.interaction_range
    }

    #[inline]
    fn displacement_limit_sq(&self) -> f64 {
        let limit = self.safety_factor * self.skin();
        limit * limit
    }

    fn sim_box<'a>(&'a self, system: &'a MolecularSystem) -> &'a SimulationBox {
        self.sim_box.as_ref().unwrap_or_else(|| system.sim_box())
    }
}

impl NeighborCriterion for DistanceCriterion {
    fn accept(&self, system: &MolecularSystem, a: AtomId, b: AtomId) -> bool {
        let (Some(atom_a), Some(atom_b)) = (system.atom(a), system.atom(b)) else {
            return false;
        };
        let r2 = self
            .sim_box(system)
            .separation(&atom_a.position, &atom_b.position)
            .norm_squared();
        r2 < self.neighbor_radius * self.neighbor_radius
    }

    fn need_update(&mut self, system: &MolecularSystem, atom: AtomId) -> bool {
        let Some(current) = system.atom(atom).map(|a| a.position) else {
            return false;
        };
        let Some(baseline) = self.baselines.get(atom) else {
            self.last_displacement_sq = 0.0;
            return true;
        };
        let d2 = self
            .sim_box(system)
            .separation(baseline, &current)
            .norm_squared();
        self.last_displacement_sq = d2;
        d2 > self.displacement_limit_sq()
    }

    fn is_unsafe(&self) -> bool {
        let half_skin = 0.5 * self.skin();
        self.last_displacement_sq > half_skin * half_skin
    }

    fn reset(&mut self, system: &MolecularSystem, atom: AtomId) {
        if let Some(a) = system.atom(atom) {
            self.baselines.insert(atom, a.position);
        }
    }

    fn set_box(&mut self, sim_box: &SimulationBox) {
        self.sim_box = Some(sim_box.clone());
    }

    fn neighbor_radius(&self) -> f64 {
        self.neighbor_radius
    }
}

macro_rules! delegate_bookkeeping {
    () => {
        fn need_update(&mut self, system: &MolecularSystem, atom: AtomId) -> bool {
            self.inner.need_update(system, atom)
        }

        fn is_unsafe(&self) -> bool {
            self.inner.is_unsafe()
        }

        fn reset(&mut self, system: &MolecularSystem, atom: AtomId) {
            self.inner.reset(system, atom)
        }

        fn set_box(&mut self, sim_box: &SimulationBox) {
            self.inner.set_box(sim_box)
        }

        fn neighbor_radius(&self) -> f64 {
            self.inner.neighbor_radius()
        }
    };
}

/// Restricts a chain to one unordered pair of atom types.
#[derive(Debug)]
pub struct TypePairFilter {
    types: (AtomTypeId, AtomTypeId),
    inner: Box<dyn NeighborCriterion>,
}

impl TypePairFilter {
    pub fn new(types: (AtomTypeId, AtomTypeId), inner: Box<dyn NeighborCriterion>) -> Self {
        Self { types, inner }
    }

    fn matches(&self, a: AtomTypeId, b: AtomTypeId) -> bool {
        (a, b) == self.types || (b, a) == self.types
    }
}

impl NeighborCriterion for TypePairFilter {
    fn accept(&self, system: &MolecularSystem, a: AtomId, b: AtomId) -> bool {
        let (Some(atom_a), Some(atom_b)) = (system.atom(a), system.atom(b)) else {
            return false;
        };
        self.matches(atom_a.type_id, atom_b.type_id) && self.inner.accept(system, a, b)
    }

    delegate_bookkeeping!();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoleculeScope {
    /// Both atoms belong to the same molecule.
    Intra,
    /// The atoms belong to different molecules.
    Inter,
}

#[derive(Debug)]
pub struct MoleculeFilter {
    scope: MoleculeScope,
    inner: Box<dyn NeighborCriterion>,
}

impl MoleculeFilter {
    pub fn new(scope: MoleculeScope, inner: Box<dyn NeighborCriterion>) -> Self {
        Self { scope, inner }
    }
}

impl NeighborCriterion for MoleculeFilter {
    fn accept(&self, system: &MolecularSystem, a: AtomId, b: AtomId) -> bool {
        let (Some(atom_a), Some(atom_b)) = (system.atom(a), system.atom(b)) else {
            return false;
        };
        let same = atom_a.molecule_id == atom_b.molecule_id;
        let wanted = match self.scope {
            MoleculeScope::Intra => same,
            MoleculeScope::Inter => !same,
        };
        wanted && self.inner.accept(system, a, b)
    }

    delegate_bookkeeping!();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondedScope {
    /// Only pairs joined by a bond term.
    Adjacent,
    /// Every pair except those joined by a bond term.
    NonAdjacent,
}

#[derive(Debug)]
pub struct BondedFilter {
    scope: BondedScope,
    inner: Box<dyn NeighborCriterion>,
}

impl BondedFilter {
    pub fn new(scope: BondedScope, inner: Box<dyn NeighborCriterion>) -> Self {
        Self { scope, inner }
    }
}

fn are_bonded(system: &MolecularSystem, a: AtomId, b: AtomId) -> Option<bool> {
    let atom_a = system.atom(a)?;
    let atom_b = system.atom(b)?;
    if atom_a.molecule_id != atom_b.molecule_id {
        return Some(false);
    }
    let molecule = system.molecule(atom_a.molecule_id)?;
    let species = system.species(molecule.species)?;
    Some(species.are_bonded(atom_a.index_in_molecule, atom_b.index_in_molecule))
}

impl NeighborCriterion for BondedFilter {
    fn accept(&self, system: &MolecularSystem, a: AtomId, b: AtomId) -> bool {
        let Some(bonded) = are_bonded(system, a, b) else {
            return false;
        };
        let wanted = match self.scope {
            BondedScope::Adjacent => bonded,
            BondedScope::NonAdjacent => !bonded,
        };
        wanted && self.inner.accept(system, a, b)
    }

    delegate_bookkeeping!();
}
