use super::cell_list::CellList;
use super::criterion::NeighborCriterion;
use super::registry::{Interaction, PotentialEntry, PotentialRegistry};
use super::verlet_list::VerletList;
use crate::core::forcefield::params::PairPotential;
use crate::core::models::ids::{AtomId, AtomTypeId};
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::system::MolecularSystem;
use crate::engine::error::EngineError;
use std::fmt;
use tracing::{debug, trace};

/// The two spatial-partition engines kept over the shared configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    CellList,
    VerletList,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::CellList => write!(f, "cell-list"),
            BackendKind::VerletList => write!(f, "Verlet-list"),
        }
    }
}

/// Common surface of the cell-list and Verlet-list engines.
pub trait NeighborEngine {
    fn kind(&self) -> BackendKind;
    fn is_stale(&self) -> bool;
    fn mark_stale(&mut self);
    /// Adopts a new neighbor radius. Leaves the engine stale.
    fn set_range(&mut self, range: f64);
    fn rebuild(&mut self, system: &MolecularSystem, registry: &mut PotentialRegistry);
    fn molecule_added(&mut self, system: &MolecularSystem, atoms: &[AtomId]);
    fn molecule_removed(&mut self, atoms: &[AtomId]);
    fn positions_changed(&mut self, system: &MolecularSystem, registry: &mut PotentialRegistry);
    /// Every accepted interaction of `atom`, in both directions.
    fn interactions_of(
        &self,
        system: &MolecularSystem,
        registry: &PotentialRegistry,
        atom: AtomId,
    ) -> Vec<Interaction>;
    /// Every accepted interaction, each unordered pair once.
    fn pair_interactions(
        &self,
        system: &MolecularSystem,
        registry: &PotentialRegistry,
    ) -> Vec<(AtomId, AtomId, usize)>;
}

/// Owns both neighbor engines and routes queries to the authoritative one.
///
/// Only one engine answers queries at a time. Structural and positional
/// notifications keep the authoritative engine current and mark the other
/// one stale; a stale engine refuses queries until [`select`] or [`refresh`]
/// rebuilds it.
///
/// [`select`]: NeighborBackendSwitch::select
/// [`refresh`]: NeighborBackendSwitch::refresh
#[derive(Debug)]
pub struct NeighborBackendSwitch {
    registry: PotentialRegistry,
    cell_list: CellList,
    verlet_list: VerletList,
    active: BackendKind,
    sim_box: SimulationBox,
}

impl NeighborBackendSwitch {
    pub fn new(sim_box: SimulationBox) -> Self {
        Self {
            registry: PotentialRegistry::new(),
            cell_list: CellList::new(sim_box.clone(), 0.0),
            verlet_list: VerletList::new(sim_box.clone(), 0.0),
            active: BackendKind::CellList,
            sim_box,
        }
    }

    /// Registers a pair potential with its criterion chain. Both engines
    /// adopt the largest neighbor radius registered so far and become stale.
    pub fn register(
        &mut self,
        types: (AtomTypeId, AtomTypeId),
        potential: PairPotential,
        mut criterion: Box<dyn NeighborCriterion>,
    ) -> usize {
        criterion.set_box(&self.sim_box);
        let index = self.registry.add(PotentialEntry {
            types,
            potential,
            criterion,
        });
        let range = self.registry.max_neighbor_radius();
        self.cell_list.set_range(range);
        self.verlet_list.set_range(range);
        debug!(
            entry = index,
            types = ?types,
            neighbor_range = range,
            "Registered pair potential."
        );
        index
    }

    pub fn registry(&self) -> &PotentialRegistry {
        &self.registry
    }

    pub fn active(&self) -> BackendKind {
        self.active
    }

    pub fn is_stale(&self, kind: BackendKind) -> bool {
        self.engine(kind).is_stale()
    }

    pub fn verlet_list(&self) -> &VerletList {
        &self.verlet_list
    }

    fn engine(&self, kind: BackendKind) -> &dyn NeighborEngine {
        match kind {
            BackendKind::CellList => &self.cell_list as &dyn NeighborEngine,
            BackendKind::VerletList => &self.verlet_list as &dyn NeighborEngine,
        }
    }

    fn split_mut(
        &mut self,
    ) -> (
        &mut dyn NeighborEngine,
        &mut dyn NeighborEngine,
        &mut PotentialRegistry,
    ) {
        match self.active {
            BackendKind::CellList => (
                &mut self.cell_list as &mut dyn NeighborEngine,
                &mut self.verlet_list as &mut dyn NeighborEngine,
                &mut self.registry,
            ),
            BackendKind::VerletList => (
                &mut self.verlet_list as &mut dyn NeighborEngine,
                &mut self.cell_list as &mut dyn NeighborEngine,
                &mut self.registry,
            ),
        }
    }

    /// Makes `kind` authoritative and force-rebuilds both engines.
    pub fn select(&mut self, kind: BackendKind, system: &MolecularSystem) {
        self.active = kind;
        self.cell_list.rebuild(system, &mut self.registry);
        self.verlet_list.rebuild(system, &mut self.registry);
        trace!(backend = %kind, "Neighbor backend selected.");
    }

    /// Force-rebuilds the authoritative engine.
    pub fn refresh(&mut self, system: &MolecularSystem) {
        let (active, _, registry) = self.split_mut();
        active.rebuild(system, registry);
    }

    pub fn molecule_added(&mut self, system: &MolecularSystem, atoms: &[AtomId]) {
        let (active, inactive, registry) = self.split_mut();
        inactive.mark_stale();
        active.molecule_added(system, atoms);
        if active.is_stale() {
            active.rebuild(system, registry);
        }
    }

    pub fn molecule_removed(&mut self, system: &MolecularSystem, atoms: &[AtomId]) {
        let (active, inactive, registry) = self.split_mut();
        inactive.mark_stale();
        active.molecule_removed(atoms);
        if active.is_stale() {
            active.rebuild(system, registry);
        }
    }

    /// Lets the authoritative engine catch up with moved atoms.
    pub fn positions_changed(&mut self, system: &MolecularSystem) {
        let (active, inactive, registry) = self.split_mut();
        inactive.mark_stale();
        active.positions_changed(system, registry);
    }

    fn checked(&self, kind: BackendKind) -> Result<&dyn NeighborEngine, EngineError> {
        let engine = self.engine(kind);
        if engine.is_stale() {
            return Err(EngineError::StaleNeighborBackend { backend: kind });
        }
        Ok(engine)
    }

    pub fn interactions_of(
        &self,
        system: &MolecularSystem,
        atom: AtomId,
    ) -> Result<Vec<Interaction>, EngineError> {
        let engine = self.checked(self.active)?;
        if self.registry.is_empty() {
            return Ok(Vec::new());
        }
        Ok(engine.interactions_of(system, &self.registry, atom))
    }

    pub fn pair_interactions(
        &self,
        system: &MolecularSystem,
    ) -> Result<Vec<(AtomId, AtomId, usize)>, EngineError> {
        self.pair_interactions_from(self.active, system)
    }

    /// Queries a specific engine, authoritative or not.
    pub fn pair_interactions_from(
        &self,
        kind: BackendKind,
        system: &MolecularSystem,
    ) -> Result<Vec<(AtomId, AtomId, usize)>, EngineError> {
        let engine = self.checked(kind)?;
        if self.registry.is_empty() {
            return Ok(Vec::new());
        }
        Ok(engine.pair_interactions(system, &self.registry))
    }
}
