use super::cell_list::CellList;
use super::registry::{Interaction, PotentialRegistry};
use super::switch::{BackendKind, NeighborEngine};
use crate::core::models::ids::AtomId;
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::system::MolecularSystem;
use slotmap::SecondaryMap;
use tracing::{trace, warn};

/// Per-atom neighbor lists built out to the neighbor radius.
///
/// The skin between the neighbor radius and the interaction range lets the
/// lists stay valid for several MD steps; the registry's criteria decide when
/// an atom has drifted far enough to require a rebuild. Lists are built
/// through an internal cell grid whose occupancy is updated incrementally
/// between rebuilds.
#[derive(Debug, Clone)]
pub struct VerletList {
    cells: CellList,
    lists: SecondaryMap<AtomId, Vec<Interaction>>,
    stale: bool,
    rebuilds: u64,
}

impl VerletList {
    pub fn new(sim_box: SimulationBox, range: f64) -> Self {
        Self {
            cells: CellList::new(sim_box, range),
            lists: SecondaryMap::new(),
            stale: true,
            rebuilds: 0,
        }
    }

    pub fn set_box(&mut self, sim_box: &SimulationBox) {
        self.cells.set_box(sim_box);
        self.stale = true;
    }

    /// Number of full list rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn neighbors(&self, atom: AtomId) -> &[Interaction] {
        self.lists.get(atom).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rebuilds the lists if any atom drifted past its criteria's limit.
    /// Returns `true` if a rebuild happened.
    pub fn update_if_needed(
        &mut self,
        system: &MolecularSystem,
        registry: &mut PotentialRegistry,
    ) -> bool {
        let mut needed = false;
        let mut unsafe_move = false;
        for (id, _) in system.atoms_iter() {
            let (need, unsafe_) = registry.need_update(system, id);
            needed |= need;
            unsafe_move |= unsafe_;
        }
        if unsafe_move {
            warn!("An atom moved more than half the neighbor skin since the last list rebuild; pairs may have been missed.");
        }
        if needed {
            self.build(system, registry);
        }
        needed
    }

    fn build(&mut self, system: &MolecularSystem, registry: &mut PotentialRegistry) {
        if self.cells.is_stale() {
            self.cells.assign(system);
        } else {
            let ids: Vec<AtomId> = system.atoms_iter().map(|(id, _)| id).collect();
            for id in ids {
                self.cells.relocate(system, id);
            }
        }

        self.lists.clear();
        for (id, _) in system.atoms_iter() {
            self.lists.insert(id, Vec::new());
            registry.reset(system, id);
        }

        let registry = &*registry;
        let lists = &mut self.lists;
        self.cells.for_each_candidate_pair(|a, b| {
            registry.for_each_accepting(system, a, b, |entry| {
                if let Some(list) = lists.get_mut(a) {
                    list.push(Interaction { other: b, entry });
                }
                if let Some(list) = lists.get_mut(b) {
                    list.push(Interaction { other: a, entry });
                }
            });
        });

        self.stale = false;
        self.rebuilds += 1;
        trace!(
            atoms = system.atom_count(),
            rebuilds = self.rebuilds,
            "Verlet lists rebuilt."
        );
    }
}

impl NeighborEngine for VerletList {
    fn kind(&self) -> BackendKind {
        BackendKind::VerletList
    }

    fn is_stale(&self) -> bool {
        self.stale
    }

    fn mark_stale(&mut self) {
        self.stale = true;
        self.cells.mark_stale();
    }

    fn set_range(&mut self, range: f64) {
        self.cells.set_range(range);
        self.stale = true;
    }

    fn rebuild(&mut self, system: &MolecularSystem, registry: &mut PotentialRegistry) {
        self.cells.mark_stale();
        self.build(system, registry);
    }

    fn molecule_added(&mut self, _system: &MolecularSystem, _atoms: &[AtomId]) {
        self.mark_stale();
    }

    fn molecule_removed(&mut self, _atoms: &[AtomId]) {
        self.mark_stale();
    }

    fn positions_changed(&mut self, system: &MolecularSystem, registry: &mut PotentialRegistry) {
        if !self.stale {
            self.update_if_needed(system, registry);
        }
    }

    fn interactions_of(
        &self,
        _system: &MolecularSystem,
        _registry: &PotentialRegistry,
        atom: AtomId,
    ) -> Vec<Interaction> {
        self.neighbors(atom).to_vec()
    }

    fn pair_interactions(
        &self,
        _system: &MolecularSystem,
        _registry: &PotentialRegistry,
    ) -> Vec<(AtomId, AtomId, usize)> {
        self.lists
            .iter()
            .flat_map(|(a, list)| {
                list.iter()
                    .filter(move |i| a < i.other)
                    .map(move |i| (a, i.other, i.entry))
            })
            .collect()
    }
}
