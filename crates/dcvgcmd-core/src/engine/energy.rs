use super::config::NeighborConfig;
use super::error::EngineError;
use super::neighbors::criterion::{
    BondedFilter, BondedScope, DistanceCriterion, MoleculeFilter, MoleculeScope,
    NeighborCriterion, TypePairFilter,
};
use super::neighbors::switch::NeighborBackendSwitch;
use crate::core::forcefield::bonded;
use crate::core::forcefield::params::{PairPotential, WallPotential};
use crate::core::models::ids::{AtomId, AtomTypeId, MoleculeId};
use crate::core::models::simulation_box::{CONSTRAINED_AXIS, SimulationBox};
use crate::core::models::system::MolecularSystem;
use nalgebra::Vector3;
use slotmap::SecondaryMap;
use std::collections::HashMap;
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Which atom pairs a pair potential applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairScope {
    /// Only atoms of different molecules.
    #[default]
    Intermolecular,
    /// Atoms of different molecules, plus atoms of one molecule that are
    /// not joined by a bond.
    NonBonded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairRegistration {
    pub types: (AtomTypeId, AtomTypeId),
    pub potential: PairPotential,
    pub scope: PairScope,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallRegistration {
    pub atom_type: AtomTypeId,
    pub wall: WallPotential,
}

/// Every interaction the evaluator should know about, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionSet {
    pub pairs: Vec<PairRegistration>,
    pub walls: Vec<WallRegistration>,
}

/// Forces on every atom together with the potential energy they derive from.
#[derive(Debug, Clone, Default)]
pub struct Forces {
    pub per_atom: SecondaryMap<AtomId, Vector3<f64>>,
    pub potential_energy: f64,
}

/// Evaluates energies and forces of the live configuration.
///
/// Pair terms are enumerated through the [`NeighborBackendSwitch`], so every
/// query fails with [`EngineError::StaleNeighborBackend`] if the authoritative
/// engine has not been rebuilt since it was last invalidated. Bonded terms
/// come from the species topology; tethers and walls act on single atoms.
#[derive(Debug)]
pub struct EnergyEvaluator {
    neighbors: NeighborBackendSwitch,
    walls: HashMap<AtomTypeId, WallPotential>,
}

impl EnergyEvaluator {
    pub fn new(sim_box: SimulationBox) -> Self {
        Self {
            neighbors: NeighborBackendSwitch::new(sim_box),
            walls: HashMap::new(),
        }
    }

    pub fn from_interactions(
        sim_box: SimulationBox,
        interactions: &InteractionSet,
        neighbor_config: &NeighborConfig,
    ) -> Self {
        let mut evaluator = Self::new(sim_box);
        for pair in &interactions.pairs {
            evaluator.add_pair(pair, neighbor_config);
        }
        for wall in &interactions.walls {
            evaluator.add_wall(wall.atom_type, wall.wall);
        }
        evaluator
    }

    /// Registers a pair potential behind the default criterion chain for its
    /// scope: type pair, then molecule or bond exclusion, then distance.
    pub fn add_pair(&mut self, pair: &PairRegistration, neighbor_config: &NeighborConfig) -> usize {
        let range = pair.potential.range();
        let distance = Box::new(
            DistanceCriterion::new(range, range * neighbor_config.range_factor)
                .with_safety_factor(neighbor_config.safety_factor),
        );
        let scoped: Box<dyn NeighborCriterion> = match pair.scope {
            PairScope::Intermolecular => {
                Box::new(MoleculeFilter::new(MoleculeScope::Inter, distance))
            }
            PairScope::NonBonded => Box::new(BondedFilter::new(BondedScope::NonAdjacent, distance)),
        };
        let criterion = Box::new(TypePairFilter::new(pair.types, scoped));
        self.neighbors.register(pair.types, pair.potential, criterion)
    }

    pub fn add_wall(&mut self, atom_type: AtomTypeId, wall: WallPotential) {
        self.walls.insert(atom_type, wall);
    }

    pub fn neighbors(&self) -> &NeighborBackendSwitch {
        &self.neighbors
    }

    pub fn neighbors_mut(&mut self) -> &mut NeighborBackendSwitch {
        &mut self.neighbors
    }

    /// Notifies the neighbor engines that a molecule was added.
    pub fn molecule_added(&mut self, system: &MolecularSystem, molecule: MoleculeId) {
        if let Some(m) = system.molecule(molecule) {
            let atoms = m.atoms().to_vec();
            self.neighbors.molecule_added(system, &atoms);
        }
    }

    /// Notifies the neighbor engines that a molecule's atoms were removed.
    pub fn molecule_removed(&mut self, system: &MolecularSystem, atoms: &[AtomId]) {
        self.neighbors.molecule_removed(system, atoms);
    }

    #[inline]
    fn pair_energy(&self, system: &MolecularSystem, a: AtomId, b: AtomId, entry: usize) -> f64 {
        let (Some(atom_a), Some(atom_b)) = (system.atom(a), system.atom(b)) else {
            return 0.0;
        };
        let r = system
            .sim_box()
            .separation(&atom_a.position, &atom_b.position)
            .norm();
        self.neighbors.registry().entry(entry).potential.energy(r)
    }

    /// Tether and wall energy of one atom.
    fn one_body_energy(&self, system: &MolecularSystem, atom: AtomId) -> f64 {
        let Some(a) = system.atom(atom) else {
            return 0.0;
        };
        let mut energy = 0.0;
        if let Some(wall) = self.walls.get(&a.type_id) {
            let half = system.sim_box().half_length(CONSTRAINED_AXIS);
            energy += wall.energy(a.position[CONSTRAINED_AXIS], half);
        }
        let tether = system
            .molecule(a.molecule_id)
            .and_then(|m| system.species(m.species))
            .and_then(|s| s.tether());
        if let Some(tether) = tether {
            energy += bonded::tether_energy(tether, &a.position, &a.site, Some(system.sim_box()));
        }
        energy
    }

    fn bonded_energy(&self, system: &MolecularSystem, molecule: MoleculeId) -> f64 {
        let Some(species) = system
            .molecule(molecule)
            .and_then(|m| system.species(m.species))
        else {
            return 0.0;
        };
        if !species.has_bonded_terms() {
            return 0.0;
        }
        system
            .molecule_positions(molecule)
            .map(|p| bonded::intramolecular_energy(species, &p, Some(system.sim_box())))
            .unwrap_or(0.0)
    }

    /// Potential energy of the whole configuration.
    #[instrument(level = "trace", skip_all)]
    pub fn total_energy(&self, system: &MolecularSystem) -> Result<f64, EngineError> {
        let pairs = self.neighbors.pair_interactions(system)?;

        #[cfg(not(feature = "parallel"))]
        let pair_energy: f64 = pairs
            .iter()
            .map(|&(a, b, e)| self.pair_energy(system, a, b, e))
            .sum();
        #[cfg(feature = "parallel")]
        let pair_energy: f64 = pairs
            .par_iter()
            .map(|&(a, b, e)| self.pair_energy(system, a, b, e))
            .sum();

        let bonded: f64 = system
            .molecules_iter()
            .map(|(id, _)| self.bonded_energy(system, id))
            .sum();
        let one_body: f64 = system
            .atoms_iter()
            .map(|(id, _)| self.one_body_energy(system, id))
            .sum();
        Ok(pair_energy + bonded + one_body)
    }

    /// Energy of one molecule with everything else: its pair interactions
    /// (intramolecular pairs counted once), its bonded terms and the one-body
    /// terms of its atoms. Removing the molecule changes the total energy by
    /// exactly this amount.
    pub fn molecule_energy(
        &self,
        system: &MolecularSystem,
        molecule: MoleculeId,
    ) -> Result<f64, EngineError> {
        let Some(m) = system.molecule(molecule) else {
            return Ok(0.0);
        };
        let mut energy = self.bonded_energy(system, molecule);
        for &a in m.atoms() {
            energy += self.one_body_energy(system, a);
            for interaction in self.neighbors.interactions_of(system, a)? {
                let other = interaction.other;
                let same_molecule = system
                    .atom(other)
                    .is_some_and(|o| o.molecule_id == molecule);
                if same_molecule && other < a {
                    continue;
                }
                energy += self.pair_energy(system, a, other, interaction.entry);
            }
        }
        Ok(energy)
    }

    /// Forces on every atom, `-dU/dr`.
    #[instrument(level = "trace", skip_all)]
    pub fn compute_forces(&self, system: &MolecularSystem) -> Result<Forces, EngineError> {
        let mut forces = Forces::default();
        for (id, _) in system.atoms_iter() {
            forces.per_atom.insert(id, Vector3::zeros());
        }
        let sim_box = system.sim_box();

        for (a, b, entry) in self.neighbors.pair_interactions(system)? {
            let (Some(atom_a), Some(atom_b)) = (system.atom(a), system.atom(b)) else {
                continue;
            };
            let dr = sim_box.separation(&atom_a.position, &atom_b.position);
            let r = dr.norm();
            let potential = &self.neighbors.registry().entry(entry).potential;
            forces.potential_energy += potential.energy(r);
            if r > 0.0 {
                let f_b = -potential.derivative(r) * dr / r;
                forces.per_atom[b] += f_b;
                forces.per_atom[a] -= f_b;
            }
        }

        for (id, molecule) in system.molecules_iter() {
            let Some(species) = system.species(molecule.species) else {
                continue;
            };
            if species.has_bonded_terms() {
                let Some(positions) = system.molecule_positions(id) else {
                    continue;
                };
                let mut local = vec![Vector3::zeros(); positions.len()];
                forces.potential_energy += bonded::accumulate_intramolecular_forces(
                    species,
                    &positions,
                    Some(sim_box),
                    &mut local,
                );
                for (&atom_id, f) in molecule.atoms().iter().zip(local) {
                    forces.per_atom[atom_id] += f;
                }
            }
            for &atom_id in molecule.atoms() {
                let Some(atom) = system.atom(atom_id) else {
                    continue;
                };
                if let Some(tether) = species.tether() {
                    forces.potential_energy +=
                        bonded::tether_energy(tether, &atom.position, &atom.site, Some(sim_box));
                    forces.per_atom[atom_id] +=
                        bonded::tether_force(tether, &atom.position, &atom.site, Some(sim_box));
                }
                if let Some(wall) = self.walls.get(&atom.type_id) {
                    let half = sim_box.half_length(CONSTRAINED_AXIS);
                    let z = atom.position[CONSTRAINED_AXIS];
                    forces.potential_energy += wall.energy(z, half);
                    forces.per_atom[atom_id][CONSTRAINED_AXIS] += wall.force(z, half);
                }
            }
        }

        Ok(forces)
    }
}
