use super::registry::{Interaction, PotentialRegistry};
use super::switch::{BackendKind, NeighborEngine};
use crate::core::models::ids::AtomId;
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::system::MolecularSystem;
use itertools::Itertools;
use nalgebra::Point3;
use slotmap::SecondaryMap;
use tracing::trace;

/// Uniform spatial grid with cells at least one neighbor radius wide.
///
/// Every pair closer than the neighbor radius lies in the same or in adjacent
/// cells, so candidate pairs come from a fixed stencil of at most 27 cells.
/// Atoms can be inserted, removed or relocated one at a time, which keeps the
/// grid current across exchange moves without a full rebuild.
#[derive(Debug, Clone)]
pub struct CellList {
    sim_box: SimulationBox,
    range: f64,
    dims: [usize; 3],
    cells: Vec<Vec<AtomId>>,
    atom_cell: SecondaryMap<AtomId, usize>,
    neighbor_cells: Vec<Vec<usize>>,
    stale: bool,
}

impl CellList {
    pub fn new(sim_box: SimulationBox, range: f64) -> Self {
        let mut list = Self {
            sim_box,
            range,
            dims: [1; 3],
            cells: Vec::new(),
            atom_cell: SecondaryMap::new(),
            neighbor_cells: Vec::new(),
            stale: true,
        };
        list.layout();
        list
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn set_box(&mut self, sim_box: &SimulationBox) {
        self.sim_box = sim_box.clone();
        self.layout();
    }

    fn layout(&mut self) {
        for axis in 0..3 {
            let l = self.sim_box.length(axis);
            self.dims[axis] = if self.range > 0.0 {
                ((l / self.range).floor() as usize).max(1)
            } else {
                1
            };
        }
        let n = self.dims.iter().product();
        self.cells = vec![Vec::new(); n];
        self.atom_cell.clear();
        self.neighbor_cells = (0..n).map(|c| self.stencil(c)).collect();
        self.stale = true;
    }

    #[inline]
    fn flatten(&self, idx: [usize; 3]) -> usize {
        (idx[0] * self.dims[1] + idx[1]) * self.dims[2] + idx[2]
    }

    fn unflatten(&self, cell: usize) -> [usize; 3] {
        let z = cell % self.dims[2];
        let y = (cell / self.dims[2]) % self.dims[1];
        let x = cell / (self.dims[1] * self.dims[2]);
        [x, y, z]
    }

    /// The cell itself and its adjacent cells, wrapped along periodic axes,
    /// clipped along walled ones, without duplicates.
    fn stencil(&self, cell: usize) -> Vec<usize> {
        let centre = self.unflatten(cell);
        let mut out = Vec::with_capacity(27);
        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                for dz in -1i64..=1 {
                    let mut idx = [0usize; 3];
                    let mut inside = true;
                    for (axis, d) in [dx, dy, dz].into_iter().enumerate() {
                        let n = self.dims[axis] as i64;
                        let i = centre[axis] as i64 + d;
                        if self.sim_box.is_periodic(axis) {
                            idx[axis] = i.rem_euclid(n) as usize;
                        } else if (0..n).contains(&i) {
                            idx[axis] = i as usize;
                        } else {
                            inside = false;
                        }
                    }
                    if inside {
                        out.push(self.flatten(idx));
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn cell_of(&self, p: &Point3<f64>) -> usize {
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let u = self.sim_box.fractional(axis, p[axis]);
            idx[axis] = ((u * self.dims[axis] as f64) as usize).min(self.dims[axis] - 1);
        }
        self.flatten(idx)
    }

    /// Reassigns every atom from scratch.
    pub fn assign(&mut self, system: &MolecularSystem) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.atom_cell.clear();
        for (id, atom) in system.atoms_iter() {
            let cell = self.cell_of(&atom.position);
            self.cells[cell].push(id);
            self.atom_cell.insert(id, cell);
        }
        self.stale = false;
        trace!(
            atoms = system.atom_count(),
            cells = self.cells.len(),
            "Cell list reassigned."
        );
    }

    pub fn insert(&mut self, system: &MolecularSystem, atom: AtomId) {
        let Some(position) = system.atom(atom).map(|a| a.position) else {
            return;
        };
        let cell = self.cell_of(&position);
        self.cells[cell].push(atom);
        self.atom_cell.insert(atom, cell);
    }

    pub fn remove(&mut self, atom: AtomId) {
        if let Some(cell) = self.atom_cell.remove(atom) {
            if let Some(pos) = self.cells[cell].iter().position(|&a| a == atom) {
                self.cells[cell].swap_remove(pos);
            }
        }
    }

    /// Moves `atom` to the cell matching its current position. Returns `true`
    /// if it changed cell.
    pub fn relocate(&mut self, system: &MolecularSystem, atom: AtomId) -> bool {
        let Some(position) = system.atom(atom).map(|a| a.position) else {
            return false;
        };
        let new_cell = self.cell_of(&position);
        match self.atom_cell.get(atom).copied() {
            Some(old) if old == new_cell => false,
            _ => {
                self.remove(atom);
                self.cells[new_cell].push(atom);
                self.atom_cell.insert(atom, new_cell);
                true
            }
        }
    }

    /// Atoms sharing the stencil of `atom`'s cell, excluding `atom` itself.
    pub fn candidates(&self, atom: AtomId) -> impl Iterator<Item = AtomId> + '_ {
        let stencil = self
            .atom_cell
            .get(atom)
            .map(|&c| self.neighbor_cells[c].as_slice())
            .unwrap_or(&[]);
        stencil
            .iter()
            .flat_map(move |&c| self.cells[c].iter().copied())
            .filter(move |&other| other != atom)
    }

    /// Calls `f` once for every unordered candidate pair.
    pub fn for_each_candidate_pair(&self, mut f: impl FnMut(AtomId, AtomId)) {
        for (c, members) in self.cells.iter().enumerate() {
            for (&a, &b) in members.iter().tuple_combinations() {
                f(a, b);
            }
            for &n in self.neighbor_cells[c].iter().filter(|&&n| n > c) {
                for (&a, &b) in members.iter().cartesian_product(&self.cells[n]) {
                    f(a, b);
                }
            }
        }
    }
}

impl NeighborEngine for CellList {
    fn kind(&self) -> BackendKind {
        BackendKind::CellList
    }

    fn is_stale(&self) -> bool {
        self.stale
    }

    fn mark_stale(&mut self) {
        self.stale = true;
    }

    fn set_range(&mut self, range: f64) {
        self.range = range;
        self.layout();
    }

    fn rebuild(&mut self, system: &MolecularSystem, _registry: &mut PotentialRegistry) {
        self.assign(system);
    }

    fn molecule_added(&mut self, system: &MolecularSystem, atoms: &[AtomId]) {
        if self.stale {
            return;
        }
        for &atom in atoms {
            self.insert(system, atom);
        }
    }

    fn molecule_removed(&mut self, atoms: &[AtomId]) {
        if self.stale {
            return;
        }
        for &atom in atoms {
            self.remove(atom);
        }
    }

    fn positions_changed(&mut self, system: &MolecularSystem, _registry: &mut PotentialRegistry) {
        if self.stale {
            return;
        }
        let ids: Vec<AtomId> = system.atoms_iter().map(|(id, _)| id).collect();
        for id in ids {
            self.relocate(system, id);
        }
    }

    fn interactions_of(
        &self,
        system: &MolecularSystem,
        registry: &PotentialRegistry,
        atom: AtomId,
    ) -> Vec<Interaction> {
        let mut out = Vec::new();
        for other in self.candidates(atom) {
            registry.for_each_accepting(system, atom, other, |entry| {
                out.push(Interaction { other, entry })
            });
        }
        out
    }

    fn pair_interactions(
        &self,
        system: &MolecularSystem,
        registry: &PotentialRegistry,
    ) -> Vec<(AtomId, AtomId, usize)> {
        let mut out = Vec::new();
        self.for_each_candidate_pair(|a, b| {
            registry.for_each_accepting(system, a, b, |entry| out.push((a, b, entry)));
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::AtomType;
    use crate::core::models::species::Species;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn random_system(n: usize, seed: u64) -> MolecularSystem {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut system = MolecularSystem::new(SimulationBox::slit(12.0, 12.0, 30.0));
        let t = system.add_atom_type(AtomType::new("A", 1.0));
        let s = system.add_species(Species::monatomic("a", t)).unwrap();
        for _ in 0..n {
            let p = Point3::new(
                rng.gen_range(-6.0..6.0),
                rng.gen_range(-6.0..6.0),
                rng.gen_range(-15.0..15.0),
            );
            system.add_molecule_at(s, p).unwrap();
        }
        system
    }

    fn brute_force_pairs(system: &MolecularSystem, range: f64) -> HashSet<(AtomId, AtomId)> {
        let atoms: Vec<_> = system.atoms_iter().collect();
        atoms
            .iter()
            .tuple_combinations()
            .filter(|((_, a), (_, b))| {
                system.sim_box().separation(&a.position, &b.position).norm() < range
            })
            .map(|(&(a, _), &(b, _))| if a < b { (a, b) } else { (b, a) })
            .collect()
    }

    fn cell_pairs_within(list: &CellList, system: &MolecularSystem, range: f64) -> HashSet<(AtomId, AtomId)> {
        let mut out = HashSet::new();
        let mut count = 0usize;
        list.for_each_candidate_pair(|a, b| {
            count += 1;
            let pa = system.atom(a).unwrap().position;
            let pb = system.atom(b).unwrap().position;
            if system.sim_box().separation(&pa, &pb).norm() < range {
                assert!(out.insert(if a < b { (a, b) } else { (b, a) }), "pair visited twice");
            }
        });
        assert!(count > 0);
        out
    }

    #[test]
    fn layout_uses_cells_at_least_range_wide() {
        let list = CellList::new(SimulationBox::slit(12.0, 12.0, 30.0), 2.5);
        assert_eq!(list.dims(), [4, 4, 12]);
        let coarse = CellList::new(SimulationBox::slit(12.0, 12.0, 30.0), 20.0);
        assert_eq!(coarse.dims(), [1, 1, 1]);
    }

    #[test]
    fn candidate_pairs_cover_all_close_pairs_exactly_once() {
        let system = random_system(150, 1);
        let mut list = CellList::new(system.sim_box().clone(), 2.5);
        list.assign(&system);
        assert_eq!(
            cell_pairs_within(&list, &system, 2.5),
            brute_force_pairs(&system, 2.5)
        );
    }

    #[test]
    fn small_periodic_grid_does_not_double_count() {
        let system = random_system(40, 2);
        let mut list = CellList::new(system.sim_box().clone(), 5.0);
        assert_eq!(list.dims()[0], 2);
        list.assign(&system);
        assert_eq!(
            cell_pairs_within(&list, &system, 5.0),
            brute_force_pairs(&system, 5.0)
        );
    }

    #[test]
    fn incremental_updates_match_full_reassignment() {
        let mut system = random_system(60, 3);
        let mut list = CellList::new(system.sim_box().clone(), 3.0);
        list.assign(&system);

        let removed: Vec<_> = system.molecules_iter().map(|(id, _)| id).take(5).collect();
        for mol in removed {
            let atoms = system.molecule(mol).unwrap().atoms().to_vec();
            system.remove_molecule(mol);
            list.molecule_removed(&atoms);
        }
        let species = system.find_species("a").unwrap();
        let added = system
            .add_molecule_at(species, Point3::new(0.5, 0.5, 0.5))
            .unwrap();
        list.molecule_added(&system, system.molecule(added).unwrap().atoms());

        let moved: Vec<AtomId> = system.atoms_iter().map(|(id, _)| id).take(10).collect();
        for &id in &moved {
            system.atom_mut(id).unwrap().position += Vector3::new(2.9, -2.9, 1.0);
            list.relocate(&system, id);
        }

        let mut fresh = CellList::new(system.sim_box().clone(), 3.0);
        fresh.assign(&system);
        assert_eq!(
            cell_pairs_within(&list, &system, 3.0),
            cell_pairs_within(&fresh, &system, 3.0)
        );
    }

    #[test]
    fn stale_list_ignores_structural_notifications() {
        let system = random_system(5, 4);
        let mut list = CellList::new(system.sim_box().clone(), 3.0);
        assert!(list.is_stale());
        let atoms: Vec<AtomId> = system.atoms_iter().map(|(id, _)| id).collect();
        list.molecule_added(&system, &atoms);
        assert_eq!(list.candidates(atoms[0]).count(), 0);
    }
}
