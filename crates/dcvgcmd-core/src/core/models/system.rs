use super::atom::{Atom, AtomType};
use super::ids::{AtomId, AtomTypeId, MoleculeId, SpeciesId};
use super::molecule::Molecule;
use super::simulation_box::SimulationBox;
use super::species::Species;
use nalgebra::{Point3, Vector3};
use slotmap::SlotMap;

/// The live particle configuration shared by every sampler.
///
/// Atoms and molecules are stored in slot maps so that insertions and
/// deletions performed by the exchange moves never invalidate the ids held by
/// other molecules. Atom types and species are append-only tables addressed
/// by index.
#[derive(Debug, Clone)]
pub struct MolecularSystem {
    /// Primary storage for atoms using a slot map for efficient ID management.
    atoms: SlotMap<AtomId, Atom>,
    /// Primary storage for molecules using a slot map for efficient ID management.
    molecules: SlotMap<MoleculeId, Molecule>,
    atom_types: Vec<AtomType>,
    species: Vec<Species>,
    sim_box: SimulationBox,
}

impl MolecularSystem {
    /// Creates an empty system inside the given box.
    pub fn new(sim_box: SimulationBox) -> Self {
        Self {
            atoms: SlotMap::with_key(),
            molecules: SlotMap::with_key(),
            atom_types: Vec::new(),
            species: Vec::new(),
            sim_box,
        }
    }

    pub fn sim_box(&self) -> &SimulationBox {
        &self.sim_box
    }

    /// Registers an atom type and returns its id.
    pub fn add_atom_type(&mut self, atom_type: AtomType) -> AtomTypeId {
        self.atom_types.push(atom_type);
        AtomTypeId(self.atom_types.len() - 1)
    }

    pub fn atom_type(&self, id: AtomTypeId) -> Option<&AtomType> {
        self.atom_types.get(id.0)
    }

    pub fn atom_types(&self) -> &[AtomType] {
        &self.atom_types
    }

    pub fn find_atom_type(&self, name: &str) -> Option<AtomTypeId> {
        self.atom_types
            .iter()
            .position(|t| t.name == name)
            .map(AtomTypeId)
    }

    /// Registers a species.
    ///
    /// # Return
    ///
    /// Returns `None` if the species references an unknown atom type or a
    /// bonded term addresses an index outside its template.
    pub fn add_species(&mut self, species: Species) -> Option<SpeciesId> {
        if species
            .atom_types()
            .iter()
            .any(|t| t.0 >= self.atom_types.len())
        {
            return None;
        }
        if species
            .max_term_index()
            .is_some_and(|max| max >= species.len())
        {
            return None;
        }
        self.species.push(species);
        Some(SpeciesId(self.species.len() - 1))
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id.0)
    }

    pub fn species_iter(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.species
            .iter()
            .enumerate()
            .map(|(i, s)| (SpeciesId(i), s))
    }

    pub fn find_species(&self, name: &str) -> Option<SpeciesId> {
        self.species
            .iter()
            .position(|s| s.name == name)
            .map(SpeciesId)
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    pub fn atoms_iter_mut(&mut self) -> impl Iterator<Item = (AtomId, &mut Atom)> {
        self.atoms.iter_mut()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Mass of an atom, looked up through its type.
    pub fn atom_mass(&self, id: AtomId) -> Option<f64> {
        let atom = self.atoms.get(id)?;
        self.atom_types.get(atom.type_id.0).map(|t| t.mass)
    }

    pub fn molecule(&self, id: MoleculeId) -> Option<&Molecule> {
        self.molecules.get(id)
    }

    pub fn molecules_iter(&self) -> impl Iterator<Item = (MoleculeId, &Molecule)> {
        self.molecules.iter()
    }

    /// Ids of all live molecules of `species`.
    pub fn molecules_of(&self, species: SpeciesId) -> impl Iterator<Item = MoleculeId> + '_ {
        self.molecules
            .iter()
            .filter(move |(_, m)| m.species == species)
            .map(|(id, _)| id)
    }

    pub fn molecule_count(&self, species: SpeciesId) -> usize {
        self.molecules_of(species).count()
    }

    pub fn total_molecule_count(&self) -> usize {
        self.molecules.len()
    }

    /// Adds a molecule of `species` with the given atom positions, in template
    /// order. Velocities start at zero and tether sites at the given positions.
    ///
    /// # Return
    ///
    /// Returns `None` if the species is unknown or the number of positions
    /// does not match its template.
    pub fn add_molecule(
        &mut self,
        species_id: SpeciesId,
        positions: &[Point3<f64>],
    ) -> Option<MoleculeId> {
        let species = self.species.get(species_id.0)?;
        if positions.len() != species.len() {
            return None;
        }
        let types = species.atom_types().to_vec();
        let molecule_id = self.molecules.insert(Molecule::new(species_id));
        for (index, (type_id, position)) in types.into_iter().zip(positions).enumerate() {
            let atom_id = self
                .atoms
                .insert(Atom::new(type_id, molecule_id, index, *position));
            self.molecules[molecule_id].push_atom(atom_id);
        }
        Some(molecule_id)
    }

    /// Adds a molecule of `species` with its template centred on `centre`.
    pub fn add_molecule_at(
        &mut self,
        species_id: SpeciesId,
        centre: Point3<f64>,
    ) -> Option<MoleculeId> {
        let positions: Vec<_> = self
            .species
            .get(species_id.0)?
            .template()
            .iter()
            .map(|p| centre + p.coords)
            .collect();
        self.add_molecule(species_id, &positions)
    }

    /// Removes a molecule together with all of its atoms.
    pub fn remove_molecule(&mut self, id: MoleculeId) -> Option<Molecule> {
        let molecule = self.molecules.remove(id)?;
        for &atom_id in molecule.atoms() {
            self.atoms.remove(atom_id);
        }
        Some(molecule)
    }

    /// Atom positions of a molecule in template order.
    pub fn molecule_positions(&self, id: MoleculeId) -> Option<Vec<Point3<f64>>> {
        self.molecules
            .get(id)?
            .atoms()
            .iter()
            .map(|&a| self.atoms.get(a).map(|atom| atom.position))
            .collect()
    }

    /// Geometric centre of a molecule, computed with every atom unwrapped to
    /// the minimum image of the first one.
    pub fn reference_point(&self, id: MoleculeId) -> Option<Point3<f64>> {
        let molecule = self.molecules.get(id)?;
        let first = self.atoms.get(*molecule.atoms().first()?)?.position;
        let mut sum = Vector3::zeros();
        for &atom_id in molecule.atoms() {
            let p = self.atoms.get(atom_id)?.position;
            sum += self.sim_box.separation(&first, &p);
        }
        Some(first + sum / molecule.len() as f64)
    }

    /// Kinetic energy `0.5 m v^2` summed over mobile atoms.
    pub fn kinetic_energy(&self) -> f64 {
        self.atoms
            .values()
            .filter_map(|a| {
                let t = self.atom_types.get(a.type_id.0)?;
                t.is_mobile()
                    .then(|| 0.5 * t.mass * a.velocity.norm_squared())
            })
            .sum()
    }

    /// Number of translational degrees of freedom carried by mobile atoms.
    pub fn degrees_of_freedom(&self) -> usize {
        3 * self
            .atoms
            .values()
            .filter(|a| {
                self.atom_types
                    .get(a.type_id.0)
                    .is_some_and(AtomType::is_mobile)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::HarmonicBond;

    fn setup() -> (MolecularSystem, SpeciesId) {
        let mut system = MolecularSystem::new(SimulationBox::slit(20.0, 20.0, 50.0));
        let ch3 = system.add_atom_type(AtomType::new("CH3", 15.0));
        let species = Species::new(
            "ethane",
            &[
                (ch3, Point3::new(-0.77, 0.0, 0.0)),
                (ch3, Point3::new(0.77, 0.0, 0.0)),
            ],
        )
        .with_bond(
            0,
            1,
            HarmonicBond {
                spring_constant: 1e6,
                length: 1.54,
            },
        );
        let id = system.add_species(species).unwrap();
        (system, id)
    }

    #[test]
    fn add_molecule_creates_atoms_in_template_order() {
        let (mut system, species) = setup();
        let mol = system
            .add_molecule_at(species, Point3::new(1.0, 2.0, 3.0))
            .unwrap();
        let molecule = system.molecule(mol).unwrap();
        assert_eq!(molecule.len(), 2);
        for (i, &atom_id) in molecule.atoms().iter().enumerate() {
            let atom = system.atom(atom_id).unwrap();
            assert_eq!(atom.index_in_molecule, i);
            assert_eq!(atom.molecule_id, mol);
        }
        let centre = system.reference_point(mol).unwrap();
        assert!((centre - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn add_molecule_rejects_wrong_atom_count() {
        let (mut system, species) = setup();
        assert!(
            system
                .add_molecule(species, &[Point3::origin()])
                .is_none()
        );
        assert_eq!(system.total_molecule_count(), 0);
    }

    #[test]
    fn add_species_rejects_unknown_type_and_bad_indices() {
        let (mut system, _) = setup();
        assert!(
            system
                .add_species(Species::monatomic("ghost", AtomTypeId(7)))
                .is_none()
        );
        let bad = Species::monatomic("bad", AtomTypeId(0)).with_bond(
            0,
            1,
            HarmonicBond {
                spring_constant: 1.0,
                length: 1.0,
            },
        );
        assert!(system.add_species(bad).is_none());
    }

    #[test]
    fn remove_molecule_removes_its_atoms() {
        let (mut system, species) = setup();
        let keep = system.add_molecule_at(species, Point3::origin()).unwrap();
        let drop = system
            .add_molecule_at(species, Point3::new(5.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(system.atom_count(), 4);
        system.remove_molecule(drop).unwrap();
        assert_eq!(system.atom_count(), 2);
        assert_eq!(system.molecule_count(species), 1);
        assert!(system.molecule(drop).is_none());
        assert!(system.molecule(keep).is_some());
    }

    #[test]
    fn reference_point_unwraps_across_periodic_boundary() {
        let (mut system, species) = setup();
        let mol = system
            .add_molecule(
                species,
                &[Point3::new(9.5, 0.0, 0.0), Point3::new(-9.5, 0.0, 0.0)],
            )
            .unwrap();
        let centre = system.reference_point(mol).unwrap();
        assert!((centre.x - 10.0).abs() < 1e-12);
    }

    #[test]
    fn kinetic_energy_ignores_immobile_atoms() {
        let (mut system, species) = setup();
        let wall = system.add_atom_type(AtomType::new("wall", f64::INFINITY));
        let wall_species = system
            .add_species(Species::monatomic("wall", wall))
            .unwrap();
        system.add_molecule_at(species, Point3::origin()).unwrap();
        system
            .add_molecule_at(wall_species, Point3::new(3.0, 0.0, 0.0))
            .unwrap();
        for (_, atom) in system.atoms_iter_mut() {
            atom.velocity = Vector3::new(1.0, 0.0, 0.0);
        }
        assert!((system.kinetic_energy() - 15.0).abs() < 1e-12);
        assert_eq!(system.degrees_of_freedom(), 6);
    }
}
