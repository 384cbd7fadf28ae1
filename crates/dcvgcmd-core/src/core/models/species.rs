use super::ids::AtomTypeId;
use crate::core::forcefield::params::{BondAngle, HarmonicBond, SiteTether};
use nalgebra::{Point3, Vector3};

/// A harmonic bond between two template indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondTerm {
    pub atoms: (usize, usize),
    pub potential: HarmonicBond,
}

/// A bond angle with `atoms.1` at the vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleTerm {
    pub atoms: (usize, usize, usize),
    pub potential: BondAngle,
}

/// The shared topology of every molecule of one kind.
///
/// A species describes its atoms by type and by a template geometry. The
/// template is stored relative to its geometric centre, which is also the
/// reference point used to decide control-region membership. Bonded terms
/// address atoms by their index in the template, so every molecule of the
/// species keeps its atoms in template order.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    atom_types: Vec<AtomTypeId>,
    template: Vec<Point3<f64>>,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    tether: Option<SiteTether>,
}

impl Species {
    /// Creates a species from `(type, position)` pairs. The template is
    /// recentred on its geometric centre.
    pub fn new(name: &str, atoms: &[(AtomTypeId, Point3<f64>)]) -> Self {
        let centre = geometric_centre(atoms.iter().map(|(_, p)| p));
        Self {
            name: name.to_string(),
            atom_types: atoms.iter().map(|(t, _)| *t).collect(),
            template: atoms
                .iter()
                .map(|(_, p)| Point3::from(p - centre))
                .collect(),
            bonds: Vec::new(),
            angles: Vec::new(),
            tether: None,
        }
    }

    /// A single-site species with the atom at the origin.
    pub fn monatomic(name: &str, atom_type: AtomTypeId) -> Self {
        Self::new(name, &[(atom_type, Point3::origin())])
    }

    pub fn with_bond(mut self, i: usize, j: usize, potential: HarmonicBond) -> Self {
        self.bonds.push(BondTerm {
            atoms: (i, j),
            potential,
        });
        self
    }

    pub fn with_angle(mut self, i: usize, j: usize, k: usize, potential: BondAngle) -> Self {
        self.angles.push(AngleTerm {
            atoms: (i, j, k),
            potential,
        });
        self
    }

    pub fn with_tether(mut self, tether: SiteTether) -> Self {
        self.tether = Some(tether);
        self
    }

    pub fn atom_types(&self) -> &[AtomTypeId] {
        &self.atom_types
    }

    pub fn template(&self) -> &[Point3<f64>] {
        &self.template
    }

    pub fn bonds(&self) -> &[BondTerm] {
        &self.bonds
    }

    pub fn angles(&self) -> &[AngleTerm] {
        &self.angles
    }

    pub fn tether(&self) -> Option<&SiteTether> {
        self.tether.as_ref()
    }

    pub fn len(&self) -> usize {
        self.atom_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atom_types.is_empty()
    }

    /// Returns `true` if a bond term joins the two template indices.
    pub fn are_bonded(&self, i: usize, j: usize) -> bool {
        self.bonds
            .iter()
            .any(|b| b.atoms == (i, j) || b.atoms == (j, i))
    }

    /// Returns `true` if the species has any intramolecular energy terms.
    pub fn has_bonded_terms(&self) -> bool {
        !self.bonds.is_empty() || !self.angles.is_empty()
    }

    /// Largest index referenced by any bonded term, for validation.
    pub(crate) fn max_term_index(&self) -> Option<usize> {
        self.bonds
            .iter()
            .flat_map(|b| [b.atoms.0, b.atoms.1])
            .chain(self.angles.iter().flat_map(|a| [a.atoms.0, a.atoms.1, a.atoms.2]))
            .max()
    }
}

pub(crate) fn geometric_centre<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Point3<f64> {
    let mut sum = Vector3::zeros();
    let mut n = 0usize;
    for p in points {
        sum += p.coords;
        n += 1;
    }
    if n == 0 {
        Point3::origin()
    } else {
        Point3::from(sum / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn propane() -> Species {
        let bond = HarmonicBond {
            spring_constant: 1e6,
            length: 1.54,
        };
        Species::new(
            "propane",
            &[
                (AtomTypeId(0), Point3::new(1.0, 0.0, 0.0)),
                (AtomTypeId(1), Point3::new(2.0, 1.0, 0.0)),
                (AtomTypeId(0), Point3::new(3.0, 2.0, 0.0)),
            ],
        )
        .with_bond(0, 1, bond)
        .with_bond(1, 2, bond)
        .with_angle(
            0,
            1,
            2,
            BondAngle {
                epsilon: 62500.0,
                angle: 114f64.to_radians(),
            },
        )
    }

    #[test]
    fn template_is_centred_on_geometric_centre() {
        let species = propane();
        let centre = geometric_centre(species.template().iter());
        assert!(centre.coords.norm() < 1e-12);
        assert_eq!(species.template()[1], Point3::origin());
    }

    #[test]
    fn bonded_lookup_is_symmetric() {
        let species = propane();
        assert!(species.are_bonded(0, 1));
        assert!(species.are_bonded(2, 1));
        assert!(!species.are_bonded(0, 2));
        assert_eq!(species.max_term_index(), Some(2));
    }

    #[test]
    fn monatomic_species_has_no_bonded_terms() {
        let species = Species::monatomic("argon", AtomTypeId(3));
        assert_eq!(species.len(), 1);
        assert!(!species.has_bonded_terms());
        assert!(species.tether().is_none());
        assert_eq!(species.max_term_index(), None);
    }
}
