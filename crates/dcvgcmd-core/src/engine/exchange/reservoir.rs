use crate::core::forcefield::bonded;
use crate::core::models::ids::SpeciesId;
use crate::core::models::species::{Species, geometric_centre};
use crate::engine::config::ReservoirConfig;
use crate::engine::utils::sampling::metropolis_accept;
use nalgebra::{Point3, Vector3};
use rand::Rng;

/// The prototype molecule new insertions are cloned from.
///
/// Before every insertion proposal the template takes a few Metropolis
/// steps under its intramolecular energy alone, so successive insertions do
/// not all share the rigid template geometry. Coordinates are kept relative
/// to the template's geometric centre.
#[derive(Debug, Clone)]
pub struct ReservoirTemplate {
    species: SpeciesId,
    positions: Vec<Point3<f64>>,
    relaxation_steps: usize,
    step_size: f64,
    attempted: u64,
    accepted: u64,
}

impl ReservoirTemplate {
    pub fn new(species_id: SpeciesId, species: &Species, config: &ReservoirConfig) -> Self {
        Self {
            species: species_id,
            positions: species.template().to_vec(),
            relaxation_steps: config.relaxation_steps,
            step_size: config.step_size,
            attempted: 0,
            accepted: 0,
        }
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    /// Current template coordinates, centred on the origin.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Largest distance of any atom from the template's geometric centre.
    pub fn reach(&self) -> f64 {
        self.positions
            .iter()
            .map(|p| p.coords.norm())
            .fold(0.0, f64::max)
    }

    /// Fraction of accepted relaxation sub-steps, or `None` before any.
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.attempted > 0).then(|| self.accepted as f64 / self.attempted as f64)
    }

    /// Runs the relaxation sub-steps at `temperature` on a working copy and
    /// commits the result.
    pub fn relax(&mut self, species: &Species, temperature: f64, rng: &mut impl Rng) {
        if !species.has_bonded_terms() || self.positions.is_empty() {
            return;
        }
        let mut working = self.positions.clone();
        let mut energy = bonded::intramolecular_energy(species, &working, None);

        for _ in 0..self.relaxation_steps {
            let index = rng.gen_range(0..working.len());
            let old = working[index];
            working[index] += Vector3::new(
                rng.gen_range(-self.step_size..self.step_size),
                rng.gen_range(-self.step_size..self.step_size),
                rng.gen_range(-self.step_size..self.step_size),
            );
            let trial = bonded::intramolecular_energy(species, &working, None);
            self.attempted += 1;
            if metropolis_accept((-(trial - energy) / temperature).exp(), rng) {
                energy = trial;
                self.accepted += 1;
            } else {
                working[index] = old;
            }
        }

        let centre = geometric_centre(working.iter());
        self.positions = working.into_iter().map(|p| p - centre.coords).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{BondAngle, HarmonicBond};
    use crate::core::models::ids::AtomTypeId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn propane() -> Species {
        let theta = 114f64.to_radians();
        let bond = HarmonicBond {
            spring_constant: 1e3,
            length: 1.54,
        };
        Species::new(
            "propane",
            &[
                (AtomTypeId(0), Point3::new(-1.54, 0.0, 0.0)),
                (AtomTypeId(1), Point3::origin()),
                (
                    AtomTypeId(0),
                    Point3::new(-1.54 * theta.cos(), 1.54 * theta.sin(), 0.0),
                ),
            ],
        )
        .with_bond(0, 1, bond)
        .with_bond(1, 2, bond)
        .with_angle(
            0,
            1,
            2,
            BondAngle {
                epsilon: 100.0,
                angle: theta,
            },
        )
    }

    #[test]
    fn relaxation_keeps_template_centred_and_near_equilibrium() {
        let species = propane();
        let mut rng = StdRng::seed_from_u64(13);
        let mut template =
            ReservoirTemplate::new(SpeciesId(0), &species, &ReservoirConfig::default());
        for _ in 0..200 {
            template.relax(&species, 5.0, &mut rng);
        }
        let centre = geometric_centre(template.positions().iter());
        assert!(centre.coords.norm() < 1e-9);
        let p = template.positions();
        let r01 = (p[1] - p[0]).norm();
        assert!((r01 - 1.54).abs() < 0.3, "bond drifted to {r01}");
        let rate = template.acceptance_rate().unwrap();
        assert!(rate > 0.0 && rate <= 1.0);
    }

    #[test]
    fn relaxation_changes_the_geometry() {
        let species = propane();
        let mut rng = StdRng::seed_from_u64(14);
        let mut template =
            ReservoirTemplate::new(SpeciesId(0), &species, &ReservoirConfig::default());
        let before = template.positions().to_vec();
        template.relax(&species, 50.0, &mut rng);
        assert_ne!(before, template.positions());
    }

    #[test]
    fn monatomic_template_is_left_alone() {
        let species = Species::monatomic("argon", AtomTypeId(0));
        let mut rng = StdRng::seed_from_u64(15);
        let mut template =
            ReservoirTemplate::new(SpeciesId(0), &species, &ReservoirConfig::default());
        template.relax(&species, 1.0, &mut rng);
        assert_eq!(template.positions(), &[Point3::origin()]);
        assert!(template.acceptance_rate().is_none());
        assert_eq!(template.reach(), 0.0);
    }

    #[test]
    fn reach_is_the_farthest_atom_from_the_centre() {
        let species = propane();
        let template =
            ReservoirTemplate::new(SpeciesId(0), &species, &ReservoirConfig::default());
        // Both terminal carbons sit 1.3215 from the centroid of a 114° propane.
        assert!((template.reach() - 1.3215).abs() < 1e-3);
    }
}
