use crate::core::models::ids::{MoleculeId, SpeciesId};
use crate::core::models::system::MolecularSystem;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Invalid temperature value: {0}. Temperature must be positive and finite")]
    InvalidTemperature(f64),
    #[error("Failed to create normal distribution: {source}")]
    DistributionError {
        #[from]
        source: rand_distr::NormalError,
    },
}

/// Metropolis test on an acceptance ratio: accepts with probability
/// `min(1, ratio)`. A NaN ratio is always rejected.
#[inline]
pub fn metropolis_accept(ratio: f64, rng: &mut impl Rng) -> bool {
    if ratio >= 1.0 {
        return true;
    }
    if !(ratio > 0.0) {
        return false;
    }
    rng.r#gen::<f64>() < ratio
}

/// Draws a velocity from the Maxwell-Boltzmann distribution at `temperature`
/// (energy units, `k_B = 1`) for a particle of mass `mass`.
///
/// Immobile particles (infinite or non-positive mass) get a zero velocity.
pub fn maxwell_boltzmann_velocity(
    mass: f64,
    temperature: f64,
    rng: &mut impl Rng,
) -> Result<Vector3<f64>, SamplingError> {
    if !(temperature > 0.0 && temperature.is_finite()) {
        return Err(SamplingError::InvalidTemperature(temperature));
    }
    if !(mass.is_finite() && mass > 0.0) {
        return Ok(Vector3::zeros());
    }
    let normal = Normal::new(0.0, (temperature / mass).sqrt())?;
    Ok(Vector3::new(
        normal.sample(rng),
        normal.sample(rng),
        normal.sample(rng),
    ))
}

/// Resamples the velocity of every atom of one molecule.
pub fn randomize_molecule_velocities(
    system: &mut MolecularSystem,
    molecule: MoleculeId,
    temperature: f64,
    rng: &mut impl Rng,
) -> Result<(), SamplingError> {
    let Some(atoms) = system.molecule(molecule).map(|m| m.atoms().to_vec()) else {
        return Ok(());
    };
    for atom_id in atoms {
        let mass = system.atom_mass(atom_id).unwrap_or(f64::INFINITY);
        let v = maxwell_boltzmann_velocity(mass, temperature, rng)?;
        if let Some(atom) = system.atom_mut(atom_id) {
            atom.velocity = v;
        }
    }
    Ok(())
}

/// Resamples the velocities of every molecule of `species`.
#[instrument(level = "debug", skip(system, rng))]
pub fn thermalize_species(
    system: &mut MolecularSystem,
    species: SpeciesId,
    temperature: f64,
    rng: &mut impl Rng,
) -> Result<(), SamplingError> {
    let molecules: Vec<_> = system.molecules_of(species).collect();
    for molecule in molecules {
        randomize_molecule_velocities(system, molecule, temperature, rng)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::AtomType;
    use crate::core::models::simulation_box::SimulationBox;
    use crate::core::models::species::Species;
    use nalgebra::Point3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn metropolis_always_accepts_ratios_above_one() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..100).all(|_| metropolis_accept(1.5, &mut rng)));
        assert!((0..100).all(|_| !metropolis_accept(0.0, &mut rng)));
        assert!(!metropolis_accept(f64::NAN, &mut rng));
    }

    #[test]
    fn metropolis_acceptance_frequency_matches_ratio() {
        let mut rng = StdRng::seed_from_u64(2);
        let n = 20_000;
        let accepted = (0..n).filter(|_| metropolis_accept(0.3, &mut rng)).count();
        let freq = accepted as f64 / n as f64;
        assert!((freq - 0.3).abs() < 0.02, "frequency {freq}");
    }

    #[test]
    fn maxwell_boltzmann_matches_equipartition() {
        let mut rng = StdRng::seed_from_u64(3);
        let (mass, temperature) = (4.0, 2.5);
        let n = 20_000;
        let mean_ke: f64 = (0..n)
            .map(|_| {
                0.5 * mass
                    * maxwell_boltzmann_velocity(mass, temperature, &mut rng)
                        .unwrap()
                        .norm_squared()
            })
            .sum::<f64>()
            / n as f64;
        assert!((mean_ke - 1.5 * temperature).abs() < 0.1, "mean KE {mean_ke}");
    }

    #[test]
    fn maxwell_boltzmann_rejects_nonpositive_temperature() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!(matches!(
            maxwell_boltzmann_velocity(1.0, 0.0, &mut rng),
            Err(SamplingError::InvalidTemperature(_))
        ));
    }

    #[test]
    fn immobile_atoms_stay_at_rest() {
        let mut rng = StdRng::seed_from_u64(5);
        let v = maxwell_boltzmann_velocity(f64::INFINITY, 300.0, &mut rng).unwrap();
        assert_eq!(v, Vector3::zeros());
    }

    #[test]
    fn thermalize_species_only_touches_that_species() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut system = MolecularSystem::new(SimulationBox::slit(10.0, 10.0, 10.0));
        let t = system.add_atom_type(AtomType::new("M", 12.0));
        let a = system.add_species(Species::monatomic("a", t)).unwrap();
        let b = system.add_species(Species::monatomic("b", t)).unwrap();
        system.add_molecule_at(a, Point3::origin()).unwrap();
        let untouched = system.add_molecule_at(b, Point3::new(1.0, 0.0, 0.0)).unwrap();

        thermalize_species(&mut system, a, 100.0, &mut rng).unwrap();

        for (_, atom) in system.atoms_iter() {
            if atom.molecule_id == untouched {
                assert_eq!(atom.velocity, Vector3::zeros());
            } else {
                assert!(atom.velocity.norm() > 0.0);
            }
        }
    }
}
