use crate::core::models::ids::AtomId;
use crate::core::models::system::MolecularSystem;
use crate::engine::energy::EnergyEvaluator;
use crate::engine::error::EngineError;
use nalgebra::Vector3;
use slotmap::SecondaryMap;
use tracing::trace;

/// Velocity-Verlet stepper with an optional velocity-rescaling thermostat.
///
/// Forces from the end of one step are reused as the start of the next. The
/// cache must be cleared with [`reset`](VelocityVerlet::reset) whenever the
/// configuration changed outside the stepper, e.g. after an MC burst.
#[derive(Debug, Clone)]
pub struct VelocityVerlet {
    time_step: f64,
    time: f64,
    temperature: f64,
    isothermal: bool,
    thermostat_interval: usize,
    steps_since_rescale: usize,
    forces: Option<SecondaryMap<AtomId, Vector3<f64>>>,
    potential_energy: f64,
    kinetic_energy: Option<f64>,
}

impl VelocityVerlet {
    pub fn new(time_step: f64, temperature: f64) -> Self {
        Self {
            time_step,
            time: 0.0,
            temperature,
            isothermal: false,
            thermostat_interval: 1,
            steps_since_rescale: 0,
            forces: None,
            potential_energy: 0.0,
            kinetic_energy: None,
        }
    }

    pub fn with_thermostat(mut self, isothermal: bool, interval: usize) -> Self {
        self.isothermal = isothermal;
        self.thermostat_interval = interval.max(1);
        self
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Simulated time accumulated over every step taken.
    pub fn current_time(&self) -> f64 {
        self.time
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    pub fn is_isothermal(&self) -> bool {
        self.isothermal
    }

    pub fn set_isothermal(&mut self, isothermal: bool) {
        self.isothermal = isothermal;
    }

    /// Potential energy at the end of the last step.
    pub fn potential_energy(&self) -> f64 {
        self.potential_energy
    }

    /// Kinetic energy at the end of the last step, if one was taken since
    /// the last reset.
    pub fn kinetic_energy(&self) -> Option<f64> {
        self.kinetic_energy
    }

    /// Drops the cached forces and kinetic energy.
    pub fn reset(&mut self) {
        self.forces = None;
        self.kinetic_energy = None;
        self.steps_since_rescale = 0;
    }

    /// Advances the configuration by one time step. Atoms of immobile types
    /// keep their positions and velocities.
    pub fn step(
        &mut self,
        system: &mut MolecularSystem,
        evaluator: &mut EnergyEvaluator,
    ) -> Result<(), EngineError> {
        let forces = match self.forces.take() {
            Some(f) => f,
            None => evaluator.compute_forces(system)?.per_atom,
        };
        let dt = self.time_step;

        let inverse_masses = inverse_masses(system);
        for (id, atom) in system.atoms_iter_mut() {
            let Some(&inv_m) = inverse_masses.get(id) else {
                continue;
            };
            let f = forces.get(id).copied().unwrap_or_else(Vector3::zeros);
            atom.velocity += 0.5 * dt * inv_m * f;
            atom.position += dt * atom.velocity;
        }
        evaluator.neighbors_mut().positions_changed(system);

        let new_forces = evaluator.compute_forces(system)?;
        for (id, atom) in system.atoms_iter_mut() {
            let Some(&inv_m) = inverse_masses.get(id) else {
                continue;
            };
            let f = new_forces
                .per_atom
                .get(id)
                .copied()
                .unwrap_or_else(Vector3::zeros);
            atom.velocity += 0.5 * dt * inv_m * f;
        }
        self.time += dt;
        self.potential_energy = new_forces.potential_energy;
        self.forces = Some(new_forces.per_atom);

        if self.isothermal {
            self.steps_since_rescale += 1;
            if self.steps_since_rescale >= self.thermostat_interval {
                self.steps_since_rescale = 0;
                rescale_velocities(system, self.temperature);
            }
        }
        self.kinetic_energy = Some(system.kinetic_energy());
        trace!(
            time = self.time,
            potential = self.potential_energy,
            kinetic = self.kinetic_energy,
            "MD step complete."
        );
        Ok(())
    }
}

fn inverse_masses(system: &MolecularSystem) -> SecondaryMap<AtomId, f64> {
    let mut map = SecondaryMap::new();
    for (id, atom) in system.atoms_iter() {
        let mobile = system
            .atom_type(atom.type_id)
            .filter(|t| t.is_mobile());
        if let Some(t) = mobile {
            map.insert(id, 1.0 / t.mass);
        }
    }
    map
}

/// Scales every mobile velocity so the instantaneous kinetic temperature
/// equals `temperature`.
fn rescale_velocities(system: &mut MolecularSystem, temperature: f64) {
    let kinetic = system.kinetic_energy();
    let dof = system.degrees_of_freedom();
    if kinetic <= 0.0 || dof == 0 {
        return;
    }
    let scale = (0.5 * dof as f64 * temperature / kinetic).sqrt();
    for (_, atom) in system.atoms_iter_mut() {
        atom.velocity *= scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{HarmonicBond, LennardJones, PairPotential};
    use crate::core::models::atom::AtomType;
    use crate::core::models::simulation_box::SimulationBox;
    use crate::core::models::species::Species;
    use crate::engine::config::NeighborConfig;
    use crate::engine::energy::PairRegistration;
    use crate::engine::neighbors::switch::BackendKind;
    use crate::engine::utils::sampling::thermalize_species;
    use nalgebra::Point3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dimer_system() -> (MolecularSystem, EnergyEvaluator) {
        let mut system = MolecularSystem::new(SimulationBox::slit(12.0, 12.0, 12.0));
        let a = system.add_atom_type(AtomType::new("A", 1.0));
        let dimer = system
            .add_species(
                Species::new(
                    "dimer",
                    &[
                        (a, Point3::new(-0.6, 0.0, 0.0)),
                        (a, Point3::new(0.6, 0.0, 0.0)),
                    ],
                )
                .with_bond(
                    0,
                    1,
                    HarmonicBond {
                        spring_constant: 50.0,
                        length: 1.0,
                    },
                ),
            )
            .unwrap();
        system
            .add_molecule_at(dimer, Point3::new(-2.0, 0.0, 0.0))
            .unwrap();
        system
            .add_molecule_at(dimer, Point3::new(2.0, 0.5, 0.0))
            .unwrap();
        let mut evaluator = EnergyEvaluator::new(system.sim_box().clone());
        evaluator.add_pair(
            &PairRegistration {
                types: (a, a),
                potential: PairPotential::new(LennardJones::new(1.0, 1.0), 3.0),
                scope: Default::default(),
            },
            &NeighborConfig::default(),
        );
        evaluator
            .neighbors_mut()
            .select(BackendKind::VerletList, &system);
        (system, evaluator)
    }

    #[test]
    fn total_energy_is_conserved_without_thermostat() {
        let (mut system, mut evaluator) = dimer_system();
        let species = system.find_species("dimer").unwrap();
        thermalize_species(&mut system, species, 0.5, &mut StdRng::seed_from_u64(4)).unwrap();
        let initial = evaluator.total_energy(&system).unwrap() + system.kinetic_energy();

        let mut verlet = VelocityVerlet::new(0.002, 0.5);
        for _ in 0..2_000 {
            verlet.step(&mut system, &mut evaluator).unwrap();
        }
        let last = verlet.potential_energy() + verlet.kinetic_energy().unwrap();
        assert!(
            (last - initial).abs() < 1e-2 * initial.abs().max(1.0),
            "initial {initial} final {last}"
        );
        assert!((verlet.current_time() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn immobile_atoms_do_not_move() {
        let (mut system, mut evaluator) = dimer_system();
        let wall = system.add_atom_type(AtomType::new("wall", f64::INFINITY));
        let wall_species = system
            .add_species(Species::monatomic("wall", wall))
            .unwrap();
        let fixed = system
            .add_molecule_at(wall_species, Point3::new(0.0, 3.0, 0.0))
            .unwrap();
        evaluator.molecule_added(&system, fixed);
        let atom = system.molecule(fixed).unwrap().atoms()[0];

        let mut verlet = VelocityVerlet::new(0.005, 1.0);
        for _ in 0..100 {
            verlet.step(&mut system, &mut evaluator).unwrap();
        }
        let a = system.atom(atom).unwrap();
        assert_eq!(a.position, Point3::new(0.0, 3.0, 0.0));
        assert_eq!(a.velocity, Vector3::zeros());
    }

    #[test]
    fn thermostat_pins_kinetic_temperature() {
        let (mut system, mut evaluator) = dimer_system();
        let species = system.find_species("dimer").unwrap();
        thermalize_species(&mut system, species, 3.0, &mut StdRng::seed_from_u64(8)).unwrap();
        let mut verlet = VelocityVerlet::new(0.002, 1.5).with_thermostat(true, 1);
        verlet.step(&mut system, &mut evaluator).unwrap();
        let dof = system.degrees_of_freedom() as f64;
        let kinetic_temperature = 2.0 * verlet.kinetic_energy().unwrap() / dof;
        assert!((kinetic_temperature - 1.5).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_caches() {
        let (mut system, mut evaluator) = dimer_system();
        let mut verlet = VelocityVerlet::new(0.002, 1.0);
        verlet.step(&mut system, &mut evaluator).unwrap();
        assert!(verlet.kinetic_energy().is_some());
        verlet.reset();
        assert!(verlet.kinetic_energy().is_none());
        verlet.step(&mut system, &mut evaluator).unwrap();
        assert!((verlet.current_time() - 0.004).abs() < 1e-12);
    }
}
