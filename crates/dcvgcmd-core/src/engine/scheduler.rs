use super::config::SimulationConfig;
use super::energy::EnergyEvaluator;
use super::error::{BoundKind, EngineError};
use super::exchange::restricted::RestrictedExchangeMove;
use super::integrators::monte_carlo::{McSampler, McStepOutcome};
use super::integrators::velocity_verlet::VelocityVerlet;
use super::neighbors::switch::BackendKind;
use super::utils::sampling::thermalize_species;
use crate::core::models::ids::{AtomId, SpeciesId};
use crate::core::models::simulation_box::CONSTRAINED_AXIS;
use crate::core::models::system::MolecularSystem;
use rand::Rng;
use tracing::{debug, info, instrument};

/// What a call to [`HybridStepScheduler::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A full Monte Carlo burst ran.
    McBurst { attempted: usize, accepted: usize },
    /// One molecular dynamics time step was taken.
    MdStep,
}

/// Alternates exchange Monte Carlo bursts with molecular dynamics bursts over
/// one configuration.
///
/// The scheduler owns the configuration, the energy evaluator and the random
/// source for its whole life. Each call to [`step`](Self::step) either runs a
/// complete MC burst or advances MD by one time step, and the first call
/// always runs an MC burst. The cell list is authoritative during MC bursts
/// and the Verlet list during MD bursts; both are force-rebuilt at every
/// transition.
#[derive(Debug)]
pub struct HybridStepScheduler<R: Rng> {
    system: MolecularSystem,
    evaluator: EnergyEvaluator,
    sampler: McSampler,
    integrator: VelocityVerlet,
    rng: R,
    temperature: f64,
    md_burst_length: usize,
    mc_steps_per_burst: usize,
    neighbor_refresh_interval: usize,
    velocity_limit: f64,
    thermalized_species: Option<SpeciesId>,
    remaining: usize,
    md_steps_since_refresh: usize,
    step_count: u64,
}

impl<R: Rng> HybridStepScheduler<R> {
    /// Builds one exchange move per configured `(species, side)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRegion`] if a control region does not fit
    /// the box and [`EngineError::SpeciesNotFound`] if an exchange or the
    /// thermalised species names an unknown species.
    pub fn new(
        system: MolecularSystem,
        evaluator: EnergyEvaluator,
        config: &SimulationConfig,
        rng: R,
    ) -> Result<Self, EngineError> {
        let moves = config
            .exchanges
            .iter()
            .map(|exchange| {
                RestrictedExchangeMove::new(
                    &system,
                    exchange,
                    config.temperature,
                    &config.region,
                    &config.reservoir,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(species) = config.thermalized_species {
            if system.species(species).is_none() {
                return Err(EngineError::SpeciesNotFound(species));
            }
        }

        info!(
            moves = moves.len(),
            md_burst_length = config.md_burst_length,
            mc_steps_per_burst = config.mc_steps_per_burst,
            temperature = config.temperature,
            "Hybrid scheduler initialized."
        );

        Ok(Self {
            system,
            evaluator,
            sampler: McSampler::new(moves),
            integrator: VelocityVerlet::new(config.time_step, config.temperature)
                .with_thermostat(config.isothermal, config.thermostat_interval),
            rng,
            temperature: config.temperature,
            md_burst_length: config.md_burst_length,
            mc_steps_per_burst: config.mc_steps_per_burst,
            neighbor_refresh_interval: config.neighbor_refresh_interval,
            velocity_limit: config.velocity_limit,
            thermalized_species: config.thermalized_species,
            remaining: 0,
            md_steps_since_refresh: 0,
            step_count: 0,
        })
    }

    pub fn system(&self) -> &MolecularSystem {
        &self.system
    }

    pub fn evaluator(&self) -> &EnergyEvaluator {
        &self.evaluator
    }

    pub fn sampler(&self) -> &McSampler {
        &self.sampler
    }

    pub fn moves(&self) -> &[RestrictedExchangeMove] {
        self.sampler.moves()
    }

    pub fn integrator(&self) -> &VelocityVerlet {
        &self.integrator
    }

    /// Simulated MD time; MC bursts take no time.
    pub fn current_time(&self) -> f64 {
        self.integrator.current_time()
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
        self.sampler.set_temperature(temperature);
        self.integrator.set_temperature(temperature);
    }

    pub fn is_isothermal(&self) -> bool {
        self.integrator.is_isothermal()
    }

    pub fn set_isothermal(&mut self, isothermal: bool) {
        self.integrator.set_isothermal(isothermal);
    }

    /// Number of completed calls to [`step`](Self::step).
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// MD steps left before the next MC burst.
    pub fn remaining_md_steps(&self) -> usize {
        self.remaining
    }

    /// Gives the configuration back, consuming the scheduler.
    pub fn into_system(self) -> MolecularSystem {
        self.system
    }

    /// Runs one MC burst or one MD step.
    ///
    /// # Errors
    ///
    /// A bound violation aborts the step with [`EngineError::BoundViolation`];
    /// the configuration is left as it was when the violation was detected.
    pub fn step(&mut self) -> Result<StepOutcome, EngineError> {
        let step = self.step_count;
        let outcome = if self.remaining == 0 {
            self.mc_burst(step)?
        } else {
            self.md_step(step)?;
            StepOutcome::MdStep
        };
        self.step_count += 1;
        Ok(outcome)
    }

    /// Runs up to `steps` steps, checking `stop` before each one.
    ///
    /// # Return
    ///
    /// The number of steps actually taken.
    pub fn run(
        &mut self,
        steps: u64,
        mut stop: impl FnMut(&Self) -> bool,
    ) -> Result<u64, EngineError> {
        for taken in 0..steps {
            if stop(self) {
                return Ok(taken);
            }
            self.step()?;
        }
        Ok(steps)
    }

    #[instrument(level = "debug", skip(self), name = "mc_burst")]
    fn mc_burst(&mut self, step: u64) -> Result<StepOutcome, EngineError> {
        self.remaining = self.md_burst_length;
        self.sampler.rebuild_active_sets(&self.system);
        self.evaluator
            .neighbors_mut()
            .select(BackendKind::CellList, &self.system);
        self.sampler.reset_energy(&self.system, &self.evaluator)?;

        let mut attempted = 0;
        let mut accepted = 0;
        for _ in 0..self.mc_steps_per_burst {
            match self
                .sampler
                .do_step(&mut self.system, &mut self.evaluator, &mut self.rng)?
            {
                McStepOutcome::Accepted => {
                    attempted += 1;
                    accepted += 1;
                }
                McStepOutcome::Rejected => attempted += 1,
                McStepOutcome::Infeasible | McStepOutcome::Idle => {}
            }
        }

        self.check_bounds(step, false)?;

        if let Some(species) = self.thermalized_species {
            thermalize_species(&mut self.system, species, self.temperature, &mut self.rng)?;
        }

        self.evaluator
            .neighbors_mut()
            .select(BackendKind::VerletList, &self.system);
        self.integrator.reset();
        self.md_steps_since_refresh = 0;

        info!(
            step,
            attempted,
            accepted,
            molecules = self.system.total_molecule_count(),
            energy = self.sampler.energy(),
            "MC burst finished."
        );
        Ok(StepOutcome::McBurst {
            attempted,
            accepted,
        })
    }

    fn md_step(&mut self, step: u64) -> Result<(), EngineError> {
        self.remaining -= 1;
        self.md_steps_since_refresh += 1;
        if self.md_steps_since_refresh >= self.neighbor_refresh_interval {
            self.md_steps_since_refresh = 0;
            self.evaluator.neighbors_mut().refresh(&self.system);
            debug!(step, "Forced neighbor list rebuild.");
        }

        self.check_bounds(step, true)?;
        self.integrator.step(&mut self.system, &mut self.evaluator)?;
        self.check_bounds(step, true)
    }

    /// Fails on the first atom with `|z|` beyond the box half length or, if
    /// `velocities` is set, with `|v_z|` above the velocity limit.
    fn check_bounds(&self, step: u64, velocities: bool) -> Result<(), EngineError> {
        let half = self.system.sim_box().half_length(CONSTRAINED_AXIS);
        for (id, atom) in self.system.atoms_iter() {
            if atom.position[CONSTRAINED_AXIS].abs() > half {
                return Err(self.violation(step, BoundKind::Position, id));
            }
            if velocities && atom.velocity[CONSTRAINED_AXIS].abs() > self.velocity_limit {
                return Err(self.violation(step, BoundKind::Velocity, id));
            }
        }
        Ok(())
    }

    fn violation(&self, step: u64, kind: BoundKind, id: AtomId) -> EngineError {
        let Some(atom) = self.system.atom(id) else {
            return EngineError::Internal(format!("atom {id:?} vanished during bound check"));
        };
        let species = self
            .system
            .molecule(atom.molecule_id)
            .map(|m| m.species)
            .unwrap_or(SpeciesId(usize::MAX));
        EngineError::BoundViolation {
            step,
            kind,
            atom: id,
            molecule: atom.molecule_id,
            species,
            position: atom.position,
            velocity: atom.velocity,
        }
    }
}
