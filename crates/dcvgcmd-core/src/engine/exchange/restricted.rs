use super::region::{ControlRegion, Side};
use super::reservoir::ReservoirTemplate;
use crate::core::models::ids::{MoleculeId, SpeciesId};
use crate::core::models::simulation_box::CONSTRAINED_AXIS;
use crate::core::models::system::MolecularSystem;
use crate::core::utils::geometry::{random_rotation, rotate_about};
use crate::engine::config::{ExchangeSpec, RegionConfig, ReservoirConfig};
use crate::engine::energy::EnergyEvaluator;
use crate::engine::error::EngineError;
use crate::engine::utils::sampling::randomize_molecule_velocities;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use tracing::debug;

/// Attempt and acceptance counters of one exchange move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub insertions_attempted: u64,
    pub insertions_accepted: u64,
    pub deletions_attempted: u64,
    pub deletions_accepted: u64,
}

impl ExchangeStats {
    pub fn attempted(&self) -> u64 {
        self.insertions_attempted + self.deletions_attempted
    }

    pub fn accepted(&self) -> u64 {
        self.insertions_accepted + self.deletions_accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingTrial {
    Insertion {
        molecule: MoleculeId,
        energy: f64,
    },
    Deletion {
        molecule: MoleculeId,
        energy: f64,
    },
}

/// Grand-canonical insertion/deletion of one species confined to one
/// control region.
///
/// A trial is proposed with [`do_trial`] and then resolved with exactly one
/// of [`accept`] or [`reject`]. Insertions add the tentative molecule to the
/// live configuration while the trial is pending so that its energy can be
/// evaluated with the neighbor engines; rejecting removes it again.
///
/// The reservoir template is relaxed before each insertion proposal, and that
/// relaxation is not accounted for in the acceptance ratio. The sampler is
/// therefore an approximation of the grand-canonical ensemble for flexible
/// species; for rigid or monatomic species it is exact.
///
/// [`do_trial`]: RestrictedExchangeMove::do_trial
/// [`accept`]: RestrictedExchangeMove::accept
/// [`reject`]: RestrictedExchangeMove::reject
#[derive(Debug, Clone)]
pub struct RestrictedExchangeMove {
    species: SpeciesId,
    temperature: f64,
    chemical_potential: f64,
    region: ControlRegion,
    region_volume: f64,
    active_set: Vec<MoleculeId>,
    reservoir: ReservoirTemplate,
    pending: Option<PendingTrial>,
    net_exchange: i64,
    stats: ExchangeStats,
}

impl RestrictedExchangeMove {
    pub fn new(
        system: &MolecularSystem,
        exchange: &ExchangeSpec,
        temperature: f64,
        region: &RegionConfig,
        reservoir: &ReservoirConfig,
    ) -> Result<Self, EngineError> {
        let species = system
            .species(exchange.species)
            .ok_or(EngineError::SpeciesNotFound(exchange.species))?;
        let sim_box = system.sim_box();
        let control =
            ControlRegion::new(sim_box, exchange.side, region.fraction, region.padding)?;
        let reservoir = ReservoirTemplate::new(exchange.species, species, reservoir);
        if control.insertion_bounds(reservoir.reach()).is_none() {
            return Err(EngineError::InvalidRegion {
                side: exchange.side,
                reason: format!(
                    "no height in {:?} keeps every atom of '{}' (reach {:.3}) inside the box",
                    control.bounds(),
                    species.name,
                    reservoir.reach()
                ),
            });
        }
        Ok(Self {
            species: exchange.species,
            temperature,
            chemical_potential: exchange.chemical_potential,
            region: control,
            region_volume: region.fraction * sim_box.volume(),
            active_set: Vec::new(),
            reservoir,
            pending: None,
            net_exchange: 0,
            stats: ExchangeStats::default(),
        })
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn side(&self) -> Side {
        self.region.side()
    }

    pub fn region(&self) -> &ControlRegion {
        &self.region
    }

    pub fn chemical_potential(&self) -> f64 {
        self.chemical_potential
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    /// Accepted insertions minus accepted deletions since construction.
    pub fn net_exchange(&self) -> i64 {
        self.net_exchange
    }

    pub fn active_set(&self) -> &[MoleculeId] {
        &self.active_set
    }

    pub fn occupancy(&self) -> usize {
        self.active_set.len()
    }

    pub fn stats(&self) -> &ExchangeStats {
        &self.stats
    }

    pub fn reservoir(&self) -> &ReservoirTemplate {
        &self.reservoir
    }

    /// Rescans every molecule of the species and keeps those whose reference
    /// point lies inside the region.
    pub fn rebuild_active_set(&mut self, system: &MolecularSystem) {
        self.active_set = system
            .molecules_of(self.species)
            .filter(|&id| {
                system
                    .reference_point(id)
                    .is_some_and(|p| self.region.contains(p[CONSTRAINED_AXIS]))
            })
            .collect();
    }

    /// Proposes an insertion or a deletion with equal probability.
    ///
    /// # Return
    ///
    /// The acceptance ratio of the proposed trial, or `None` if the trial is
    /// infeasible: a deletion drawn while the region is empty, or an insertion
    /// whose relaxed molecule no longer fits between the region and the walls.
    /// Infeasible trials are not counted as attempts and leave nothing pending.
    pub fn do_trial(
        &mut self,
        system: &mut MolecularSystem,
        evaluator: &mut EnergyEvaluator,
        rng: &mut impl Rng,
    ) -> Result<Option<f64>, EngineError> {
        if rng.r#gen::<bool>() {
            self.do_insertion_trial(system, evaluator, rng)
        } else {
            self.do_deletion_trial(system, evaluator, rng)
        }
    }

    /// Inserts a relaxed, randomly oriented copy of the reservoir template
    /// with its reference point inside the region.
    ///
    /// The height is drawn from the part of the region where every atom of
    /// the rotated copy stays between the walls.
    pub fn do_insertion_trial(
        &mut self,
        system: &mut MolecularSystem,
        evaluator: &mut EnergyEvaluator,
        rng: &mut impl Rng,
    ) -> Result<Option<f64>, EngineError> {
        self.ensure_resolved()?;
        let species = system
            .species(self.species)
            .ok_or(EngineError::SpeciesNotFound(self.species))?;
        self.reservoir.relax(species, self.temperature, rng);

        let mut positions = self.reservoir.positions().to_vec();
        rotate_about(&mut positions, &Point3::origin(), &random_rotation(rng));
        let reach = positions
            .iter()
            .map(|p| p[CONSTRAINED_AXIS].abs())
            .fold(0.0, f64::max);
        let Some(z) = self.region.sample_z(reach, rng) else {
            debug!(species = %self.species, side = %self.side(), reach, "Insertion infeasible.");
            return Ok(None);
        };
        let dims = system.sim_box().dimensions();
        let centre = Vector3::new(
            rng.gen_range(-0.5 * dims.x..0.5 * dims.x),
            rng.gen_range(-0.5 * dims.y..0.5 * dims.y),
            z,
        );
        for p in &mut positions {
            *p += centre;
        }

        let molecule = system.add_molecule(self.species, &positions).ok_or_else(|| {
            EngineError::Internal(format!(
                "reservoir template of {} does not match its species",
                self.species
            ))
        })?;
        evaluator.molecule_added(system, molecule);
        let energy = match evaluator.molecule_energy(system, molecule) {
            Ok(e) => e,
            Err(e) => {
                remove_molecule(system, evaluator, molecule);
                return Err(e);
            }
        };

        self.stats.insertions_attempted += 1;
        self.pending = Some(PendingTrial::Insertion { molecule, energy });

        let prefactor = self.region_volume / (self.active_set.len() + 1) as f64;
        let ratio = prefactor * ((self.chemical_potential - energy) / self.temperature).exp();
        debug!(species = %self.species, side = %self.side(), energy, ratio, "Insertion proposed.");
        Ok(Some(ratio))
    }

    pub fn do_deletion_trial(
        &mut self,
        system: &mut MolecularSystem,
        evaluator: &mut EnergyEvaluator,
        rng: &mut impl Rng,
    ) -> Result<Option<f64>, EngineError> {
        self.ensure_resolved()?;
        if self.active_set.is_empty() {
            return Ok(None);
        }
        let molecule = self.active_set[rng.gen_range(0..self.active_set.len())];
        let energy = evaluator.molecule_energy(system, molecule)?;

        self.stats.deletions_attempted += 1;
        self.pending = Some(PendingTrial::Deletion { molecule, energy });

        let prefactor = self.active_set.len() as f64 / self.region_volume;
        let ratio = prefactor * ((energy - self.chemical_potential) / self.temperature).exp();
        debug!(species = %self.species, side = %self.side(), energy, ratio, "Deletion proposed.");
        Ok(Some(ratio))
    }

    /// Commits the pending trial and returns the change in total energy.
    pub fn accept(
        &mut self,
        system: &mut MolecularSystem,
        evaluator: &mut EnergyEvaluator,
        rng: &mut impl Rng,
    ) -> Result<f64, EngineError> {
        match self.pending.take() {
            Some(PendingTrial::Insertion { molecule, energy }) => {
                self.active_set.push(molecule);
                randomize_molecule_velocities(system, molecule, self.temperature, rng)?;
                self.net_exchange += 1;
                self.stats.insertions_accepted += 1;
                Ok(energy)
            }
            Some(PendingTrial::Deletion { molecule, energy }) => {
                remove_molecule(system, evaluator, molecule);
                if let Some(pos) = self.active_set.iter().position(|&m| m == molecule) {
                    self.active_set.swap_remove(pos);
                }
                self.net_exchange -= 1;
                self.stats.deletions_accepted += 1;
                Ok(-energy)
            }
            None => Err(EngineError::Internal(
                "accept called without a pending exchange trial".to_string(),
            )),
        }
    }

    /// Discards the pending trial, removing a tentatively inserted molecule.
    pub fn reject(
        &mut self,
        system: &mut MolecularSystem,
        evaluator: &mut EnergyEvaluator,
    ) -> Result<(), EngineError> {
        match self.pending.take() {
            Some(PendingTrial::Insertion { molecule, .. }) => {
                remove_molecule(system, evaluator, molecule);
                Ok(())
            }
            Some(PendingTrial::Deletion { .. }) => Ok(()),
            None => Err(EngineError::Internal(
                "reject called without a pending exchange trial".to_string(),
            )),
        }
    }

    fn ensure_resolved(&self) -> Result<(), EngineError> {
        if self.pending.is_some() {
            return Err(EngineError::Internal(
                "a new exchange trial was proposed before the previous one was resolved"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn remove_molecule(
    system: &mut MolecularSystem,
    evaluator: &mut EnergyEvaluator,
    molecule: MoleculeId,
) {
    if let Some(m) = system.remove_molecule(molecule) {
        evaluator.molecule_removed(system, m.atoms());
    }
}
