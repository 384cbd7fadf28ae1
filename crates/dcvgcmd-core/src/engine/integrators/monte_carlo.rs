use crate::core::models::system::MolecularSystem;
use crate::engine::energy::EnergyEvaluator;
use crate::engine::error::EngineError;
use crate::engine::exchange::restricted::{ExchangeStats, RestrictedExchangeMove};
use crate::engine::utils::sampling::metropolis_accept;
use rand::Rng;
use tracing::debug;

/// Outcome of a single Monte Carlo step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McStepOutcome {
    Accepted,
    Rejected,
    /// The selected move had nothing to propose.
    Infeasible,
    /// No moves are registered.
    Idle,
}

/// Drives a set of exchange moves and keeps the total potential energy up to
/// date incrementally.
#[derive(Debug, Clone, Default)]
pub struct McSampler {
    moves: Vec<RestrictedExchangeMove>,
    energy: f64,
    steps: u64,
    accepted: u64,
}

impl McSampler {
    pub fn new(moves: Vec<RestrictedExchangeMove>) -> Self {
        Self {
            moves,
            ..Self::default()
        }
    }

    pub fn add_move(&mut self, exchange: RestrictedExchangeMove) {
        self.moves.push(exchange);
    }

    pub fn moves(&self) -> &[RestrictedExchangeMove] {
        &self.moves
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        for m in &mut self.moves {
            m.set_temperature(temperature);
        }
    }

    /// Cached total potential energy.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Recomputes the cached energy from scratch.
    pub fn reset_energy(
        &mut self,
        system: &MolecularSystem,
        evaluator: &EnergyEvaluator,
    ) -> Result<(), EngineError> {
        self.energy = evaluator.total_energy(system)?;
        Ok(())
    }

    pub fn rebuild_active_sets(&mut self, system: &MolecularSystem) {
        for m in &mut self.moves {
            m.rebuild_active_set(system);
        }
    }

    /// Steps performed, feasible or not.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Attempts and acceptances summed over every move.
    pub fn stats(&self) -> ExchangeStats {
        self.moves.iter().fold(ExchangeStats::default(), |acc, m| {
            let s = m.stats();
            ExchangeStats {
                insertions_attempted: acc.insertions_attempted + s.insertions_attempted,
                insertions_accepted: acc.insertions_accepted + s.insertions_accepted,
                deletions_attempted: acc.deletions_attempted + s.deletions_attempted,
                deletions_accepted: acc.deletions_accepted + s.deletions_accepted,
            }
        })
    }

    /// Picks one move uniformly, runs its trial and resolves it with a
    /// Metropolis test on the returned acceptance ratio.
    pub fn do_step(
        &mut self,
        system: &mut MolecularSystem,
        evaluator: &mut EnergyEvaluator,
        rng: &mut impl Rng,
    ) -> Result<McStepOutcome, EngineError> {
        if self.moves.is_empty() {
            return Ok(McStepOutcome::Idle);
        }
        self.steps += 1;
        let index = rng.gen_range(0..self.moves.len());
        let exchange = &mut self.moves[index];

        let Some(ratio) = exchange.do_trial(system, evaluator, rng)? else {
            return Ok(McStepOutcome::Infeasible);
        };
        if metropolis_accept(ratio, rng) {
            self.energy += exchange.accept(system, evaluator, rng)?;
            self.accepted += 1;
            debug!(move_index = index, energy = self.energy, "Exchange trial accepted.");
            Ok(McStepOutcome::Accepted)
        } else {
            exchange.reject(system, evaluator)?;
            Ok(McStepOutcome::Rejected)
        }
    }
}
