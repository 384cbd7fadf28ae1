use crate::core::models::ids::SpeciesId;
use crate::core::models::simulation_box::CONSTRAINED_AXIS;
use crate::core::models::system::MolecularSystem;
use crate::engine::config::SimulationConfig;
use crate::engine::energy::{EnergyEvaluator, InteractionSet};
use crate::engine::error::EngineError;
use crate::engine::exchange::region::Side;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::scheduler::{HybridStepScheduler, StepOutcome};
use crate::engine::utils::sampling::thermalize_species;
use rand::Rng;
use tracing::{info, instrument};

/// Outcome of one exchange move over a run.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub species: SpeciesId,
    pub species_name: String,
    pub side: Side,
    pub chemical_potential: f64,
    pub net_exchange: i64,
    /// Net exchange per unit time and cross-section area.
    pub flux: f64,
    pub occupancy: usize,
    pub attempted: u64,
    pub accepted: u64,
    pub reservoir_acceptance: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FluxReport {
    pub steps: u64,
    pub time: f64,
    pub temperature: f64,
    pub cross_section_area: f64,
    pub moves: Vec<MoveReport>,
    pub mc_steps: u64,
    pub mc_accepted: u64,
    pub system: MolecularSystem,
}

/// Net exchange divided by elapsed time and cross-section area; zero before
/// any time has elapsed.
pub fn flux(net_exchange: i64, time: f64, area: f64) -> f64 {
    if time > 0.0 && area > 0.0 {
        net_exchange as f64 / (time * area)
    } else {
        0.0
    }
}

/// Number density of `species` along the constrained axis, binned by the
/// molecules' reference points.
///
/// # Return
///
/// One `(bin centre, density)` pair per bin, from the low wall to the high
/// wall. Empty if `bins` is zero.
pub fn z_profile(system: &MolecularSystem, species: SpeciesId, bins: usize) -> Vec<(f64, f64)> {
    if bins == 0 {
        return Vec::new();
    }
    let sim_box = system.sim_box();
    let length = sim_box.length(CONSTRAINED_AXIS);
    let width = length / bins as f64;
    let mut counts = vec![0usize; bins];
    for id in system.molecules_of(species) {
        let Some(p) = system.reference_point(id) else {
            continue;
        };
        let u = sim_box.fractional(CONSTRAINED_AXIS, p[CONSTRAINED_AXIS]);
        counts[((u * bins as f64) as usize).min(bins - 1)] += 1;
    }
    let bin_volume = width * sim_box.cross_section_area(CONSTRAINED_AXIS);
    counts
        .into_iter()
        .enumerate()
        .map(|(i, n)| {
            let centre = -0.5 * length + (i as f64 + 0.5) * width;
            (centre, n as f64 / bin_volume)
        })
        .collect()
}

/// Runs a DCV-GCMD simulation and measures the flux through every control
/// region.
///
/// Initial velocities of every molecule are drawn from the Maxwell-Boltzmann
/// distribution at the configured temperature. A [`Progress::Snapshot`] is
/// reported every `snapshot_interval` steps when it is non-zero.
#[instrument(skip_all, name = "flux_workflow", fields(steps = steps))]
pub fn run<R: Rng>(
    mut system: MolecularSystem,
    interactions: &InteractionSet,
    config: &SimulationConfig,
    mut rng: R,
    steps: u64,
    snapshot_interval: u64,
    reporter: &ProgressReporter,
) -> Result<FluxReport, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Setup" });
    info!(
        molecules = system.total_molecule_count(),
        atoms = system.atom_count(),
        "Preparing simulation."
    );
    let species: Vec<_> = system.species_iter().map(|(id, _)| id).collect();
    for id in species {
        thermalize_species(&mut system, id, config.temperature, &mut rng)?;
    }
    let evaluator =
        EnergyEvaluator::from_interactions(system.sim_box().clone(), interactions, &config.neighbors);
    let mut scheduler = HybridStepScheduler::new(system, evaluator, config, rng)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Simulation" });
    reporter.report(Progress::TaskStart { total_steps: steps });
    for step in 1..=steps {
        if let StepOutcome::McBurst {
            attempted,
            accepted,
        } = scheduler.step()?
        {
            reporter.report(Progress::McBurst {
                attempted,
                accepted,
            });
        }
        reporter.report(Progress::TaskIncrement);
        if snapshot_interval > 0 && step % snapshot_interval == 0 {
            reporter.report(Progress::Snapshot {
                step,
                time: scheduler.current_time(),
                molecules: scheduler.system().total_molecule_count(),
                net_exchange: scheduler.moves().iter().map(|m| m.net_exchange()).sum(),
            });
        }
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let report = build_report(scheduler, steps);
    for m in &report.moves {
        info!(
            species = %m.species_name,
            side = %m.side,
            net_exchange = m.net_exchange,
            flux = m.flux,
            occupancy = m.occupancy,
            "Exchange summary."
        );
    }
    info!(time = report.time, "Workflow complete.");
    Ok(report)
}

fn build_report<R: Rng>(scheduler: HybridStepScheduler<R>, steps: u64) -> FluxReport {
    let time = scheduler.current_time();
    let area = scheduler.system().sim_box().cross_section_area(CONSTRAINED_AXIS);
    let moves = scheduler
        .moves()
        .iter()
        .map(|m| MoveReport {
            species: m.species(),
            species_name: scheduler
                .system()
                .species(m.species())
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            side: m.side(),
            chemical_potential: m.chemical_potential(),
            net_exchange: m.net_exchange(),
            flux: flux(m.net_exchange(), time, area),
            occupancy: m.occupancy(),
            attempted: m.stats().attempted(),
            accepted: m.stats().accepted(),
            reservoir_acceptance: m.reservoir().acceptance_rate(),
        })
        .collect();
    let temperature = scheduler.temperature();
    let mc_steps = scheduler.sampler().steps();
    let mc_accepted = scheduler.sampler().accepted();
    FluxReport {
        steps,
        time,
        temperature,
        cross_section_area: area,
        moves,
        mc_steps,
        mc_accepted,
        system: scheduler.into_system(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::{LennardJones, PairPotential, WallPotential};
    use crate::core::models::atom::AtomType;
    use crate::core::models::simulation_box::SimulationBox;
    use crate::core::models::species::Species;
    use crate::engine::config::{RegionConfig, SimulationConfigBuilder};
    use crate::engine::energy::{PairRegistration, PairScope, WallRegistration};
    use nalgebra::Point3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    #[test]
    fn flux_is_zero_before_time_elapses() {
        assert_eq!(flux(10, 0.0, 100.0), 0.0);
        assert!((flux(10, 2.0, 5.0) - 1.0).abs() < 1e-12);
        assert!((flux(-4, 1.0, 2.0) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn z_profile_bins_molecules_by_reference_point() {
        let mut system = MolecularSystem::new(SimulationBox::slit(2.0, 5.0, 10.0));
        let t = system.add_atom_type(AtomType::new("A", 1.0));
        let s = system.add_species(Species::monatomic("a", t)).unwrap();
        for z in [-4.5, -4.0, 0.5, 4.9] {
            system.add_molecule_at(s, Point3::new(0.0, 0.0, z)).unwrap();
        }
        let profile = z_profile(&system, s, 5);
        assert_eq!(profile.len(), 5);
        assert!((profile[0].0 + 4.0).abs() < 1e-12);
        // Bin volume is 2 * 2 * 5 = 20.
        assert!((profile[0].1 - 2.0 / 20.0).abs() < 1e-12);
        assert_eq!(profile[1].1, 0.0);
        assert!((profile[2].1 - 1.0 / 20.0).abs() < 1e-12);
        assert!((profile[4].1 - 1.0 / 20.0).abs() < 1e-12);
        assert!(z_profile(&system, s, 0).is_empty());
    }

    #[test]
    fn run_reports_progress_and_builds_gradient() {
        let mut system = MolecularSystem::new(SimulationBox::slit(8.0, 8.0, 30.0));
        let ar = system.add_atom_type(AtomType::new("Ar", 1.0));
        let argon = system.add_species(Species::monatomic("argon", ar)).unwrap();
        let config = SimulationConfigBuilder::new()
            .temperature(1.2)
            .time_step(0.005)
            .md_burst_length(10)
            .mc_steps_per_burst(40)
            .region(RegionConfig {
                fraction: 0.15,
                padding: 1.0,
            })
            .exchange(argon, Side::Low, -2.0)
            .exchange(argon, Side::High, -8.0)
            .build()
            .unwrap();
        let interactions = InteractionSet {
            pairs: vec![PairRegistration {
                types: (ar, ar),
                potential: PairPotential::new(LennardJones::new(1.0, 1.0), 2.5),
                scope: PairScope::Intermolecular,
            }],
            walls: vec![WallRegistration {
                atom_type: ar,
                wall: WallPotential {
                    sigma: 1.0,
                    epsilon: 1.0,
                },
            }],
        };

        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));
        let steps = 55;
        let report = run(
            system,
            &interactions,
            &config,
            StdRng::seed_from_u64(12),
            steps,
            11,
            &reporter,
        )
        .unwrap();
        drop(reporter);

        let events = events.into_inner().unwrap();
        let increments = events
            .iter()
            .filter(|e| matches!(e, Progress::TaskIncrement))
            .count();
        assert_eq!(increments as u64, steps);
        let snapshots = events
            .iter()
            .filter(|e| matches!(e, Progress::Snapshot { .. }))
            .count();
        assert_eq!(snapshots, 5);
        let bursts = events
            .iter()
            .filter(|e| matches!(e, Progress::McBurst { .. }))
            .count();
        assert_eq!(bursts, 5);

        // 5 MC bursts and 50 MD steps.
        assert!((report.time - 50.0 * 0.005).abs() < 1e-9);
        assert_eq!(report.moves.len(), 2);
        assert_eq!(report.mc_steps, 5 * 40);
        let low = &report.moves[0];
        let high = &report.moves[1];
        assert_eq!(low.side, Side::Low);
        assert_eq!(low.species_name, "argon");
        assert!(low.net_exchange > 0);
        assert!(low.occupancy > high.occupancy);
        assert!((report.cross_section_area - 64.0).abs() < 1e-12);
        let total: i64 = report.moves.iter().map(|m| m.net_exchange).sum();
        assert_eq!(total, report.system.molecule_count(argon) as i64);
    }
}
