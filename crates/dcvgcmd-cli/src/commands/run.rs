use crate::cli::RunArgs;
use crate::config::{AppConfig, build_config};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use dcvgcmd::engine::progress::ProgressReporter;
use dcvgcmd::workflows::flux::{self, FluxReport};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    info!("Building simulation from {:?}", &args.config);
    let AppConfig {
        system,
        interactions,
        simulation,
        steps,
        seed,
        snapshot_interval,
    } = build_config(&args)?;
    info!(
        steps,
        seed,
        temperature = simulation.temperature,
        exchanges = simulation.exchanges.len(),
        "Configuration resolved."
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting DCV-GCMD simulation ({steps} steps, seed {seed})...");
    let report = flux::run(
        system,
        &interactions,
        &simulation,
        StdRng::seed_from_u64(seed),
        steps,
        snapshot_interval,
        &reporter,
    )?;

    print_summary(&report);
    if args.profile_bins > 0 {
        print_profiles(&report, args.profile_bins);
    }
    Ok(())
}

fn print_summary(report: &FluxReport) {
    println!(
        "Simulated {:.4} time units over {} steps at T = {:.4}.",
        report.time, report.steps, report.temperature
    );
    let mc_rate = if report.mc_steps > 0 {
        report.mc_accepted as f64 / report.mc_steps as f64
    } else {
        0.0
    };
    println!(
        "Exchange moves: {} attempted, {} accepted ({:.1}%).",
        report.mc_steps,
        report.mc_accepted,
        100.0 * mc_rate
    );
    println!(
        "{:<16} {:<5} {:>10} {:>10} {:>14} {:>10} {:>10}",
        "species", "side", "mu", "net", "flux", "occupancy", "accepted"
    );
    for m in &report.moves {
        println!(
            "{:<16} {:<5} {:>10.4} {:>10} {:>14.6e} {:>10} {:>10}",
            m.species_name,
            m.side.to_string(),
            m.chemical_potential,
            m.net_exchange,
            m.flux,
            m.occupancy,
            format!("{}/{}", m.accepted, m.attempted)
        );
        if let Some(rate) = m.reservoir_acceptance {
            println!("  reservoir relaxation acceptance: {:.1}%", 100.0 * rate);
        }
    }
}

fn print_profiles(report: &FluxReport, bins: usize) {
    for (id, species) in report.system.species_iter() {
        println!("Density profile for '{}':", species.name);
        for (z, density) in flux::z_profile(&report.system, id, bins) {
            println!("  {z:>10.4} {density:>14.6e}");
        }
    }
}
