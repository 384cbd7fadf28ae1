use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileSide, FileSpecies};
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use dcvgcmd::core::forcefield::params::{
    BondAngle, HarmonicBond, PairParamSet, ParamError, SiteTether, WallPotential,
};
use dcvgcmd::core::models::atom::AtomType;
use dcvgcmd::core::models::simulation_box::SimulationBox;
use dcvgcmd::core::models::species::Species;
use dcvgcmd::core::models::system::MolecularSystem;
use dcvgcmd::engine::config::{
    NeighborConfig, RegionConfig, ReservoirConfig, SimulationConfig, SimulationConfigBuilder,
};
use dcvgcmd::engine::energy::{InteractionSet, PairRegistration, PairScope, WallRegistration};
use dcvgcmd::engine::exchange::region::Side;
use nalgebra::Point3;
use rand::Rng;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::from_file(&args.config)?;
    let file_config = apply_set_values(file_config, &args.set_values)?;

    let system = build_system(&file_config)?;
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    let interactions = build_interactions(&file_config, &system, base_dir)?;
    let simulation = build_simulation_config(&file_config, args, &system)?;

    let sim_file = file_config.simulation.unwrap_or_default();
    let steps = args.steps.or(sim_file.steps).unwrap_or(defaults.steps);
    let snapshot_interval = sim_file
        .snapshot_interval
        .unwrap_or(defaults.snapshot_interval);
    let seed = match args.seed.or(sim_file.seed) {
        Some(seed) => seed,
        None => {
            let seed: u64 = rand::thread_rng().r#gen();
            info!(seed, "No seed given; drew one at random.");
            seed
        }
    };

    Ok(AppConfig {
        system,
        interactions,
        simulation,
        steps,
        seed,
        snapshot_interval,
    })
}

fn build_system(config: &FileConfig) -> Result<MolecularSystem> {
    let sim_box = config
        .sim_box
        .as_ref()
        .ok_or_else(|| CliError::Config("A [box] table with `dimensions` is required.".to_string()))?;
    let [lx, ly, lz] = sim_box.dimensions;
    if !(lx > 0.0 && ly > 0.0 && lz > 0.0) {
        return Err(CliError::Config(format!(
            "Box dimensions must be positive, got {:?}",
            sim_box.dimensions
        )));
    }
    let mut system = MolecularSystem::new(SimulationBox::slit(lx, ly, lz));

    for atom_type in &config.atom_types {
        if system.find_atom_type(&atom_type.name).is_some() {
            return Err(CliError::Config(format!(
                "Atom type '{}' is defined twice.",
                atom_type.name
            )));
        }
        if !(atom_type.mass > 0.0) {
            return Err(CliError::Config(format!(
                "Atom type '{}' must have a positive mass.",
                atom_type.name
            )));
        }
        system.add_atom_type(AtomType::new(&atom_type.name, atom_type.mass));
    }

    for file_species in &config.species {
        let species = build_species(&system, file_species)?;
        let id = system.add_species(species).ok_or_else(|| {
            CliError::Config(format!(
                "Species '{}' references an atom index outside its template.",
                file_species.name
            ))
        })?;
        for centre in &file_species.initial_positions {
            system
                .add_molecule_at(id, Point3::from(*centre))
                .ok_or_else(|| {
                    CliError::Config(format!("Could not place a '{}' molecule.", file_species.name))
                })?;
        }
        debug!(
            species = %file_species.name,
            molecules = file_species.initial_positions.len(),
            "Species registered."
        );
    }
    Ok(system)
}

fn build_species(system: &MolecularSystem, file: &FileSpecies) -> Result<Species> {
    if file.atoms.is_empty() {
        return Err(CliError::Config(format!(
            "Species '{}' has no atoms.",
            file.name
        )));
    }
    let atoms = file
        .atoms
        .iter()
        .map(|a| {
            let type_id = system.find_atom_type(&a.type_name).ok_or_else(|| {
                CliError::Config(format!(
                    "Species '{}' uses unknown atom type '{}'.",
                    file.name, a.type_name
                ))
            })?;
            Ok((type_id, Point3::from(a.position)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut species = Species::new(&file.name, &atoms);
    for bond in &file.bonds {
        species = species.with_bond(
            bond.atoms[0],
            bond.atoms[1],
            HarmonicBond {
                spring_constant: bond.spring_constant,
                length: bond.length,
            },
        );
    }
    for angle in &file.angles {
        species = species.with_angle(
            angle.atoms[0],
            angle.atoms[1],
            angle.atoms[2],
            BondAngle {
                epsilon: angle.epsilon,
                angle: angle.angle_degrees.to_radians(),
            },
        );
    }
    if let Some(tether) = file.tether {
        species = species.with_tether(SiteTether {
            spring_constant: tether.spring_constant,
        });
    }
    Ok(species)
}

fn build_interactions(
    config: &FileConfig,
    system: &MolecularSystem,
    base_dir: &Path,
) -> Result<InteractionSet> {
    let mut interactions = InteractionSet::default();

    if let Some(relative) = &config.pair_parameters {
        let path = base_dir.join(relative);
        let params = PairParamSet::load(&path)?;
        let resolve = |name: &str| {
            system
                .find_atom_type(name)
                .ok_or_else(|| ParamError::UnknownAtomType(name.to_string()))
        };
        for (param, (types, potential)) in params.pairs.iter().zip(params.potentials()?) {
            interactions.pairs.push(PairRegistration {
                types: (resolve(&types[0])?, resolve(&types[1])?),
                potential,
                scope: if param.intramolecular {
                    PairScope::NonBonded
                } else {
                    PairScope::Intermolecular
                },
            });
        }
        info!(
            pairs = interactions.pairs.len(),
            path = %path.display(),
            "Loaded pair parameters."
        );
    }

    for atom_type in &config.atom_types {
        if let (Some(wall), Some(id)) = (atom_type.wall, system.find_atom_type(&atom_type.name)) {
            interactions.walls.push(WallRegistration {
                atom_type: id,
                wall: WallPotential {
                    sigma: wall.sigma,
                    epsilon: wall.epsilon,
                },
            });
        }
    }
    Ok(interactions)
}

fn build_simulation_config(
    config: &FileConfig,
    args: &RunArgs,
    system: &MolecularSystem,
) -> Result<SimulationConfig> {
    let sim = config.simulation.clone().unwrap_or_default();
    let mut builder = SimulationConfigBuilder::new();

    if let Some(t) = args.temperature.or(sim.temperature) {
        builder = builder.temperature(t);
    }
    if let Some(dt) = sim.time_step {
        builder = builder.time_step(dt);
    }
    if let Some(v) = sim.isothermal {
        builder = builder.isothermal(v);
    }
    if let Some(v) = sim.thermostat_interval {
        builder = builder.thermostat_interval(v);
    }
    if let Some(v) = sim.md_burst_length {
        builder = builder.md_burst_length(v);
    }
    if let Some(v) = sim.mc_steps_per_burst {
        builder = builder.mc_steps_per_burst(v);
    }
    if let Some(v) = sim.neighbor_refresh_interval {
        builder = builder.neighbor_refresh_interval(v);
    }
    if let Some(v) = sim.velocity_limit {
        builder = builder.velocity_limit(v);
    }

    let region_defaults = RegionConfig::default();
    let region = config.region.clone().unwrap_or_default();
    builder = builder.region(RegionConfig {
        fraction: region.fraction.unwrap_or(region_defaults.fraction),
        padding: region.padding.unwrap_or(region_defaults.padding),
    });
    let reservoir_defaults = ReservoirConfig::default();
    let reservoir = config.reservoir.clone().unwrap_or_default();
    builder = builder.reservoir(ReservoirConfig {
        relaxation_steps: reservoir
            .relaxation_steps
            .unwrap_or(reservoir_defaults.relaxation_steps),
        step_size: reservoir.step_size.unwrap_or(reservoir_defaults.step_size),
    });
    let neighbor_defaults = NeighborConfig::default();
    let neighbors = config.neighbors.clone().unwrap_or_default();
    builder = builder.neighbors(NeighborConfig {
        range_factor: neighbors
            .range_factor
            .unwrap_or(neighbor_defaults.range_factor),
        safety_factor: neighbors
            .safety_factor
            .unwrap_or(neighbor_defaults.safety_factor),
    });

    let species_id = |name: &str| {
        system
            .find_species(name)
            .ok_or_else(|| CliError::Config(format!("Unknown species '{name}'.")))
    };
    for exchange in &config.exchanges {
        let side = match exchange.side {
            FileSide::Low => Side::Low,
            FileSide::High => Side::High,
        };
        builder = builder.exchange(
            species_id(&exchange.species)?,
            side,
            exchange.chemical_potential,
        );
    }
    if let Some(name) = &sim.thermalized_species {
        builder = builder.thermalized_species(species_id(name)?);
    }

    Ok(builder.build()?)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "simulation.temperature" => {
                config.simulation.get_or_insert_with(Default::default).temperature = Some(parse_value(key, value)?);
            }
            "simulation.time-step" => {
                config.simulation.get_or_insert_with(Default::default).time_step = Some(parse_value(key, value)?);
            }
            "simulation.steps" => {
                config.simulation.get_or_insert_with(Default::default).steps = Some(parse_value(key, value)?);
            }
            "simulation.seed" => {
                config.simulation.get_or_insert_with(Default::default).seed = Some(parse_value(key, value)?);
            }
            "simulation.isothermal" => {
                config.simulation.get_or_insert_with(Default::default).isothermal = Some(parse_value(key, value)?);
            }
            "simulation.thermostat-interval" => {
                config.simulation.get_or_insert_with(Default::default).thermostat_interval =
                    Some(parse_value(key, value)?);
            }
            "simulation.md-burst-length" => {
                config.simulation.get_or_insert_with(Default::default).md_burst_length =
                    Some(parse_value(key, value)?);
            }
            "simulation.mc-steps-per-burst" => {
                config.simulation.get_or_insert_with(Default::default).mc_steps_per_burst =
                    Some(parse_value(key, value)?);
            }
            "simulation.neighbor-refresh-interval" => {
                config.simulation.get_or_insert_with(Default::default).neighbor_refresh_interval =
                    Some(parse_value(key, value)?);
            }
            "simulation.velocity-limit" => {
                config.simulation.get_or_insert_with(Default::default).velocity_limit =
                    Some(parse_value(key, value)?);
            }
            "simulation.snapshot-interval" => {
                config.simulation.get_or_insert_with(Default::default).snapshot_interval =
                    Some(parse_value(key, value)?);
            }
            "region.fraction" => {
                config.region.get_or_insert_with(Default::default).fraction =
                    Some(parse_value(key, value)?);
            }
            "region.padding" => {
                config.region.get_or_insert_with(Default::default).padding =
                    Some(parse_value(key, value)?);
            }
            "reservoir.relaxation-steps" => {
                config.reservoir.get_or_insert_with(Default::default).relaxation_steps =
                    Some(parse_value(key, value)?);
            }
            "reservoir.step-size" => {
                config.reservoir.get_or_insert_with(Default::default).step_size =
                    Some(parse_value(key, value)?);
            }
            "neighbors.range-factor" => {
                config.neighbors.get_or_insert_with(Default::default).range_factor =
                    Some(parse_value(key, value)?);
            }
            "neighbors.safety-factor" => {
                config.neighbors.get_or_insert_with(Default::default).safety_factor =
                    Some(parse_value(key, value)?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcvgcmd::engine::config::ConfigError;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    const CONFIG: &str = r#"
        pair-parameters = "pairs.toml"

        [simulation]
        temperature = 1.2
        time-step = 0.005
        steps = 300
        seed = 11
        md-burst-length = 25
        thermalized-species = "membrane"

        [region]
        fraction = 0.15
        padding = 1.0

        [box]
        dimensions = [10.0, 10.0, 40.0]

        [[atom-type]]
        name = "Ar"
        mass = 1.0
        wall = { sigma = 1.0, epsilon = 1.0 }

        [[atom-type]]
        name = "M"
        mass = 2.0

        [[species]]
        name = "argon"
        [[species.atom]]
        type = "Ar"
        position = [0.0, 0.0, 0.0]

        [[species]]
        name = "membrane"
        tether = { spring-constant = 50.0 }
        initial-positions = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]
        [[species.atom]]
        type = "M"
        position = [0.0, 0.0, 0.0]

        [[exchange]]
        species = "argon"
        side = "low"
        chemical-potential = -3.0

        [[exchange]]
        species = "argon"
        side = "high"
        chemical-potential = -6.0
    "#;

    const PAIRS: &str = r#"
        default-cutoff = 2.5

        [[pair]]
        types = ["Ar", "Ar"]
        sigma = 1.0
        epsilon = 1.0

        [[pair]]
        types = ["Ar", "M"]
        sigma = 1.0
        epsilon = 0.5
        cutoff = 2.0
    "#;

    fn write_inputs(config: &str, pairs: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        fs::write(&path, config).unwrap();
        fs::write(dir.path().join("pairs.toml"), pairs).unwrap();
        (dir, path)
    }

    fn base_run_args(config: PathBuf) -> RunArgs {
        RunArgs {
            config,
            steps: None,
            seed: None,
            temperature: None,
            profile_bins: 0,
            set_values: vec![],
        }
    }

    #[test]
    fn build_config_reads_file_and_merges_defaults() {
        let (_dir, path) = write_inputs(CONFIG, PAIRS);
        let app = build_config(&base_run_args(path)).expect("build ok");

        assert_eq!(app.steps, 300);
        assert_eq!(app.seed, 11);
        assert_eq!(app.snapshot_interval, DefaultsConfig::default().snapshot_interval);

        let sim = &app.simulation;
        assert_eq!(sim.temperature, 1.2);
        assert_eq!(sim.md_burst_length, 25);
        assert_eq!(sim.mc_steps_per_burst, 50);
        assert_eq!(sim.region.fraction, 0.15);
        assert_eq!(sim.exchanges.len(), 2);
        assert_eq!(sim.exchanges[1].side, Side::High);
        let membrane = app.system.find_species("membrane").unwrap();
        assert_eq!(sim.thermalized_species, Some(membrane));

        assert_eq!(app.system.molecule_count(membrane), 2);
        assert!(app.system.species(membrane).unwrap().tether().is_some());
        assert_eq!(app.interactions.pairs.len(), 2);
        assert_eq!(app.interactions.pairs[1].potential.cutoff, 2.0);
        assert_eq!(app.interactions.walls.len(), 1);
    }

    #[test]
    fn cli_arguments_override_file_values() {
        let (_dir, path) = write_inputs(CONFIG, PAIRS);
        let mut args = base_run_args(path);
        args.steps = Some(42);
        args.seed = Some(5);
        args.temperature = Some(2.0);
        let app = build_config(&args).unwrap();
        assert_eq!(app.steps, 42);
        assert_eq!(app.seed, 5);
        assert_eq!(app.simulation.temperature, 2.0);
    }

    #[test]
    fn set_values_override_file_values() {
        let (_dir, path) = write_inputs(CONFIG, PAIRS);
        let mut args = base_run_args(path);
        args.set_values = vec![
            "simulation.md-burst-length=80".to_string(),
            "region.padding=0.5".to_string(),
            "neighbors.range-factor=1.5".to_string(),
            "reservoir.relaxation-steps=3".to_string(),
        ];
        let app = build_config(&args).unwrap();
        assert_eq!(app.simulation.md_burst_length, 80);
        assert!((app.simulation.region.padding - 0.5).abs() < 1e-12);
        assert!((app.simulation.neighbors.range_factor - 1.5).abs() < 1e-12);
        assert_eq!(app.simulation.reservoir.relaxation_steps, 3);
    }

    #[test]
    fn unsupported_or_malformed_set_values_fail() {
        let (_dir, path) = write_inputs(CONFIG, PAIRS);
        for bad in ["simulation.colour=red", "no-equals-sign", "region.fraction=wide"] {
            let mut args = base_run_args(path.clone());
            args.set_values = vec![bad.to_string()];
            assert!(
                matches!(build_config(&args), Err(CliError::Config(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn unknown_exchange_species_is_rejected() {
        let config = CONFIG.replace(r#"species = "argon"
        side = "high""#, r#"species = "xenon"
        side = "high""#);
        let (_dir, path) = write_inputs(&config, PAIRS);
        assert!(matches!(
            build_config(&base_run_args(path)),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn unknown_pair_atom_type_is_rejected() {
        let pairs = PAIRS.replace(r#"["Ar", "M"]"#, r#"["Ar", "Kr"]"#);
        let (_dir, path) = write_inputs(CONFIG, &pairs);
        assert!(matches!(
            build_config(&base_run_args(path)),
            Err(CliError::Params(ParamError::UnknownAtomType(_)))
        ));
    }

    #[test]
    fn missing_box_is_rejected() {
        let config = CONFIG.replace("dimensions = [10.0, 10.0, 40.0]", "");
        let (_dir, path) = write_inputs(&config, PAIRS);
        assert!(build_config(&base_run_args(path)).is_err());
    }

    #[test]
    fn missing_temperature_is_a_configuration_error() {
        let config = CONFIG.replace("temperature = 1.2", "");
        let (_dir, path) = write_inputs(&config, PAIRS);
        let Err(err) = build_config(&base_run_args(path)) else {
            panic!("expected a configuration error");
        };
        assert!(matches!(
            err,
            CliError::Simulation(ConfigError::MissingParameter("temperature"))
        ));
        let source = std::error::Error::source(&err).expect("typed source is kept");
        assert!(source.to_string().contains("temperature"));
    }
}
