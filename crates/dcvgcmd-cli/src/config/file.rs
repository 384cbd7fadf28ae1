use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSimulationConfig {
    pub temperature: Option<f64>,
    pub time_step: Option<f64>,
    pub steps: Option<u64>,
    pub seed: Option<u64>,
    pub isothermal: Option<bool>,
    pub thermostat_interval: Option<usize>,
    pub md_burst_length: Option<usize>,
    pub mc_steps_per_burst: Option<usize>,
    pub neighbor_refresh_interval: Option<usize>,
    pub velocity_limit: Option<f64>,
    pub snapshot_interval: Option<u64>,
    pub thermalized_species: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRegionConfig {
    pub fraction: Option<f64>,
    pub padding: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileReservoirConfig {
    pub relaxation_steps: Option<usize>,
    pub step_size: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileNeighborConfig {
    pub range_factor: Option<f64>,
    pub safety_factor: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileBoxConfig {
    pub dimensions: [f64; 3],
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct FileWallConfig {
    pub sigma: f64,
    pub epsilon: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileAtomType {
    pub name: String,
    /// `inf` marks an immobile type.
    pub mass: f64,
    pub wall: Option<FileWallConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileAtom {
    #[serde(rename = "type")]
    pub type_name: String,
    pub position: [f64; 3],
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBond {
    pub atoms: [usize; 2],
    pub spring_constant: f64,
    pub length: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileAngle {
    pub atoms: [usize; 3],
    pub epsilon: f64,
    pub angle_degrees: f64,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileTether {
    pub spring_constant: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSpecies {
    pub name: String,
    #[serde(rename = "atom")]
    pub atoms: Vec<FileAtom>,
    #[serde(default, rename = "bond")]
    pub bonds: Vec<FileBond>,
    #[serde(default, rename = "angle")]
    pub angles: Vec<FileAngle>,
    pub tether: Option<FileTether>,
    /// Centres of the molecules present at the start of the run.
    #[serde(default)]
    pub initial_positions: Vec<[f64; 3]>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileSide {
    Low,
    High,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileExchange {
    pub species: String,
    pub side: FileSide,
    pub chemical_potential: f64,
}

/// The simulation configuration file as written by the user.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Pair parameter file, relative to the configuration file.
    pub pair_parameters: Option<PathBuf>,
    pub simulation: Option<FileSimulationConfig>,
    pub region: Option<FileRegionConfig>,
    pub reservoir: Option<FileReservoirConfig>,
    pub neighbors: Option<FileNeighborConfig>,
    #[serde(rename = "box")]
    pub sim_box: Option<FileBoxConfig>,
    #[serde(default, rename = "atom-type")]
    pub atom_types: Vec<FileAtomType>,
    #[serde(default)]
    pub species: Vec<FileSpecies>,
    #[serde(default, rename = "exchange")]
    pub exchanges: Vec<FileExchange>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[simulation]\ntemprature = 1.0\n").unwrap();
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FileConfig::from_file(&dir.path().join("absent.toml")),
            Err(CliError::Io(_))
        ));
    }

    #[test]
    fn species_tables_parse() {
        let config: FileConfig = toml::from_str(
            r#"
            [[atom-type]]
            name = "M"
            mass = inf

            [[species]]
            name = "propane"
            initial-positions = [[0.0, 0.0, 0.0]]
            tether = { spring-constant = 10.0 }

            [[species.atom]]
            type = "CH3"
            position = [0.0, 0.0, 0.0]

            [[species.bond]]
            atoms = [0, 1]
            spring-constant = 1000.0
            length = 1.54

            [[exchange]]
            species = "propane"
            side = "high"
            chemical-potential = -3.5
            "#,
        )
        .unwrap();
        assert!(config.atom_types[0].mass.is_infinite());
        let species = &config.species[0];
        assert_eq!(species.atoms[0].type_name, "CH3");
        assert_eq!(species.bonds[0].atoms, [0, 1]);
        assert_eq!(species.initial_positions.len(), 1);
        assert_eq!(config.exchanges[0].side, FileSide::High);
    }
}
