use dcvgcmd::core::forcefield::params::ParamError;
use dcvgcmd::engine::config::ConfigError;
use dcvgcmd::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Params(#[from] ParamError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid simulation settings: {0}")]
    Simulation(#[from] ConfigError),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
