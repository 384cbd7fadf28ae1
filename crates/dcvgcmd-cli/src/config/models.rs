use dcvgcmd::core::models::system::MolecularSystem;
use dcvgcmd::engine::config::SimulationConfig;
use dcvgcmd::engine::energy::InteractionSet;

pub struct AppConfig {
    pub system: MolecularSystem,
    pub interactions: InteractionSet,
    pub simulation: SimulationConfig,
    pub steps: u64,
    pub seed: u64,
    pub snapshot_interval: u64,
}
