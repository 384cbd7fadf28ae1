use super::exchange::region::Side;
use crate::core::models::ids::SpeciesId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// One directional exchange move: a species inserted into and deleted from
/// one control region at a fixed chemical potential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeSpec {
    pub species: SpeciesId,
    pub side: Side,
    pub chemical_potential: f64,
}

/// Geometry shared by both control regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionConfig {
    /// Fraction of the box length along the constrained axis covered by each region.
    pub fraction: f64,
    /// Gap kept between a region and its wall.
    pub padding: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            fraction: 0.1,
            padding: 0.0,
        }
    }
}

/// Pre-insertion relaxation of the reservoir templates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservoirConfig {
    pub relaxation_steps: usize,
    pub step_size: f64,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            relaxation_steps: 10,
            step_size: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborConfig {
    /// Neighbor radius as a multiple of each potential's interaction range.
    pub range_factor: f64,
    /// Fraction of the skin an atom may travel before its list is rebuilt.
    pub safety_factor: f64,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            range_factor: 1.2,
            safety_factor: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub temperature: f64,
    pub time_step: f64,
    pub isothermal: bool,
    /// MD steps between velocity rescalings when isothermal.
    pub thermostat_interval: usize,
    pub md_burst_length: usize,
    pub mc_steps_per_burst: usize,
    pub neighbor_refresh_interval: usize,
    pub velocity_limit: f64,
    pub region: RegionConfig,
    pub reservoir: ReservoirConfig,
    pub neighbors: NeighborConfig,
    pub exchanges: Vec<ExchangeSpec>,
    pub thermalized_species: Option<SpeciesId>,
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    temperature: Option<f64>,
    time_step: Option<f64>,
    isothermal: Option<bool>,
    thermostat_interval: Option<usize>,
    md_burst_length: Option<usize>,
    mc_steps_per_burst: Option<usize>,
    neighbor_refresh_interval: Option<usize>,
    velocity_limit: Option<f64>,
    region: Option<RegionConfig>,
    reservoir: Option<ReservoirConfig>,
    neighbors: Option<NeighborConfig>,
    exchanges: Vec<ExchangeSpec>,
    thermalized_species: Option<SpeciesId>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn time_step(mut self, dt: f64) -> Self {
        self.time_step = Some(dt);
        self
    }
    pub fn isothermal(mut self, isothermal: bool) -> Self {
        self.isothermal = Some(isothermal);
        self
    }
    pub fn thermostat_interval(mut self, steps: usize) -> Self {
        self.thermostat_interval = Some(steps);
        self
    }
    pub fn md_burst_length(mut self, steps: usize) -> Self {
        self.md_burst_length = Some(steps);
        self
    }
    pub fn mc_steps_per_burst(mut self, steps: usize) -> Self {
        self.mc_steps_per_burst = Some(steps);
        self
    }
    pub fn neighbor_refresh_interval(mut self, steps: usize) -> Self {
        self.neighbor_refresh_interval = Some(steps);
        self
    }
    pub fn velocity_limit(mut self, limit: f64) -> Self {
        self.velocity_limit = Some(limit);
        self
    }
    pub fn region(mut self, region: RegionConfig) -> Self {
        self.region = Some(region);
        self
    }
    pub fn reservoir(mut self, reservoir: ReservoirConfig) -> Self {
        self.reservoir = Some(reservoir);
        self
    }
    pub fn neighbors(mut self, neighbors: NeighborConfig) -> Self {
        self.neighbors = Some(neighbors);
        self
    }
    pub fn exchange(mut self, species: SpeciesId, side: Side, chemical_potential: f64) -> Self {
        self.exchanges.push(ExchangeSpec {
            species,
            side,
            chemical_potential,
        });
        self
    }
    pub fn thermalized_species(mut self, species: SpeciesId) -> Self {
        self.thermalized_species = Some(species);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let temperature = self
            .temperature
            .ok_or(ConfigError::MissingParameter("temperature"))?;
        let time_step = self
            .time_step
            .ok_or(ConfigError::MissingParameter("time_step"))?;
        if self.exchanges.is_empty() {
            return Err(ConfigError::MissingParameter("exchanges"));
        }

        let config = SimulationConfig {
            temperature,
            time_step,
            isothermal: self.isothermal.unwrap_or(false),
            thermostat_interval: self.thermostat_interval.unwrap_or(1),
            md_burst_length: self.md_burst_length.unwrap_or(50),
            mc_steps_per_burst: self.mc_steps_per_burst.unwrap_or(50),
            neighbor_refresh_interval: self.neighbor_refresh_interval.unwrap_or(10),
            velocity_limit: self.velocity_limit.unwrap_or(100.0),
            region: self.region.unwrap_or_default(),
            reservoir: self.reservoir.unwrap_or_default(),
            neighbors: self.neighbors.unwrap_or_default(),
            exchanges: self.exchanges,
            thermalized_species: self.thermalized_species,
        };
        config.validate()?;
        Ok(config)
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = |parameter: &'static str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    parameter,
                    reason: format!("must be positive and finite, got {value}"),
                })
            }
        };
        positive("temperature", self.temperature)?;
        positive("time_step", self.time_step)?;
        positive("velocity_limit", self.velocity_limit)?;
        positive("reservoir.step_size", self.reservoir.step_size)?;
        positive("neighbors.safety_factor", self.neighbors.safety_factor)?;

        if self.neighbors.range_factor <= 1.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "neighbors.range_factor",
                reason: format!(
                    "must exceed 1 to leave a neighbor skin, got {}",
                    self.neighbors.range_factor
                ),
            });
        }
        for (parameter, value) in [
            ("md_burst_length", self.md_burst_length),
            ("neighbor_refresh_interval", self.neighbor_refresh_interval),
            ("thermostat_interval", self.thermostat_interval),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    parameter,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}
