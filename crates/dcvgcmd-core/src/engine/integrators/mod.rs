//! Samplers that advance the configuration: the exchange Monte Carlo sampler
//! used during MC bursts and the velocity-Verlet stepper used during MD bursts.

pub mod monte_carlo;
pub mod velocity_verlet;
