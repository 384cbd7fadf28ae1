//! Utility functions for the engine module, currently the random sampling
//! primitives used by both samplers.

pub mod sampling;
