//! Geometric helpers shared by the samplers.

pub mod geometry;
