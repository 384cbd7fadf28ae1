use crate::core::models::simulation_box::{CONSTRAINED_AXIS, SimulationBox};
use crate::engine::error::EngineError;
use rand::Rng;
use std::fmt;

/// Which end of the constrained axis a control region sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Low,
    High,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Low => write!(f, "low"),
            Side::High => write!(f, "high"),
        }
    }
}

/// A slab at one end of the box along the constrained axis, within which
/// exchange moves insert and delete molecules.
///
/// With the box spanning `[-L/2, L/2]`, the low region covers
/// `[-L/2 + padding, -L/2 + fraction*L)` and the high region
/// `[L/2 - fraction*L, L/2 - padding)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRegion {
    side: Side,
    fraction: f64,
    padding: f64,
    half_length: f64,
    z_min: f64,
    z_max: f64,
}

impl ControlRegion {
    pub fn new(
        sim_box: &SimulationBox,
        side: Side,
        fraction: f64,
        padding: f64,
    ) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidRegion { side, reason };
        if !(fraction > 0.0 && fraction <= 0.5) {
            return Err(invalid(format!(
                "fraction must lie in (0, 0.5] so opposite regions cannot overlap, got {fraction}"
            )));
        }
        let length = sim_box.length(CONSTRAINED_AXIS);
        let width = fraction * length;
        if !(padding >= 0.0 && padding < width) {
            return Err(invalid(format!(
                "padding must lie in [0, {width}) for a region of width {width}, got {padding}"
            )));
        }
        let half = 0.5 * length;
        let (z_min, z_max) = match side {
            Side::Low => (-half + padding, -half + width),
            Side::High => (half - width, half - padding),
        };
        Ok(Self {
            side,
            fraction,
            padding,
            half_length: half,
            z_min,
            z_max,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.z_min, self.z_max)
    }

    /// Returns `true` if `z` lies in `[z_min, z_max)`.
    #[inline]
    pub fn contains(&self, z: f64) -> bool {
        z >= self.z_min && z < self.z_max
    }

    /// Heights at which a molecule whose atoms extend up to `reach` from its
    /// reference point can be centred without any atom leaving the box.
    ///
    /// Returns `None` if no such height exists inside the region.
    pub fn insertion_bounds(&self, reach: f64) -> Option<(f64, f64)> {
        let lo = self.z_min.max(-self.half_length + reach);
        let hi = self.z_max.min(self.half_length - reach);
        (lo < hi).then_some((lo, hi))
    }

    /// Draws a height uniformly from [`insertion_bounds`](Self::insertion_bounds).
    pub fn sample_z(&self, reach: f64, rng: &mut impl Rng) -> Option<f64> {
        let (lo, hi) = self.insertion_bounds(reach)?;
        Some(rng.gen_range(lo..hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sim_box() -> SimulationBox {
        SimulationBox::slit(40.0, 40.0, 100.0)
    }

    #[test]
    fn low_and_high_bounds_follow_fraction_and_padding() {
        let low = ControlRegion::new(&sim_box(), Side::Low, 0.1, 5.0).unwrap();
        let high = ControlRegion::new(&sim_box(), Side::High, 0.1, 5.0).unwrap();
        assert_eq!(low.bounds(), (-45.0, -40.0));
        assert_eq!(high.bounds(), (40.0, 45.0));
    }

    #[test]
    fn membership_is_half_open() {
        let low = ControlRegion::new(&sim_box(), Side::Low, 0.1, 0.0).unwrap();
        assert!(low.contains(-50.0));
        assert!(low.contains(-40.000001));
        assert!(!low.contains(-40.0));
        assert!(!low.contains(0.0));
    }

    #[test]
    fn rejects_overlapping_or_degenerate_fractions() {
        for fraction in [0.0, -0.1, 0.51, f64::NAN] {
            assert!(matches!(
                ControlRegion::new(&sim_box(), Side::High, fraction, 0.0),
                Err(EngineError::InvalidRegion {
                    side: Side::High,
                    ..
                })
            ));
        }
        assert!(ControlRegion::new(&sim_box(), Side::Low, 0.5, 0.0).is_ok());
    }

    #[test]
    fn rejects_padding_that_swallows_the_region() {
        assert!(ControlRegion::new(&sim_box(), Side::Low, 0.1, 10.0).is_err());
        assert!(ControlRegion::new(&sim_box(), Side::Low, 0.1, -1.0).is_err());
    }

    #[test]
    fn sampled_heights_lie_inside_the_region() {
        let mut rng = StdRng::seed_from_u64(8);
        let high = ControlRegion::new(&sim_box(), Side::High, 0.1, 2.0).unwrap();
        assert!((0..1000).all(|_| high.contains(high.sample_z(0.0, &mut rng).unwrap())));
    }

    #[test]
    fn insertion_bounds_keep_extended_molecules_inside_the_box() {
        let low = ControlRegion::new(&sim_box(), Side::Low, 0.1, 0.0).unwrap();
        let high = ControlRegion::new(&sim_box(), Side::High, 0.1, 1.0).unwrap();
        assert_eq!(low.insertion_bounds(0.0), Some((-50.0, -40.0)));
        assert_eq!(low.insertion_bounds(2.5), Some((-47.5, -40.0)));
        assert_eq!(high.insertion_bounds(0.5), Some((40.0, 49.0)));
        assert_eq!(high.insertion_bounds(3.0), Some((40.0, 47.0)));
        assert_eq!(low.insertion_bounds(10.0), None);
    }
}
