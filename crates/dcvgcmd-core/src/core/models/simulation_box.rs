use nalgebra::{Point3, Vector3};

/// Axis along which the control regions are laid out and the bound checks run.
pub const CONSTRAINED_AXIS: usize = 2;

/// An orthorhombic box centred on the origin.
///
/// Each axis is either periodic (minimum-image convention applies) or bounded
/// by hard walls at `±L/2`. DCV-GCMD uses a slit: periodic in x and y, walled
/// in z, so that the two control volumes sit at opposite walls.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationBox {
    dimensions: Vector3<f64>,
    periodic: [bool; 3],
}

impl SimulationBox {
    pub fn new(dimensions: Vector3<f64>, periodic: [bool; 3]) -> Self {
        Self {
            dimensions,
            periodic,
        }
    }

    /// Periodic in x and y, non-periodic along the constrained axis.
    pub fn slit(lx: f64, ly: f64, lz: f64) -> Self {
        Self::new(Vector3::new(lx, ly, lz), [true, true, false])
    }

    pub fn dimensions(&self) -> &Vector3<f64> {
        &self.dimensions
    }

    pub fn length(&self, axis: usize) -> f64 {
        self.dimensions[axis]
    }

    pub fn half_length(&self, axis: usize) -> f64 {
        0.5 * self.dimensions[axis]
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodic[axis]
    }

    pub fn volume(&self) -> f64 {
        self.dimensions.x * self.dimensions.y * self.dimensions.z
    }

    /// Area of the face normal to `axis`.
    pub fn cross_section_area(&self, axis: usize) -> f64 {
        (0..3)
            .filter(|&i| i != axis)
            .map(|i| self.dimensions[i])
            .product()
    }

    /// Applies the minimum-image convention along periodic axes.
    pub fn minimum_image(&self, mut dr: Vector3<f64>) -> Vector3<f64> {
        for axis in 0..3 {
            if self.periodic[axis] {
                let l = self.dimensions[axis];
                dr[axis] -= l * (dr[axis] / l).round();
            }
        }
        dr
    }

    /// Separation `b - a` under the minimum-image convention.
    #[inline]
    pub fn separation(&self, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
        self.minimum_image(b - a)
    }

    /// Wraps a point back into `[-L/2, L/2)` along periodic axes.
    pub fn wrap(&self, mut p: Point3<f64>) -> Point3<f64> {
        for axis in 0..3 {
            if self.periodic[axis] {
                let l = self.dimensions[axis];
                p[axis] -= l * ((p[axis] + 0.5 * l) / l).floor();
            }
        }
        p
    }

    /// Fractional coordinate in `[0, 1]` of `value` along `axis`, clamped for
    /// non-periodic axes and wrapped for periodic ones.
    pub fn fractional(&self, axis: usize, value: f64) -> f64 {
        let l = self.dimensions[axis];
        let u = (value + 0.5 * l) / l;
        if self.periodic[axis] {
            u - u.floor()
        } else {
            u.clamp(0.0, 1.0)
        }
    }
}
