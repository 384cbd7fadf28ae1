use nalgebra::{Point3, Quaternion, UnitQuaternion};
use rand::Rng;

/// Draws a rotation uniformly from SO(3).
///
/// Uses Marsaglia's method: two points drawn uniformly inside the unit disc
/// give the four components of a unit quaternion without any trigonometry.
pub fn random_rotation<R: Rng + ?Sized>(rng: &mut R) -> UnitQuaternion<f64> {
    let (x1, y1, s1) = sample_unit_disc(rng);
    let (x2, y2, s2) = sample_unit_disc(rng);
    let scale = ((1.0 - s1) / s2).sqrt();
    UnitQuaternion::from_quaternion(Quaternion::new(x1, y1, x2 * scale, y2 * scale))
}

fn sample_unit_disc<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64, f64) {
    loop {
        let x = rng.gen_range(-1.0..1.0);
        let y = rng.gen_range(-1.0..1.0);
        let s = x * x + y * y;
        if s < 1.0 && s > 0.0 {
            return (x, y, s);
        }
    }
}

/// Rotates `points` rigidly about `centre`.
pub fn rotate_about(points: &mut [Point3<f64>], centre: &Point3<f64>, rotation: &UnitQuaternion<f64>) {
    for p in points.iter_mut() {
        *p = centre + rotation * (*p - centre);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_rotation_is_normalized() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let q = random_rotation(&mut rng);
            assert!((q.quaternion().norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn random_rotations_have_no_preferred_direction() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20_000;
        let mut mean = Vector3::zeros();
        for _ in 0..n {
            mean += random_rotation(&mut rng) * Vector3::z();
        }
        mean /= n as f64;
        assert!(mean.norm() < 0.03, "mean rotated axis {mean:?}");
    }

    #[test]
    fn rotate_about_preserves_distances_to_centre() {
        let mut rng = StdRng::seed_from_u64(3);
        let centre = Point3::new(1.0, -2.0, 0.5);
        let mut points = vec![Point3::new(2.0, -2.0, 0.5), Point3::new(1.0, 0.0, 0.5)];
        let before: Vec<f64> = points.iter().map(|p| (p - centre).norm()).collect();
        rotate_about(&mut points, &centre, &random_rotation(&mut rng));
        for (p, d) in points.iter().zip(before) {
            assert!(((p - centre).norm() - d).abs() < 1e-12);
        }
    }
}
