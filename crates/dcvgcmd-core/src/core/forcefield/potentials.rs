#[inline]
pub fn lennard_jones_12_6(dist: f64, sigma: f64, epsilon: f64) -> f64 {
    if dist < 1e-6 {
        return 1e10;
    }
    let s6 = (sigma / dist).powi(6);
    4.0 * epsilon * (s6 * s6 - s6)
}

/// Radial derivative `du/dr` of the 12-6 Lennard-Jones potential.
#[inline]
pub fn lennard_jones_12_6_derivative(dist: f64, sigma: f64, epsilon: f64) -> f64 {
    if dist < 1e-6 {
        return -1e10;
    }
    let s6 = (sigma / dist).powi(6);
    4.0 * epsilon * (-12.0 * s6 * s6 + 6.0 * s6) / dist
}

/// Truncated, force-shifted Lennard-Jones: both energy and force go to zero
/// continuously at `cutoff`.
#[inline]
pub fn lennard_jones_force_shifted(dist: f64, sigma: f64, epsilon: f64, cutoff: f64) -> f64 {
    if dist >= cutoff {
        return 0.0;
    }
    let u_c = lennard_jones_12_6(cutoff, sigma, epsilon);
    let du_c = lennard_jones_12_6_derivative(cutoff, sigma, epsilon);
    lennard_jones_12_6(dist, sigma, epsilon) - u_c - (dist - cutoff) * du_c
}

#[inline]
pub fn lennard_jones_force_shifted_derivative(
    dist: f64,
    sigma: f64,
    epsilon: f64,
    cutoff: f64,
) -> f64 {
    if dist >= cutoff {
        return 0.0;
    }
    lennard_jones_12_6_derivative(dist, sigma, epsilon)
        - lennard_jones_12_6_derivative(cutoff, sigma, epsilon)
}

/// Weeks-Chandler-Andersen repulsion: Lennard-Jones cut at its minimum and
/// shifted up by `epsilon`.
#[inline]
pub fn wca(dist: f64, sigma: f64, epsilon: f64) -> f64 {
    if dist >= wca_range(sigma) {
        return 0.0;
    }
    lennard_jones_12_6(dist, sigma, epsilon) + epsilon
}

#[inline]
pub fn wca_derivative(dist: f64, sigma: f64, epsilon: f64) -> f64 {
    if dist >= wca_range(sigma) {
        return 0.0;
    }
    lennard_jones_12_6_derivative(dist, sigma, epsilon)
}

#[inline]
pub fn wca_range(sigma: f64) -> f64 {
    2f64.powf(1.0 / 6.0) * sigma
}

#[inline]
pub fn harmonic(displacement: f64, spring_constant: f64) -> f64 {
    0.5 * spring_constant * displacement * displacement
}

#[inline]
pub fn harmonic_angle(theta: f64, theta0: f64, epsilon: f64) -> f64 {
    let d = theta - theta0;
    epsilon * d * d
}
