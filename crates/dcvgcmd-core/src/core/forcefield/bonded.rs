use super::params::{BondAngle, HarmonicBond, SiteTether};
use super::potentials;
use crate::core::models::simulation_box::SimulationBox;
use crate::core::models::species::Species;
use nalgebra::{Point3, Vector3};

const MIN_SIN_THETA: f64 = 1e-8;

#[inline]
fn separation(sim_box: Option<&SimulationBox>, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
    match sim_box {
        Some(b_) => b_.separation(a, b),
        None => b - a,
    }
}

/// Energy of one harmonic bond between `a` and `b`.
pub fn bond_energy(bond: &HarmonicBond, a: &Point3<f64>, b: &Point3<f64>, sim_box: Option<&SimulationBox>) -> f64 {
    let r = separation(sim_box, a, b).norm();
    potentials::harmonic(r - bond.length, bond.spring_constant)
}

/// Energy of one angle with `j` at the vertex.
pub fn angle_energy(
    angle: &BondAngle,
    i: &Point3<f64>,
    j: &Point3<f64>,
    k: &Point3<f64>,
    sim_box: Option<&SimulationBox>,
) -> f64 {
    let r_ji = separation(sim_box, j, i);
    let r_jk = separation(sim_box, j, k);
    let cos = (r_ji.dot(&r_jk) / (r_ji.norm() * r_jk.norm())).clamp(-1.0, 1.0);
    potentials::harmonic_angle(cos.acos(), angle.angle, angle.epsilon)
}

pub fn tether_energy(
    tether: &SiteTether,
    position: &Point3<f64>,
    site: &Point3<f64>,
    sim_box: Option<&SimulationBox>,
) -> f64 {
    let d = separation(sim_box, site, position).norm();
    potentials::harmonic(d, tether.spring_constant)
}

/// Bond and angle energy of one molecule, with `positions` in template order.
///
/// The site tether is not included since it depends on the atoms' anchors
/// rather than on the molecule's internal geometry.
pub fn intramolecular_energy(
    species: &Species,
    positions: &[Point3<f64>],
    sim_box: Option<&SimulationBox>,
) -> f64 {
    let bonds: f64 = species
        .bonds()
        .iter()
        .map(|b| bond_energy(&b.potential, &positions[b.atoms.0], &positions[b.atoms.1], sim_box))
        .sum();
    let angles: f64 = species
        .angles()
        .iter()
        .map(|a| {
            angle_energy(
                &a.potential,
                &positions[a.atoms.0],
                &positions[a.atoms.1],
                &positions[a.atoms.2],
                sim_box,
            )
        })
        .sum();
    bonds + angles
}

/// Accumulates bond and angle forces into `forces` (template order) and
/// returns the corresponding energy.
pub fn accumulate_intramolecular_forces(
    species: &Species,
    positions: &[Point3<f64>],
    sim_box: Option<&SimulationBox>,
    forces: &mut [Vector3<f64>],
) -> f64 {
    let mut energy = 0.0;

    for bond in species.bonds() {
        let (a, b) = bond.atoms;
        let dr = separation(sim_box, &positions[a], &positions[b]);
        let r = dr.norm();
        let stretch = r - bond.potential.length;
        energy += potentials::harmonic(stretch, bond.potential.spring_constant);
        if r > 0.0 {
            let f_b = -bond.potential.spring_constant * stretch * dr / r;
            forces[b] += f_b;
            forces[a] -= f_b;
        }
    }

    for angle in species.angles() {
        let (i, j, k) = angle.atoms;
        let r_ji = separation(sim_box, &positions[j], &positions[i]);
        let r_jk = separation(sim_box, &positions[j], &positions[k]);
        let (d_ji, d_jk) = (r_ji.norm(), r_jk.norm());
        if d_ji == 0.0 || d_jk == 0.0 {
            continue;
        }
        let u_ji = r_ji / d_ji;
        let u_jk = r_jk / d_jk;
        let cos = u_ji.dot(&u_jk).clamp(-1.0, 1.0);
        let theta = cos.acos();
        energy += potentials::harmonic_angle(theta, angle.potential.angle, angle.potential.epsilon);

        let de_dtheta = 2.0 * angle.potential.epsilon * (theta - angle.potential.angle);
        let sin = theta.sin().max(MIN_SIN_THETA);
        let f_i = de_dtheta / sin * (u_jk - cos * u_ji) / d_ji;
        let f_k = de_dtheta / sin * (u_ji - cos * u_jk) / d_jk;
        forces[i] += f_i;
        forces[k] += f_k;
        forces[j] -= f_i + f_k;
    }

    energy
}

/// Tether force on an atom at `position` anchored to `site`.
pub fn tether_force(
    tether: &SiteTether,
    position: &Point3<f64>,
    site: &Point3<f64>,
    sim_box: Option<&SimulationBox>,
) -> Vector3<f64> {
    -tether.spring_constant * separation(sim_box, site, position)
}
