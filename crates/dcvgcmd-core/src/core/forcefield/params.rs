use super::potentials;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// 12-6 Lennard-Jones parameters.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub sigma: f64,
    pub epsilon: f64,
}

impl LennardJones {
    pub fn new(sigma: f64, epsilon: f64) -> Self {
        Self { sigma, epsilon }
    }

    /// Lorentz-Berthelot combination.
    pub fn mixed(&self, other: &Self) -> Self {
        Self {
            sigma: 0.5 * (self.sigma + other.sigma),
            epsilon: (self.epsilon * other.epsilon).sqrt(),
        }
    }
}

/// A truncated, force-shifted pair potential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairPotential {
    pub lj: LennardJones,
    pub cutoff: f64,
}

impl PairPotential {
    pub fn new(lj: LennardJones, cutoff: f64) -> Self {
        Self { lj, cutoff }
    }

    /// Interaction range; pairs farther apart than this contribute nothing.
    #[inline]
    pub fn range(&self) -> f64 {
        self.cutoff
    }

    #[inline]
    pub fn energy(&self, dist: f64) -> f64 {
        potentials::lennard_jones_force_shifted(dist, self.lj.sigma, self.lj.epsilon, self.cutoff)
    }

    #[inline]
    pub fn derivative(&self, dist: f64) -> f64 {
        potentials::lennard_jones_force_shifted_derivative(
            dist,
            self.lj.sigma,
            self.lj.epsilon,
            self.cutoff,
        )
    }
}

/// `0.5 k (r - r0)^2`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct HarmonicBond {
    pub spring_constant: f64,
    pub length: f64,
}

/// `epsilon (theta - theta0)^2`, angle in radians.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct BondAngle {
    pub epsilon: f64,
    pub angle: f64,
}

/// `0.5 k |r - r_site|^2`, pinning an atom to the site it was created at.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SiteTether {
    pub spring_constant: f64,
}

/// Repulsive WCA walls at both ends of the constrained axis.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct WallPotential {
    pub sigma: f64,
    pub epsilon: f64,
}

impl WallPotential {
    /// Energy of an atom at coordinate `z` between walls at `±half_length`.
    pub fn energy(&self, z: f64, half_length: f64) -> f64 {
        potentials::wca(half_length + z, self.sigma, self.epsilon)
            + potentials::wca(half_length - z, self.sigma, self.epsilon)
    }

    /// Force along the constrained axis, `-dU/dz`.
    pub fn force(&self, z: f64, half_length: f64) -> f64 {
        -potentials::wca_derivative(half_length + z, self.sigma, self.epsilon)
            + potentials::wca_derivative(half_length - z, self.sigma, self.epsilon)
    }
}

/// One entry of a pair parameter file, keyed by atom type names.
///
/// Pairs act between molecules only, unless `intramolecular` is set, in which
/// case they also act between atoms of one molecule that share no bond.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PairParam {
    pub types: [String; 2],
    pub sigma: f64,
    pub epsilon: f64,
    pub cutoff: Option<f64>,
    #[serde(default)]
    pub intramolecular: bool,
}

/// Pair parameters as loaded from a TOML file.
///
/// ```toml
/// default-cutoff = 11.0
///
/// [[pair]]
/// types = ["propaneCH3", "propaneCH3"]
/// sigma = 3.75
/// epsilon = 98.0
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PairParamSet {
    pub default_cutoff: f64,
    #[serde(default, rename = "pair")]
    pub pairs: Vec<PairParam>,
}

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown atom type '{0}' in pair parameters")]
    UnknownAtomType(String),
    #[error("Invalid pair parameter for {types:?}: {reason}")]
    Invalid { types: [String; 2], reason: String },
}

impl PairParamSet {
    pub fn load(path: &Path) -> Result<Self, ParamError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| ParamError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolves every entry into a [`PairPotential`], validating its values.
    pub fn potentials(&self) -> Result<Vec<([String; 2], PairPotential)>, ParamError> {
        self.pairs
            .iter()
            .map(|p| {
                let cutoff = p.cutoff.unwrap_or(self.default_cutoff);
                if !(p.sigma > 0.0 && p.epsilon >= 0.0 && cutoff > 0.0) {
                    return Err(ParamError::Invalid {
                        types: p.types.clone(),
                        reason: format!(
                            "sigma={}, epsilon={}, cutoff={}",
                            p.sigma, p.epsilon, cutoff
                        ),
                    });
                }
                Ok((
                    p.types.clone(),
                    PairPotential::new(LennardJones::new(p.sigma, p.epsilon), cutoff),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn mixing_follows_lorentz_berthelot() {
        let a = LennardJones::new(3.75, 98.0);
        let b = LennardJones::new(3.95, 46.0);
        let m = a.mixed(&b);
        assert!((m.sigma - 3.85).abs() < 1e-12);
        assert!((m.epsilon - (98.0f64 * 46.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn pair_potential_is_zero_beyond_range() {
        let p = PairPotential::new(LennardJones::new(3.0, 1.0), 9.0);
        assert_eq!(p.range(), 9.0);
        assert_eq!(p.energy(9.5), 0.0);
        assert_eq!(p.derivative(9.5), 0.0);
        assert!(p.energy(3.3) < 0.0);
    }

    #[test]
    fn wall_pushes_atoms_back_into_the_box() {
        let wall = WallPotential {
            sigma: 2.0,
            epsilon: 10.0,
        };
        assert_eq!(wall.energy(0.0, 50.0), 0.0);
        assert!(wall.energy(-49.0, 50.0) > 0.0);
        assert!(wall.force(-49.0, 50.0) > 0.0);
        assert!(wall.force(49.0, 50.0) < 0.0);
    }

    #[test]
    fn load_succeeds_with_valid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pairs.toml");
        fs::write(
            &path,
            r#"
            default-cutoff = 11.0

            [[pair]]
            types = ["A", "A"]
            sigma = 3.75
            epsilon = 98.0

            [[pair]]
            types = ["A", "B"]
            sigma = 3.85
            epsilon = 67.1
            cutoff = 8.0
            intramolecular = true
            "#,
        )
        .unwrap();

        let set = PairParamSet::load(&path).unwrap();
        let potentials = set.potentials().unwrap();
        assert_eq!(potentials.len(), 2);
        assert_eq!(potentials[0].1.cutoff, 11.0);
        assert_eq!(potentials[1].1.cutoff, 8.0);
        assert_eq!(potentials[1].0, ["A".to_string(), "B".to_string()]);
        assert!(!set.pairs[0].intramolecular);
        assert!(set.pairs[1].intramolecular);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = PairParamSet::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ParamError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not toml").unwrap();
        assert!(matches!(
            PairParamSet::load(&path),
            Err(ParamError::Toml { .. })
        ));
    }

    #[test]
    fn potentials_rejects_nonpositive_sigma() {
        let set = PairParamSet {
            default_cutoff: 5.0,
            pairs: vec![PairParam {
                types: ["A".to_string(), "A".to_string()],
                sigma: 0.0,
                epsilon: 1.0,
                cutoff: None,
                intramolecular: false,
            }],
        };
        assert!(matches!(set.potentials(), Err(ParamError::Invalid { .. })));
    }
}
