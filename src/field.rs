use nalgebra::Vector3;
use ndarray::Array1;

use crate::error::CmcError;

/// A classical spin: a unit 3-vector in lab coordinates.
pub type Spin = Vector3<f64>;

/// Read-only material record. The magnetic moment `moment` is mu_s in
/// joules per tesla, one record per material index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub moment: f64,
}

impl Material {
    pub fn new(moment: f64) -> Self {
        Material { moment }
    }
}

/// The spin ensemble: N unit vectors plus an immutable material index per
/// site. Site count is fixed for the lifetime of the field, and the field
/// is exclusively owned by one driver; there are no concurrent writers.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinField {
    spins: Array1<Spin>,
    materials: Array1<usize>,
}

impl SpinField {
    /// Build a field from per-site spins and material indices.
    ///
    /// Input spins are normalized; a zero or non-finite vector is a
    /// configuration error. The two tables must have the same length and
    /// at least one site.
    pub fn new(spins: Vec<Spin>, materials: Vec<usize>) -> Result<Self, CmcError> {
        if spins.is_empty() {
            return Err(CmcError::InvalidConfig(
                "spin field must contain at least one site".into(),
            ));
        }
        if spins.len() != materials.len() {
            return Err(CmcError::InvalidConfig(format!(
                "{} spins but {} material indices",
                spins.len(),
                materials.len()
            )));
        }
        let mut normalized = Vec::with_capacity(spins.len());
        for (site, s) in spins.iter().enumerate() {
            let norm = s.norm();
            if !norm.is_finite() || norm == 0.0 {
                return Err(CmcError::InvalidConfig(format!(
                    "site {} has an unusable spin vector ({}, {}, {})",
                    site, s.x, s.y, s.z
                )));
            }
            normalized.push(s / norm);
        }
        Ok(SpinField {
            spins: Array1::from_vec(normalized),
            materials: Array1::from_vec(materials),
        })
    }

    /// A field of `n` copies of `direction` (normalized), all of the same
    /// material.
    pub fn uniform(n: usize, direction: Spin, material: usize) -> Result<Self, CmcError> {
        SpinField::new(vec![direction; n], vec![material; n])
    }

    pub fn len(&self) -> usize {
        self.spins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spins.is_empty()
    }

    /// Read the spin at a site.
    #[inline]
    pub fn get(&self, site: usize) -> Spin {
        self.spins[site]
    }

    /// Write the spin at a site. The caller is responsible for keeping the
    /// vector normalized.
    #[inline]
    pub fn set(&mut self, site: usize, spin: Spin) {
        self.spins[site] = spin;
    }

    /// Material index of a site.
    #[inline]
    pub fn material(&self, site: usize) -> usize {
        self.materials[site]
    }

    pub fn spins(&self) -> &Array1<Spin> {
        &self.spins
    }

    pub fn material_indices(&self) -> &Array1<usize> {
        &self.materials
    }

    /// Point every spin along `direction` (assumed unit length).
    pub fn align(&mut self, direction: Spin) {
        for s in self.spins.iter_mut() {
            *s = direction;
        }
    }

    /// Recompute the spin sum from scratch. Used for audits against the
    /// incrementally tracked magnetization.
    pub fn total_spin(&self) -> Vector3<f64> {
        self.spins.iter().fold(Vector3::zeros(), |acc, s| acc + s)
    }
}
