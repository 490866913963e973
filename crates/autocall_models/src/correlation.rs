//! Correlation matrices: construction, PSD repair and Cholesky factors.
//!
//! The correlation input is either a full matrix or a pairwise map; both are
//! normalised into a dense row-major [`CorrelationMatrix`]. Before
//! factorisation the matrix goes through [`CorrelationMatrix::repair`],
//! which symmetrises, restores the unit diagonal, clips out-of-range
//! entries and clips negative eigenvalues, logging a warning for every
//! adjustment it makes.
//!
//! Correlated draws per path are `W = L * Z` with `L` the lower-triangular
//! Cholesky factor and `Z` i.i.d. standard normals per asset.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::warn;

use crate::termsheet::error::ValidationError;
use crate::termsheet::TermSheet;

/// Eigenvalue clip threshold used by PSD repair and the Cholesky retry.
pub const PSD_EPSILON: f64 = 1e-8;

/// Tolerance for diagonal and symmetry checks.
const CHECK_TOLERANCE: f64 = 1e-6;

/// Errors from correlation factorisation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    /// The matrix is not positive semi-definite even after the ε·I retry.
    #[error("Correlation matrix is not positive semi-definite")]
    NotPositiveDefinite,

    /// The flat buffer does not hold dim x dim elements.
    #[error("Invalid matrix data: expected {expected} elements, got {got}")]
    InvalidDimensions {
        /// Expected element count (dim squared).
        expected: usize,
        /// Supplied element count.
        got: usize,
    },
}

/// Dense correlation matrix in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    data: Vec<f64>,
    dim: usize,
}

impl CorrelationMatrix {
    /// Creates a matrix from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::InvalidDimensions`] when the buffer does
    /// not hold `dim * dim` elements.
    pub fn new(data: Vec<f64>, dim: usize) -> Result<Self, CorrelationError> {
        if data.len() != dim * dim {
            return Err(CorrelationError::InvalidDimensions {
                expected: dim * dim,
                got: data.len(),
            });
        }
        Ok(Self { data, dim })
    }

    /// Identity matrix (uncorrelated assets).
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![0.0; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        Self { data, dim }
    }

    /// Matrix dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Element at (i, j).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim + j]
    }

    /// Sets the symmetric pair (i, j) and (j, i).
    #[inline]
    pub fn set_pair(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.dim + j] = value;
        self.data[j * self.dim + i] = value;
    }

    /// Validates and repairs the matrix in place.
    ///
    /// Applies, in order: unit-diagonal restoration, symmetrisation,
    /// clipping of entries to [-1, 1], and eigenvalue clipping to
    /// `max(λ, epsilon)` with diagonal renormalisation. Each active step
    /// logs a warning; the eigenvalue warning carries the clip magnitude.
    pub fn repair(&mut self, epsilon: f64) {
        let n = self.dim;

        if (0..n).any(|i| (self.get(i, i) - 1.0).abs() > CHECK_TOLERANCE) {
            warn!("correlation diagonal not all 1.0, overwriting");
            for i in 0..n {
                self.data[i * n + i] = 1.0;
            }
        }

        let mut asymmetric = false;
        for i in 0..n {
            for j in (i + 1)..n {
                if (self.get(i, j) - self.get(j, i)).abs() > CHECK_TOLERANCE {
                    asymmetric = true;
                }
            }
        }
        if asymmetric {
            warn!("correlation matrix not symmetric, symmetrising");
            for i in 0..n {
                for j in (i + 1)..n {
                    let mean = 0.5 * (self.get(i, j) + self.get(j, i));
                    self.set_pair(i, j, mean);
                }
            }
        }

        if self.data.iter().any(|v| v.abs() > 1.0 + epsilon) {
            warn!("correlation values outside [-1, 1], clipping");
            for v in self.data.iter_mut() {
                *v = v.clamp(-1.0, 1.0);
            }
            for i in 0..n {
                self.data[i * n + i] = 1.0;
            }
        }

        let m = DMatrix::from_row_slice(n, n, &self.data);
        let eigen = m.symmetric_eigen();
        let min_eigenvalue = eigen
            .eigenvalues
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);

        if min_eigenvalue < -epsilon {
            let adjustment = min_eigenvalue.abs() + epsilon;
            warn!(
                min_eigenvalue,
                adjustment, "correlation matrix not PSD, clipping eigenvalues"
            );

            let clipped = DVector::from_iterator(
                n,
                eigen.eigenvalues.iter().map(|&l| l.max(epsilon)),
            );
            let rebuilt =
                &eigen.eigenvectors * DMatrix::from_diagonal(&clipped) * eigen.eigenvectors.transpose();

            let scale: Vec<f64> = (0..n).map(|i| rebuilt[(i, i)].sqrt()).collect();
            for i in 0..n {
                for j in 0..n {
                    self.data[i * n + j] = rebuilt[(i, j)] / (scale[i] * scale[j]);
                }
                self.data[i * n + i] = 1.0;
            }
        }
    }

    /// Computes the lower-triangular Cholesky factor.
    ///
    /// On failure, adds `epsilon` to the diagonal and retries once before
    /// giving up.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::NotPositiveDefinite`] when both attempts
    /// fail.
    pub fn cholesky(&self, epsilon: f64) -> Result<CholeskyFactor, CorrelationError> {
        if let Some(lower) = cholesky_lower(&self.data, self.dim) {
            return Ok(CholeskyFactor {
                data: lower,
                dim: self.dim,
            });
        }

        warn!("Cholesky factorisation failed, retrying with epsilon on the diagonal");
        let mut bumped = self.data.clone();
        for i in 0..self.dim {
            bumped[i * self.dim + i] += epsilon;
        }
        cholesky_lower(&bumped, self.dim)
            .map(|lower| CholeskyFactor {
                data: lower,
                dim: self.dim,
            })
            .ok_or(CorrelationError::NotPositiveDefinite)
    }
}

/// Lower-triangular Cholesky factor of a correlation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    /// Lower-triangular elements, row-major.
    data: Vec<f64>,
    dim: usize,
}

impl CholeskyFactor {
    /// Matrix dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Element at (i, j); zero above the diagonal.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if j > i {
            0.0
        } else {
            self.data[i * self.dim + j]
        }
    }

    /// Transforms independent standard normals into correlated normals.
    ///
    /// Computes `out[i] = sum_{j<=i} L[i][j] * z[j]`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when either slice is shorter than the
    /// dimension.
    #[inline]
    pub fn correlate_into(&self, z: &[f64], out: &mut [f64]) {
        let n = self.dim;
        debug_assert!(z.len() >= n && out.len() >= n);

        for i in 0..n {
            let row = &self.data[i * n..i * n + i + 1];
            let mut sum = 0.0;
            for (j, &l) in row.iter().enumerate() {
                sum += l * z[j];
            }
            out[i] = sum;
        }
    }
}

fn cholesky_lower(data: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut lower = vec![0.0; n * n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            if j == i {
                for k in 0..j {
                    let l_jk = lower[j * n + k];
                    sum += l_jk * l_jk;
                }
                let diag = data[j * n + j] - sum;
                if diag <= 0.0 {
                    return None;
                }
                lower[j * n + j] = diag.sqrt();
            } else {
                for k in 0..j {
                    sum += lower[i * n + k] * lower[j * n + k];
                }
                let l_jj = lower[j * n + j];
                if l_jj <= 0.0 {
                    return None;
                }
                lower[i * n + j] = (data[i * n + j] - sum) / l_jj;
            }
        }
    }

    Some(lower)
}

/// Builds the correlation matrix for a term sheet.
///
/// A single-asset term sheet yields the 1x1 identity. The full matrix input
/// takes precedence over the pairwise map; pairwise keys must resolve
/// against the underlying ids as `"A_B"` in either order (matching is done
/// against ordered id pairs, so ids containing underscores stay
/// unambiguous).
///
/// # Errors
///
/// Returns a [`ValidationError`] for shape mismatches or unresolvable
/// pairwise keys.
pub fn build_correlation(ts: &TermSheet) -> Result<CorrelationMatrix, ValidationError> {
    let n = ts.num_assets();

    if n == 1 {
        return Ok(CorrelationMatrix::identity(1));
    }

    let input = match &ts.correlation {
        Some(input) => input,
        None => return Ok(CorrelationMatrix::identity(n)),
    };

    if let Some(matrix) = &input.matrix {
        if matrix.len() != n {
            return Err(ValidationError::CorrelationMatrixShape {
                expected: n,
                rows: matrix.len(),
                cols: matrix.first().map(Vec::len).unwrap_or(0),
            });
        }
        let mut data = Vec::with_capacity(n * n);
        for row in matrix {
            if row.len() != n {
                return Err(ValidationError::CorrelationMatrixShape {
                    expected: n,
                    rows: matrix.len(),
                    cols: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        // Construction cannot fail here: data is n*n by the loop above.
        return CorrelationMatrix::new(data, n).map_err(|_| {
            ValidationError::CorrelationMatrixShape {
                expected: n,
                rows: n,
                cols: n,
            }
        });
    }

    let mut corr = CorrelationMatrix::identity(n);
    if let Some(pairwise) = &input.pairwise {
        let ids = ts.asset_ids();
        for (key, &rho) in pairwise {
            let indices = resolve_pair_key(key, &ids);
            match indices {
                Some((i, j)) => corr.set_pair(i, j, rho),
                None => {
                    return Err(ValidationError::MalformedCorrelationKey { key: key.clone() })
                }
            }
        }
    }

    Ok(corr)
}

fn resolve_pair_key(key: &str, ids: &[&str]) -> Option<(usize, usize)> {
    for (i, a) in ids.iter().enumerate() {
        for (j, b) in ids.iter().enumerate() {
            if i != j && key.len() == a.len() + b.len() + 1 {
                let (head, tail) = key.split_at(a.len());
                if head == *a && tail.starts_with('_') && &tail[1..] == *b {
                    return Some((i, j));
                }
            }
        }
    }
    None
}
