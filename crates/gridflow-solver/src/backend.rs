//! Dense and sparse linear-solve backends.
//!
//! The dense backend factors a `faer::Mat` with partial-pivot LU on every
//! solve. The sparse backend owns the established CSC structure plus a
//! cached symbolic LU factorization: the symbolic analysis is paid once
//! per sparsity pattern and only the numeric factorization repeats, the
//! same split a KLU-backed solver exploits.

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::{SparseColMat, Triplet};
use gridflow_core::Index;
use gridflow_sparse::{
    csc_from_matrix_data, CscAdapter, DenseAdapter, MatrixData, MatrixError, Ordering,
    ShardedMatrix,
};
use sprs::CsMat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("jacobian structure has not been established")]
    NoStructure,
    #[error("symbolic analysis failed: {0}")]
    Symbolic(String),
    #[error("numeric factorization failed: {0}")]
    Factorization(String),
    #[error("singular matrix")]
    Singular,
    #[error("jacobian fill failed: {0}")]
    Fill(#[from] MatrixError),
}

/// How a sparse re-initialization treats the established structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseReinitMode {
    /// Keep the symbolic analysis, refresh only numeric values.
    Refactor,
    /// Discard structure and symbolic analysis; the next Jacobian call
    /// re-discovers the pattern.
    Resize,
}

/// Discovery container sized to the state count.
///
/// Small systems use one shard of 32-bit keys; larger ones scale the shard
/// count up, and systems past the 16-bit index half-width move to 64-bit
/// keys.
pub fn discovery_container(
    states: usize,
    max_nnz: usize,
) -> Result<Box<dyn MatrixData>, MatrixError> {
    let n = states as Index;
    let mut container: Box<dyn MatrixData> = if states < 65_535 {
        let k = if states < 100 {
            0
        } else if states < 1_000 {
            1
        } else {
            2
        };
        Box::new(ShardedMatrix::<u32>::new(k, Ordering::ColMajor, n, n)?)
    } else {
        Box::new(ShardedMatrix::<u64>::new(2, Ordering::ColMajor, n, n)?)
    };
    container.reserve(max_nnz as u32);
    Ok(container)
}

/// Dense LU workspace.
pub struct DenseBackend {
    mat: faer::Mat<f64>,
}

impl DenseBackend {
    pub fn new(n: usize) -> Self {
        Self {
            mat: faer::Mat::zeros(n, n),
        }
    }

    /// Borrow the workspace as an accumulation target. The adapter's
    /// `clear` zeroes it for a fresh Jacobian build.
    pub fn adapter(&mut self) -> DenseAdapter<'_> {
        DenseAdapter::new(&mut self.mat)
    }

    /// Solve `J x = rhs` with partial-pivot LU.
    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, BackendError> {
        let n = rhs.len();
        let lu = self.mat.partial_piv_lu();
        let b = faer::Mat::from_fn(n, 1, |i, _| rhs[i]);
        let x = lu.solve(b);
        let mut out = vec![0.0; n];
        for (i, o) in out.iter_mut().enumerate() {
            let xi = x[(i, 0)];
            if !xi.is_finite() {
                return Err(BackendError::Singular);
            }
            *o = xi;
        }
        Ok(out)
    }
}

/// Sparse LU workspace with an established CSC structure.
pub struct SparseBackend {
    n: usize,
    csc: Option<CsMat<f64>>,
    symbolic: Option<SymbolicLu<usize>>,
}

impl SparseBackend {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            csc: None,
            symbolic: None,
        }
    }

    pub fn structure_established(&self) -> bool {
        self.csc.is_some()
    }

    pub fn nnz(&self) -> usize {
        self.csc.as_ref().map_or(0, CsMat::nnz)
    }

    /// Translate a discovery container into the owned CSC structure.
    /// Invalidates any cached symbolic analysis.
    pub fn install_structure(&mut self, md: &mut dyn MatrixData) {
        self.csc = Some(csc_from_matrix_data(md, self.n, self.n));
        self.symbolic = None;
    }

    /// Borrow the established structure for value refresh.
    pub fn adapter(&mut self) -> Result<CscAdapter<'_>, BackendError> {
        let csc = self.csc.as_mut().ok_or(BackendError::NoStructure)?;
        Ok(CscAdapter::new(csc))
    }

    pub fn reinit(&mut self, mode: SparseReinitMode) {
        match mode {
            SparseReinitMode::Refactor => {
                if let Some(csc) = &mut self.csc {
                    for v in csc.data_mut() {
                        *v = 0.0;
                    }
                }
            }
            SparseReinitMode::Resize => {
                self.csc = None;
                self.symbolic = None;
            }
        }
    }

    /// Solve `J x = rhs`, reusing the cached symbolic analysis when the
    /// pattern is unchanged.
    pub fn solve(&mut self, rhs: &[f64]) -> Result<Vec<f64>, BackendError> {
        let csc = self.csc.as_ref().ok_or(BackendError::NoStructure)?;
        let mut triplets = Vec::with_capacity(csc.nnz());
        let mut row_seen = vec![false; self.n];
        let mut col_seen = vec![false; self.n];
        for (&v, (row, col)) in csc.iter() {
            if v != 0.0 {
                row_seen[row] = true;
                col_seen[col] = true;
            }
            triplets.push(Triplet::new(row, col, v));
        }
        // a numerically empty row or column admits no pivot
        if row_seen.contains(&false) || col_seen.contains(&false) {
            return Err(BackendError::Singular);
        }
        let a = SparseColMat::<usize, f64>::try_new_from_triplets(self.n, self.n, &triplets)
            .map_err(|e| BackendError::Factorization(format!("{e:?}")))?;
        let symbolic = match &self.symbolic {
            Some(s) => s.clone(),
            None => {
                let s = SymbolicLu::try_new(a.symbolic().as_ref())
                    .map_err(|e| BackendError::Symbolic(format!("{e:?}")))?;
                self.symbolic = Some(s.clone());
                s
            }
        };
        // the sparse LU panics on a zero pivot instead of reporting it
        let lu = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            Lu::try_new_with_symbolic(symbolic, a.as_ref())
        }))
        .map_err(|_| BackendError::Singular)?
        .map_err(|e| BackendError::Factorization(format!("{e:?}")))?;
        let b = faer::Mat::from_fn(self.n, 1, |i, _| rhs[i]);
        let x = lu.solve(b);
        let mut out = vec![0.0; self.n];
        for (i, o) in out.iter_mut().enumerate() {
            let xi = x[(i, 0)];
            if !xi.is_finite() {
                return Err(BackendError::Singular);
            }
            *o = xi;
        }
        Ok(out)
    }
}

/// The selected linear-solve path.
pub enum LinearBackend {
    Dense(DenseBackend),
    Sparse(SparseBackend),
}

impl LinearBackend {
    pub fn is_dense(&self) -> bool {
        matches!(self, Self::Dense(_))
    }
}
