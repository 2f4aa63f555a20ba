//! Symmetric sparse linear system with diagonally preconditioned CG.
//!
//! The matrix has dimension `NumNodes + NumConductors`; conductor rows
//! are plain indices past the node range. Only the upper triangle is
//! stored, row by row with sorted column indices; `get`/`put` treat
//! `(i, j)` and `(j, i)` as the same entry.

use crate::error::{HearthError, Result};

/// Row tag: unassigned.
pub const Q_FREE: i32 = -2;
/// Row tag: prescribed (Dirichlet or point source already applied).
pub const Q_FIXED: i32 = -1;

#[derive(Debug, Clone)]
pub struct SymmetricSystem {
    /// System dimension.
    pub n: usize,
    /// Upper-triangle entries per row, sorted by column.
    rows: Vec<Vec<(usize, f64)>>,
    /// Solution vector; kept across `wipe` so outer iterations warm-start.
    pub v: Vec<f64>,
    /// Right-hand side.
    pub b: Vec<f64>,
    /// Scratch selector used by the conductor-flow integrator.
    pub p: Vec<f64>,
    /// Per-row tag: `Q_FREE`, `Q_FIXED`, or a conductor index.
    pub q: Vec<i32>,
    /// Relative-residual termination threshold.
    pub precision: f64,
}

impl SymmetricSystem {
    pub fn new(n: usize, precision: f64) -> Self {
        Self {
            n,
            rows: vec![Vec::new(); n],
            v: vec![0.0; n],
            b: vec![0.0; n],
            p: vec![0.0; n],
            q: vec![Q_FREE; n],
            precision,
        }
    }

    /// Read entry `(i, j)`; absent entries are zero.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (row, col) = if i <= j { (i, j) } else { (j, i) };
        match self.rows[row].binary_search_by_key(&col, |&(c, _)| c) {
            Ok(idx) => self.rows[row][idx].1,
            Err(_) => 0.0,
        }
    }

    /// Assign entry `(i, j)` (and its mirror).
    pub fn put(&mut self, value: f64, i: usize, j: usize) {
        let (row, col) = if i <= j { (i, j) } else { (j, i) };
        match self.rows[row].binary_search_by_key(&col, |&(c, _)| c) {
            Ok(idx) => self.rows[row][idx].1 = value,
            Err(idx) => self.rows[row].insert(idx, (col, value)),
        }
    }

    /// Zero every stored entry and the right-hand side, keeping the
    /// sparsity structure and the solution vector.
    pub fn wipe(&mut self) {
        for row in &mut self.rows {
            for entry in row.iter_mut() {
                entry.1 = 0.0;
            }
        }
        self.b.fill(0.0);
    }

    /// Sum of the off-diagonal entries of row `k`.
    pub fn row_offdiagonal_sum(&self, k: usize) -> f64 {
        let mut sum = 0.0;
        // entries right of the diagonal live in row k
        for &(col, val) in &self.rows[k] {
            if col != k {
                sum += val;
            }
        }
        // entries left of the diagonal live in the rows above
        for (row, entries) in self.rows.iter().enumerate().take(k) {
            if let Ok(idx) = entries.binary_search_by_key(&k, |&(c, _)| c) {
                sum += entries[idx].1;
            }
        }
        sum
    }

    /// y = A·x over the symmetric structure.
    fn spmv(&self, x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; self.n];
        for (i, row) in self.rows.iter().enumerate() {
            for &(j, val) in row {
                y[i] += val * x[j];
                if i != j {
                    y[j] += val * x[i];
                }
            }
        }
        y
    }

    /// Tie `V[a] = V[b]`.
    ///
    /// Row and column `b` are folded into `a` (coefficients and RHS
    /// summed) and row `b` becomes the symmetric constraint
    /// `kappa·(V[b] - V[a]) = 0`, with `kappa` matched to the diagonal
    /// scale so the system stays positive definite.
    pub fn periodicity(&mut self, a: usize, b: usize) {
        debug_assert_ne!(a, b);
        let kappa = self.get(a, a) + self.get(b, b);
        for k in 0..self.n {
            if k == a || k == b {
                continue;
            }
            let s = self.get(k, b);
            if s != 0.0 {
                self.put(self.get(k, a) + s, k, a);
                self.put(0.0, k, b);
            }
        }
        let merged = self.get(a, a) + self.get(b, b) + 2.0 * self.get(a, b);
        self.put(merged + kappa, a, a);
        self.put(-kappa, a, b);
        self.put(kappa, b, b);
        self.b[a] += self.b[b];
        self.b[b] = 0.0;
    }

    /// Tie `V[a] = -V[b]`, folding with a sign flip.
    pub fn anti_periodicity(&mut self, a: usize, b: usize) {
        debug_assert_ne!(a, b);
        let kappa = self.get(a, a) + self.get(b, b);
        for k in 0..self.n {
            if k == a || k == b {
                continue;
            }
            let s = self.get(k, b);
            if s != 0.0 {
                self.put(self.get(k, a) - s, k, a);
                self.put(0.0, k, b);
            }
        }
        let merged = self.get(a, a) + self.get(b, b) - 2.0 * self.get(a, b);
        self.put(merged + kappa, a, a);
        self.put(kappa, a, b);
        self.put(kappa, b, b);
        self.b[a] -= self.b[b];
        self.b[b] = 0.0;
    }

    /// Solve `A·V = b` by conjugate gradients with a Jacobi
    /// preconditioner, starting from the current `V`. Returns the
    /// iteration count.
    pub fn pcg_solve(&mut self, outer: usize) -> Result<usize> {
        let n = self.n;
        let mut diag = vec![0.0; n];
        for (i, d) in diag.iter_mut().enumerate() {
            *d = self.get(i, i);
            if *d == 0.0 {
                return Err(HearthError::Solve(format!(
                    "zero diagonal at row {i}; matrix is singular"
                )));
            }
        }

        let b_norm = norm(&self.b);
        if b_norm < 1e-300 {
            self.v.fill(0.0);
            return Ok(0);
        }
        let abs_tol = self.precision * b_norm;

        let ax = self.spmv(&self.v);
        let mut r: Vec<f64> = self.b.iter().zip(&ax).map(|(b, ax)| b - ax).collect();
        if norm(&r) <= abs_tol {
            return Ok(0);
        }

        let mut z: Vec<f64> = r.iter().zip(&diag).map(|(r, d)| r / d).collect();
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        let max_iterations = 5 * n + 100;
        for iter in 0..max_iterations {
            let q = self.spmv(&p);
            let pq = dot(&p, &q);
            if pq == 0.0 {
                return Err(HearthError::Solve("CG breakdown: p·Ap = 0".into()));
            }
            let alpha = rz / pq;
            for i in 0..n {
                self.v[i] += alpha * p[i];
                r[i] -= alpha * q[i];
            }

            let r_norm = norm(&r);
            if r_norm.is_nan() || r_norm.is_infinite() {
                return Err(HearthError::Solve("CG diverged: NaN/Inf in residual".into()));
            }
            if r_norm <= abs_tol {
                tracing::debug!(outer, iterations = iter + 1, "CG converged");
                return Ok(iter + 1);
            }

            for i in 0..n {
                z[i] = r[i] / diag[i];
            }
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Err(HearthError::Solve(format!(
            "CG did not converge within {max_iterations} iterations"
        )))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}
