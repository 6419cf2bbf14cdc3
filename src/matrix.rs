//! The weight matrix: the numeric link store.
//!
//! `W[target_element, source_element] = weight`, so propagation is the
//! left-multiplication `a' = W * a`. Storage is either a dense `NoE x NoE`
//! array or CSR; both modes must agree on every observable operation.
//! A weight of exactly 0 means "no link" and is not stored in CSR.

use ndarray::{Array1, Array2};
use num_traits::Zero;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::errors::{NetError, NetResult};
use crate::FloatX;

/// Compressed sparse row storage with the scipy-compatible triple layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    size: usize,
    data: Vec<FloatX>,
    indices: Vec<i32>,
    indptr: Vec<i32>,
}

impl CsrMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: Vec::new(),
            indices: Vec::new(),
            indptr: vec![0; size + 1],
        }
    }

    pub fn from_parts(size: usize, data: Vec<FloatX>, indices: Vec<i32>, indptr: Vec<i32>) -> NetResult<Self> {
        let consistent = indptr.len() == size + 1
            && data.len() == indices.len()
            && indptr.last().copied().unwrap_or(-1) as usize == data.len()
            && indptr.windows(2).all(|w| 0 <= w[0] && w[0] <= w[1])
            && indices.iter().all(|&col| 0 <= col && (col as usize) < size);
        if !consistent {
            return Err(NetError::InvalidPersistence(format!(
                "inconsistent CSR triple: {} values, {} indices, {} row pointers for size {}",
                data.len(),
                indices.len(),
                indptr.len(),
                size
            )));
        }
        Ok(Self { size, data, indices, indptr })
    }

    fn row_bounds(&self, row: usize) -> (usize, usize) {
        (self.indptr[row] as usize, self.indptr[row + 1] as usize)
    }

    pub fn get(&self, row: usize, col: usize) -> FloatX {
        let (start, end) = self.row_bounds(row);
        match self.indices[start..end].binary_search(&(col as i32)) {
            Ok(pos) => self.data[start + pos],
            Err(_) => FloatX::zero(),
        }
    }

    pub fn set(&mut self, row: usize, col: usize, weight: FloatX) {
        let (start, end) = self.row_bounds(row);
        match self.indices[start..end].binary_search(&(col as i32)) {
            Ok(pos) => {
                if weight == 0.0 {
                    self.data.remove(start + pos);
                    self.indices.remove(start + pos);
                    for p in &mut self.indptr[row + 1..] {
                        *p -= 1;
                    }
                } else {
                    self.data[start + pos] = weight;
                }
            }
            Err(pos) => {
                if weight != 0.0 {
                    self.data.insert(start + pos, weight);
                    self.indices.insert(start + pos, col as i32);
                    for p in &mut self.indptr[row + 1..] {
                        *p += 1;
                    }
                }
            }
        }
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    fn spmv(&self, a: &Array1<FloatX>) -> Array1<FloatX> {
        let row = |r: usize| -> FloatX {
            let (start, end) = self.row_bounds(r);
            let mut sum = FloatX::zero();
            for k in start..end {
                sum += self.data[k] * a[self.indices[k] as usize];
            }
            sum
        };
        #[cfg(feature = "rayon")]
        let out: Vec<FloatX> = (0..self.size).into_par_iter().map(row).collect();
        #[cfg(not(feature = "rayon"))]
        let out: Vec<FloatX> = (0..self.size).map(row).collect();
        Array1::from_vec(out)
    }
}

/// The link store, dense or sparse as configured.
#[derive(Debug, Clone)]
pub enum WeightMatrix {
    Dense(Array2<FloatX>),
    Sparse(CsrMatrix),
}

impl WeightMatrix {
    pub fn zeros(size: usize, sparse: bool) -> Self {
        if sparse {
            WeightMatrix::Sparse(CsrMatrix::zeros(size))
        } else {
            WeightMatrix::Dense(Array2::zeros((size, size)))
        }
    }

    pub fn size(&self) -> usize {
        match self {
            WeightMatrix::Dense(m) => m.nrows(),
            WeightMatrix::Sparse(m) => m.size,
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, WeightMatrix::Sparse(_))
    }

    pub fn get(&self, row: usize, col: usize) -> FloatX {
        match self {
            WeightMatrix::Dense(m) => m[[row, col]],
            WeightMatrix::Sparse(m) => m.get(row, col),
        }
    }

    pub fn set(&mut self, row: usize, col: usize, weight: FloatX) {
        match self {
            WeightMatrix::Dense(m) => m[[row, col]] = weight,
            WeightMatrix::Sparse(m) => m.set(row, col, weight),
        }
    }

    /// `a' = W * a`.
    pub fn propagate(&self, a: &Array1<FloatX>) -> Array1<FloatX> {
        match self {
            WeightMatrix::Dense(m) => m.dot(a),
            WeightMatrix::Sparse(m) => m.spmv(a),
        }
    }

    /// Non-zero entries of one row: incoming links of a slot element,
    /// as `(source_element, weight)` pairs.
    pub fn row_nonzeros(&self, row: usize) -> Vec<(usize, FloatX)> {
        match self {
            WeightMatrix::Dense(m) => m
                .row(row)
                .iter()
                .enumerate()
                .filter(|(_, &w)| w != 0.0)
                .map(|(col, &w)| (col, w))
                .collect(),
            WeightMatrix::Sparse(m) => {
                let (start, end) = m.row_bounds(row);
                (start..end)
                    .map(|k| (m.indices[k] as usize, m.data[k]))
                    .collect()
            }
        }
    }

    /// Non-zero entries of one column: outgoing links of a gate element,
    /// as `(target_element, weight)` pairs.
    pub fn col_nonzeros(&self, col: usize) -> Vec<(usize, FloatX)> {
        match self {
            WeightMatrix::Dense(m) => m
                .column(col)
                .iter()
                .enumerate()
                .filter(|(_, &w)| w != 0.0)
                .map(|(row, &w)| (row, w))
                .collect(),
            WeightMatrix::Sparse(m) => {
                let mut out = Vec::new();
                for row in 0..m.size {
                    let (start, end) = m.row_bounds(row);
                    if let Ok(pos) = m.indices[start..end].binary_search(&(col as i32)) {
                        out.push((row, m.data[start + pos]));
                    }
                }
                out
            }
        }
    }

    pub fn row_has_nonzero(&self, row: usize) -> bool {
        match self {
            WeightMatrix::Dense(m) => m.row(row).iter().any(|&w| w != 0.0),
            WeightMatrix::Sparse(m) => {
                let (start, end) = m.row_bounds(row);
                end > start
            }
        }
    }

    pub fn clear_row(&mut self, row: usize) {
        match self {
            WeightMatrix::Dense(m) => m.row_mut(row).fill(FloatX::zero()),
            WeightMatrix::Sparse(m) => {
                let (start, end) = m.row_bounds(row);
                let removed = (end - start) as i32;
                if removed > 0 {
                    m.data.drain(start..end);
                    m.indices.drain(start..end);
                    for p in &mut m.indptr[row + 1..] {
                        *p -= removed;
                    }
                }
            }
        }
    }

    pub fn clear_column(&mut self, col: usize) {
        match self {
            WeightMatrix::Dense(m) => m.column_mut(col).fill(FloatX::zero()),
            WeightMatrix::Sparse(m) => {
                for row in 0..m.size {
                    m.set(row, col, FloatX::zero());
                }
            }
        }
    }

    /// CSR triple of the current contents; densified matrices are converted.
    /// This is the persisted wire format in both storage modes.
    pub fn to_csr_parts(&self) -> (Vec<FloatX>, Vec<i32>, Vec<i32>) {
        match self {
            WeightMatrix::Sparse(m) => (m.data.clone(), m.indices.clone(), m.indptr.clone()),
            WeightMatrix::Dense(m) => {
                let mut data = Vec::new();
                let mut indices = Vec::new();
                let mut indptr = Vec::with_capacity(m.nrows() + 1);
                indptr.push(0);
                for row in m.rows() {
                    for (col, &w) in row.iter().enumerate() {
                        if w != 0.0 {
                            data.push(w);
                            indices.push(col as i32);
                        }
                    }
                    indptr.push(data.len() as i32);
                }
                (data, indices, indptr)
            }
        }
    }

    pub fn from_csr_parts(
        size: usize,
        data: Vec<FloatX>,
        indices: Vec<i32>,
        indptr: Vec<i32>,
        sparse: bool,
    ) -> NetResult<Self> {
        let csr = CsrMatrix::from_parts(size, data, indices, indptr)?;
        if sparse {
            Ok(WeightMatrix::Sparse(csr))
        } else {
            let mut dense = Array2::zeros((size, size));
            for row in 0..size {
                let (start, end) = csr.row_bounds(row);
                for k in start..end {
                    dense[[row, csr.indices[k] as usize]] = csr.data[k];
                }
            }
            Ok(WeightMatrix::Dense(dense))
        }
    }
}
