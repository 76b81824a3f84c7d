//! Jacobians of cost functions.
//!
//! [`Matrix`] wraps `nalgebra::DMatrix`: one row per residual, one column
//! per parameter, stored column-major the way MINPACK reads it.

use crate::array::Array;
use nalgebra::{DMatrix, DVector};
use ql_core::Real;
use std::ops::{Index, IndexMut};

/// A dynamically-sized 2D matrix of `Real` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<Real>);

impl Matrix {
    /// A zero `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::zeros(rows, cols))
    }

    /// A matrix read row by row from `data`.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[Real]) -> Self {
        Self(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Transpose.
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Matrix-vector product `M * v`.
    pub fn mul_vec(&self, v: &Array) -> Array {
        let product = &self.0 * DVector::from_column_slice(v.as_slice());
        Array::from_slice(product.as_slice())
    }

    /// Elements in column-major order.
    pub fn as_column_major(&self) -> &[Real] {
        self.0.as_slice()
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Real;
    fn index(&self, (i, j): (usize, usize)) -> &Real {
        &self.0[(i, j)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Real {
        &mut self.0[(i, j)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobian_layout_and_gradient() {
        // Two residuals, three parameters.
        let jac = Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!((jac.rows(), jac.cols()), (2, 3));
        assert_eq!(jac[(1, 0)], 4.0);
        assert_eq!(jac.as_column_major(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        // Gradient of the sum of squares is 2·Jᵀr.
        let residuals = Array::from_slice(&[1.0, -1.0]);
        let gradient = &jac.transpose().mul_vec(&residuals) * 2.0;
        assert_eq!(gradient.to_vec(), vec![-6.0, -6.0, -6.0]);
    }
}
