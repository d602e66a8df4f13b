//! # Vectors and Matrices
//!
//! Dense `f64` value types used by every cell and layer. Tensors are plain
//! values: each operation returns a fresh tensor (or mutates `self` when the
//! name says `_assign`) and never touches shared state.
//!
//! ## Operations
//!
//! | Op | Vector | Matrix |
//! |----|--------|--------|
//! | elementwise | `add`, `sub`, `hadamard`, `zip_map` | `add`, `add_assign`, `zip_map` |
//! | scalar | `scale`, `map`, `clip` | `scale`, `map`, `clip` |
//! | linear algebra | `dot`, `outer` | `mul_vec` (W·x), `transpose_mul_vec` (Wᵀ·v), `transpose` |
//! | reduction | `sum`, `norm`, `max_abs` | `max_abs` |
//! | structure | `concat`, `split_at` | `from_rows`, `row` |
//!
//! Binary operations on mismatched dimensions return
//! [`CoreError::ShapeMismatch`]; nothing is truncated or padded.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::shape::Shape;

/// A time-ordered list of vectors, oldest first.
pub type Sequence = Vec<Vector>;

/// A dense column vector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector(Vec<f64>);

impl Vector {
    /// A vector of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// A vector of `len` copies of `value`.
    pub fn full(len: usize, value: f64) -> Self {
        Self(vec![value; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn shape(&self) -> Shape {
        Shape::vector(self.len())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    /// Fail with `ShapeMismatch` unless `len() == expected`.
    pub fn expect_len(&self, op: &'static str, expected: usize) -> Result<()> {
        if self.len() == expected {
            Ok(())
        } else {
            Err(CoreError::vector_mismatch(op, expected, self.len()))
        }
    }

    /// Combine two equal-length vectors element by element.
    pub fn zip_map(&self, other: &Vector, op: &'static str, f: impl Fn(f64, f64) -> f64) -> Result<Vector> {
        other.expect_len(op, self.len())?;
        Ok(Vector(
            self.0.iter().zip(other.0.iter()).map(|(&a, &b)| f(a, b)).collect(),
        ))
    }

    /// Element-wise addition.
    pub fn add(&self, other: &Vector) -> Result<Vector> {
        self.zip_map(other, "vector add", |a, b| a + b)
    }

    /// Element-wise subtraction.
    pub fn sub(&self, other: &Vector) -> Result<Vector> {
        self.zip_map(other, "vector sub", |a, b| a - b)
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, other: &Vector) -> Result<Vector> {
        self.zip_map(other, "hadamard", |a, b| a * b)
    }

    /// In-place element-wise addition.
    pub fn add_assign(&mut self, other: &Vector) -> Result<()> {
        other.expect_len("vector add_assign", self.len())?;
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
        Ok(())
    }

    pub fn scale(&self, k: f64) -> Vector {
        self.map(|x| x * k)
    }

    /// Apply a function to each element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Vector {
        Vector(self.0.iter().map(|&x| f(x)).collect())
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        other.expect_len("dot", self.len())?;
        Ok(self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum())
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Euclidean (L2) norm.
    pub fn norm(&self) -> f64 {
        self.0.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Largest absolute element, `0.0` for an empty vector.
    pub fn max_abs(&self) -> f64 {
        self.0.iter().fold(0.0, |m, x| m.max(x.abs()))
    }

    /// Stack `self` on top of `other`: `[self..., other...]`.
    pub fn concat(&self, other: &Vector) -> Vector {
        let mut data = Vec::with_capacity(self.len() + other.len());
        data.extend_from_slice(&self.0);
        data.extend_from_slice(&other.0);
        Vector(data)
    }

    /// Undo [`concat`](Self::concat): the first `at` elements and the rest.
    pub fn split_at(&self, at: usize) -> Result<(Vector, Vector)> {
        if at > self.len() {
            return Err(CoreError::ShapeMismatch {
                op: "split_at",
                expected: Shape::vector(at),
                got: self.shape(),
            });
        }
        let (a, b) = self.0.split_at(at);
        Ok((Vector(a.to_vec()), Vector(b.to_vec())))
    }

    /// Outer product `self ⊗ other`: a `len(self) × len(other)` matrix.
    pub fn outer(&self, other: &Vector) -> Matrix {
        let mut data = Vec::with_capacity(self.len() * other.len());
        for &a in &self.0 {
            data.extend(other.0.iter().map(|&b| a * b));
        }
        Matrix {
            rows: self.len(),
            cols: other.len(),
            data,
        }
    }

    /// Clamp every element into `[-bound, bound]`.
    pub fn clip(&self, bound: f64) -> Vector {
        self.map(|x| x.clamp(-bound, bound))
    }

    /// Fail on the first NaN or infinite element.
    pub fn check(&self, context: &str) -> Result<()> {
        check_finite(&self.0, context)
    }
}

impl From<Vec<f64>> for Vector {
    fn from(data: Vec<f64>) -> Self {
        Self(data)
    }
}

impl From<&[f64]> for Vector {
    fn from(data: &[f64]) -> Self {
        Self(data.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Vector {
    fn from(data: [f64; N]) -> Self {
        Self(data.to_vec())
    }
}

impl FromIterator<f64> for Vector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

/// A dense row-major matrix.
///
/// A weight matrix has one row per output unit and one column per input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix from `f(row, col)`.
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    /// Build a matrix from equal-length rows.
    ///
    /// An empty slice gives a `0 × 0` matrix.
    pub fn from_rows(rows: &[Vector]) -> Result<Self> {
        let cols = rows.first().map(Vector::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            row.expect_len("matrix from_rows", cols)?;
            data.extend_from_slice(row.as_slice());
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::matrix(self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Copy of row `i`.
    pub fn row(&self, i: usize) -> Vector {
        Vector::from(&self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Flattened row-major elements.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn expect_shape(&self, op: &'static str, other: &Matrix) -> Result<()> {
        if self.rows == other.rows && self.cols == other.cols {
            Ok(())
        } else {
            Err(CoreError::ShapeMismatch {
                op,
                expected: self.shape(),
                got: other.shape(),
            })
        }
    }

    /// `W · x`, requires `len(x) == cols`.
    pub fn mul_vec(&self, x: &Vector) -> Result<Vector> {
        x.expect_len("matrix mul_vec", self.cols)?;
        Ok((0..self.rows)
            .map(|i| {
                self.data[i * self.cols..(i + 1) * self.cols]
                    .iter()
                    .zip(x.iter())
                    .map(|(w, v)| w * v)
                    .sum()
            })
            .collect())
    }

    /// `Wᵀ · v`, requires `len(v) == rows`. Avoids materialising the transpose.
    pub fn transpose_mul_vec(&self, v: &Vector) -> Result<Vector> {
        v.expect_len("matrix transpose_mul_vec", self.rows)?;
        let mut out = vec![0.0; self.cols];
        for (i, &vi) in v.iter().enumerate() {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            for (o, w) in out.iter_mut().zip(row) {
                *o += w * vi;
            }
        }
        Ok(Vector::from(out))
    }

    pub fn transpose(&self) -> Matrix {
        Matrix::from_fn(self.cols, self.rows, |i, j| self.get(j, i))
    }

    /// Combine two equal-shape matrices element by element.
    pub fn zip_map(&self, other: &Matrix, op: &'static str, f: impl Fn(f64, f64) -> f64) -> Result<Matrix> {
        self.expect_shape(op, other)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_map(other, "matrix add", |a, b| a + b)
    }

    /// In-place element-wise addition.
    pub fn add_assign(&mut self, other: &Matrix) -> Result<()> {
        self.expect_shape("matrix add_assign", other)?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
        Ok(())
    }

    pub fn scale(&self, k: f64) -> Matrix {
        self.map(|x| x * k)
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Clamp every element into `[-bound, bound]`.
    pub fn clip(&self, bound: f64) -> Matrix {
        self.map(|x| x.clamp(-bound, bound))
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, x| m.max(x.abs()))
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Fail on the first NaN or infinite element (row-major index).
    pub fn check(&self, context: &str) -> Result<()> {
        check_finite(&self.data, context)
    }
}

fn check_finite(data: &[f64], context: &str) -> Result<()> {
    match data.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(CoreError::NumericInvariantViolation {
            context: context.to_string(),
            index,
            value: data[index],
        }),
        None => Ok(()),
    }
}

/// Row-wise `a - b` of two equal-length sequences.
pub fn sequence_sub(a: &[Vector], b: &[Vector]) -> Result<Sequence> {
    if a.len() != b.len() {
        return Err(CoreError::ShapeMismatch {
            op: "sequence_sub",
            expected: Shape::vector(a.len()),
            got: Shape::vector(b.len()),
        });
    }
    a.iter().zip(b).map(|(x, y)| x.sub(y)).collect()
}

/// Per-row sum of absolute values.
pub fn sequence_abs_sum(rows: &[Vector]) -> Vector {
    rows.iter().map(|r| r.iter().map(|x| x.abs()).sum()).collect()
}
