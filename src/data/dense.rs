//! Column-major local dense matrix used for sequential fronts.

use crate::data::scalar::Scalar;

#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix<F> {
    height: usize,
    width: usize,
    data: Vec<F>,
}

impl<F: Scalar> Default for DenseMatrix<F> {
    fn default() -> Self {
        Self::zeros(0, 0)
    }
}

impl<F: Scalar> DenseMatrix<F> {
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![F::zero(); height * width],
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> F {
        debug_assert!(i < self.height && j < self.width);
        self.data[i + j * self.height]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: F) {
        debug_assert!(i < self.height && j < self.width);
        self.data[i + j * self.height] = value;
    }

    /// Add `value` to entry `(i, j)`.
    #[inline]
    pub fn update(&mut self, i: usize, j: usize, value: F) {
        debug_assert!(i < self.height && j < self.width);
        self.data[i + j * self.height] += value;
    }

    /// Reset every entry to zero, keeping the shape.
    pub fn fill_zero(&mut self) {
        self.data.iter_mut().for_each(|x| *x = F::zero());
    }

    /// Column-major view of the entries.
    pub fn as_slice(&self) -> &[F] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_update() {
        let mut m = DenseMatrix::<f64>::zeros(3, 2);
        m.set(2, 1, 4.0);
        m.update(2, 1, 1.0);
        m.update(0, 0, -1.0);
        assert_eq!(m.get(2, 1), 5.0);
        assert_eq!(m.as_slice(), &[-1.0, 0.0, 0.0, 0.0, 0.0, 5.0]);
        m.fill_zero();
        assert!(m.as_slice().iter().all(|&x| x == 0.0));
    }
}
