//! Entry counts and flop estimates over a frontal tree.
//!
//! Pure reductions for performance reporting. Every count is local to the
//! calling process; absent `work` blocks contribute nothing.

use crate::data::scalar::Scalar;
use crate::front::{DistFront, Front, FrontNode, FrontTree};

fn local_dims<F: Scalar>(front: &Front<F>) -> (f64, f64) {
    (front.l.height() as f64, front.l.width() as f64)
}

fn factor_flops(m: f64, n: f64, sel_inv: bool) -> f64 {
    let diag = if sel_inv {
        2. * n * n * n / 3.
    } else {
        n * n * n / 3.
    };
    diag + (m - n) * n + (m - n) * (m - n) * n
}

fn to_gflops<F: Scalar>(real_flops: f64) -> f64 {
    let flops = if F::IS_COMPLEX {
        4. * real_flops
    } else {
        real_flops
    };
    flops / 1.0e9
}

impl<F: Scalar> Front<F> {
    pub fn num_entries(&self) -> usize {
        let work = self.work.as_ref().map_or(0, |w| w.height() * w.width());
        self.l.height() * self.l.width() + work
    }

    pub fn num_top_left_entries(&self) -> usize {
        let n = self.l.width();
        n * n
    }

    pub fn num_bottom_left_entries(&self) -> usize {
        let (m, n) = (self.l.height(), self.l.width());
        (m - n) * n
    }

    pub fn factor_gflops(&self, sel_inv: bool) -> f64 {
        let (m, n) = local_dims(self);
        to_gflops::<F>(factor_flops(m, n, sel_inv))
    }

    pub fn solve_gflops(&self, num_rhs: usize) -> f64 {
        let (m, n) = local_dims(self);
        to_gflops::<F>(m * n * num_rhs as f64)
    }
}

impl<F: Scalar> DistFront<F> {
    pub fn num_local_entries(&self) -> usize {
        let work = self
            .work
            .as_ref()
            .map_or(0, |w| w.local_height() * w.local_width());
        self.l2d.local_height() * self.l2d.local_width() + work
    }

    pub fn num_top_left_local_entries(&self) -> usize {
        let n = self.l2d.width();
        self.l2d.local_rows_before(n) * self.l2d.local_width()
    }

    pub fn num_bottom_left_local_entries(&self) -> usize {
        let n = self.l2d.width();
        (self.l2d.local_height() - self.l2d.local_rows_before(n)) * self.l2d.local_width()
    }

    pub fn local_factor_gflops(&self, sel_inv: bool) -> f64 {
        let (m, n) = (self.l2d.height() as f64, self.l2d.width() as f64);
        let p = self.l2d.dist_size() as f64;
        to_gflops::<F>(factor_flops(m, n, sel_inv) / p)
    }

    pub fn local_solve_gflops(&self, num_rhs: usize) -> f64 {
        let (m, n) = (self.l2d.height() as f64, self.l2d.width() as f64);
        let p = self.l2d.dist_size() as f64;
        to_gflops::<F>(m * n * num_rhs as f64 / p)
    }
}

impl<F: Scalar> FrontTree<F> {
    fn sum_usize(&self, local: impl Fn(&Front<F>) -> usize, dist: impl Fn(&DistFront<F>) -> usize) -> usize {
        self.nodes()
            .map(|(_, node)| match node {
                FrontNode::Local(f) => local(f),
                FrontNode::Dist(f) => dist(f),
            })
            .sum()
    }

    fn sum_f64(&self, local: impl Fn(&Front<F>) -> f64, dist: impl Fn(&DistFront<F>) -> f64) -> f64 {
        self.nodes()
            .map(|(_, node)| match node {
                FrontNode::Local(f) => local(f),
                FrontNode::Dist(f) => dist(f),
            })
            .sum()
    }

    /// Entries of `L` and `work` stored on this process.
    pub fn num_local_entries(&self) -> usize {
        self.sum_usize(Front::num_entries, DistFront::num_local_entries)
    }

    /// Entries of the diagonal blocks stored on this process.
    pub fn num_top_left_local_entries(&self) -> usize {
        self.sum_usize(Front::num_top_left_entries, DistFront::num_top_left_local_entries)
    }

    /// Entries of the fill-in blocks stored on this process.
    pub fn num_bottom_left_local_entries(&self) -> usize {
        self.sum_usize(
            Front::num_bottom_left_entries,
            DistFront::num_bottom_left_local_entries,
        )
    }

    /// This process' share of the factorization work, in GFlops.
    pub fn local_factor_gflops(&self, sel_inv: bool) -> f64 {
        self.sum_f64(|f| f.factor_gflops(sel_inv), |f| f.local_factor_gflops(sel_inv))
    }

    /// This process' share of a triangular solve with `num_rhs` right-hand sides.
    pub fn local_solve_gflops(&self, num_rhs: usize) -> f64 {
        self.sum_f64(|f| f.solve_gflops(num_rhs), |f| f.local_solve_gflops(num_rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dense::DenseMatrix;
    use num_complex::Complex64;

    fn front<F: Scalar>(m: usize, n: usize) -> Front<F> {
        Front {
            l: DenseMatrix::zeros(m, n),
            work: None,
            children: vec![],
            parent: None,
            ty: Default::default(),
            is_hermitian: false,
        }
    }

    #[test]
    fn closed_forms() {
        let mut f = front::<f64>(5, 3);
        assert_eq!(f.num_entries(), 15);
        assert_eq!(f.num_top_left_entries(), 9);
        assert_eq!(f.num_bottom_left_entries(), 6);
        // 27/3 + 2*3 + 4*3
        assert!((f.factor_gflops(false) - 27.0e-9).abs() < 1e-18);
        // 54/3 + 6 + 12
        assert!((f.factor_gflops(true) - 36.0e-9).abs() < 1e-18);
        assert!((f.solve_gflops(2) - 30.0e-9).abs() < 1e-18);

        f.work = Some(DenseMatrix::zeros(2, 2));
        assert_eq!(f.num_entries(), 19);
    }

    #[test]
    fn complex_costs_four_times_more() {
        let f = front::<Complex64>(4, 4);
        let g = front::<f64>(4, 4);
        assert!((f.solve_gflops(1) - 4. * g.solve_gflops(1)).abs() < 1e-18);
    }
}
