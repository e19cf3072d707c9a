//! Element-cyclic 2D distributed dense matrix.
//!
//! Global entry `(i, j)` lives on grid row `(i + col_align) % height` and grid
//! column `(j + row_align) % width`. Each process stores its entries densely,
//! column-major, in local coordinates. The coordinate helpers accept indices
//! beyond the matrix dimensions and answer cyclically; update-exchange planning
//! relies on that to address a parent front together with its update block.

use crate::data::dense::DenseMatrix;
use crate::data::scalar::Scalar;
use crate::topology::grid::Grid;

#[derive(Clone, Debug, PartialEq)]
pub struct DistMatrix<F> {
    grid: Grid,
    height: usize,
    width: usize,
    col_align: usize,
    row_align: usize,
    local: DenseMatrix<F>,
}

#[inline]
fn shift(me: usize, align: usize, stride: usize) -> usize {
    (me + stride - align % stride) % stride
}

#[inline]
fn local_length(n: usize, shift: usize, stride: usize) -> usize {
    if n > shift {
        (n - shift - 1) / stride + 1
    } else {
        0
    }
}

impl<F: Scalar> DistMatrix<F> {
    pub fn zeros(grid: Grid, height: usize, width: usize) -> Self {
        Self::zeros_aligned(grid, height, width, 0, 0)
    }

    /// Zero matrix whose row 0 lives on grid row `col_align` and column 0 on
    /// grid column `row_align`.
    pub fn zeros_aligned(
        grid: Grid,
        height: usize,
        width: usize,
        col_align: usize,
        row_align: usize,
    ) -> Self {
        let col_align = col_align % grid.height();
        let row_align = row_align % grid.width().max(1);
        let local_h = local_length(height, shift(grid.row(), col_align, grid.height()), grid.height());
        let local_w = local_length(width, shift(grid.col(), row_align, grid.width()), grid.width());
        Self {
            grid,
            height,
            width,
            col_align,
            row_align,
            local: DenseMatrix::zeros(local_h, local_w),
        }
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
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
    pub fn local_height(&self) -> usize {
        self.local.height()
    }
    #[inline]
    pub fn local_width(&self) -> usize {
        self.local.width()
    }
    /// Number of processes the matrix is spread over.
    #[inline]
    pub fn dist_size(&self) -> usize {
        self.grid.size()
    }

    #[inline]
    pub fn col_shift(&self) -> usize {
        shift(self.grid.row(), self.col_align, self.grid.height())
    }
    #[inline]
    pub fn row_shift(&self) -> usize {
        shift(self.grid.col(), self.row_align, self.grid.width())
    }

    #[inline]
    pub fn global_row(&self, i_loc: usize) -> usize {
        self.col_shift() + i_loc * self.grid.height()
    }
    #[inline]
    pub fn global_col(&self, j_loc: usize) -> usize {
        self.row_shift() + j_loc * self.grid.width()
    }

    #[inline]
    pub fn row_owner(&self, i: usize) -> usize {
        (i + self.col_align) % self.grid.height()
    }
    #[inline]
    pub fn col_owner(&self, j: usize) -> usize {
        (j + self.row_align) % self.grid.width()
    }

    #[inline]
    pub fn is_local_row(&self, i: usize) -> bool {
        self.row_owner(i) == self.grid.row()
    }
    #[inline]
    pub fn is_local_col(&self, j: usize) -> bool {
        self.col_owner(j) == self.grid.col()
    }
    #[inline]
    pub fn is_local(&self, i: usize, j: usize) -> bool {
        self.is_local_row(i) && self.is_local_col(j)
    }

    /// Number of local rows whose global index is below `i`.
    #[inline]
    pub fn local_rows_before(&self, i: usize) -> usize {
        local_length(i, self.col_shift(), self.grid.height())
    }
    /// Number of local columns whose global index is below `j`.
    #[inline]
    pub fn local_cols_before(&self, j: usize) -> usize {
        local_length(j, self.row_shift(), self.grid.width())
    }

    /// Local row of a locally owned global row.
    #[inline]
    pub fn local_row(&self, i: usize) -> usize {
        debug_assert!(self.is_local_row(i));
        (i - self.col_shift()) / self.grid.height()
    }
    /// Local column of a locally owned global column.
    #[inline]
    pub fn local_col(&self, j: usize) -> usize {
        debug_assert!(self.is_local_col(j));
        (j - self.row_shift()) / self.grid.width()
    }

    /// Team rank owning global entry `(i, j)`.
    #[inline]
    pub fn owner(&self, i: usize, j: usize) -> usize {
        self.grid.rank_of(self.row_owner(i), self.col_owner(j))
    }

    #[inline]
    pub fn get_local(&self, i_loc: usize, j_loc: usize) -> F {
        self.local.get(i_loc, j_loc)
    }
    #[inline]
    pub fn set_local(&mut self, i_loc: usize, j_loc: usize, value: F) {
        self.local.set(i_loc, j_loc, value);
    }
    #[inline]
    pub fn update_local(&mut self, i_loc: usize, j_loc: usize, value: F) {
        self.local.update(i_loc, j_loc, value);
    }

    /// Entry `(i, j)` if this process owns it.
    pub fn get(&self, i: usize, j: usize) -> Option<F> {
        self.is_local(i, j)
            .then(|| self.local.get(self.local_row(i), self.local_col(j)))
    }

    /// Overwrite entry `(i, j)`. No-op on processes that do not own it.
    pub fn set(&mut self, i: usize, j: usize, value: F) {
        if self.is_local(i, j) {
            let (il, jl) = (self.local_row(i), self.local_col(j));
            self.local.set(il, jl, value);
        }
    }

    /// Add to entry `(i, j)`. No-op on processes that do not own it.
    pub fn update(&mut self, i: usize, j: usize, value: F) {
        if self.is_local(i, j) {
            let (il, jl) = (self.local_row(i), self.local_col(j));
            self.local.update(il, jl, value);
        }
    }

    pub fn fill_zero(&mut self) {
        self.local.fill_zero();
    }

    /// The locally stored block.
    pub fn local(&self) -> &DenseMatrix<F> {
        &self.local
    }
}
