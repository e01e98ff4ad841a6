use crate::blas::Blas;
use crate::global_variables::*;
use std::sync::Arc;

/// Operators of every level, finest first.
pub struct MgMatrix<B: Blas> {
    pub levels: Vec<B::Matrix>,
}

/// Vectors of every level, finest first.
pub struct MgVector<B: Blas> {
    pub levels: Vec<B::Vector>,
}

impl<B: Blas> Default for MgMatrix<B> {
    fn default() -> Self {
        Self { levels: Vec::new() }
    }
}

impl<B: Blas> Default for MgVector<B> {
    fn default() -> Self {
        Self { levels: Vec::new() }
    }
}

impl<B: Blas> Clone for MgMatrix<B>
where
    B::Matrix: Clone,
{
    fn clone(&self) -> Self {
        Self {
            levels: self.levels.clone(),
        }
    }
}

impl<B: Blas> Clone for MgVector<B>
where
    B::Vector: Clone,
{
    fn clone(&self) -> Self {
        Self {
            levels: self.levels.clone(),
        }
    }
}

impl<B: Blas> MgMatrix<B> {
    pub fn finest(&self) -> Option<&B::Matrix> {
        self.levels.first()
    }
}

impl<B: Blas> MgVector<B> {
    pub fn finest(&self) -> Option<&B::Vector> {
        self.levels.first()
    }
}

/// Smoother: `(a, b, number_of_iterations, max_tolerance, x, buffer)`.
pub type MgRelaxFunc<B> = Arc<
    dyn Fn(&<B as Blas>::Matrix, &<B as Blas>::Vector, u32, Float, &mut <B as Blas>::Vector, &mut <B as Blas>::Vector)
        + Send
        + Sync,
>;

/// Fine-to-coarse transfer: `(finer, coarser)`.
pub type MgRestrictFunc<B> = fn(&<B as Blas>::Vector, &mut <B as Blas>::Vector);

/// Coarse-to-fine correction added onto the finer vector: `(coarser, finer)`.
pub type MgCorrectFunc<B> = fn(&<B as Blas>::Vector, &mut <B as Blas>::Vector);

pub struct MgParameters<B: Blas> {
    pub max_number_of_levels: usize,
    pub number_of_restriction_iter: u32,
    pub number_of_correction_iter: u32,
    pub number_of_coarsest_iter: u32,
    pub number_of_final_iter: u32,
    pub max_number_of_cycles: u32,
    pub max_tolerance: Float,
    pub relax_func: MgRelaxFunc<B>,
    pub restrict_func: MgRestrictFunc<B>,
    pub correct_func: MgCorrectFunc<B>,
}

impl<B: Blas> Clone for MgParameters<B> {
    fn clone(&self) -> Self {
        Self {
            max_number_of_levels: self.max_number_of_levels,
            number_of_restriction_iter: self.number_of_restriction_iter,
            number_of_correction_iter: self.number_of_correction_iter,
            number_of_coarsest_iter: self.number_of_coarsest_iter,
            number_of_final_iter: self.number_of_final_iter,
            max_number_of_cycles: self.max_number_of_cycles,
            max_tolerance: self.max_tolerance,
            relax_func: Arc::clone(&self.relax_func),
            restrict_func: self.restrict_func,
            correct_func: self.correct_func,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MgResult {
    pub last_residual_norm: Float,
}

/// One V-cycle over all levels of `a`, followed by the final smoothing pass
/// on the finest level. `b` levels below the finest are overwritten with the
/// restricted residuals; `buffer` must mirror the level sizes of `x`.
pub fn mg_v_cycle<B: Blas>(
    a: &MgMatrix<B>,
    params: &MgParameters<B>,
    x: &mut MgVector<B>,
    b: &mut MgVector<B>,
    buffer: &mut MgVector<B>,
) -> MgResult {
    if a.levels.is_empty() {
        return MgResult::default();
    }
    debug_assert_eq!(a.levels.len(), x.levels.len());
    debug_assert_eq!(a.levels.len(), b.levels.len());
    debug_assert_eq!(a.levels.len(), buffer.levels.len());

    v_cycle(a, params, 0, params.max_tolerance, x, b, buffer);

    (params.relax_func)(
        &a.levels[0],
        &b.levels[0],
        params.number_of_final_iter,
        params.max_tolerance,
        &mut x.levels[0],
        &mut buffer.levels[0],
    );
    B::residual(&a.levels[0], &x.levels[0], &b.levels[0], &mut buffer.levels[0]);
    MgResult {
        last_residual_norm: B::l2_norm(&buffer.levels[0]),
    }
}

fn v_cycle<B: Blas>(
    a: &MgMatrix<B>,
    params: &MgParameters<B>,
    level: usize,
    tolerance: Float,
    x: &mut MgVector<B>,
    b: &mut MgVector<B>,
    buffer: &mut MgVector<B>,
) {
    let relax = &params.relax_func;
    if level + 1 == a.levels.len() {
        relax(
            &a.levels[level],
            &b.levels[level],
            params.number_of_coarsest_iter,
            tolerance,
            &mut x.levels[level],
            &mut buffer.levels[level],
        );
        return;
    }

    relax(
        &a.levels[level],
        &b.levels[level],
        params.number_of_restriction_iter,
        tolerance,
        &mut x.levels[level],
        &mut buffer.levels[level],
    );
    B::residual(&a.levels[level], &x.levels[level], &b.levels[level], &mut buffer.levels[level]);
    (params.restrict_func)(&buffer.levels[level], &mut b.levels[level + 1]);
    B::set(0.0, &mut x.levels[level + 1]);

    v_cycle(a, params, level + 1, 0.5 * tolerance, x, b, buffer);

    let (finer, coarser) = x.levels.split_at_mut(level + 1);
    (params.correct_func)(&coarser[0], &mut finer[level]);
    relax(
        &a.levels[level],
        &b.levels[level],
        params.number_of_correction_iter,
        tolerance,
        &mut x.levels[level],
        &mut buffer.levels[level],
    );
}
