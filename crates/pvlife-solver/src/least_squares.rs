//! Bounded nonlinear least squares with robust loss.
//!
//! Levenberg-Marquardt on the loss-weighted Gauss-Newton model, with box
//! constraints enforced by freezing variables that sit on a bound while the
//! gradient pushes outward and by clamping every trial point. The Jacobian
//! is a three-point finite difference that switches to a one-sided
//! second-order stencil next to a bound, so the residual function is never
//! evaluated outside the box.

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::linear::solve_dense;
use crate::loss::Loss;

/// Ratio of actual to predicted reduction above which a step is accepted.
const ACCEPT_RATIO: f64 = 1e-4;

/// Damping beyond which no useful step can be taken.
const MAX_DAMPING: f64 = 1e30;

/// Residual vector as a function of the optimisation variables.
pub trait ResidualFunction {
    /// Evaluate the residuals at `x`. The length must not change between calls.
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;
}

impl<F> ResidualFunction for F
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        self(x)
    }
}

/// Closed box `lower <= x <= upper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Each lower bound must be strictly below its upper bound. Infinite
    /// bounds are allowed.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::DimensionMismatch {
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo >= hi {
                return Err(Error::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// No constraints on `n` variables.
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn contains(&self, x: &DVector<f64>) -> bool {
        x.len() == self.len()
            && x
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    /// Project `x` onto the box.
    pub fn clamp(&self, x: &mut DVector<f64>) {
        for (v, (&lo, &hi)) in x.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = v.clamp(lo, hi);
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeastSquaresConfig {
    /// Stop when an accepted step reduces the cost by less than `ftol * cost`.
    pub ftol: f64,
    /// Stop when `|step| < xtol (xtol + |x|)`.
    pub xtol: f64,
    /// Stop when the projected gradient max-norm falls to `gtol`.
    pub gtol: f64,
    pub loss: Loss,
    /// Residual magnitude at which the robust loss starts to bend.
    pub f_scale: f64,
    /// Scale the damping term by the Jacobian column norms.
    pub jac_scaling: bool,
    /// Jacobian evaluations before giving up.
    pub max_iterations: usize,
    /// Starting Levenberg-Marquardt damping.
    pub initial_damping: f64,
}

impl Default for LeastSquaresConfig {
    fn default() -> Self {
        Self {
            ftol: 1e-10,
            xtol: 1e-12,
            gtol: 1e-12,
            loss: Loss::Cauchy,
            f_scale: 1.0,
            jac_scaling: true,
            max_iterations: 200,
            initial_damping: 1e-3,
        }
    }
}

impl LeastSquaresConfig {
    pub fn with_tolerances(mut self, ftol: f64, xtol: f64, gtol: f64) -> Self {
        self.ftol = ftol;
        self.xtol = xtol;
        self.gtol = gtol;
        self
    }

    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_f_scale(mut self, f_scale: f64) -> Self {
        self.f_scale = f_scale;
        self
    }

    pub fn with_jac_scaling(mut self, jac_scaling: bool) -> Self {
        self.jac_scaling = jac_scaling;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Which tolerance ended the iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Projected gradient below `gtol`.
    Gradient,
    /// Relative cost reduction below `ftol`.
    Function,
    /// Step length below `xtol`.
    Step,
}

/// Solution of a least-squares problem.
#[derive(Debug, Clone)]
pub struct LeastSquaresResult {
    /// Optimal point, inside the bounds.
    pub x: DVector<f64>,
    /// Raw residuals at `x`.
    pub residuals: DVector<f64>,
    /// Robust cost at `x`.
    pub cost: f64,
    /// Robust cost at the starting point.
    pub initial_cost: f64,
    /// Max-norm of the projected gradient at the last Jacobian.
    pub optimality: f64,
    /// Jacobian evaluations performed.
    pub iterations: usize,
    /// Residual function evaluations performed.
    pub evaluations: usize,
    pub termination: Termination,
}

/// Minimise `0.5 f_scale^2 sum rho((f_i(x) / f_scale)^2)` over the box.
///
/// # Errors
/// - [`Error::InfeasibleStart`] if `x0` lies outside `bounds`
/// - [`Error::NonFiniteResidual`] if the residuals at `x0` or at a Jacobian
///   stencil point are not finite
/// - [`Error::ConvergenceFailed`] if no tolerance is met within
///   `config.max_iterations`
pub fn least_squares<F>(
    fun: &F,
    x0: &DVector<f64>,
    bounds: &Bounds,
    config: &LeastSquaresConfig,
) -> Result<LeastSquaresResult>
where
    F: ResidualFunction + ?Sized,
{
    let n = x0.len();
    if bounds.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: bounds.len(),
        });
    }
    for (index, &value) in x0.iter().enumerate() {
        if !(value >= bounds.lower[index] && value <= bounds.upper[index]) {
            return Err(Error::InfeasibleStart { index, value });
        }
    }

    let mut x = x0.clone();
    let mut f = fun.residuals(&x);
    check_finite(&f)?;
    let m = f.len();
    let mut evaluations = 1;

    let loss = config.loss;
    let mut cost = loss.cost(f.as_slice(), config.f_scale);
    let initial_cost = cost;

    let mut damping = config.initial_damping;
    let mut growth = 2.0;
    let mut scale = DVector::<f64>::zeros(n);
    let mut optimality = f64::INFINITY;
    let mut outcome = None;

    'outer: for iteration in 1..=config.max_iterations {
        let mut jac = jacobian(fun, &x, &f, bounds, &mut evaluations)?;
        let weights = loss.weights(f.as_slice(), config.f_scale);
        for (i, &w) in weights.iter().enumerate() {
            jac.row_mut(i).scale_mut(w);
        }
        let fw = f.component_mul(&DVector::from_vec(weights));

        let grad = jac.transpose() * &fw;
        let jtj = jac.transpose() * &jac;

        for j in 0..n {
            let norm = jtj[(j, j)].sqrt();
            scale[j] = if config.jac_scaling {
                scale[j].max(if norm > 0.0 { norm } else { 1.0 })
            } else {
                1.0
            };
        }

        // Variables pinned on a bound with the descent direction pointing out.
        let free: Vec<usize> = (0..n)
            .filter(|&j| {
                let at_lower = x[j] <= bounds.lower[j] && grad[j] > 0.0;
                let at_upper = x[j] >= bounds.upper[j] && grad[j] < 0.0;
                !(at_lower || at_upper)
            })
            .collect();
        optimality = free.iter().map(|&j| grad[j].abs()).fold(0.0, f64::max);

        debug!(
            "lsq iter {}: cost = {:.6e}, optimality = {:.3e}, damping = {:.3e}, free = {}/{}",
            iteration,
            cost,
            optimality,
            damping,
            free.len(),
            n
        );

        if optimality <= config.gtol {
            outcome = Some((iteration, Termination::Gradient));
            break;
        }

        loop {
            let k = free.len();
            let lhs = DMatrix::from_fn(k, k, |r, c| {
                let (jr, jc) = (free[r], free[c]);
                let diag = if r == c {
                    damping * scale[jr] * scale[jr]
                } else {
                    0.0
                };
                jtj[(jr, jc)] + diag
            });
            let rhs = DVector::from_fn(k, |r, _| -grad[free[r]]);
            let reduced = solve_dense(&lhs, &rhs)?;

            let mut trial = x.clone();
            for (r, &j) in free.iter().enumerate() {
                trial[j] += reduced[r];
            }
            bounds.clamp(&mut trial);

            let step = &trial - &x;
            let step_norm = step.norm();
            let step_small = step_norm < config.xtol * (config.xtol + x.norm());
            let predicted = -(grad.dot(&step) + 0.5 * (&jac * &step).norm_squared());

            let trial_f = fun.residuals(&trial);
            evaluations += 1;
            let trial_cost = if trial_f.len() == m && trial_f.iter().all(|v| v.is_finite()) {
                loss.cost(trial_f.as_slice(), config.f_scale)
            } else {
                f64::INFINITY
            };

            let actual = cost - trial_cost;
            let ratio = if predicted > 0.0 {
                actual / predicted
            } else {
                0.0
            };

            if ratio > ACCEPT_RATIO {
                damping *= (1.0f64 / 3.0).max(1.0 - (2.0 * ratio - 1.0).powi(3));
                growth = 2.0;

                let previous = cost;
                x = trial;
                f = trial_f;
                cost = trial_cost;

                if actual < config.ftol * previous && ratio > 0.25 {
                    outcome = Some((iteration, Termination::Function));
                    break 'outer;
                }
                if step_small {
                    outcome = Some((iteration, Termination::Step));
                    break 'outer;
                }
                break;
            }

            damping *= growth;
            growth *= 2.0;
            if step_small || damping > MAX_DAMPING {
                outcome = Some((iteration, Termination::Step));
                break 'outer;
            }
        }
    }

    match outcome {
        Some((iterations, termination)) => {
            debug!(
                "lsq finished after {} iterations ({:?}): cost {:.6e} -> {:.6e}",
                iterations, termination, initial_cost, cost
            );
            Ok(LeastSquaresResult {
                x,
                residuals: f,
                cost,
                initial_cost,
                optimality,
                iterations,
                evaluations,
                termination,
            })
        }
        None => Err(Error::ConvergenceFailed {
            iterations: config.max_iterations,
            cost,
            x: x.as_slice().to_vec(),
        }),
    }
}

fn check_finite(f: &DVector<f64>) -> Result<()> {
    match f.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(Error::NonFiniteResidual { index }),
        None => Ok(()),
    }
}

/// Residuals at `x` with variable `j` shifted by `h`.
fn shifted<F>(fun: &F, x: &DVector<f64>, j: usize, h: f64, m: usize) -> Result<DVector<f64>>
where
    F: ResidualFunction + ?Sized,
{
    let mut xs = x.clone();
    xs[j] += h;
    let f = fun.residuals(&xs);
    if f.len() != m {
        return Err(Error::DimensionMismatch {
            expected: m,
            actual: f.len(),
        });
    }
    check_finite(&f)?;
    Ok(f)
}

/// Three-point finite-difference Jacobian that stays inside the bounds.
fn jacobian<F>(
    fun: &F,
    x: &DVector<f64>,
    f0: &DVector<f64>,
    bounds: &Bounds,
    evaluations: &mut usize,
) -> Result<DMatrix<f64>>
where
    F: ResidualFunction + ?Sized,
{
    let m = f0.len();
    let n = x.len();
    let rel_step = f64::EPSILON.cbrt();
    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let h = rel_step * x[j].abs().max(1.0);
        let (lo, hi) = (bounds.lower[j], bounds.upper[j]);

        let column = if x[j] - h >= lo && x[j] + h <= hi {
            let fp = shifted(fun, x, j, h, m)?;
            let fm = shifted(fun, x, j, -h, m)?;
            (fp - fm) / (2.0 * h)
        } else {
            // One-sided second-order stencil into the interior.
            let room_up = hi - x[j];
            let room_down = x[j] - lo;
            let s = if room_up >= room_down {
                h.min(room_up / 2.0)
            } else {
                -h.min(room_down / 2.0)
            };
            let f1 = shifted(fun, x, j, s, m)?;
            let f2 = shifted(fun, x, j, 2.0 * s, m)?;
            (f1 * 4.0 - f2 - f0 * 3.0) / (2.0 * s)
        };
        *evaluations += 2;
        jac.set_column(j, &column);
    }

    Ok(jac)
}
