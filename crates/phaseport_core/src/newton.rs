use crate::jacobian::{fd_jacobian, FD_STEP};
use anyhow::{anyhow, bail, Result};
use nalgebra::DVector;

/// Settings for the damped Newton iteration used by the equilibrium search.
#[derive(Debug, Clone, Copy)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    /// Convergence tolerance on the residual l2 norm.
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewtonSolution {
    pub state: Vec<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Damped Newton root solve of `eval` starting from `initial_guess`.
///
/// The Jacobian is estimated by centered finite differences. A singular
/// Jacobian or exhausting the step budget is an error; callers running a
/// multi-seed scan skip the seed and move on.
pub fn solve<F>(eval: F, initial_guess: &[f64], settings: NewtonSettings) -> Result<NewtonSolution>
where
    F: Fn(&[f64], &mut [f64]),
{
    let dim = initial_guess.len();
    if dim == 0 {
        bail!("Initial guess has zero dimension.");
    }
    if settings.max_steps == 0 {
        bail!("max_steps must be greater than zero.");
    }
    if settings.damping <= 0.0 {
        bail!("damping must be positive.");
    }
    if settings.tolerance <= 0.0 {
        bail!("tolerance must be positive.");
    }

    let mut state = initial_guess.to_vec();
    let mut residual = vec![0.0; dim];
    eval(&state, &mut residual);
    let mut residual_norm = l2_norm(&residual);
    let mut iterations = 0usize;

    loop {
        if residual_norm <= settings.tolerance {
            break;
        }
        if iterations >= settings.max_steps {
            bail!(
                "Newton solver failed to converge in {} steps (residual norm = {:e}).",
                settings.max_steps,
                residual_norm
            );
        }

        let jacobian = fd_jacobian(&eval, &state, FD_STEP);
        let rhs = DVector::from_column_slice(&residual);
        let delta = jacobian
            .lu()
            .solve(&rhs)
            .ok_or_else(|| anyhow!("Jacobian is singular."))?;

        for i in 0..dim {
            state[i] -= settings.damping * delta[i];
        }
        if state.iter().any(|v| !v.is_finite()) {
            bail!("Newton iterate left the finite domain.");
        }

        iterations += 1;
        eval(&state, &mut residual);
        residual_norm = l2_norm(&residual);
    }

    Ok(NewtonSolution {
        state,
        residual_norm,
        iterations,
    })
}

/// Bisection on a seed interval. Returns a root when `f` changes sign across
/// `[lo, hi]`, `None` otherwise. Supplements the Newton scan in 1D: near a
/// bifurcation a root's Newton basin can shrink below the seed spacing, but a
/// sign change between adjacent seeds still brackets it.
pub(crate) fn bisect<F: Fn(f64) -> f64>(f: F, mut lo: f64, mut hi: f64) -> Option<f64> {
    let mut flo = f(lo);
    let fhi = f(hi);
    if !flo.is_finite() || !fhi.is_finite() {
        return None;
    }
    if flo == 0.0 {
        return Some(lo);
    }
    if fhi == 0.0 {
        return Some(hi);
    }
    if flo.signum() == fhi.signum() {
        return None;
    }

    for _ in 0..128 {
        let mid = 0.5 * (lo + hi);
        let fmid = f(mid);
        if fmid == 0.0 || (hi - lo).abs() <= f64::EPSILON * (1.0 + mid.abs()) {
            return Some(mid);
        }
        if fmid.signum() == flo.signum() {
            lo = mid;
            flo = fmid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

pub(crate) fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::{solve, NewtonSettings};

    #[test]
    fn converges_to_nearby_scalar_root() {
        let eval = |x: &[f64], out: &mut [f64]| out[0] = x[0] * x[0] - 4.0;
        let solution = solve(eval, &[3.0], NewtonSettings::default()).expect("root");
        assert!((solution.state[0] - 2.0).abs() < 1e-8);
        assert!(solution.residual_norm <= 1e-10);
        assert!(solution.iterations > 0);
    }

    #[test]
    fn converges_in_two_dimensions() {
        // Intersection of a circle and a line: x^2 + y^2 = 2, x = y.
        let eval = |x: &[f64], out: &mut [f64]| {
            out[0] = x[0] * x[0] + x[1] * x[1] - 2.0;
            out[1] = x[0] - x[1];
        };
        let solution = solve(eval, &[2.0, 1.0], NewtonSettings::default()).expect("root");
        assert!((solution.state[0] - 1.0).abs() < 1e-8);
        assert!((solution.state[1] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn reports_failure_when_no_root_exists() {
        let eval = |x: &[f64], out: &mut [f64]| out[0] = x[0] * x[0] + 1.0;
        assert!(solve(eval, &[1.0], NewtonSettings::default()).is_err());
    }

    #[test]
    fn bisection_refines_a_bracketed_root() {
        let f = |x: f64| x * x - 2.0;
        let root = super::bisect(f, 1.0, 2.0).expect("bracketed");
        assert!((root - std::f64::consts::SQRT_2).abs() < 1e-12);
        // No sign change, no root reported.
        assert!(super::bisect(f, 2.0, 3.0).is_none());
        assert!(super::bisect(|_| f64::NAN, 0.0, 1.0).is_none());
    }

    #[test]
    fn rejects_degenerate_settings() {
        let eval = |x: &[f64], out: &mut [f64]| out[0] = x[0];
        let mut settings = NewtonSettings::default();
        settings.max_steps = 0;
        assert!(solve(eval, &[1.0], settings).is_err());
        assert!(solve(eval, &[], NewtonSettings::default()).is_err());
    }
}
