use crate::error::InputError;
use crate::field::SystemField;
use crate::sampler::linspace;
use crate::solvers::{DormandPrince45, StepController};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Tolerances and budget for adaptive integration.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Maximum number of attempted steps before giving up.
    pub max_steps: usize,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 100_000,
        }
    }
}

/// A sampled solution curve. On integration failure this degenerates to the
/// single initial point with `success = false`, so callers can render
/// "nothing happened" instead of crashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    /// One state vector per time sample.
    pub states: Vec<Vec<f64>>,
    pub success: bool,
}

impl Trajectory {
    fn degenerate(t0: f64, initial: &[f64]) -> Self {
        Self {
            times: vec![t0],
            states: vec![initial.to_vec()],
            success: false,
        }
    }
}

/// Integrates a trajectory from `initial` over `t_span` with the embedded
/// Dormand-Prince 5(4) pair, resampled onto `n_points` uniform times by cubic
/// Hermite interpolation. A negative span (t1 < t0) integrates backward.
///
/// Numerical failure (non-finite states, step underflow, exhausted budget) is
/// reported through the `success` flag, never as an error; only malformed
/// input fails fast.
pub fn integrate_trajectory(
    field: &SystemField,
    initial: &[f64],
    t_span: (f64, f64),
    n_points: usize,
    settings: IntegrationSettings,
) -> Result<Trajectory> {
    let dim = field.dimension();
    if initial.len() != dim {
        return Err(InputError::DimensionMismatch {
            expected: dim,
            got: initial.len(),
        }
        .into());
    }
    if initial.iter().any(|v| !v.is_finite()) {
        return Err(InputError::NonFiniteState.into());
    }
    let (t0, t1) = t_span;
    if !t0.is_finite() || !t1.is_finite() {
        return Err(InputError::NonFiniteRange { min: t0, max: t1 }.into());
    }
    if t0 == t1 {
        return Err(InputError::EmptyTimeSpan { t: t0 }.into());
    }
    if n_points < 2 {
        return Err(InputError::TooFewSamples {
            min: 2,
            got: n_points,
        }
        .into());
    }

    let mut t_out = linspace(t0, t1, n_points);
    // linspace can land one ulp past the endpoint; the last sample must be
    // exactly t1 or the dense-output loop never reaches it.
    t_out[n_points - 1] = t1;
    let direction = (t1 - t0).signum();
    let span_abs = (t1 - t0).abs();
    let h_min = span_abs * 1e-12;

    let mut stepper = DormandPrince45::new(dim);
    let controller = StepController::default();
    let mut h = (t1 - t0) / 100.0;
    let mut t = t0;
    let mut state = initial.to_vec();
    let mut next = vec![0.0; dim];

    let mut states: Vec<Vec<f64>> = Vec::with_capacity(n_points);
    states.push(initial.to_vec());
    let mut out_idx = 1usize;

    let mut attempts = 0usize;
    while out_idx < n_points {
        if attempts >= settings.max_steps {
            return Ok(Trajectory::degenerate(t0, initial));
        }
        attempts += 1;

        // Do not step past the end of the span.
        if (t + h - t1) * direction > 0.0 {
            h = t1 - t;
        }

        let err = stepper.try_step(field, &state, h, settings.atol, settings.rtol, &mut next);
        let finite = err.is_finite() && next.iter().all(|v| v.is_finite());

        if !finite || err > 1.0 {
            h *= if finite { controller.factor(err) } else { 0.5 };
            if h.abs() < h_min {
                return Ok(Trajectory::degenerate(t0, initial));
            }
            continue;
        }

        let mut t_new = t + h;
        if (t1 - t_new) * direction < h_min {
            t_new = t1;
        }

        // Dense output: fill every requested sample inside [t, t_new].
        while out_idx < n_points && (t_out[out_idx] - t_new) * direction <= 0.0 {
            let theta = (t_out[out_idx] - t) / h;
            states.push(hermite(&state, &next, &stepper.k1, &stepper.k7, h, theta));
            out_idx += 1;
        }

        std::mem::swap(&mut state, &mut next);
        t = t_new;
        h *= controller.factor(err);
    }

    Ok(Trajectory {
        times: t_out,
        states,
        success: true,
    })
}

/// Cubic Hermite interpolant on one accepted step, using the field values at
/// both endpoints (k1 and the FSAL stage k7).
fn hermite(y0: &[f64], y1: &[f64], f0: &[f64], f1: &[f64], h: f64, theta: f64) -> Vec<f64> {
    let t2 = theta * theta;
    let t3 = t2 * theta;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + theta;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    y0.iter()
        .zip(y1)
        .zip(f0.iter().zip(f1))
        .map(|((&a, &b), (&fa, &fb))| h00 * a + h10 * h * fa + h01 * b + h11 * h * fb)
        .collect()
}
