use crate::equilibrium::{Equilibrium1D, Stability, RESIDUAL_TOL, STABILITY_TOL};
use crate::error::{check_range, InputError};
use crate::jacobian::FD_STEP;
use crate::newton::{self, NewtonSettings};
use crate::sampler::linspace;
use crate::LogCallback;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default parameter samples for branch tracking.
pub const BRANCH_SAMPLES: usize = 200;
/// Default parameter samples for event detection.
pub const EVENT_SAMPLES: usize = 100;
/// Default seed count for the per-sample equilibrium scan.
pub const SWEEP_SEEDS: usize = 30;
/// Deduplication distance for the sweep scan, coarser than the standalone
/// search so nearly merged roots collapse before they produce count noise.
pub const SWEEP_DEDUP: f64 = 0.05;
/// Largest x jump between consecutive samples still treated as one branch.
pub const BRANCH_GAP: f64 = 0.5;

type ParamFn = Box<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// One-parameter family of 1D fields, dx/dt = f(x, r), with an optional exact
/// derivative df/dx supplied by the expression layer.
pub struct ParamField1D {
    f: ParamFn,
    dfdx: Option<ParamFn>,
}

impl ParamField1D {
    pub fn new(f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            f: Box::new(f),
            dfdx: None,
        }
    }

    pub fn with_derivative(
        f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
        dfdx: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            f: Box::new(f),
            dfdx: Some(Box::new(dfdx)),
        }
    }

    fn eval_raw(&self, x: f64, r: f64) -> f64 {
        (self.f)(x, r)
    }

    fn eval_guarded(&self, x: f64, r: f64) -> f64 {
        let value = (self.f)(x, r);
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// df/dx at (x, r): exact when supplied, centered difference otherwise.
    pub fn derivative(&self, x: f64, r: f64) -> f64 {
        if let Some(dfdx) = &self.dfdx {
            let value = dfdx(x, r);
            return if value.is_finite() { value } else { 0.0 };
        }
        (self.eval_guarded(x + FD_STEP, r) - self.eval_guarded(x - FD_STEP, r)) / (2.0 * FD_STEP)
    }
}

/// One continuous thread of equilibria across the parameter sweep.
/// `params[i]` and `states[i]` pair up; the stability label is the one of the
/// branch's originating point and is not re-evaluated along the branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub params: Vec<f64>,
    pub states: Vec<f64>,
    pub stability: Stability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BifurcationKind {
    SaddleNode,
    Pitchfork,
    Unknown,
}

/// A change in the equilibrium count between consecutive parameter samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BifurcationEvent {
    /// Parameter value at which the new count was first observed.
    pub param: f64,
    pub kind: BifurcationKind,
    pub count_before: usize,
    pub count_after: usize,
}

/// Equilibria of f(., r) at one fixed parameter value, sorted ascending.
/// Same multi-seed scan as the standalone 1D search, with the sweep's coarser
/// deduplication distance.
pub fn equilibria_at(
    field: &ParamField1D,
    r: f64,
    x_range: (f64, f64),
    n_seeds: usize,
) -> Result<Vec<Equilibrium1D>> {
    check_range(x_range.0, x_range.1)?;
    if !r.is_finite() {
        return Err(InputError::NonFiniteState.into());
    }
    if n_seeds < 2 {
        return Err(InputError::TooFewSamples {
            min: 2,
            got: n_seeds,
        }
        .into());
    }

    let eval = |x: &[f64], out: &mut [f64]| out[0] = field.eval_guarded(x[0], r);
    let scalar = |x: f64| field.eval_guarded(x, r);
    let seeds = linspace(x_range.0, x_range.1, n_seeds);
    let mut candidates: Vec<f64> = Vec::new();

    for &seed in &seeds {
        if let Ok(solution) = newton::solve(eval, &[seed], NewtonSettings::default()) {
            candidates.push(solution.state[0]);
        }
    }
    // Same bracketing pass as the standalone 1D scan; without it the central
    // root of a family just past its pitchfork is lost between the seeds.
    for pair in seeds.windows(2) {
        if let Some(x) = newton::bisect(&scalar, pair[0], pair[1]) {
            candidates.push(x);
        }
    }

    let mut found: Vec<Equilibrium1D> = Vec::new();
    for x in candidates {
        let residual = field.eval_raw(x, r);
        if !residual.is_finite() || residual * residual >= RESIDUAL_TOL {
            continue;
        }
        if x < x_range.0 || x > x_range.1 {
            continue;
        }
        if found.iter().any(|e| (e.x - x).abs() < SWEEP_DEDUP) {
            continue;
        }
        let derivative = field.derivative(x, r);
        let stability = if derivative < -STABILITY_TOL {
            Stability::Stable
        } else if derivative > STABILITY_TOL {
            Stability::Unstable
        } else {
            Stability::Marginal
        };
        found.push(Equilibrium1D {
            x,
            stability,
            derivative,
        });
    }

    found.sort_by(|a, b| a.x.total_cmp(&b.x));
    Ok(found)
}

/// Sweeps r ascending and links same-branch equilibria across adjacent samples
/// into continuous curves by greedy nearest-x matching.
///
/// A branch ends when the nearest candidate jumps farther than `BRANCH_GAP`
/// (e.g. the branch annihilated at a fold); a sample whose nearest candidate
/// is already claimed by another branch is skipped rather than re-matched.
/// Length-1 branches are dropped as tracking noise. This is a heuristic, not a
/// certified continuation method: branches passing very close to each other
/// can be mis-linked.
pub fn track_branches(
    field: &ParamField1D,
    r_range: (f64, f64),
    x_range: (f64, f64),
    samples: usize,
    log: Option<LogCallback>,
) -> Result<Vec<Branch>> {
    check_range(r_range.0, r_range.1)?;
    check_range(x_range.0, x_range.1)?;
    if samples < 2 {
        return Err(InputError::TooFewSamples {
            min: 2,
            got: samples,
        }
        .into());
    }

    if let Some(log) = log {
        log(&format!("sweeping {samples} parameter samples"));
    }

    let rs = linspace(r_range.0, r_range.1, samples);
    let mut groups: Vec<Vec<Equilibrium1D>> = Vec::with_capacity(samples);
    for &r in &rs {
        groups.push(equilibria_at(field, r, x_range, SWEEP_SEEDS)?);
    }

    let mut used: Vec<Vec<bool>> = groups.iter().map(|g| vec![false; g.len()]).collect();
    let mut branches: Vec<Branch> = Vec::new();

    for start in 0..samples {
        for first in 0..groups[start].len() {
            if used[start][first] {
                continue;
            }
            used[start][first] = true;
            let origin = &groups[start][first];
            let mut branch = Branch {
                params: vec![rs[start]],
                states: vec![origin.x],
                stability: origin.stability,
            };
            let mut current_x = origin.x;

            for next in start + 1..samples {
                let Some(nearest) = nearest_index(&groups[next], current_x) else {
                    continue;
                };
                let candidate = groups[next][nearest].x;
                if (candidate - current_x).abs() > BRANCH_GAP {
                    break;
                }
                if used[next][nearest] {
                    continue;
                }
                used[next][nearest] = true;
                branch.params.push(rs[next]);
                branch.states.push(candidate);
                current_x = candidate;
            }

            if branch.params.len() > 1 {
                branches.push(branch);
            }
        }
    }

    if let Some(log) = log {
        log(&format!("assembled {} branches", branches.len()));
    }
    Ok(branches)
}

/// Sweeps r over a coarser sample set, counting equilibria at each value, and
/// classifies every count change purely from the delta: 1<->3 is a pitchfork,
/// any other change of exactly two is a saddle-node, anything else is reported
/// unclassified with the verbatim counts.
///
/// Transcritical bifurcations preserve the count and are invisible to this
/// heuristic; coincident simultaneous events can be misclassified. Callers
/// document both limitations to their users.
pub fn detect_bifurcations(
    field: &ParamField1D,
    r_range: (f64, f64),
    x_range: (f64, f64),
    samples: usize,
    log: Option<LogCallback>,
) -> Result<Vec<BifurcationEvent>> {
    check_range(r_range.0, r_range.1)?;
    check_range(x_range.0, x_range.1)?;
    if samples < 2 {
        return Err(InputError::TooFewSamples {
            min: 2,
            got: samples,
        }
        .into());
    }

    let mut events = Vec::new();
    let mut previous: Option<usize> = None;

    for r in linspace(r_range.0, r_range.1, samples) {
        let count = equilibria_at(field, r, x_range, SWEEP_SEEDS)?.len();
        if let Some(before) = previous {
            if count != before {
                let event = BifurcationEvent {
                    param: r,
                    kind: classify_count_change(before, count),
                    count_before: before,
                    count_after: count,
                };
                if let Some(log) = log {
                    log(&format!(
                        "r = {:.4}: {:?} ({} -> {} equilibria)",
                        event.param, event.kind, event.count_before, event.count_after
                    ));
                }
                events.push(event);
            }
        }
        previous = Some(count);
    }

    Ok(events)
}

fn classify_count_change(before: usize, after: usize) -> BifurcationKind {
    match (before, after) {
        (1, 3) | (3, 1) => BifurcationKind::Pitchfork,
        (b, a) if b.abs_diff(a) == 2 => BifurcationKind::SaddleNode,
        _ => BifurcationKind::Unknown,
    }
}

fn nearest_index(group: &[Equilibrium1D], x: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, eq) in group.iter().enumerate() {
        let distance = (eq.x - x).abs();
        match best {
            Some((_, d)) if d <= distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}
