use crate::error::{check_range, InputError};
use crate::field::SystemField;
use crate::jacobian::{jacobian_2d, scalar_derivative};
use crate::newton::{self, NewtonSettings};
use crate::sampler::linspace;
use anyhow::Result;
use nalgebra::Matrix2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Acceptance tolerance on the sum of squared field components at a candidate.
pub const RESIDUAL_TOL: f64 = 1e-6;
/// Tolerance below which a derivative / eigenvalue real part counts as zero.
pub const STABILITY_TOL: f64 = 1e-8;
/// Per-axis distance under which two candidates are the same root.
pub const DEDUP_TOL: f64 = 0.01;
/// Default seed count for both the 1D scan and the 2D seed grid.
pub const DEFAULT_SEEDS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Stable,
    Unstable,
    Marginal,
}

/// Qualitative type of a 2D equilibrium by the eigenstructure of its Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseType {
    Node,
    Saddle,
    SpiralFocus,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium1D {
    pub x: f64,
    pub stability: Stability,
    /// df/dx at the root (exact when available, finite difference otherwise).
    pub derivative: f64,
}

/// Eigenvalues of the 2x2 Jacobian, with unit eigenvectors when both
/// eigenvalues are real. The rendering layer draws the local stable/unstable
/// directions from the vectors; a complex pair has no real directions to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenData {
    pub values: [Complex<f64>; 2],
    pub vectors: Option<[[f64; 2]; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: PhaseType,
    pub stability: Stability,
    /// Row-major finite-difference Jacobian at the point.
    pub jacobian: [[f64; 2]; 2],
    pub eigen: EigenData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium2D {
    pub point: [f64; 2],
    pub classification: Classification,
}

/// Classifies a point of a 1D field by the sign of df/dx.
/// Returns the stability label and the derivative it was read from.
pub fn classify_1d(field: &SystemField, x: f64) -> (Stability, f64) {
    let derivative = scalar_derivative(field, x);
    let stability = if derivative < -STABILITY_TOL {
        Stability::Stable
    } else if derivative > STABILITY_TOL {
        Stability::Unstable
    } else {
        Stability::Marginal
    };
    (stability, derivative)
}

/// Classifies a point of a 2D field by the eigenstructure of its Jacobian.
pub fn classify_2d(field: &SystemField, x: f64, y: f64) -> Classification {
    let j = jacobian_2d(field, x, y);
    let eigen = eigen_2x2(&j);

    let (kind, stability) = if eigen.values[0].im != 0.0 {
        // Complex-conjugate pair; both share the real part.
        let re = eigen.values[0].re;
        if re.abs() < STABILITY_TOL {
            (PhaseType::Center, Stability::Marginal)
        } else if re < 0.0 {
            (PhaseType::SpiralFocus, Stability::Stable)
        } else {
            (PhaseType::SpiralFocus, Stability::Unstable)
        }
    } else {
        let l1 = eigen.values[0].re;
        let l2 = eigen.values[1].re;
        if l1 * l2 > 0.0 {
            let stability = if l1 < 0.0 && l2 < 0.0 {
                Stability::Stable
            } else {
                Stability::Unstable
            };
            (PhaseType::Node, stability)
        } else {
            // Opposite signs; saddles are unstable by definition.
            (PhaseType::Saddle, Stability::Unstable)
        }
    };

    Classification {
        kind,
        stability,
        jacobian: [[j[(0, 0)], j[(0, 1)]], [j[(1, 0)], j[(1, 1)]]],
        eigen,
    }
}

/// Finds the equilibria of a 1D field within `range` by a multi-seed Newton
/// scan: evenly spaced seeds, per-seed convergence (failures skipped), a
/// sign-change bisection pass between adjacent seeds, validation against the
/// raw field, and deduplication (first-found wins). The result is sorted
/// ascending by coordinate.
pub fn find_equilibria_1d(
    field: &SystemField,
    range: (f64, f64),
    n_seeds: usize,
) -> Result<Vec<Equilibrium1D>> {
    find_equilibria_1d_with_dedup(field, range, n_seeds, DEDUP_TOL)
}

/// The 1D scan with a caller-chosen deduplication distance. The bifurcation
/// sweep uses a coarser threshold than the standalone search.
pub fn find_equilibria_1d_with_dedup(
    field: &SystemField,
    range: (f64, f64),
    n_seeds: usize,
    dedup_tol: f64,
) -> Result<Vec<Equilibrium1D>> {
    if field.dimension() != 1 {
        return Err(InputError::DimensionMismatch {
            expected: 1,
            got: field.dimension(),
        }
        .into());
    }
    check_range(range.0, range.1)?;
    if n_seeds < 2 {
        return Err(InputError::TooFewSamples {
            min: 2,
            got: n_seeds,
        }
        .into());
    }

    let eval = |x: &[f64], out: &mut [f64]| field.eval_guarded(x, out);
    let scalar = |x: f64| {
        let mut out = [0.0];
        field.eval_guarded(&[x], &mut out);
        out[0]
    };
    let seeds = linspace(range.0, range.1, n_seeds);
    let mut candidates: Vec<f64> = Vec::new();

    for &seed in &seeds {
        if let Ok(solution) = newton::solve(eval, &[seed], NewtonSettings::default()) {
            candidates.push(solution.state[0]);
        }
    }
    // A root whose Newton basin has shrunk below the seed spacing (roots about
    // to merge) is still bracketed by a sign change between adjacent seeds.
    for pair in seeds.windows(2) {
        if let Some(x) = newton::bisect(&scalar, pair[0], pair[1]) {
            candidates.push(x);
        }
    }

    let mut found: Vec<Equilibrium1D> = Vec::new();
    for x in candidates {
        if !accept_candidate(field, &[x]) {
            continue;
        }
        if x < range.0 || x > range.1 {
            continue;
        }
        if found.iter().any(|e| (e.x - x).abs() < dedup_tol) {
            continue;
        }
        let (stability, derivative) = classify_1d(field, x);
        found.push(Equilibrium1D {
            x,
            stability,
            derivative,
        });
    }

    found.sort_by(|a, b| a.x.total_cmp(&b.x));
    Ok(found)
}

/// Finds the equilibria of a 2D field within the bounding box. Seeds are laid
/// out as a roughly square grid with about `n_seeds` points in total.
pub fn find_equilibria_2d(
    field: &SystemField,
    x_range: (f64, f64),
    y_range: (f64, f64),
    n_seeds: usize,
) -> Result<Vec<Equilibrium2D>> {
    if field.dimension() != 2 {
        return Err(InputError::DimensionMismatch {
            expected: 2,
            got: field.dimension(),
        }
        .into());
    }
    check_range(x_range.0, x_range.1)?;
    check_range(y_range.0, y_range.1)?;
    let per_axis = (n_seeds as f64).sqrt() as usize;
    if per_axis < 2 {
        return Err(InputError::TooFewSamples {
            min: 4,
            got: n_seeds,
        }
        .into());
    }

    let eval = |x: &[f64], out: &mut [f64]| field.eval_guarded(x, out);
    let x_seeds = linspace(x_range.0, x_range.1, per_axis);
    let y_seeds = linspace(y_range.0, y_range.1, per_axis);
    let mut found: Vec<Equilibrium2D> = Vec::new();

    for &x0 in &x_seeds {
        for &y0 in &y_seeds {
            let Ok(solution) = newton::solve(eval, &[x0, y0], NewtonSettings::default()) else {
                continue;
            };
            let (x, y) = (solution.state[0], solution.state[1]);
            if !accept_candidate(field, &[x, y]) {
                continue;
            }
            if x < x_range.0 || x > x_range.1 || y < y_range.0 || y > y_range.1 {
                continue;
            }
            let duplicate = found.iter().any(|e| {
                (e.point[0] - x).abs() < DEDUP_TOL && (e.point[1] - y).abs() < DEDUP_TOL
            });
            if duplicate {
                continue;
            }
            found.push(Equilibrium2D {
                point: [x, y],
                classification: classify_2d(field, x, y),
            });
        }
    }

    Ok(found)
}

/// A candidate is a root only if the raw field is defined there and the sum of
/// squared components is below tolerance. Checking the raw field (not the
/// guarded one) keeps an everywhere-undefined field from turning every seed
/// into a fake root.
fn accept_candidate(field: &SystemField, point: &[f64]) -> bool {
    let mut out = vec![0.0; point.len()];
    field.eval_into(point, &mut out);
    let mut sum_sq = 0.0;
    for value in &out {
        if !value.is_finite() {
            return false;
        }
        sum_sq += value * value;
    }
    sum_sq < RESIDUAL_TOL
}

/// Eigenvalues/eigenvectors of a 2x2 matrix from the characteristic
/// polynomial. Real pairs come with unit eigenvectors read off the rows of
/// (J - lambda I); a complex pair carries no real vectors.
fn eigen_2x2(j: &Matrix2<f64>) -> EigenData {
    let trace = j[(0, 0)] + j[(1, 1)];
    let det = j[(0, 0)] * j[(1, 1)] - j[(0, 1)] * j[(1, 0)];
    let half = trace / 2.0;
    let discriminant = half * half - det;

    if discriminant >= 0.0 {
        let sq = discriminant.sqrt();
        let l1 = half + sq;
        let l2 = half - sq;
        let vectors = [real_eigenvector(j, l1), real_eigenvector(j, l2)];
        EigenData {
            values: [Complex::new(l1, 0.0), Complex::new(l2, 0.0)],
            vectors: Some(vectors),
        }
    } else {
        let im = (-discriminant).sqrt();
        EigenData {
            values: [Complex::new(half, im), Complex::new(half, -im)],
            vectors: None,
        }
    }
}

fn real_eigenvector(j: &Matrix2<f64>, lambda: f64) -> [f64; 2] {
    let (a, b) = (j[(0, 0)], j[(0, 1)]);
    let (c, d) = (j[(1, 0)], j[(1, 1)]);
    let (vx, vy) = if b.abs() > 1e-12 {
        (b, lambda - a)
    } else if c.abs() > 1e-12 {
        (lambda - d, c)
    } else if (lambda - a).abs() <= (lambda - d).abs() {
        // Diagonal Jacobian: the eigenvectors are the axes.
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };
    let norm = (vx * vx + vy * vy).sqrt();
    if norm > 0.0 {
        [vx / norm, vy / norm]
    } else {
        [0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::{
        classify_1d, classify_2d, find_equilibria_1d, find_equilibria_2d, PhaseType, Stability,
        DEFAULT_SEEDS,
    };
    use crate::field::SystemField;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Vector2};

    fn quadratic() -> SystemField {
        SystemField::custom_1d(|x| x * x - 4.0)
    }

    #[test]
    fn quadratic_field_has_stable_and_unstable_roots() {
        let equilibria =
            find_equilibria_1d(&quadratic(), (-5.0, 5.0), DEFAULT_SEEDS).expect("search");
        assert_eq!(equilibria.len(), 2);
        // Sorted ascending: x = -2 first.
        assert_relative_eq!(equilibria[0].x, -2.0, epsilon = 1e-6);
        assert_eq!(equilibria[0].stability, Stability::Stable);
        assert_relative_eq!(equilibria[1].x, 2.0, epsilon = 1e-6);
        assert_eq!(equilibria[1].stability, Stability::Unstable);
        // Round trip: the returned points really are roots.
        for eq in &equilibria {
            assert!((eq.x * eq.x - 4.0).abs() < 1e-6);
        }
    }

    #[test]
    fn logistic_field_matches_textbook_result() {
        let field = SystemField::custom_1d(|x| x * (1.0 - x));
        let equilibria = find_equilibria_1d(&field, (-1.0, 2.0), DEFAULT_SEEDS).expect("search");
        assert_eq!(equilibria.len(), 2);
        assert_relative_eq!(equilibria[0].x, 0.0, epsilon = 1e-6);
        assert_eq!(equilibria[0].stability, Stability::Unstable);
        assert_relative_eq!(equilibria[1].x, 1.0, epsilon = 1e-6);
        assert_eq!(equilibria[1].stability, Stability::Stable);
    }

    #[test]
    fn narrow_basin_root_is_found_by_bracketing() {
        // Near a triple-root merge the central root's Newton basin is narrower
        // than the seed spacing; the sign-change pass still brackets it.
        let field = SystemField::custom_1d(|x| 0.02 * x - x * x * x);
        let equilibria = find_equilibria_1d(&field, (-1.0, 1.0), DEFAULT_SEEDS).expect("search");
        assert_eq!(equilibria.len(), 3);
        assert!(equilibria[1].x.abs() < 1e-9);
        assert_relative_eq!(equilibria[2].x, 0.02_f64.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn search_is_idempotent() {
        let field = quadratic();
        let first = find_equilibria_1d(&field, (-5.0, 5.0), DEFAULT_SEEDS).expect("search");
        let second = find_equilibria_1d(&field, (-5.0, 5.0), DEFAULT_SEEDS).expect("search");
        assert_eq!(first, second);
    }

    #[test]
    fn rootless_box_returns_empty_set() {
        // Roots of x^2 - 4 are outside [5, 10]; seeds converge out of bounds.
        let equilibria = find_equilibria_1d(&quadratic(), (5.0, 10.0), DEFAULT_SEEDS).expect("search");
        assert!(equilibria.is_empty());
    }

    #[test]
    fn undefined_everywhere_field_yields_empty_not_crash() {
        let field = SystemField::custom_1d(|_| f64::NAN);
        let equilibria = find_equilibria_1d(&field, (-5.0, 5.0), DEFAULT_SEEDS).expect("search");
        assert!(equilibria.is_empty());

        let plane = SystemField::custom_2d(|_, _| f64::NAN, |_, _| f64::INFINITY);
        let equilibria =
            find_equilibria_2d(&plane, (-5.0, 5.0), (-5.0, 5.0), DEFAULT_SEEDS).expect("search");
        assert!(equilibria.is_empty());
    }

    #[test]
    fn rejects_malformed_ranges_and_seed_counts() {
        assert!(find_equilibria_1d(&quadratic(), (5.0, -5.0), DEFAULT_SEEDS).is_err());
        assert!(find_equilibria_1d(&quadratic(), (-5.0, 5.0), 1).is_err());
        let plane = SystemField::custom_2d(|x, _| x, |_, y| y);
        assert!(find_equilibria_2d(&plane, (f64::NAN, 1.0), (-1.0, 1.0), 20).is_err());
        assert!(find_equilibria_2d(&plane, (-1.0, 1.0), (-1.0, 1.0), 2).is_err());
        assert!(find_equilibria_1d(&plane, (-1.0, 1.0), 20).is_err());
    }

    #[test]
    fn linear_spiral_classifies_as_stable_focus() {
        // trace = -1, det = 2: complex pair with real part -1/2.
        let a = Matrix2::new(0.0, 1.0, -2.0, -1.0);
        let field = SystemField::linear_2d(a, Vector2::zeros());
        let equilibria =
            find_equilibria_2d(&field, (-5.0, 5.0), (-5.0, 5.0), DEFAULT_SEEDS).expect("search");
        assert_eq!(equilibria.len(), 1);
        let eq = &equilibria[0];
        assert!(eq.point[0].abs() < 1e-8 && eq.point[1].abs() < 1e-8);
        assert_eq!(eq.classification.kind, PhaseType::SpiralFocus);
        assert_eq!(eq.classification.stability, Stability::Stable);
        assert_relative_eq!(eq.classification.eigen.values[0].re, -0.5, epsilon = 1e-6);
        assert!(eq.classification.eigen.vectors.is_none());
    }

    #[test]
    fn saddle_carries_real_eigenvectors() {
        let field = SystemField::custom_2d(|x, _| x, |_, y| -y);
        let class = classify_2d(&field, 0.0, 0.0);
        assert_eq!(class.kind, PhaseType::Saddle);
        assert_eq!(class.stability, Stability::Unstable);
        let vectors = class.eigen.vectors.expect("real pair");
        // Eigenvalues +1 / -1 with axis-aligned directions.
        assert_relative_eq!(class.eigen.values[0].re, 1.0, epsilon = 1e-6);
        assert_relative_eq!(class.eigen.values[1].re, -1.0, epsilon = 1e-6);
        assert_relative_eq!(vectors[0][0].abs(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(vectors[1][1].abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn stable_node_and_center_cases() {
        let node = SystemField::custom_2d(|x, _| -x, |_, y| -2.0 * y);
        let class = classify_2d(&node, 0.0, 0.0);
        assert_eq!(class.kind, PhaseType::Node);
        assert_eq!(class.stability, Stability::Stable);

        let center = SystemField::linear_2d(Matrix2::new(0.0, 1.0, -1.0, 0.0), Vector2::zeros());
        let class = classify_2d(&center, 0.0, 0.0);
        assert_eq!(class.kind, PhaseType::Center);
        assert_eq!(class.stability, Stability::Marginal);
    }

    #[test]
    fn flat_cubic_root_is_marginal() {
        let field = SystemField::custom_1d(|x| x * x * x);
        let (stability, derivative) = classify_1d(&field, 0.0);
        assert_eq!(stability, Stability::Marginal);
        assert!(derivative.abs() < 1e-8);
    }
}
