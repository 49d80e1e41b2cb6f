use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Boxed right-hand side for a 1D system, dx/dt = f(x).
pub type ScalarFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;
/// Boxed right-hand side component for a 2D system, e.g. dx/dt = f(x, y).
pub type PlaneFn = Box<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// A vector field dx/dt = f(x), selected from a closed set of system kinds at
/// construction time.
///
/// The field only holds the caller's closures (or matrices) plus a dimension
/// tag; it owns no mutable state and is safe to evaluate concurrently.
pub enum SystemField {
    /// dx/dt = f(x), with an optional exact derivative df/dx.
    Custom1D {
        f: ScalarFn,
        dfdx: Option<ScalarFn>,
    },
    /// dx/dt = f(x, y), dy/dt = g(x, y).
    Custom2D { f: PlaneFn, g: PlaneFn },
    /// X' = A X + b.
    Linear2D { a: Matrix2<f64>, b: Vector2<f64> },
    /// A hard-coded 3D system with known closed-form equilibria.
    Named3D(NamedSystem),
}

impl SystemField {
    pub fn custom_1d(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        SystemField::Custom1D {
            f: Box::new(f),
            dfdx: None,
        }
    }

    /// 1D system with an exact derivative supplied by the expression layer.
    pub fn custom_1d_with_derivative(
        f: impl Fn(f64) -> f64 + Send + Sync + 'static,
        dfdx: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        SystemField::Custom1D {
            f: Box::new(f),
            dfdx: Some(Box::new(dfdx)),
        }
    }

    pub fn custom_2d(
        f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
        g: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        SystemField::Custom2D {
            f: Box::new(f),
            g: Box::new(g),
        }
    }

    pub fn linear_2d(a: Matrix2<f64>, b: Vector2<f64>) -> Self {
        SystemField::Linear2D { a, b }
    }

    pub fn dimension(&self) -> usize {
        match self {
            SystemField::Custom1D { .. } => 1,
            SystemField::Custom2D { .. } | SystemField::Linear2D { .. } => 2,
            SystemField::Named3D(_) => 3,
        }
    }

    /// Evaluates the raw field. Components may come back non-finite where the
    /// user formula is undefined (log of a negative, division by zero).
    pub fn eval_into(&self, x: &[f64], out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dimension());
        debug_assert_eq!(out.len(), self.dimension());
        match self {
            SystemField::Custom1D { f, .. } => {
                out[0] = f(x[0]);
            }
            SystemField::Custom2D { f, g } => {
                out[0] = f(x[0], x[1]);
                out[1] = g(x[0], x[1]);
            }
            SystemField::Linear2D { a, b } => {
                let state = Vector2::new(x[0], x[1]);
                let result = a * state + b;
                out[0] = result[0];
                out[1] = result[1];
            }
            SystemField::Named3D(named) => named.eval_into(x, out),
        }
    }

    /// Evaluation for root finding: undefined components are replaced with 0.0
    /// so a single bad point never aborts a seed scan.
    pub fn eval_guarded(&self, x: &[f64], out: &mut [f64]) {
        self.eval_into(x, out);
        for value in out.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
    }

    /// Evaluation for grid sampling: undefined components are recorded as NaN
    /// so the renderer can leave those cells blank.
    pub fn eval_or_nan(&self, x: &[f64], out: &mut [f64]) {
        self.eval_into(x, out);
        for value in out.iter_mut() {
            if !value.is_finite() {
                *value = f64::NAN;
            }
        }
    }

    /// Exact df/dx at `x` for 1D systems that carry a symbolic derivative.
    /// A derivative that evaluates non-finite is reported as 0.0, matching the
    /// guarded field evaluation.
    pub fn exact_derivative_1d(&self, x: f64) -> Option<f64> {
        match self {
            SystemField::Custom1D { dfdx: Some(d), .. } => {
                let value = d(x);
                Some(if value.is_finite() { value } else { 0.0 })
            }
            _ => None,
        }
    }
}

/// Sprott's simple chaotic flows, variants B, C, and D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SprottVariant {
    B,
    C,
    D,
}

/// Hard-coded 3D systems. Each carries its standard parameters and knows its
/// closed-form equilibria, so no numerical search is run in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NamedSystem {
    Lorenz { sigma: f64, rho: f64, beta: f64 },
    Rossler { a: f64, b: f64, c: f64 },
    Chua { alpha: f64, beta: f64, m0: f64, m1: f64 },
    Sprott(SprottVariant),
}

impl NamedSystem {
    pub fn lorenz(sigma: f64, rho: f64, beta: f64) -> Self {
        NamedSystem::Lorenz { sigma, rho, beta }
    }

    pub fn rossler(a: f64, b: f64, c: f64) -> Self {
        NamedSystem::Rossler { a, b, c }
    }

    pub fn chua(alpha: f64, beta: f64, m0: f64, m1: f64) -> Self {
        NamedSystem::Chua {
            alpha,
            beta,
            m0,
            m1,
        }
    }

    fn eval_into(&self, s: &[f64], out: &mut [f64]) {
        let (x, y, z) = (s[0], s[1], s[2]);
        match *self {
            NamedSystem::Lorenz { sigma, rho, beta } => {
                out[0] = sigma * (y - x);
                out[1] = x * (rho - z) - y;
                out[2] = x * y - beta * z;
            }
            NamedSystem::Rossler { a, b, c } => {
                out[0] = -y - z;
                out[1] = x + a * y;
                out[2] = b + z * (x - c);
            }
            NamedSystem::Chua {
                alpha,
                beta,
                m0,
                m1,
            } => {
                // Chua diode characteristic: h(x) = m1*x + (m0-m1)/2 * (|x+1| - |x-1|)
                let h = m1 * x + 0.5 * (m0 - m1) * ((x + 1.0).abs() - (x - 1.0).abs());
                out[0] = alpha * (y - x - h);
                out[1] = x - y + z;
                out[2] = -beta * y;
            }
            NamedSystem::Sprott(variant) => match variant {
                SprottVariant::B => {
                    out[0] = y * z;
                    out[1] = x - y;
                    out[2] = 1.0 - x * y;
                }
                SprottVariant::C => {
                    out[0] = y * z;
                    out[1] = x - y;
                    out[2] = 1.0 - x * x;
                }
                SprottVariant::D => {
                    out[0] = -y;
                    out[1] = x + z;
                    out[2] = x * z + 3.0 * y * y;
                }
            },
        }
    }

    /// Closed-form equilibria for the standard parameter regimes.
    pub fn equilibria(&self) -> Vec<[f64; 3]> {
        match *self {
            NamedSystem::Lorenz { rho, beta, .. } => {
                let mut points = vec![[0.0, 0.0, 0.0]];
                if rho > 1.0 {
                    let v = (beta * (rho - 1.0)).sqrt();
                    points.push([v, v, rho - 1.0]);
                    points.push([-v, -v, rho - 1.0]);
                }
                points
            }
            NamedSystem::Rossler { a, b, c } => {
                let discriminant = c * c - 4.0 * a * b;
                let mut points = Vec::new();
                if discriminant >= 0.0 {
                    let x1 = (c + discriminant.sqrt()) / 2.0;
                    points.push([x1, -x1 / a, x1 / a]);
                    if discriminant > 0.0 {
                        let x2 = (c - discriminant.sqrt()) / 2.0;
                        points.push([x2, -x2 / a, x2 / a]);
                    }
                }
                points
            }
            // Only the origin for the typical double-scroll parameters.
            NamedSystem::Chua { .. } => vec![[0.0, 0.0, 0.0]],
            NamedSystem::Sprott(variant) => match variant {
                SprottVariant::B | SprottVariant::C => {
                    vec![[1.0, 1.0, 0.0], [-1.0, -1.0, 0.0]]
                }
                SprottVariant::D => vec![[0.0, 0.0, 0.0]],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NamedSystem, SprottVariant, SystemField};
    use nalgebra::{Matrix2, Vector2};

    #[test]
    fn guarded_evaluation_zeroes_undefined_points() {
        let field = SystemField::custom_1d(|x| 1.0 / x);
        let mut out = [0.0];
        field.eval_guarded(&[0.0], &mut out);
        assert_eq!(out[0], 0.0);
        field.eval_guarded(&[2.0], &mut out);
        assert_eq!(out[0], 0.5);
    }

    #[test]
    fn sampled_evaluation_marks_undefined_points_as_nan() {
        let field = SystemField::custom_2d(|x, _| x.sqrt(), |_, y| y);
        let mut out = [0.0, 0.0];
        field.eval_or_nan(&[-1.0, 3.0], &mut out);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 3.0);
    }

    #[test]
    fn linear_field_evaluates_affine_form() {
        let a = Matrix2::new(0.0, 1.0, -2.0, -1.0);
        let b = Vector2::new(1.0, -1.0);
        let field = SystemField::linear_2d(a, b);
        let mut out = [0.0, 0.0];
        field.eval_into(&[2.0, 3.0], &mut out);
        assert_eq!(out[0], 3.0 + 1.0);
        assert_eq!(out[1], -4.0 - 3.0 - 1.0);
    }

    #[test]
    fn lorenz_equilibria_depend_on_rho() {
        let sub = NamedSystem::lorenz(10.0, 0.5, 8.0 / 3.0);
        assert_eq!(sub.equilibria().len(), 1);

        let sup = NamedSystem::lorenz(10.0, 28.0, 8.0 / 3.0);
        let points = sup.equilibria();
        assert_eq!(points.len(), 3);
        let v = (8.0 / 3.0 * 27.0_f64).sqrt();
        assert!((points[1][0] - v).abs() < 1e-12);
        assert!((points[2][0] + v).abs() < 1e-12);

        // The nontrivial points really are roots of the field.
        let field = SystemField::Named3D(sup);
        let mut out = [0.0; 3];
        field.eval_into(&points[1], &mut out);
        for component in out {
            assert!(component.abs() < 1e-9);
        }
    }

    #[test]
    fn rossler_equilibria_are_field_roots() {
        let named = NamedSystem::rossler(0.2, 0.2, 5.7);
        let points = named.equilibria();
        assert_eq!(points.len(), 2);
        let field = SystemField::Named3D(named);
        let mut out = [0.0; 3];
        for point in &points {
            field.eval_into(point, &mut out);
            for component in out {
                assert!(component.abs() < 1e-9);
            }
        }
    }

    #[test]
    fn sprott_variants_have_expected_fixed_points() {
        let b = NamedSystem::Sprott(SprottVariant::B);
        let field = SystemField::Named3D(b);
        let mut out = [0.0; 3];
        for point in b.equilibria() {
            field.eval_into(&point, &mut out);
            for component in out {
                assert!(component.abs() < 1e-12);
            }
        }
    }
}
