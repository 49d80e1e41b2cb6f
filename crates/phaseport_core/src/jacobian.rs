use crate::field::SystemField;
use nalgebra::{DMatrix, Matrix2};

/// Centered finite-difference step used for all derivative estimates.
pub const FD_STEP: f64 = 1e-5;

/// Scalar derivative df/dx of a 1D field.
///
/// Uses the exact derivative when the expression layer supplied one, otherwise
/// falls back to a centered finite difference of the guarded field.
pub fn scalar_derivative(field: &SystemField, x: f64) -> f64 {
    if let Some(exact) = field.exact_derivative_1d(x) {
        return exact;
    }
    let mut fp = [0.0];
    let mut fm = [0.0];
    field.eval_guarded(&[x + FD_STEP], &mut fp);
    field.eval_guarded(&[x - FD_STEP], &mut fm);
    (fp[0] - fm[0]) / (2.0 * FD_STEP)
}

/// 2x2 Jacobian of a 2D field by centered finite differences.
///
/// Always numerical, even when the field has a closed linear form; classifying
/// from the same estimate for every system kind keeps the pipeline uniform.
pub fn jacobian_2d(field: &SystemField, x: f64, y: f64) -> Matrix2<f64> {
    let mut fp = [0.0, 0.0];
    let mut fm = [0.0, 0.0];
    let mut j = Matrix2::zeros();

    field.eval_guarded(&[x + FD_STEP, y], &mut fp);
    field.eval_guarded(&[x - FD_STEP, y], &mut fm);
    j[(0, 0)] = (fp[0] - fm[0]) / (2.0 * FD_STEP);
    j[(1, 0)] = (fp[1] - fm[1]) / (2.0 * FD_STEP);

    field.eval_guarded(&[x, y + FD_STEP], &mut fp);
    field.eval_guarded(&[x, y - FD_STEP], &mut fm);
    j[(0, 1)] = (fp[0] - fm[0]) / (2.0 * FD_STEP);
    j[(1, 1)] = (fp[1] - fm[1]) / (2.0 * FD_STEP);

    j
}

/// Dense n x n centered-difference Jacobian of an arbitrary residual function.
/// Used by the Newton solver, where the residual is a guarded field evaluation.
pub(crate) fn fd_jacobian<F>(eval: F, x: &[f64], step: f64) -> DMatrix<f64>
where
    F: Fn(&[f64], &mut [f64]),
{
    let dim = x.len();
    let mut jac = DMatrix::zeros(dim, dim);
    let mut shifted = x.to_vec();
    let mut fp = vec![0.0; dim];
    let mut fm = vec![0.0; dim];

    for j in 0..dim {
        shifted[j] = x[j] + step;
        eval(&shifted, &mut fp);
        shifted[j] = x[j] - step;
        eval(&shifted, &mut fm);
        shifted[j] = x[j];
        for i in 0..dim {
            jac[(i, j)] = (fp[i] - fm[i]) / (2.0 * step);
        }
    }

    jac
}

#[cfg(test)]
mod tests {
    use super::{fd_jacobian, jacobian_2d, scalar_derivative, FD_STEP};
    use crate::field::SystemField;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Vector2};

    #[test]
    fn scalar_derivative_matches_analytic_value() {
        let field = SystemField::custom_1d(|x| x * x - 4.0);
        assert_relative_eq!(scalar_derivative(&field, 3.0), 6.0, epsilon = 1e-6);
    }

    #[test]
    fn scalar_derivative_prefers_exact_form() {
        // The numerical estimate of d/dx(x^2) at 10 would be ~20; the supplied
        // derivative is deliberately different so the preference is observable.
        let field = SystemField::custom_1d_with_derivative(|x| x * x, |_| -7.0);
        assert_eq!(scalar_derivative(&field, 10.0), -7.0);
    }

    #[test]
    fn jacobian_of_linear_field_recovers_matrix() {
        let a = Matrix2::new(0.0, 1.0, -2.0, -1.0);
        let field = SystemField::linear_2d(a, Vector2::zeros());
        let j = jacobian_2d(&field, 0.3, -1.7);
        for i in 0..2 {
            for k in 0..2 {
                assert_relative_eq!(j[(i, k)], a[(i, k)], epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn fd_jacobian_handles_coupled_nonlinear_residual() {
        // F(x, y) = (x*y, x + y^2), J = [[y, x], [1, 2y]].
        let eval = |x: &[f64], out: &mut [f64]| {
            out[0] = x[0] * x[1];
            out[1] = x[0] + x[1] * x[1];
        };
        let j = fd_jacobian(eval, &[2.0, 3.0], FD_STEP);
        assert_relative_eq!(j[(0, 0)], 3.0, epsilon = 1e-6);
        assert_relative_eq!(j[(0, 1)], 2.0, epsilon = 1e-6);
        assert_relative_eq!(j[(1, 0)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(j[(1, 1)], 6.0, epsilon = 1e-6);
    }
}
