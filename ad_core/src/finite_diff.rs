//! Central differences, the reference the tape-based gradients are tested
//! against.

use crate::Real;

/// Derivative of a function of one variable, `(f(x+h) - f(x-h)) / 2h`.
pub fn finite_diff_derivative<F>(mut f: F, x: Real, eps: Real) -> Real
where
    F: FnMut(Real) -> Real,
{
    (f(x + eps) - f(x - eps)) / (2.0 * eps)
}

/// Gradient of `f` at `point`, one central difference per coordinate.
///
/// ```
/// use ad_core::finite_diff_grad;
///
/// // f(x, y) = x^2 y
/// let g = finite_diff_grad(|v: &[f64]| v[0] * v[0] * v[1], &[3.0, 2.0], 1e-6);
/// assert!((g[0] - 12.0).abs() < 1e-5);
/// assert!((g[1] - 9.0).abs() < 1e-5);
/// ```
pub fn finite_diff_grad<F>(f: F, point: &[Real], eps: Real) -> Vec<Real>
where
    F: Fn(&[Real]) -> Real,
{
    let mut probe = point.to_vec();
    (0..point.len())
        .map(|axis| {
            let d = finite_diff_derivative(
                |x| {
                    probe[axis] = x;
                    f(&probe)
                },
                point[axis],
                eps,
            );
            probe[axis] = point[axis];
            d
        })
        .collect()
}

/// Largest absolute componentwise difference. Unpaired trailing entries are
/// ignored.
pub fn max_grad_error(grad1: &[Real], grad2: &[Real]) -> Real {
    grad1
        .iter()
        .zip(grad2)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, Real::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_of_polynomial() {
        // ∂/∂x = 2x + 2y, ∂/∂y = 2x + 3y^2
        let f = |v: &[f64]| v[0] * v[0] + 2.0 * v[0] * v[1] + v[1].powi(3);
        let g = finite_diff_grad(f, &[1.0, 2.0], 1e-6);
        assert!((g[0] - 6.0).abs() < 1e-5);
        assert!((g[1] - 14.0).abs() < 1e-5);
    }

    #[test]
    fn test_probe_is_restored_between_axes() {
        // Each partial must see the other coordinates at their original value.
        let g = finite_diff_grad(|v: &[f64]| v[0] * v[1] * v[2], &[1.0, 2.0, 3.0], 1e-6);
        for (got, want) in g.iter().zip([6.0, 3.0, 2.0]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_derivative_of_product() {
        let d = finite_diff_derivative(|x| x.sin() * x.exp(), 1.0, 1e-7);
        let expected = (1.0_f64.cos() + 1.0_f64.sin()) * 1.0_f64.exp();
        assert!((d - expected).abs() < 1e-5);
    }

    #[test]
    fn test_max_grad_error() {
        assert_eq!(max_grad_error(&[], &[]), 0.0);
        let err = max_grad_error(&[1.0, -2.0, 3.0], &[1.0, -2.25, 3.5, 100.0]);
        assert_eq!(err, 0.5);
    }
}
