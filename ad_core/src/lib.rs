//! # ad_core - Reverse-mode Automatic Differentiation Engine
//!
//! This crate provides a tape-based reverse-mode autodiff implementation. Arithmetic
//! on active values builds statically typed expression trees; assigning a tree to an
//! active value evaluates it in one fused pass and records the partial derivatives
//! on a [`Stack`]. A reverse sweep over the stack then yields the gradient of any
//! output with respect to every input.
//!
//! ## Overview
//!
//! Automatic differentiation computes exact derivatives (not numerical approximations)
//! by applying the chain rule systematically. Reverse-mode autodiff is efficient for
//! functions with many inputs and few outputs, making it ideal for gradient-based
//! optimization.
//!
//! ## Quick Start
//!
//! ```
//! use ad_core::{Active, ExpressionExt, Stack};
//!
//! let mut stack = Stack::new();
//!
//! // Independent variables
//! let x = Active::new(&mut stack, 2.0);
//! let y = Active::new(&mut stack, 3.0);
//!
//! // z = x * y + sin(x), recorded as a single statement
//! let z = Active::from_expression(&mut stack, &x * &y + x.sin());
//! assert!((z.value() - 6.909297426825682).abs() < 1e-10);
//!
//! // Reverse sweep seeded with dz/dz = 1
//! stack.begin_backward_pass(&[(z.gradient_index(), 1.0)]);
//! stack.compute_adjoint();
//!
//! // dz/dx = y + cos(x), dz/dy = x
//! assert!((x.gradient(&stack) - 2.5838531634528574).abs() < 1e-10);
//! assert!((y.gradient(&stack) - 2.0).abs() < 1e-10);
//! ```
//!
//! ## Supported Operations
//!
//! | Category | Operations |
//! |----------|------------|
//! | Arithmetic | `+`, `-`, `*`, `/`, unary `-`, [`ExpressionExt::pow`], [`ExpressionExt::atan2`], `max`, `min` |
//! | Transcendental | `exp`, `log`, `sin`, `cos`, ..., `erf`, `erfc` (see [`UnaryFunc`]) |
//! | Rounding | `round`, `ceil`, `floor`, `trunc`, `rint`, `nearbyint` (zero derivative) |
//! | Predicates | `is_nan`, `is_inf`, `is_finite`, comparisons (never active) |
//! | Reductions | [`sum`], [`mean`], [`product`], [`norm2`], [`maxval`], [`minval`] |
//!
//! ## Architecture
//!
//! - **[`Stack`]**: the tape. Passed explicitly to everything that records.
//! - **[`Expression`]**: the node contract, with compile-time scratch and array counts.
//! - **[`Active`]**: a scalar with a gradient slot.
//! - **[`NoAlias`]**: asserts that an operand does not overlap the assignment destination.
//! - **[`finite_diff_grad`]**: numerical gradients for validating the tape.
//!
//! Arrays live in the `ad_array` crate, which plugs into the same node framework.

pub mod active;
pub mod arith;
pub mod binary;
pub mod error;
pub mod expression;
mod finite_diff;
pub mod ops;
pub mod predicate;
pub mod reduce;
pub mod scratch;
pub mod shape;
pub mod stack;
pub mod unary;

/// Floating-point type of every value and gradient.
pub type Real = f64;

pub use active::Active;
pub use arith::ExpressionExt;
pub use binary::BinaryOperation;
pub use error::AdError;
pub use expression::{
    evaluate_scalar, for_each_location, for_each_location_contiguous, for_each_location_packets,
    Alignment, Expression, Extent,
};
pub use finite_diff::{finite_diff_derivative, finite_diff_grad, max_grad_error};
pub use ops::{BinaryFunc, CompareFunc, DerivativeFamily, PredicateFunc, UnaryFunc};
pub use predicate::{BinaryBoolOperation, UnaryBoolOperation};
pub use reduce::{
    all, any, count, maxval, mean, minval, norm2, product, reduce, reduce_value, sum, Reduction,
};
pub use scratch::Scratch;
pub use shape::Shape;
pub use stack::{GradientIndex, Stack, StackConfig};
pub use unary::{noalias, NoAlias, UnaryOperation};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Record `f(x)` for independent `x`, run the reverse sweep and return
    /// (value, dvalue/dx).
    fn derivative_at<F>(x0: Real, f: F) -> (Real, Real)
    where
        F: for<'a> Fn(&mut Stack, &'a Active) -> Active,
    {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, x0);
        let y = f(&mut stack, &x);
        stack.begin_backward_pass(&[(y.gradient_index(), 1.0)]);
        stack.compute_adjoint();
        (y.value(), x.gradient(&stack))
    }

    #[test]
    fn test_sin_derivative() {
        let (y, dx) = derivative_at(2.0, |s, x| Active::from_expression(s, x.sin()));
        assert_relative_eq!(y, 2.0_f64.sin());
        assert_relative_eq!(dx, 2.0_f64.cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_sqrt_derivative_from_output() {
        let (y, dx) = derivative_at(16.0, |s, x| Active::from_expression(s, x.sqrt()));
        assert_eq!(y, 4.0);
        assert_relative_eq!(dx, 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_sqrt_derivative_at_four() {
        // 0.5 / sqrt(4), not 0.5 / 4
        let (y, dx) = derivative_at(4.0, |s, x| Active::from_expression(s, x.sqrt()));
        assert_eq!(y, 2.0);
        assert_eq!(dx, 0.25);
    }

    #[test]
    fn test_exp_derivative_from_output() {
        let (y, dx) = derivative_at(0.5, |s, x| Active::from_expression(s, x.exp()));
        assert_relative_eq!(y, 0.5_f64.exp());
        assert_relative_eq!(dx, 0.5_f64.exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_round_has_zero_derivative() {
        let (y, dx) = derivative_at(2.7, |s, x| Active::from_expression(s, x.round()));
        assert_eq!(y, 3.0);
        assert!(dx == 0.0);
    }

    #[test]
    fn test_round_of_integer_has_zero_derivative() {
        let (y, dx) = derivative_at(3.0, |s, x| Active::from_expression(s, x.round()));
        assert_eq!(y, 3.0);
        assert!(dx == 0.0);
    }

    #[test]
    fn test_fabs_matches_abs() {
        let (y, dx) = derivative_at(-1.5, |s, x| Active::from_expression(s, x.fabs()));
        assert_eq!(y, 1.5);
        assert_eq!(dx, -1.0);
        let (_, dx) = derivative_at(-1.5, |s, x| Active::from_expression(s, x.abs()));
        assert_eq!(dx, -1.0);
    }

    #[test]
    fn test_negation_times_variable() {
        // z = (-x) * y at x = 1, y = 2
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 1.0);
        let y = Active::new(&mut stack, 2.0);
        let z = Active::from_expression(&mut stack, -&x * &y);
        assert_eq!(z.value(), -2.0);

        stack.begin_backward_pass(&[(z.gradient_index(), 1.0)]);
        stack.compute_adjoint();
        assert_relative_eq!(x.gradient(&stack), -2.0);
        assert_relative_eq!(y.gradient(&stack), -1.0);
    }

    #[test]
    fn test_gradient_arithmetic() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 2.0);
        let y = Active::new(&mut stack, 4.0);
        let sum = Active::from_expression(&mut stack, &x + &y);
        let diff = Active::from_expression(&mut stack, &x - &y);
        let prod = Active::from_expression(&mut stack, &x * &y);
        let quot = Active::from_expression(&mut stack, &x / &y);

        let jac = stack.jacobian(
            &[x.gradient_index(), y.gradient_index()],
            &[
                sum.gradient_index(),
                diff.gradient_index(),
                prod.gradient_index(),
                quot.gradient_index(),
            ],
        );
        let expected = [1.0, 1.0, 1.0, -1.0, 4.0, 2.0, 0.25, -2.0 / 16.0];
        for (got, want) in jac.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_chain_rule() {
        // z = sin(x^2), dz/dx = cos(x^2) * 2x
        let (_, dx) = derivative_at(2.0, |s, x| Active::from_expression(s, x.pow(2.0).sin()));
        assert_relative_eq!(dx, 4.0_f64.cos() * 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reused_variable() {
        // z = x * x
        let (_, dx) = derivative_at(3.0, |s, x| Active::from_expression(s, x * x));
        assert_relative_eq!(dx, 6.0);
    }

    #[test]
    fn test_diamond_across_statements() {
        // a = x + y, b = x - y, z = a * b = x^2 - y^2
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 3.0);
        let y = Active::new(&mut stack, 2.0);
        let a = Active::from_expression(&mut stack, &x + &y);
        let b = Active::from_expression(&mut stack, &x - &y);
        let z = Active::from_expression(&mut stack, &a * &b);

        stack.begin_backward_pass(&[(z.gradient_index(), 1.0)]);
        stack.compute_adjoint();
        assert_relative_eq!(x.gradient(&stack), 6.0);
        assert_relative_eq!(y.gradient(&stack), -4.0);
    }

    #[test]
    fn test_complex_expression_against_finite_differences() {
        // z = (x*y + sin(x)) / (y + 2)
        let f = |v: &[Real]| (v[0] * v[1] + v[0].sin()) / (v[1] + 2.0);

        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 1.0);
        let y = Active::new(&mut stack, 2.0);
        let z = Active::from_expression(&mut stack, (&x * &y + x.sin()) / (&y + 2.0));
        assert_relative_eq!(z.value(), f(&[1.0, 2.0]), epsilon = 1e-12);

        stack.begin_backward_pass(&[(z.gradient_index(), 1.0)]);
        stack.compute_adjoint();
        let fd = finite_diff_grad(f, &[1.0, 2.0], 1e-7);
        let ad = [x.gradient(&stack), y.gradient(&stack)];
        assert!(max_grad_error(&ad, &fd) < 1e-5);
    }

    #[test]
    fn test_finite_diff_random_point() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let x_val: Real = rng.gen_range(-2.0..2.0);
        let y_val: Real = rng.gen_range(0.5..2.0); // positive for log

        // exp(x) * log(y) + sin(x*y), then tanh of the result
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, x_val);
        let y = Active::new(&mut stack, y_val);
        let u = Active::from_expression(&mut stack, x.exp() * y.log() + (&x * &y).sin());
        let z = Active::from_expression(&mut stack, u.tanh());

        stack.begin_backward_pass(&[(z.gradient_index(), 1.0)]);
        stack.compute_adjoint();

        let f = |v: &[Real]| (v[0].exp() * v[1].ln() + (v[0] * v[1]).sin()).tanh();
        let fd = finite_diff_grad(f, &[x_val, y_val], 1e-7);

        assert!(
            (x.gradient(&stack) - fd[0]).abs() < 1e-5,
            "dz/dx mismatch: autodiff={}, fd={}",
            x.gradient(&stack),
            fd[0]
        );
        assert!(
            (y.gradient(&stack) - fd[1]).abs() < 1e-5,
            "dz/dy mismatch: autodiff={}, fd={}",
            y.gradient(&stack),
            fd[1]
        );
    }

    #[test]
    fn test_every_unary_function_through_the_tape() {
        for func in UnaryFunc::ALL {
            if func.family() == DerivativeFamily::Constant {
                continue;
            }
            let x0 = match func {
                UnaryFunc::Acosh => 1.5,
                UnaryFunc::Log1p | UnaryFunc::Asin | UnaryFunc::Acos | UnaryFunc::Atanh => 0.3,
                _ => 0.7,
            };
            let (y, dx) = derivative_at(x0, |s, x| {
                Active::from_expression(s, UnaryOperation::new(func, x))
            });
            assert_eq!(y, func.apply(x0));
            let fd = finite_diff_derivative(|v| func.apply(v), x0, 1e-6);
            assert_relative_eq!(dx, fd, epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}
