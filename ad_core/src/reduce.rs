//! Reductions of an expression to a scalar.
//!
//! A reduction produces one active result whose statement carries one
//! operation per contributing active element, so `sum(x * y)` over n
//! elements records n·2 operations and a single statement.

use log::trace;

use crate::active::Active;
use crate::error::AdError;
use crate::expression::{for_each_location, Expression};
use crate::scratch::Scratch;
use crate::stack::Stack;
use crate::Real;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    Sum,
    Mean,
    Product,
    /// Euclidean norm.
    Norm2,
    MaxVal,
    MinVal,
}

impl Reduction {
    pub fn name(self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Mean => "mean",
            Reduction::Product => "product",
            Reduction::Norm2 => "norm2",
            Reduction::MaxVal => "maxval",
            Reduction::MinVal => "minval",
        }
    }

    /// Result of reducing `values`, and the partial derivative of the result
    /// with respect to each of them.
    fn evaluate(self, values: &[Real]) -> (Real, Vec<Real>) {
        let n = values.len();
        match self {
            Reduction::Sum => (values.iter().sum(), vec![1.0; n]),
            Reduction::Mean => {
                let scale = 1.0 / n as Real;
                (values.iter().sum::<Real>() * scale, vec![scale; n])
            }
            Reduction::Product => {
                // prefix[i] * suffix[i + 1] is the product of all but values[i],
                // which stays correct when some values are zero.
                let mut prefix = vec![1.0; n + 1];
                for i in 0..n {
                    prefix[i + 1] = prefix[i] * values[i];
                }
                let mut suffix = vec![1.0; n + 1];
                for i in (0..n).rev() {
                    suffix[i] = suffix[i + 1] * values[i];
                }
                let partials = (0..n).map(|i| prefix[i] * suffix[i + 1]).collect();
                (prefix[n], partials)
            }
            Reduction::Norm2 => {
                let r = values.iter().map(|v| v * v).sum::<Real>().sqrt();
                let partials = values
                    .iter()
                    .map(|&v| if r == 0.0 { 0.0 } else { v / r })
                    .collect();
                (r, partials)
            }
            Reduction::MaxVal => select(values, Real::NEG_INFINITY, |v, best| v > best),
            Reduction::MinVal => select(values, Real::INFINITY, |v, best| v < best),
        }
    }
}

/// Extremum of `values`; the whole derivative goes to its first occurrence.
fn select(values: &[Real], init: Real, better: impl Fn(Real, Real) -> bool) -> (Real, Vec<Real>) {
    let mut best = init;
    let mut position = None;
    for (i, &v) in values.iter().enumerate() {
        if better(v, best) {
            best = v;
            position = Some(i);
        }
    }
    let mut partials = vec![0.0; values.len()];
    if let Some(i) = position {
        partials[i] = 1.0;
    }
    (best, partials)
}

/// Element values of `expr` in row-major order.
fn collect_values<E: Expression>(expr: &E) -> Result<Vec<E::Value>, AdError> {
    let shape = expr.dimensions()?;
    let mut values = Vec::with_capacity(shape.numel());
    for_each_location(expr, &shape, |_, loc| values.push(expr.value_at_location(0, loc)));
    Ok(values)
}

/// Reduce `expr` to a new active scalar on `stack`.
pub fn reduce<E: Expression<Value = Real>>(
    stack: &mut Stack,
    kind: Reduction,
    expr: E,
) -> Result<Active, AdError> {
    let () = E::LAYOUT_OK;
    let shape = expr.dimensions()?;
    let values = collect_values(&expr)?;
    let (result, partials) = kind.evaluate(&values);

    let out = Active::new(stack, result);
    if E::IS_ACTIVE && stack.is_recording() {
        trace!(
            "{} over {} elements of {}",
            kind.name(),
            values.len(),
            expr.expression_string()
        );
        stack.reserve(1, values.len() * E::N_ACTIVE);
        let mut scratch = Scratch::new(E::N_SCRATCH);
        let mut k = 0;
        for_each_location(&expr, &shape, |_, loc| {
            let multiplier = partials[k];
            k += 1;
            if multiplier == 0.0 {
                return;
            }
            scratch.reset();
            expr.value_at_location_store(0, 0, loc, &mut scratch);
            expr.calc_gradient(stack, 0, 0, loc, &scratch, multiplier);
        });
        stack.push_lhs(out.gradient_index());
    }
    Ok(out)
}

/// Passive counterpart of [`reduce`]: the value only, nothing recorded.
pub fn reduce_value<E: Expression<Value = Real>>(kind: Reduction, expr: E) -> Result<Real, AdError> {
    let () = E::LAYOUT_OK;
    Ok(kind.evaluate(&collect_values(&expr)?).0)
}

pub fn sum<E: Expression<Value = Real>>(stack: &mut Stack, expr: E) -> Result<Active, AdError> {
    reduce(stack, Reduction::Sum, expr)
}

pub fn mean<E: Expression<Value = Real>>(stack: &mut Stack, expr: E) -> Result<Active, AdError> {
    reduce(stack, Reduction::Mean, expr)
}

pub fn product<E: Expression<Value = Real>>(stack: &mut Stack, expr: E) -> Result<Active, AdError> {
    reduce(stack, Reduction::Product, expr)
}

pub fn norm2<E: Expression<Value = Real>>(stack: &mut Stack, expr: E) -> Result<Active, AdError> {
    reduce(stack, Reduction::Norm2, expr)
}

pub fn maxval<E: Expression<Value = Real>>(stack: &mut Stack, expr: E) -> Result<Active, AdError> {
    reduce(stack, Reduction::MaxVal, expr)
}

pub fn minval<E: Expression<Value = Real>>(stack: &mut Stack, expr: E) -> Result<Active, AdError> {
    reduce(stack, Reduction::MinVal, expr)
}

/// Whether any element of a predicate expression holds. False when empty.
pub fn any<E: Expression<Value = bool>>(expr: E) -> Result<bool, AdError> {
    Ok(collect_values(&expr)?.into_iter().any(|b| b))
}

/// Whether every element of a predicate expression holds. True when empty.
pub fn all<E: Expression<Value = bool>>(expr: E) -> Result<bool, AdError> {
    Ok(collect_values(&expr)?.into_iter().all(|b| b))
}

/// Number of elements for which a predicate expression holds.
pub fn count<E: Expression<Value = bool>>(expr: E) -> Result<usize, AdError> {
    Ok(collect_values(&expr)?.into_iter().filter(|&b| b).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::ExpressionExt;
    use approx::assert_relative_eq;

    #[test]
    fn test_partials() {
        let (p, dp) = Reduction::Product.evaluate(&[2.0, 0.0, 5.0]);
        assert_eq!(p, 0.0);
        assert_eq!(dp, vec![0.0, 10.0, 0.0]);

        let (r, dr) = Reduction::Norm2.evaluate(&[3.0, 4.0]);
        assert_eq!(r, 5.0);
        assert_eq!(dr, vec![0.6, 0.8]);

        let (m, dm) = Reduction::MaxVal.evaluate(&[1.0, 7.0, 7.0]);
        assert_eq!(m, 7.0);
        assert_eq!(dm, vec![0.0, 1.0, 0.0]);

        let (m, dm) = Reduction::MinVal.evaluate(&[4.0, -1.0, 3.0]);
        assert_eq!(m, -1.0);
        assert_eq!(dm, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Reduction::Sum.evaluate(&[]).0, 0.0);
        assert_eq!(Reduction::Product.evaluate(&[]).0, 1.0);
        assert_eq!(Reduction::Norm2.evaluate(&[]).0, 0.0);
        assert!(Reduction::Mean.evaluate(&[]).0.is_nan());
        assert_eq!(Reduction::MaxVal.evaluate(&[]).0, Real::NEG_INFINITY);
        assert_eq!(Reduction::MinVal.evaluate(&[]).0, Real::INFINITY);
    }

    #[test]
    fn test_norm2_of_zero_has_zero_gradient() {
        let (_, d) = Reduction::Norm2.evaluate(&[0.0, 0.0]);
        assert_eq!(d, vec![0.0, 0.0]);
    }

    #[test]
    fn test_scalar_reduction_records_one_statement() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 3.0);
        let s = product(&mut stack, x.sin() * &x).unwrap();
        assert_relative_eq!(s.value(), 3.0 * 3.0_f64.sin());
        assert_eq!(stack.n_statements(), 1);

        stack.begin_backward_pass(&[(s.gradient_index(), 1.0)]);
        stack.compute_adjoint();
        assert_relative_eq!(
            x.gradient(&stack),
            3.0_f64.sin() + 3.0 * 3.0_f64.cos(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_passive_and_bool_reductions() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, -2.0);
        assert_eq!(reduce_value(Reduction::Norm2, &x).unwrap(), 2.0);
        assert!(any(x.less(0.0)).unwrap());
        assert!(!all(x.is_nan()).unwrap());
        assert_eq!(count(x.is_finite()).unwrap(), 1);
        assert!(stack.is_empty());
    }
}
