//! Scalar active values.

use std::cell::Cell;
use std::fmt;

use crate::error::AdError;
use crate::expression::{Alignment, Expression, Extent};
use crate::scratch::Scratch;
use crate::shape::Shape;
use crate::stack::{GradientIndex, Stack};
use crate::Real;

/// A scalar tracked for differentiation.
///
/// Holds its current value and the gradient slot issued by the [`Stack`] it
/// was created on. Expressions borrow it (`&x * &y`), so it is deliberately
/// neither `Copy` nor `Clone`: two values sharing one slot would make the
/// tape ambiguous. The value sits in a `Cell` so `x.assign(stack, &x * 2.0)`
/// can read and overwrite `x` in one statement.
pub struct Active {
    value: Cell<Real>,
    index: GradientIndex,
}

impl Active {
    /// An independent variable. Registers a gradient slot; records nothing.
    pub fn new(stack: &mut Stack, value: Real) -> Self {
        Active {
            value: Cell::new(value),
            index: stack.register_gradient(),
        }
    }

    /// A fresh active value defined by `expr`, with one statement recording
    /// the partial derivatives of `expr` with respect to its active leaves.
    pub fn from_expression<E: Expression<Value = Real>>(stack: &mut Stack, expr: E) -> Self {
        let index = stack.register_gradient();
        let value = record_scalar(stack, &expr, index);
        Active {
            value: Cell::new(value),
            index,
        }
    }

    /// Overwrite this value with `expr`, reusing its gradient slot.
    ///
    /// `expr` may refer to `self`. An inactive `expr` records a statement
    /// without operations, which cuts the dependency on earlier values.
    pub fn assign<E: Expression<Value = Real>>(&self, stack: &mut Stack, expr: E) {
        let value = record_scalar(stack, &expr, self.index);
        self.value.set(value);
    }

    /// Change the value without recording anything.
    pub fn set_value(&self, value: Real) {
        self.value.set(value);
    }

    pub fn value(&self) -> Real {
        self.value.get()
    }

    pub fn gradient_index(&self) -> GradientIndex {
        self.index
    }

    /// Gradient accumulated for this value by the last backward pass.
    pub fn gradient(&self, stack: &Stack) -> Real {
        stack.gradient(self.index)
    }

    /// Seed this value's gradient slot.
    pub fn set_gradient(&self, stack: &mut Stack, gradient: Real) {
        stack.set_gradient(self.index, gradient);
    }
}

/// Evaluate a scalar expression, record its statement with `lhs` as the
/// assigned slot, and return the value.
pub(crate) fn record_scalar<E: Expression<Value = Real>>(
    stack: &mut Stack,
    expr: &E,
    lhs: GradientIndex,
) -> Real {
    let () = E::LAYOUT_OK;
    const { assert!(E::RANK == 0, "a scalar can only be assigned a rank-0 expression") };

    if !E::IS_ACTIVE {
        let value = expr.value_at_location(0, &[]);
        stack.push_lhs(lhs);
        return value;
    }

    let mut scratch = Scratch::new(E::N_SCRATCH);
    let value = expr.value_at_location_store(0, 0, &[], &mut scratch);
    if stack.is_recording() {
        stack.reserve(1, E::N_ACTIVE);
        expr.calc_gradient(stack, 0, 0, &[], &scratch, 1.0);
        stack.push_lhs(lhs);
    }
    value
}

impl fmt::Debug for Active {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Active({}, {})", self.value.get(), self.index)
    }
}

impl fmt::Display for Active {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.get())
    }
}

impl<'a> Expression for &'a Active {
    type Value = Real;

    const RANK: usize = 0;
    const IS_ACTIVE: bool = true;
    const N_ACTIVE: usize = 1;
    const N_SCRATCH: usize = 0;
    const N_ARRAYS: usize = 0;

    fn dimensions(&self) -> Result<Shape, AdError> {
        Ok(Shape::scalar())
    }

    fn expression_string(&self) -> String {
        format!("a[{}]", self.index.get())
    }

    // Scalars live outside any array storage.
    fn is_aliased(&self, _dest: &Extent) -> bool {
        false
    }

    fn overlaps(&self, _dest: &Extent) -> bool {
        false
    }

    fn all_arrays_contiguous(&self) -> bool {
        true
    }

    fn alignment_offset(&self, _packet: usize) -> Alignment {
        Alignment::Any
    }

    fn set_location(&self, _index: &[usize], _array_num: usize, _loc: &mut [usize]) {}

    fn advance_location(&self, _array_num: usize, _loc: &mut [usize]) {}

    #[inline]
    fn value_at_location(&self, _array_num: usize, _loc: &[usize]) -> Real {
        self.value.get()
    }

    #[inline]
    fn value_at_location_store(
        &self,
        _array_num: usize,
        _scratch_num: usize,
        _loc: &[usize],
        _scratch: &mut Scratch,
    ) -> Real {
        self.value.get()
    }

    #[inline]
    fn value_stored(
        &self,
        _array_num: usize,
        _scratch_num: usize,
        _loc: &[usize],
        _scratch: &Scratch,
    ) -> Real {
        self.value.get()
    }

    #[inline]
    fn calc_gradient(
        &self,
        stack: &mut Stack,
        _array_num: usize,
        _scratch_num: usize,
        _loc: &[usize],
        _scratch: &Scratch,
        multiplier: Real,
    ) {
        stack.push_rhs(multiplier, self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::ExpressionExt;
    use approx::assert_relative_eq;

    fn adjoint(stack: &mut Stack, output: &Active) {
        stack.begin_backward_pass(&[(output.gradient_index(), 1.0)]);
        stack.compute_adjoint();
    }

    #[test]
    fn test_independent_records_nothing() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 1.5);
        assert_eq!(x.value(), 1.5);
        assert!(stack.is_empty());
        assert_eq!(stack.n_gradients(), 1);
    }

    #[test]
    fn test_from_expression_records_one_statement() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 2.0);
        let y = Active::new(&mut stack, 3.0);
        let z = Active::from_expression(&mut stack, &x * &y + x.sin());

        assert_relative_eq!(z.value(), 6.0 + 2.0_f64.sin());
        assert_eq!(stack.n_statements(), 1);
        assert_eq!(stack.n_operations(), 3);

        adjoint(&mut stack, &z);
        assert_relative_eq!(x.gradient(&stack), 3.0 + 2.0_f64.cos());
        assert_relative_eq!(y.gradient(&stack), 2.0);
    }

    #[test]
    fn test_self_assignment() {
        // x1 = x0 * x0; x2 = 3 * x1  => dx2/dx0 = 6 x0
        let mut stack = Stack::new();
        let x0 = Active::new(&mut stack, 2.0);
        let x = Active::from_expression(&mut stack, &x0 * 1.0);
        x.assign(&mut stack, &x * &x);
        x.assign(&mut stack, 3.0 * &x);
        assert_eq!(x.value(), 12.0);

        adjoint(&mut stack, &x);
        assert_relative_eq!(x0.gradient(&stack), 12.0);
    }

    #[test]
    fn test_assign_constant_cuts_dependency() {
        let mut stack = Stack::new();
        let x0 = Active::new(&mut stack, 2.0);
        let x = Active::from_expression(&mut stack, &x0 * 5.0);
        x.assign(&mut stack, 7.0);
        assert_eq!(x.value(), 7.0);

        adjoint(&mut stack, &x);
        assert_eq!(x0.gradient(&stack), 0.0);
    }

    #[test]
    fn test_paused_recording_still_computes() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 4.0);
        stack.pause_recording();
        let y = Active::from_expression(&mut stack, x.sqrt());
        stack.continue_recording();
        assert_eq!(y.value(), 2.0);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_set_gradient_and_display() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.5);
        x.set_gradient(&mut stack, 2.0);
        assert_eq!(x.gradient(&stack), 2.0);
        x.set_value(0.75);
        assert_eq!(x.to_string(), "0.75");
        assert_eq!(format!("{:?}", x), "Active(0.75, g0)");
    }
}
