//! Two-operand numeric nodes.

use crate::error::AdError;
use crate::expression::{Alignment, Expression, Extent};
use crate::ops::BinaryFunc;
use crate::scratch::Scratch;
use crate::shape::Shape;
use crate::stack::Stack;
use crate::Real;

/// `func(left, right)` applied element-wise.
///
/// Scratch layout for scratch number `s`: own result at `s`, the left
/// subtree from `s + 1`, the right subtree after it. Array leaves of the
/// left operand come first in the location vector.
#[derive(Debug, Clone, Copy)]
pub struct BinaryOperation<L, R> {
    pub func: BinaryFunc,
    pub left: L,
    pub right: R,
}

impl<L, R> BinaryOperation<L, R> {
    pub fn new(func: BinaryFunc, left: L, right: R) -> Self {
        BinaryOperation { func, left, right }
    }
}

impl<L, R> Expression for BinaryOperation<L, R>
where
    L: Expression<Value = Real>,
    R: Expression<Value = Real>,
{
    type Value = Real;

    const RANK: usize = if L::RANK > R::RANK { L::RANK } else { R::RANK };
    const IS_ACTIVE: bool = L::IS_ACTIVE || R::IS_ACTIVE;
    const N_ACTIVE: usize = L::N_ACTIVE + R::N_ACTIVE;
    const N_SCRATCH: usize = if Self::IS_ACTIVE {
        1 + L::N_SCRATCH + R::N_SCRATCH
    } else {
        0
    };
    const N_ARRAYS: usize = L::N_ARRAYS + R::N_ARRAYS;

    fn dimensions(&self) -> Result<Shape, AdError> {
        self.left.dimensions()?.combine(&self.right.dimensions()?)
    }

    fn expression_string(&self) -> String {
        let l = self.left.expression_string();
        let r = self.right.expression_string();
        if self.func.is_operator() {
            format!("({} {} {})", l, self.func.name(), r)
        } else {
            format!("{}({}, {})", self.func.name(), l, r)
        }
    }

    fn is_aliased(&self, dest: &Extent) -> bool {
        self.left.is_aliased(dest) || self.right.is_aliased(dest)
    }

    fn overlaps(&self, dest: &Extent) -> bool {
        self.left.overlaps(dest) || self.right.overlaps(dest)
    }

    fn all_arrays_contiguous(&self) -> bool {
        self.left.all_arrays_contiguous() && self.right.all_arrays_contiguous()
    }

    fn alignment_offset(&self, packet: usize) -> Alignment {
        self.left
            .alignment_offset(packet)
            .combine(self.right.alignment_offset(packet))
    }

    fn set_location(&self, index: &[usize], array_num: usize, loc: &mut [usize]) {
        self.left.set_location(index, array_num, loc);
        self.right.set_location(index, array_num + L::N_ARRAYS, loc);
    }

    fn advance_location(&self, array_num: usize, loc: &mut [usize]) {
        self.left.advance_location(array_num, loc);
        self.right.advance_location(array_num + L::N_ARRAYS, loc);
    }

    #[inline]
    fn value_at_location(&self, array_num: usize, loc: &[usize]) -> Real {
        self.func.apply(
            self.left.value_at_location(array_num, loc),
            self.right.value_at_location(array_num + L::N_ARRAYS, loc),
        )
    }

    #[inline]
    fn value_at_location_store(
        &self,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &mut Scratch,
    ) -> Real {
        if !Self::IS_ACTIVE {
            return self.value_at_location(array_num, loc);
        }
        let l = self
            .left
            .value_at_location_store(array_num, scratch_num + 1, loc, scratch);
        let r = self.right.value_at_location_store(
            array_num + L::N_ARRAYS,
            scratch_num + 1 + L::N_SCRATCH,
            loc,
            scratch,
        );
        scratch.store(scratch_num, self.func.apply(l, r))
    }

    #[inline]
    fn value_stored(
        &self,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &Scratch,
    ) -> Real {
        if Self::IS_ACTIVE {
            scratch.load(scratch_num)
        } else {
            self.value_at_location(array_num, loc)
        }
    }

    fn calc_gradient(
        &self,
        stack: &mut Stack,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &Scratch,
        multiplier: Real,
    ) {
        if !Self::IS_ACTIVE {
            return;
        }
        let right_array = array_num + L::N_ARRAYS;
        let right_scratch = scratch_num + 1 + L::N_SCRATCH;

        let l = self
            .left
            .value_stored(array_num, scratch_num + 1, loc, scratch);
        let r = self
            .right
            .value_stored(right_array, right_scratch, loc, scratch);
        let y = scratch.load(scratch_num);
        let (dl, dr) = self.func.derivative(l, r, y);

        if L::IS_ACTIVE {
            self.left.calc_gradient(
                stack,
                array_num,
                scratch_num + 1,
                loc,
                scratch,
                multiplier * dl,
            );
        }
        if R::IS_ACTIVE {
            self.right.calc_gradient(
                stack,
                right_array,
                right_scratch,
                loc,
                scratch,
                multiplier * dr,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::Active;
    use crate::arith::ExpressionExt;
    use crate::expression::evaluate_scalar;

    fn n_scratch<E: Expression>(_: &E) -> usize {
        E::N_SCRATCH
    }

    #[test]
    fn test_scratch_layout() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.5);
        let y = Active::new(&mut stack, 1.5);

        // sin(x) * (y + 2): root, sin, add
        let expr = x.sin() * (&y + 2.0);
        assert_eq!(n_scratch(&expr), 3);
        // Constant operand: no slots for it.
        assert_eq!(n_scratch(&(&x * 3.0)), 1);
        assert_eq!(n_scratch(&(3.0 * &x)), 1);
    }

    #[test]
    fn test_scratch_round_trip() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.5);
        let y = Active::new(&mut stack, 1.5);
        let expr = (x.sin() * y.exp()).pow(&x - 0.25) / x.cos().max(y.tanh());
        let n = n_scratch(&expr);

        let mut scratch = Scratch::new(n);
        let v = expr.value_at_location_store(0, 0, &[], &mut scratch);
        assert_eq!(scratch.written_count(), n);
        assert_eq!(v, evaluate_scalar(&expr));

        expr.calc_gradient(&mut stack, 0, 0, &[], &scratch, 1.0);
        assert_eq!(scratch.read_count(), n);
    }

    #[test]
    fn test_expression_strings() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.5);
        let y = Active::new(&mut stack, 1.5);
        let (i, j) = (x.gradient_index().get(), y.gradient_index().get());

        assert_eq!(
            (&x * &y).expression_string(),
            format!("(a[{i}] * a[{j}])")
        );
        assert_eq!(
            x.atan2(2.0).expression_string(),
            format!("atan2(a[{i}], 2)")
        );
        assert_eq!(
            (x.sin() + &y).expression_string(),
            format!("(sin(a[{i}]) + a[{j}])")
        );
    }

    #[test]
    fn test_only_active_operands_receive_gradients() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 2.0);
        let before = stack.n_operations();

        let _z = Active::from_expression(&mut stack, &x * 4.0 + 1.0);
        assert_eq!(stack.n_operations() - before, 1);
    }
}
