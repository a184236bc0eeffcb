//! Boolean-valued nodes.
//!
//! Predicates and comparisons are not differentiable. Their nodes are
//! inactive whatever their operands are: they take no scratch slots and push
//! nothing onto the tape.

use crate::error::AdError;
use crate::expression::{Alignment, Expression, Extent};
use crate::ops::{CompareFunc, PredicateFunc};
use crate::scratch::Scratch;
use crate::shape::Shape;
use crate::stack::Stack;
use crate::Real;

/// `isnan(arg)` and friends.
#[derive(Debug, Clone, Copy)]
pub struct UnaryBoolOperation<R> {
    pub func: PredicateFunc,
    pub arg: R,
}

impl<R> UnaryBoolOperation<R> {
    pub fn new(func: PredicateFunc, arg: R) -> Self {
        UnaryBoolOperation { func, arg }
    }
}

impl<R: Expression<Value = Real>> Expression for UnaryBoolOperation<R> {
    type Value = bool;

    const RANK: usize = R::RANK;
    const IS_ACTIVE: bool = false;
    const N_ACTIVE: usize = 0;
    const N_SCRATCH: usize = 0;
    const N_ARRAYS: usize = R::N_ARRAYS;

    fn dimensions(&self) -> Result<Shape, AdError> {
        self.arg.dimensions()
    }

    fn expression_string(&self) -> String {
        format!("{}({})", self.func.name(), self.arg.expression_string())
    }

    fn is_aliased(&self, dest: &Extent) -> bool {
        self.arg.is_aliased(dest)
    }

    fn overlaps(&self, dest: &Extent) -> bool {
        self.arg.overlaps(dest)
    }

    fn all_arrays_contiguous(&self) -> bool {
        self.arg.all_arrays_contiguous()
    }

    fn alignment_offset(&self, packet: usize) -> Alignment {
        self.arg.alignment_offset(packet)
    }

    fn set_location(&self, index: &[usize], array_num: usize, loc: &mut [usize]) {
        self.arg.set_location(index, array_num, loc)
    }

    fn advance_location(&self, array_num: usize, loc: &mut [usize]) {
        self.arg.advance_location(array_num, loc)
    }

    #[inline]
    fn value_at_location(&self, array_num: usize, loc: &[usize]) -> bool {
        self.func.apply(self.arg.value_at_location(array_num, loc))
    }

    fn value_at_location_store(
        &self,
        array_num: usize,
        _scratch_num: usize,
        loc: &[usize],
        _scratch: &mut Scratch,
    ) -> bool {
        self.value_at_location(array_num, loc)
    }

    fn value_stored(
        &self,
        array_num: usize,
        _scratch_num: usize,
        loc: &[usize],
        _scratch: &Scratch,
    ) -> bool {
        self.value_at_location(array_num, loc)
    }

    fn calc_gradient(
        &self,
        _stack: &mut Stack,
        _array_num: usize,
        _scratch_num: usize,
        _loc: &[usize],
        _scratch: &Scratch,
        _multiplier: Real,
    ) {
    }
}

/// `left < right` and friends.
#[derive(Debug, Clone, Copy)]
pub struct BinaryBoolOperation<L, R> {
    pub func: CompareFunc,
    pub left: L,
    pub right: R,
}

impl<L, R> BinaryBoolOperation<L, R> {
    pub fn new(func: CompareFunc, left: L, right: R) -> Self {
        BinaryBoolOperation { func, left, right }
    }
}

impl<L, R> Expression for BinaryBoolOperation<L, R>
where
    L: Expression<Value = Real>,
    R: Expression<Value = Real>,
{
    type Value = bool;

    const RANK: usize = if L::RANK > R::RANK { L::RANK } else { R::RANK };
    const IS_ACTIVE: bool = false;
    const N_ACTIVE: usize = 0;
    const N_SCRATCH: usize = 0;
    const N_ARRAYS: usize = L::N_ARRAYS + R::N_ARRAYS;

    fn dimensions(&self) -> Result<Shape, AdError> {
        self.left.dimensions()?.combine(&self.right.dimensions()?)
    }

    fn expression_string(&self) -> String {
        format!(
            "({} {} {})",
            self.left.expression_string(),
            self.func.name(),
            self.right.expression_string()
        )
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
    fn value_at_location(&self, array_num: usize, loc: &[usize]) -> bool {
        self.func.apply(
            self.left.value_at_location(array_num, loc),
            self.right.value_at_location(array_num + L::N_ARRAYS, loc),
        )
    }

    fn value_at_location_store(
        &self,
        array_num: usize,
        _scratch_num: usize,
        loc: &[usize],
        _scratch: &mut Scratch,
    ) -> bool {
        self.value_at_location(array_num, loc)
    }

    fn value_stored(
        &self,
        array_num: usize,
        _scratch_num: usize,
        loc: &[usize],
        _scratch: &Scratch,
    ) -> bool {
        self.value_at_location(array_num, loc)
    }

    fn calc_gradient(
        &self,
        _stack: &mut Stack,
        _array_num: usize,
        _scratch_num: usize,
        _loc: &[usize],
        _scratch: &Scratch,
        _multiplier: Real,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::Active;
    use crate::arith::ExpressionExt;
    use crate::expression::evaluate_scalar;

    fn activity<E: Expression>(_: &E) -> (bool, usize, usize) {
        (E::IS_ACTIVE, E::N_ACTIVE, E::N_SCRATCH)
    }

    #[test]
    fn test_predicates_over_active_operands_are_inactive() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 1.0);

        assert_eq!(activity(&x.is_nan()), (false, 0, 0));
        assert_eq!(activity(&(&x * &x).is_finite()), (false, 0, 0));
        assert_eq!(activity(&x.sin().less(&x)), (false, 0, 0));
    }

    #[test]
    fn test_predicates_push_nothing() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.0);

        let inf = x.log().is_inf();
        let mut scratch = Scratch::new(0);
        assert!(inf.value_at_location_store(0, 0, &[], &mut scratch));
        inf.calc_gradient(&mut stack, 0, 0, &[], &scratch, 1.0);

        assert!(evaluate_scalar(&x.log().is_inf()));
        assert!(!evaluate_scalar(&x.is_nan()));
        assert!(evaluate_scalar(&x.greater_equal(0.0)));
        assert_eq!(stack.n_operations(), 0);
        assert_eq!(stack.n_statements(), 0);
    }

    #[test]
    fn test_expression_strings() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.0);
        let i = x.gradient_index().get();
        assert_eq!(x.is_finite().expression_string(), format!("isfinite(a[{i}])"));
        assert_eq!(
            x.not_equal(1.0).expression_string(),
            format!("(a[{i}] != 1)")
        );
    }
}
