//! Single-operand nodes: elementary functions and the `noalias` wrapper.

use crate::error::AdError;
use crate::expression::{Alignment, Expression, Extent};
use crate::ops::UnaryFunc;
use crate::scratch::Scratch;
use crate::shape::Shape;
use crate::stack::Stack;
use crate::Real;

/// `func(arg)` applied element-wise.
#[derive(Debug, Clone, Copy)]
pub struct UnaryOperation<R> {
    pub func: UnaryFunc,
    pub arg: R,
}

impl<R> UnaryOperation<R> {
    pub fn new(func: UnaryFunc, arg: R) -> Self {
        UnaryOperation { func, arg }
    }
}

impl<R: Expression<Value = Real>> Expression for UnaryOperation<R> {
    type Value = Real;

    const RANK: usize = R::RANK;
    const IS_ACTIVE: bool = R::IS_ACTIVE;
    const N_ACTIVE: usize = R::N_ACTIVE;
    // Own result, then the operand's slots.
    const N_SCRATCH: usize = if R::IS_ACTIVE { 1 + R::N_SCRATCH } else { 0 };
    const N_ARRAYS: usize = R::N_ARRAYS;

    fn dimensions(&self) -> Result<Shape, AdError> {
        self.arg.dimensions()
    }

    fn expression_string(&self) -> String {
        if self.func.is_operator() {
            format!("{}{}", self.func.name(), self.arg.expression_string())
        } else {
            format!("{}({})", self.func.name(), self.arg.expression_string())
        }
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
    fn value_at_location(&self, array_num: usize, loc: &[usize]) -> Real {
        self.func.apply(self.arg.value_at_location(array_num, loc))
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
        let x = self
            .arg
            .value_at_location_store(array_num, scratch_num + 1, loc, scratch);
        scratch.store(scratch_num, self.func.apply(x))
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
        if !R::IS_ACTIVE {
            return;
        }
        let x = self.arg.value_stored(array_num, scratch_num + 1, loc, scratch);
        let y = scratch.load(scratch_num);
        self.arg.calc_gradient(
            stack,
            array_num,
            scratch_num + 1,
            loc,
            scratch,
            multiplier * self.func.derivative(x, y),
        );
    }
}

/// Caller's assertion that `arg` does not share memory with the destination
/// of the assignment it appears in.
///
/// Values and gradients pass through untouched; only the alias query changes,
/// which lets the assignment skip its defensive temporary. The assertion is
/// trusted: if it is false the result is wrong, though memory-safe.
#[derive(Debug, Clone, Copy)]
pub struct NoAlias<R> {
    pub arg: R,
}

impl<R> NoAlias<R> {
    pub fn new(arg: R) -> Self {
        NoAlias { arg }
    }
}

/// Wrap `expr` in a [`NoAlias`] assertion.
pub fn noalias<R: Expression>(expr: R) -> NoAlias<R> {
    NoAlias::new(expr)
}

impl<R: Expression> Expression for NoAlias<R> {
    type Value = R::Value;

    const RANK: usize = R::RANK;
    const IS_ACTIVE: bool = R::IS_ACTIVE;
    const N_ACTIVE: usize = R::N_ACTIVE;
    // No slot of its own: the operand's value is the wrapper's value.
    const N_SCRATCH: usize = R::N_SCRATCH;
    const N_ARRAYS: usize = R::N_ARRAYS;

    fn dimensions(&self) -> Result<Shape, AdError> {
        self.arg.dimensions()
    }

    fn expression_string(&self) -> String {
        format!("noalias({})", self.arg.expression_string())
    }

    fn is_aliased(&self, _dest: &Extent) -> bool {
        false
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
    fn value_at_location(&self, array_num: usize, loc: &[usize]) -> R::Value {
        self.arg.value_at_location(array_num, loc)
    }

    #[inline]
    fn value_at_location_store(
        &self,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &mut Scratch,
    ) -> R::Value {
        self.arg
            .value_at_location_store(array_num, scratch_num, loc, scratch)
    }

    #[inline]
    fn value_stored(
        &self,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &Scratch,
    ) -> R::Value {
        self.arg.value_stored(array_num, scratch_num, loc, scratch)
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
        self.arg
            .calc_gradient(stack, array_num, scratch_num, loc, scratch, multiplier)
    }
}
