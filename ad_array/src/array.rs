//! Strided N-dimensional arrays that take part in expressions.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use ad_core::{
    for_each_location, for_each_location_contiguous, for_each_location_packets,
    impl_expression_ops, AdError, Alignment, Expression, Extent, GradientIndex, Real, Scratch,
    Shape, Stack,
};
use log::{debug, trace};

use crate::storage::Storage;

/// Array of rank `R`. Active arrays (`A = true`) own one gradient slot per
/// storage element.
///
/// Handles are views: [`link`](Array::link) and the slicing methods return
/// new handles onto the same storage, so an assignment through one handle is
/// visible through the others, and an expression may read memory its
/// destination writes. [`assign`](Array::assign) detects such overlap and
/// evaluates through a temporary.
pub struct Array<const R: usize, const A: bool> {
    storage: Rc<Storage>,
    dims: [usize; R],
    strides: [usize; R],
    offset: usize,
}

/// Elements per packet for the aligned contiguous walk.
const PACKET: usize = 4;

/// How an assignment visits its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    /// Contiguous, with every array at the same offset within a packet.
    /// `head` elements precede the first packet boundary.
    Packets { head: usize },
    Contiguous,
    Rows,
}

pub type Vector = Array<1, false>;
pub type Matrix = Array<2, false>;
pub type Array3 = Array<3, false>;
pub type ActiveVector = Array<1, true>;
pub type ActiveMatrix = Array<2, true>;
pub type ActiveArray3 = Array<3, true>;

fn row_major_strides<const R: usize>(dims: &[usize; R]) -> [usize; R] {
    let mut strides = [1usize; R];
    for i in (0..R.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

fn check_data_len<const R: usize>(len: usize, dims: &[usize; R]) -> Result<(), AdError> {
    let expected = dims.iter().product::<usize>();
    if len != expected {
        return Err(AdError::DataLength {
            expected,
            actual: len,
        });
    }
    Ok(())
}

impl<const R: usize, const A: bool> Array<R, A> {
    fn from_parts(values: Vec<Real>, dims: [usize; R], gradient_base: Option<GradientIndex>) -> Self {
        Array {
            storage: Rc::new(Storage::new(values, gradient_base)),
            dims,
            strides: row_major_strides(&dims),
            offset: 0,
        }
    }

    pub fn dims(&self) -> [usize; R] {
        self.dims
    }

    pub fn shape(&self) -> Shape {
        Shape::from(&self.dims[..])
    }

    /// Number of elements viewed by this handle.
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_active(&self) -> bool {
        A
    }

    /// Storage position of a multi-index, unchecked.
    #[inline]
    fn position_of(&self, index: &[usize]) -> usize {
        self.offset
            + index
                .iter()
                .zip(&self.strides)
                .map(|(i, s)| i * s)
                .sum::<usize>()
    }

    fn position(&self, index: [usize; R]) -> usize {
        for axis in 0..R {
            assert!(
                index[axis] < self.dims[axis],
                "index {:?} out of bounds for dimensions {:?}",
                index,
                self.dims
            );
        }
        self.position_of(&index)
    }

    /// Storage positions of every element, in row-major order.
    fn positions(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len());
        for_each_location(&self, &self.shape(), |_, loc| out.push(loc[0]));
        out
    }

    /// Element value.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn get(&self, index: [usize; R]) -> Real {
        self.storage.get(self.position(index))
    }

    /// Overwrite one element without recording anything.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn set(&self, index: [usize; R], value: Real) {
        self.storage.set(self.position(index), value)
    }

    /// Element values in row-major order.
    pub fn to_vec(&self) -> Vec<Real> {
        self.positions()
            .into_iter()
            .map(|p| self.storage.get(p))
            .collect()
    }

    /// A second handle onto the same elements.
    pub fn link(&self) -> Self {
        Array {
            storage: Rc::clone(&self.storage),
            dims: self.dims,
            strides: self.strides,
            offset: self.offset,
        }
    }

    /// View of `range` along `axis`.
    pub fn slice(&self, axis: usize, range: Range<usize>) -> Result<Self, AdError> {
        self.slice_step(axis, range, 1)
    }

    /// View of every `step`-th element of `range` along `axis`.
    pub fn slice_step(&self, axis: usize, range: Range<usize>, step: usize) -> Result<Self, AdError> {
        if axis >= R {
            return Err(AdError::InvalidAxis { axis, rank: R });
        }
        if step == 0 {
            return Err(AdError::InvalidStep);
        }
        let len = self.dims[axis];
        if range.start > range.end || range.end > len {
            return Err(AdError::InvalidSlice {
                axis,
                start: range.start,
                end: range.end,
                len,
            });
        }

        let mut dims = self.dims;
        let mut strides = self.strides;
        dims[axis] = (range.end - range.start).div_ceil(step);
        strides[axis] *= step;
        Ok(Array {
            storage: Rc::clone(&self.storage),
            dims,
            strides,
            offset: self.offset + range.start * self.strides[axis],
        })
    }

    /// Whether the viewed elements are adjacent in row-major order.
    pub fn is_contiguous(&self) -> bool {
        self.strides == row_major_strides(&self.dims)
    }

    /// Memory spanned by the viewed elements.
    pub fn extent(&self) -> Extent {
        if self.is_empty() {
            return Extent::empty();
        }
        let last = self.offset
            + self
                .dims
                .iter()
                .zip(&self.strides)
                .map(|(d, s)| (d - 1) * s)
                .sum::<usize>();
        Extent::spanning(self.storage.address(self.offset), self.storage.address(last))
    }

    /// Gradient slot of one element; `None` for passive arrays.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn gradient_index(&self, index: [usize; R]) -> Option<GradientIndex> {
        self.storage.gradient_index(self.position(index))
    }

    /// A passive deep copy of the values.
    pub fn to_inactive(&self) -> Array<R, false> {
        Array::from_parts(self.to_vec(), self.dims, None)
    }

    /// Compile-time and shape checks shared by every assignment.
    fn check_assignment<E: Expression<Value = Real>>(&self, expr: &E) -> Result<(), AdError> {
        let () = E::LAYOUT_OK;
        const {
            assert!(
                E::RANK == R || E::RANK == 0,
                "expression rank differs from the array rank"
            )
        };
        let shape = expr.dimensions()?;
        if !shape.conforms_to(&self.dims) {
            return Err(AdError::ShapeMismatch {
                left: self.shape(),
                right: shape,
            });
        }
        Ok(())
    }

    #[cfg(feature = "noalias-checking")]
    fn verify_no_overlap<E: Expression>(&self, expr: &E) -> Result<(), AdError> {
        if expr.overlaps(&self.extent()) {
            return Err(AdError::AliasViolation {
                expression: expr.expression_string(),
            });
        }
        Ok(())
    }

    /// Evaluate `expr` straight into the viewed elements, recording one
    /// statement per element when this array is active and `stack` is given.
    ///
    /// Only valid when `expr` does not read memory this array writes.
    fn write_elements<E: Expression<Value = Real>>(&self, mut stack: Option<&mut Stack>, expr: &E) {
        let record = E::IS_ACTIVE && stack.as_deref().is_some_and(Stack::is_recording);
        let n = self.len();
        if record {
            if let Some(stack) = stack.as_deref_mut() {
                stack.reserve(n, n * E::N_ACTIVE);
            }
        }

        let mut scratch = Scratch::new(if record { E::N_SCRATCH } else { 0 });
        let mut element = |position: usize, loc: &[usize]| {
            let value = match stack.as_deref_mut() {
                Some(stack) if record => {
                    scratch.reset();
                    let value = expr.value_at_location_store(0, 0, loc, &mut scratch);
                    expr.calc_gradient(stack, 0, 0, loc, &scratch, 1.0);
                    value
                }
                _ => expr.value_at_location(0, loc),
            };
            self.storage.set(position, value);
            if let (Some(stack), Some(g)) =
                (stack.as_deref_mut(), self.storage.gradient_index(position))
            {
                stack.push_lhs(g);
            }
        };

        let offset = self.offset;
        match self.plan_walk(expr) {
            Walk::Packets { head } => {
                trace!("packet walk over {} elements, head {}", n, head);
                for_each_location_packets::<PACKET, _, _>(expr, R, n, head, |k, loc| {
                    element(offset + k, loc)
                });
            }
            Walk::Contiguous => {
                trace!("contiguous walk over {} elements", n);
                for_each_location_contiguous(expr, R, n, |k, loc| element(offset + k, loc));
            }
            Walk::Rows => {
                trace!("row walk over {:?}", self.dims);
                for_each_location(expr, &self.shape(), |index, loc| {
                    element(self.position_of(index), loc)
                });
            }
        }
    }

    fn plan_walk<E: Expression>(&self, expr: &E) -> Walk {
        if !(self.is_contiguous() && expr.all_arrays_contiguous()) {
            return Walk::Rows;
        }
        match self
            .alignment_offset(PACKET)
            .combine(expr.alignment_offset(PACKET))
        {
            Alignment::Offset(k) => Walk::Packets {
                head: (PACKET - k) % PACKET,
            },
            _ => Walk::Contiguous,
        }
    }
}

impl<const R: usize> Array<R, false> {
    pub fn from_vec(data: Vec<Real>, dims: [usize; R]) -> Result<Self, AdError> {
        check_data_len(data.len(), &dims)?;
        Ok(Self::from_parts(data, dims, None))
    }

    pub fn zeros(dims: [usize; R]) -> Self {
        Self::full(dims, 0.0)
    }

    pub fn full(dims: [usize; R], value: Real) -> Self {
        let n = dims.iter().product();
        Self::from_parts(vec![value; n], dims, None)
    }

    /// A new array holding the values of `expr`.
    pub fn from_expression<E: Expression<Value = Real>>(expr: E) -> Result<Self, AdError> {
        const { assert!(E::RANK == R, "expression rank differs from the array rank") };
        let dims = expr.dimensions()?;
        let dims = <[usize; R]>::try_from(dims.dims()).map_err(|_| AdError::ShapeMismatch {
            left: Shape::new(vec![0; R]),
            right: dims.clone(),
        })?;
        let array = Self::zeros(dims);
        array.assign_value(expr)?;
        Ok(array)
    }

    /// Overwrite the elements with the values of a passive expression.
    ///
    /// On error the array is untouched.
    pub fn assign_value<E: Expression<Value = Real>>(&self, expr: E) -> Result<(), AdError> {
        const {
            assert!(
                !E::IS_ACTIVE,
                "an active expression cannot be assigned to an inactive array"
            )
        };
        self.check_assignment(&expr)?;

        if expr.is_aliased(&self.extent()) {
            trace!("aliased: {} through a temporary", expr.expression_string());
            let temp = Self::zeros(self.dims);
            temp.write_elements(None, &expr);
            for (dest, value) in self.positions().into_iter().zip(temp.to_vec()) {
                self.storage.set(dest, value);
            }
            return Ok(());
        }

        #[cfg(feature = "noalias-checking")]
        self.verify_no_overlap(&expr)?;

        self.write_elements(None, &expr);
        Ok(())
    }
}

impl<const R: usize> Clone for Array<R, false> {
    /// Deep copy. Use [`link`](Array::link) to share the elements.
    fn clone(&self) -> Self {
        self.to_inactive()
    }
}

impl<const R: usize> Array<R, true> {
    fn register(stack: &mut Stack, values: Vec<Real>, dims: [usize; R]) -> Self {
        let base = stack.register_gradients(values.len());
        debug!("active array {:?} with gradients from {}", dims, base);
        Self::from_parts(values, dims, Some(base))
    }

    pub fn from_vec(stack: &mut Stack, data: Vec<Real>, dims: [usize; R]) -> Result<Self, AdError> {
        check_data_len(data.len(), &dims)?;
        Ok(Self::register(stack, data, dims))
    }

    pub fn zeros(stack: &mut Stack, dims: [usize; R]) -> Self {
        Self::full(stack, dims, 0.0)
    }

    pub fn full(stack: &mut Stack, dims: [usize; R], value: Real) -> Self {
        let n = dims.iter().product();
        Self::register(stack, vec![value; n], dims)
    }

    /// A new active array defined by `expr`, sized to its dimensions.
    pub fn from_expression<E: Expression<Value = Real>>(
        stack: &mut Stack,
        expr: E,
    ) -> Result<Self, AdError> {
        const { assert!(E::RANK == R, "expression rank differs from the array rank") };
        let dims = expr.dimensions()?;
        let dims = <[usize; R]>::try_from(dims.dims()).map_err(|_| AdError::ShapeMismatch {
            left: Shape::new(vec![0; R]),
            right: dims.clone(),
        })?;
        let array = Self::zeros(stack, dims);
        array.check_assignment(&expr)?;
        array.write_elements(Some(stack), &expr);
        Ok(array)
    }

    /// Overwrite the elements with `expr`, recording one statement per
    /// element. Gradient slots are reused.
    ///
    /// `expr` may read the elements being written, through this handle or any
    /// other. Unless the overlap is disclaimed with `noalias`, the values are
    /// first evaluated into a temporary. On error the array is untouched.
    pub fn assign<E: Expression<Value = Real>>(&self, stack: &mut Stack, expr: E) -> Result<(), AdError> {
        self.check_assignment(&expr)?;

        if expr.is_aliased(&self.extent()) {
            trace!("aliased: {} through a temporary", expr.expression_string());
            let base = if E::IS_ACTIVE && stack.is_recording() {
                Some(stack.register_gradients(self.len()))
            } else {
                None
            };
            let temp = Self::from_parts(vec![0.0; self.len()], self.dims, base);
            temp.write_elements(Some(&mut *stack), &expr);

            for (k, dest) in self.positions().into_iter().enumerate() {
                self.storage.set(dest, temp.storage.get(k));
                if let Some(g) = temp.storage.gradient_index(k) {
                    stack.push_rhs(1.0, g);
                }
                if let Some(g) = self.storage.gradient_index(dest) {
                    stack.push_lhs(g);
                }
            }
            return Ok(());
        }

        #[cfg(feature = "noalias-checking")]
        self.verify_no_overlap(&expr)?;

        self.write_elements(Some(stack), &expr);
        Ok(())
    }

    /// Gradients accumulated for the elements, in row-major order.
    pub fn gradients(&self, stack: &Stack) -> Vec<Real> {
        self.positions()
            .into_iter()
            .map(|p| {
                self.storage
                    .gradient_index(p)
                    .map_or(0.0, |g| stack.gradient(g))
            })
            .collect()
    }

    /// Seed the gradients of the elements, in row-major order.
    pub fn set_gradients(&self, stack: &mut Stack, values: &[Real]) -> Result<(), AdError> {
        check_data_len(values.len(), &self.dims)?;
        for (p, &value) in self.positions().into_iter().zip(values) {
            if let Some(g) = self.storage.gradient_index(p) {
                stack.set_gradient(g, value);
            }
        }
        Ok(())
    }
}

impl<'a, const R: usize, const A: bool> Expression for &'a Array<R, A> {
    type Value = Real;

    const RANK: usize = R;
    const IS_ACTIVE: bool = A;
    const N_ACTIVE: usize = A as usize;
    const N_SCRATCH: usize = 0;
    const N_ARRAYS: usize = 1;

    fn dimensions(&self) -> Result<Shape, AdError> {
        Ok(self.shape())
    }

    fn expression_string(&self) -> String {
        format!("{}Array{}", if A { "a" } else { "" }, R)
    }

    fn is_aliased(&self, dest: &Extent) -> bool {
        self.extent().overlaps(dest)
    }

    fn overlaps(&self, dest: &Extent) -> bool {
        self.extent().overlaps(dest)
    }

    fn all_arrays_contiguous(&self) -> bool {
        self.is_contiguous()
    }

    fn alignment_offset(&self, packet: usize) -> Alignment {
        let element = self.storage.address(self.offset) as usize / std::mem::size_of::<Real>();
        Alignment::Offset(element % packet.max(1))
    }

    #[inline]
    fn set_location(&self, index: &[usize], array_num: usize, loc: &mut [usize]) {
        loc[array_num] = self.position_of(index);
    }

    #[inline]
    fn advance_location(&self, array_num: usize, loc: &mut [usize]) {
        if R > 0 {
            loc[array_num] += self.strides[R - 1];
        }
    }

    #[inline]
    fn value_at_location(&self, array_num: usize, loc: &[usize]) -> Real {
        self.storage.get(loc[array_num])
    }

    #[inline]
    fn value_at_location_store(
        &self,
        array_num: usize,
        _scratch_num: usize,
        loc: &[usize],
        _scratch: &mut Scratch,
    ) -> Real {
        self.storage.get(loc[array_num])
    }

    #[inline]
    fn value_stored(
        &self,
        array_num: usize,
        _scratch_num: usize,
        loc: &[usize],
        _scratch: &Scratch,
    ) -> Real {
        self.storage.get(loc[array_num])
    }

    #[inline]
    fn calc_gradient(
        &self,
        stack: &mut Stack,
        array_num: usize,
        _scratch_num: usize,
        loc: &[usize],
        _scratch: &Scratch,
        multiplier: Real,
    ) {
        if let Some(g) = self.storage.gradient_index(loc[array_num]) {
            stack.push_rhs(multiplier, g);
        }
    }
}

impl_expression_ops!(['a, const R: usize, const A: bool] &'a Array<R, A>);

impl<const R: usize, const A: bool> Array<R, A> {
    fn fmt_axis(&self, f: &mut fmt::Formatter<'_>, axis: usize, position: usize) -> fmt::Result {
        if axis == R {
            return write!(f, "{}", self.storage.get(position));
        }
        write!(f, "[")?;
        for i in 0..self.dims[axis] {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.fmt_axis(f, axis + 1, position + i * self.strides[axis])?;
        }
        write!(f, "]")
    }
}

impl<const R: usize, const A: bool> fmt::Display for Array<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_axis(f, 0, self.offset)
    }
}

impl<const R: usize, const A: bool> fmt::Debug for Array<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Array{}{} {}",
            if A { "a" } else { "" },
            R,
            self.shape(),
            self
        )
    }
}
