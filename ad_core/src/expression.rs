//! The expression node contract.
//!
//! Arithmetic on active values does not compute anything by itself: it builds
//! a tree of node types (`UnaryOperation<BinaryOperation<&Active, Real>>`, ...)
//! whose shape is known to the compiler. A driver (scalar evaluation, array
//! assignment, reduction) then walks that tree once per output element.
//!
//! Per-node bookkeeping lives in associated constants:
//!
//! | constant    | meaning |
//! |-------------|---------|
//! | `RANK`      | 0 for scalars, otherwise the array rank |
//! | `IS_ACTIVE` | at least one active leaf, so the tape must be fed |
//! | `N_ACTIVE`  | active leaves, i.e. operations pushed per element |
//! | `N_SCRATCH` | scratch slots used by the subtree for one element |
//! | `N_ARRAYS`  | array leaves, i.e. entries of the location vector |
//!
//! A node with scratch number `s` stores its own value in slot `s` and hands
//! `s + 1..` to its operands (left first). A node with array number `k` hands
//! `k..` to its left operand and `k + L::N_ARRAYS..` to its right operand. The
//! store phase and the gradient phase visit operands in the same order, so the
//! two phases agree on every slot.

use crate::error::AdError;
use crate::scratch::Scratch;
use crate::shape::Shape;
use crate::stack::Stack;
use crate::Real;

/// Address range `[begin, end)` of the memory an assignment writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub begin: usize,
    pub end: usize,
}

impl Extent {
    /// Extent covering the elements at `first..=last`.
    pub fn spanning<T>(first: *const T, last: *const T) -> Self {
        Extent {
            begin: first as usize,
            end: last as usize + std::mem::size_of::<T>(),
        }
    }

    /// Extent that overlaps nothing.
    pub fn empty() -> Self {
        Extent { begin: 0, end: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    pub fn overlaps(&self, other: &Extent) -> bool {
        !self.is_empty() && !other.is_empty() && self.begin < other.end && other.begin < self.end
    }
}

/// Alignment of the arrays touched by an expression, in elements modulo a
/// packet size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// No arrays involved.
    Any,
    /// Every array starts at this offset.
    Offset(usize),
    /// Arrays disagree.
    Mixed,
}

impl Alignment {
    pub fn combine(self, other: Alignment) -> Alignment {
        match (self, other) {
            (Alignment::Any, a) | (a, Alignment::Any) => a,
            (Alignment::Offset(a), Alignment::Offset(b)) if a == b => Alignment::Offset(a),
            _ => Alignment::Mixed,
        }
    }
}

/// A node of a statically composed expression.
///
/// Implemented by the operation nodes in this crate, by numeric constants
/// ([`Real`]), by `&Active` and by the array container of `ad_array`.
pub trait Expression {
    /// `Real` for numeric expressions, `bool` for predicates.
    type Value: Copy;

    const RANK: usize;
    const IS_ACTIVE: bool;
    const N_ACTIVE: usize;
    const N_SCRATCH: usize;
    const N_ARRAYS: usize;

    /// Consistency of the layout constants. Every driver evaluates this, so a
    /// node declaring inconsistent counts fails to compile.
    const LAYOUT_OK: () = {
        assert!(
            Self::IS_ACTIVE == (Self::N_ACTIVE > 0),
            "IS_ACTIVE must agree with N_ACTIVE"
        );
        assert!(
            Self::IS_ACTIVE || Self::N_SCRATCH == 0,
            "inactive expressions must not claim scratch slots"
        );
        assert!(
            Self::RANK > 0 || Self::N_ARRAYS == 0,
            "a scalar expression cannot contain arrays"
        );
    };

    /// Dimensions of the result, or the first incompatibility found.
    fn dimensions(&self) -> Result<Shape, AdError>;

    /// Parenthesised text form, for diagnostics.
    fn expression_string(&self) -> String;

    /// Whether the subtree's storage may overlap `dest`. Conservative; the
    /// `noalias` wrapper answers `false` on the caller's word.
    fn is_aliased(&self, dest: &Extent) -> bool;

    /// Whether the subtree's storage truly overlaps `dest`, ignoring any
    /// `noalias` assertion.
    fn overlaps(&self, dest: &Extent) -> bool;

    /// Whether every array touched is contiguous in memory.
    fn all_arrays_contiguous(&self) -> bool;

    /// Alignment of the first element of every array touched. Array
    /// assignment walks in packets when this agrees with the destination.
    fn alignment_offset(&self, packet: usize) -> Alignment;

    /// Point each array leaf's location at the element with multi-index `index`.
    fn set_location(&self, index: &[usize], array_num: usize, loc: &mut [usize]);

    /// Move each array leaf's location one step along the last axis.
    fn advance_location(&self, array_num: usize, loc: &mut [usize]);

    /// Value at the current location.
    fn value_at_location(&self, array_num: usize, loc: &[usize]) -> Self::Value;

    /// Value at the current location, storing active intermediate results
    /// into `scratch` for the gradient phase.
    fn value_at_location_store(
        &self,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &mut Scratch,
    ) -> Self::Value;

    /// Value computed by the preceding store phase.
    fn value_stored(
        &self,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &Scratch,
    ) -> Self::Value;

    /// Push `multiplier · ∂self/∂leaf` for every active leaf onto `stack`.
    fn calc_gradient(
        &self,
        stack: &mut Stack,
        array_num: usize,
        scratch_num: usize,
        loc: &[usize],
        scratch: &Scratch,
        multiplier: Real,
    );
}

// Numeric constants are inactive scalar leaves.
impl Expression for Real {
    type Value = Real;

    const RANK: usize = 0;
    const IS_ACTIVE: bool = false;
    const N_ACTIVE: usize = 0;
    const N_SCRATCH: usize = 0;
    const N_ARRAYS: usize = 0;

    fn dimensions(&self) -> Result<Shape, AdError> {
        Ok(Shape::scalar())
    }

    fn expression_string(&self) -> String {
        format!("{}", self)
    }

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
        *self
    }

    #[inline]
    fn value_at_location_store(
        &self,
        _array_num: usize,
        _scratch_num: usize,
        _loc: &[usize],
        _scratch: &mut Scratch,
    ) -> Real {
        *self
    }

    #[inline]
    fn value_stored(
        &self,
        _array_num: usize,
        _scratch_num: usize,
        _loc: &[usize],
        _scratch: &Scratch,
    ) -> Real {
        *self
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

/// Visit every element of `shape` in row-major order, calling
/// `f(index, loc)` with the multi-index and the expression's location vector.
///
/// Locations are set once per row and advanced along the last axis.
pub fn for_each_location<E, F>(expr: &E, shape: &Shape, mut f: F)
where
    E: Expression,
    F: FnMut(&[usize], &[usize]),
{
    let mut loc = vec![0usize; E::N_ARRAYS];
    let rank = shape.rank();
    if rank == 0 {
        expr.set_location(&[], 0, &mut loc);
        f(&[], &loc);
        return;
    }
    if shape.numel() == 0 {
        return;
    }

    let dims = shape.dims();
    let inner = dims[rank - 1];
    let mut index = vec![0usize; rank];
    loop {
        index[rank - 1] = 0;
        expr.set_location(&index, 0, &mut loc);
        for j in 0..inner {
            index[rank - 1] = j;
            f(&index, &loc);
            expr.advance_location(0, &mut loc);
        }

        // Odometer over the outer axes.
        let mut axis = rank - 1;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < dims[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}

/// Visit `n` elements of an expression whose arrays are all contiguous,
/// calling `f(k, loc)` for the k-th element in memory order.
///
/// Locations are set once at the origin and then only advanced.
pub fn for_each_location_contiguous<E, F>(expr: &E, rank: usize, n: usize, mut f: F)
where
    E: Expression,
    F: FnMut(usize, &[usize]),
{
    let mut loc = vec![0usize; E::N_ARRAYS];
    expr.set_location(&vec![0usize; rank], 0, &mut loc);
    for k in 0..n {
        f(k, &loc);
        expr.advance_location(0, &mut loc);
    }
}

/// Visit `n` contiguous elements like [`for_each_location_contiguous`],
/// grouped for arrays sharing one alignment: `head` single elements up to the
/// first packet boundary, then whole packets of `P`, then the remainder.
pub fn for_each_location_packets<const P: usize, E, F>(
    expr: &E,
    rank: usize,
    n: usize,
    head: usize,
    mut f: F,
) where
    E: Expression,
    F: FnMut(usize, &[usize]),
{
    const { assert!(P > 0, "packet size must be positive") };
    let mut loc = vec![0usize; E::N_ARRAYS];
    expr.set_location(&vec![0usize; rank], 0, &mut loc);

    let head = head.min(n);
    let packets = (n - head) / P;
    for k in 0..head {
        f(k, &loc);
        expr.advance_location(0, &mut loc);
    }
    for p in 0..packets {
        let base = head + p * P;
        for j in 0..P {
            f(base + j, &loc);
            expr.advance_location(0, &mut loc);
        }
    }
    for k in head + packets * P..n {
        f(k, &loc);
        expr.advance_location(0, &mut loc);
    }
}

/// Passive value of a scalar expression. Active leaves contribute their
/// current value; nothing is recorded.
pub fn evaluate_scalar<E: Expression>(expr: &E) -> E::Value {
    let () = E::LAYOUT_OK;
    const { assert!(E::RANK == 0, "evaluate_scalar needs a rank-0 expression") };
    expr.value_at_location(0, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_overlap() {
        let a = Extent { begin: 0x100, end: 0x120 };
        let b = Extent { begin: 0x118, end: 0x140 };
        let c = Extent { begin: 0x120, end: 0x140 };
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&Extent::empty()));
    }

    #[test]
    fn test_extent_spanning() {
        let data = [1.0f64, 2.0, 3.0];
        let e = Extent::spanning(&data[0] as *const f64, &data[2] as *const f64);
        assert_eq!(e.end - e.begin, 3 * std::mem::size_of::<f64>());
    }

    #[test]
    fn test_alignment_combine() {
        use Alignment::*;
        assert_eq!(Any.combine(Offset(2)), Offset(2));
        assert_eq!(Offset(2).combine(Offset(2)), Offset(2));
        assert_eq!(Offset(1).combine(Offset(2)), Mixed);
        assert_eq!(Mixed.combine(Any), Mixed);
    }

    #[test]
    fn test_constant_leaf() {
        assert_eq!(evaluate_scalar(&2.5), 2.5);
        assert_eq!(2.5.expression_string(), "2.5");
        assert_eq!(2.5.dimensions(), Ok(Shape::scalar()));
    }

    #[test]
    fn test_walk_scalar_visits_once() {
        let mut visits = 0;
        for_each_location(&1.0, &Shape::scalar(), |index, loc| {
            assert!(index.is_empty());
            assert!(loc.is_empty());
            visits += 1;
        });
        assert_eq!(visits, 1);
    }

    #[test]
    fn test_walk_row_major_order() {
        let mut seen = Vec::new();
        for_each_location(&1.0, &Shape::new(vec![2, 3]), |index, _| {
            seen.push(index.to_vec())
        });
        assert_eq!(
            seen,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
    }

    #[test]
    fn test_packet_walk_visits_every_element_once_in_order() {
        for (n, head) in [(0, 0), (3, 1), (4, 0), (11, 3), (9, 7), (2, 5)] {
            let mut seen = Vec::new();
            for_each_location_packets::<4, _, _>(&1.0, 1, n, head, |k, _| seen.push(k));
            assert_eq!(seen, (0..n).collect::<Vec<_>>(), "n = {}, head = {}", n, head);
        }
    }

    #[test]
    fn test_walk_empty_shape() {
        let mut visits = 0;
        for_each_location(&1.0, &Shape::new(vec![0, 4]), |_, _| visits += 1);
        assert_eq!(visits, 0);
    }
}
