//! Shared element storage for arrays.
//!
//! Several array handles (links, slices) may view one [`Storage`]. Elements
//! sit in `Cell`s, so writing through one handle while an expression reads
//! through another is well defined, if not always what the caller intended.

use std::cell::Cell;

use ad_core::{GradientIndex, Real};

pub(crate) struct Storage {
    data: Box<[Cell<Real>]>,
    /// First of `data.len()` contiguous gradient slots, for active storage.
    gradient_base: Option<GradientIndex>,
}

impl Storage {
    pub(crate) fn new(values: Vec<Real>, gradient_base: Option<GradientIndex>) -> Self {
        Storage {
            data: values.into_iter().map(Cell::new).collect(),
            gradient_base,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub(crate) fn get(&self, position: usize) -> Real {
        self.data[position].get()
    }

    #[inline]
    pub(crate) fn set(&self, position: usize, value: Real) {
        self.data[position].set(value)
    }

    /// Gradient slot of the element at `position`.
    #[inline]
    pub(crate) fn gradient_index(&self, position: usize) -> Option<GradientIndex> {
        self.gradient_base.map(|base| base.offset(position))
    }

    /// Address of the element at `position`. Only compared, never dereferenced.
    pub(crate) fn address(&self, position: usize) -> *const Cell<Real> {
        self.data.as_ptr().wrapping_add(position)
    }
}
