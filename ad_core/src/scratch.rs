//! Per-element scratch storage for the forward values of active nodes.

use std::cell::Cell;

use crate::Real;

/// Scratch slots for one element evaluation.
///
/// Sized by the root expression's `N_SCRATCH`. The store phase writes each
/// active node's forward value into its slot; the gradient phase reads them
/// back. Reads and writes are tracked so the slot layout can be verified.
#[derive(Debug)]
pub struct Scratch {
    values: Vec<Real>,
    written: Vec<bool>,
    read: Vec<Cell<bool>>,
}

impl Scratch {
    pub fn new(n_slots: usize) -> Self {
        Scratch {
            values: vec![0.0; n_slots],
            written: vec![false; n_slots],
            read: (0..n_slots).map(|_| Cell::new(false)).collect(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forget the previous element's bookkeeping.
    pub fn reset(&mut self) {
        self.written.iter_mut().for_each(|w| *w = false);
        self.read.iter().for_each(|r| r.set(false));
    }

    /// Write `value` into `slot` and return it.
    #[inline]
    pub fn store(&mut self, slot: usize, value: Real) -> Real {
        debug_assert!(!self.written[slot], "scratch slot {slot} written twice");
        self.values[slot] = value;
        self.written[slot] = true;
        value
    }

    /// Read back the value stored in `slot`.
    #[inline]
    pub fn load(&self, slot: usize) -> Real {
        debug_assert!(self.written[slot], "scratch slot {slot} read before write");
        self.read[slot].set(true);
        self.values[slot]
    }

    /// Slots written since the last reset.
    pub fn written_count(&self) -> usize {
        self.written.iter().filter(|&&w| w).count()
    }

    /// Slots read since the last reset.
    pub fn read_count(&self) -> usize {
        self.read.iter().filter(|r| r.get()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_load_tracking() {
        let mut scratch = Scratch::new(3);
        assert_eq!(scratch.len(), 3);
        assert_eq!(scratch.store(1, 4.5), 4.5);
        assert_eq!(scratch.load(1), 4.5);
        assert_eq!(scratch.written_count(), 1);
        assert_eq!(scratch.read_count(), 1);
        scratch.reset();
        assert_eq!(scratch.written_count(), 0);
        assert_eq!(scratch.read_count(), 0);
    }

    #[test]
    #[should_panic(expected = "read before write")]
    #[cfg(debug_assertions)]
    fn test_read_before_write_panics() {
        let scratch = Scratch::new(1);
        scratch.load(0);
    }
}
