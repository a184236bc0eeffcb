//! Dimensions of expressions.

use std::fmt;

use crate::error::AdError;

/// Extent of each axis of an expression result; rank 0 is a scalar.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn scalar() -> Self {
        Shape::default()
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Elements in the result. A scalar has one; a zero-length axis makes none.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Whether a result of this shape can be written to a destination with
    /// `dest` dimensions. Scalars fill any destination.
    pub fn conforms_to(&self, dest: &[usize]) -> bool {
        self.is_scalar() || self.dims == dest
    }

    /// Result shape of an element-wise operation on operands shaped `self`
    /// and `other`.
    ///
    /// A scalar operand takes the other's shape. Array operands must match
    /// exactly; size-1 axes are not stretched.
    pub fn combine(&self, other: &Shape) -> Result<Shape, AdError> {
        match (self.is_scalar(), other.is_scalar()) {
            (true, _) => Ok(other.clone()),
            (_, true) => Ok(self.clone()),
            _ if self == other => Ok(self.clone()),
            _ => Err(AdError::ShapeMismatch {
                left: self.clone(),
                right: other.clone(),
            }),
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape{:?}", self.dims)
    }
}

// `(3,)`, `(2, 3)`, `()` for scalars.
impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        match inner.len() {
            1 => write!(f, "({},)", inner[0]),
            _ => write!(f, "({})", inner.join(", ")),
        }
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape { dims }
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }
}

impl<const R: usize> From<[usize; R]> for Shape {
    fn from(dims: [usize; R]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let s = Shape::from([2, 3, 4]);
        assert_eq!(s.rank(), 3);
        assert_eq!(s.numel(), 24);
        assert!(!s.is_scalar());

        assert_eq!(Shape::scalar().numel(), 1);
        assert_eq!(Shape::new(vec![3, 0]).numel(), 0);
    }

    #[test]
    fn test_combine_scalar_takes_other_shape() {
        let a = Shape::from([2, 3]);
        assert_eq!(a.combine(&Shape::scalar()), Ok(a.clone()));
        assert_eq!(Shape::scalar().combine(&a), Ok(a.clone()));
        assert_eq!(Shape::scalar().combine(&Shape::scalar()), Ok(Shape::scalar()));
    }

    #[test]
    fn test_combine_does_not_stretch_unit_axes() {
        let a = Shape::from([1, 4]);
        let b = Shape::from([3, 4]);
        assert_eq!(
            a.combine(&b),
            Err(AdError::ShapeMismatch {
                left: a.clone(),
                right: b.clone()
            })
        );
    }

    #[test]
    fn test_conforms_to() {
        assert!(Shape::scalar().conforms_to(&[5, 2]));
        assert!(Shape::from([5, 2]).conforms_to(&[5, 2]));
        assert!(!Shape::from([2, 5]).conforms_to(&[5, 2]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::from([3]).to_string(), "(3,)");
        assert_eq!(Shape::from([2, 3]).to_string(), "(2, 3)");
        assert_eq!(Shape::scalar().to_string(), "()");
        assert_eq!(format!("{:?}", Shape::from([2, 3])), "Shape[2, 3]");
    }
}
