//! # ad_array - Arrays for the ad_core expression engine
//!
//! [`Array`] is a strided view onto shared storage. `&Array` is an expression
//! leaf, so arrays mix freely with scalars, [`ad_core::Active`] values and
//! every function in [`ad_core::ExpressionExt`]:
//!
//! ```
//! use ad_array::prelude::*;
//!
//! let mut stack = Stack::new();
//! let x = ActiveVector::from_vec(&mut stack, vec![1.0, 2.0, 3.0], [3]).unwrap();
//! let y = ActiveVector::from_expression(&mut stack, x.sin() * &x).unwrap();
//!
//! stack.clear_gradients();
//! y.set_gradients(&mut stack, &[1.0, 1.0, 1.0]).unwrap();
//! stack.compute_adjoint();
//!
//! // d/dx (x sin x) = sin x + x cos x
//! let dx = x.gradients(&stack);
//! assert!((dx[1] - (2.0f64.sin() + 2.0 * 2.0f64.cos())).abs() < 1e-12);
//! ```
//!
//! ## Aliasing
//!
//! [`Array::assign`] checks whether the expression reads memory the
//! destination writes. If so, the expression is evaluated into a temporary
//! first. Wrapping the expression in `noalias` skips the check; the caller
//! vouches for it. With the `noalias-checking` feature the vouching is
//! verified and a false claim returns [`ad_core::AdError::AliasViolation`].

mod array;
mod storage;

pub use array::{ActiveArray3, ActiveMatrix, ActiveVector, Array, Array3, Matrix, Vector};

pub mod prelude {
    pub use crate::array::{ActiveArray3, ActiveMatrix, ActiveVector, Array, Array3, Matrix, Vector};
    pub use ad_core::{
        all, any, count, maxval, mean, minval, noalias, norm2, product, sum, Active, AdError,
        ExpressionExt, Real, Stack, StackConfig,
    };
}
