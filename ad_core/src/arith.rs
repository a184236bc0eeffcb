//! Operator overloading and method syntax for building expressions.
//!
//! `+ - * /` and unary `-` come from [`impl_expression_ops!`], which every
//! numeric node type (and `ad_array`'s array handle) invokes for itself.
//! Function calls (`x.sin()`, `x.pow(y)`, `x.less(y)`) come from the blanket
//! [`ExpressionExt`] trait.

use crate::active::Active;
use crate::binary::BinaryOperation;
use crate::expression::Expression;
use crate::ops::{BinaryFunc, CompareFunc, PredicateFunc, UnaryFunc};
use crate::predicate::{BinaryBoolOperation, UnaryBoolOperation};
use crate::unary::{NoAlias, UnaryOperation};
use crate::Real;

/// Implement the arithmetic operators for an expression type.
///
/// The bracketed list holds the impl's generic parameters, the type follows:
///
/// ```ignore
/// impl_expression_ops!([L, R] BinaryOperation<L, R>);
/// impl_expression_ops!(['a] &'a Active);
/// ```
///
/// Besides `expr op rhs` for any numeric right-hand expression, this provides
/// `Real op expr` so constants may appear on the left.
#[macro_export]
macro_rules! impl_expression_ops {
    ([$($gen:tt)*] $ty:ty) => {
        impl<$($gen)*, __Rhs> ::core::ops::Add<__Rhs> for $ty
        where
            $ty: $crate::Expression<Value = $crate::Real>,
            __Rhs: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$ty, __Rhs>;

            #[inline]
            fn add(self, rhs: __Rhs) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Add, self, rhs)
            }
        }

        impl<$($gen)*, __Rhs> ::core::ops::Sub<__Rhs> for $ty
        where
            $ty: $crate::Expression<Value = $crate::Real>,
            __Rhs: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$ty, __Rhs>;

            #[inline]
            fn sub(self, rhs: __Rhs) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Sub, self, rhs)
            }
        }

        impl<$($gen)*, __Rhs> ::core::ops::Mul<__Rhs> for $ty
        where
            $ty: $crate::Expression<Value = $crate::Real>,
            __Rhs: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$ty, __Rhs>;

            #[inline]
            fn mul(self, rhs: __Rhs) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Mul, self, rhs)
            }
        }

        impl<$($gen)*, __Rhs> ::core::ops::Div<__Rhs> for $ty
        where
            $ty: $crate::Expression<Value = $crate::Real>,
            __Rhs: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$ty, __Rhs>;

            #[inline]
            fn div(self, rhs: __Rhs) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Div, self, rhs)
            }
        }

        impl<$($gen)*> ::core::ops::Neg for $ty
        where
            $ty: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::UnaryOperation<$ty>;

            #[inline]
            fn neg(self) -> Self::Output {
                $crate::UnaryOperation::new($crate::UnaryFunc::UnaryMinus, self)
            }
        }

        impl<$($gen)*> ::core::ops::Add<$ty> for $crate::Real
        where
            $ty: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$crate::Real, $ty>;

            #[inline]
            fn add(self, rhs: $ty) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Add, self, rhs)
            }
        }

        impl<$($gen)*> ::core::ops::Sub<$ty> for $crate::Real
        where
            $ty: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$crate::Real, $ty>;

            #[inline]
            fn sub(self, rhs: $ty) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Sub, self, rhs)
            }
        }

        impl<$($gen)*> ::core::ops::Mul<$ty> for $crate::Real
        where
            $ty: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$crate::Real, $ty>;

            #[inline]
            fn mul(self, rhs: $ty) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Mul, self, rhs)
            }
        }

        impl<$($gen)*> ::core::ops::Div<$ty> for $crate::Real
        where
            $ty: $crate::Expression<Value = $crate::Real>,
        {
            type Output = $crate::BinaryOperation<$crate::Real, $ty>;

            #[inline]
            fn div(self, rhs: $ty) -> Self::Output {
                $crate::BinaryOperation::new($crate::BinaryFunc::Div, self, rhs)
            }
        }
    };
}

impl_expression_ops!([R] UnaryOperation<R>);
impl_expression_ops!([L, R] BinaryOperation<L, R>);
impl_expression_ops!([R] NoAlias<R>);
impl_expression_ops!(['a] &'a Active);

macro_rules! unary_methods {
    ($($(#[$doc:meta])* $method:ident => $func:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[inline]
            fn $method(self) -> UnaryOperation<Self> {
                UnaryOperation::new(UnaryFunc::$func, self)
            }
        )*
    };
}

/// Function-call syntax for numeric expressions.
///
/// Implemented for every `Expression<Value = Real>`. Plain `f64` receivers
/// keep their inherent methods (`2.0.sin()` is a number, not a node).
pub trait ExpressionExt: Expression<Value = Real> + Sized {
    unary_methods! {
        log => Log,
        log10 => Log10,
        log2 => Log2,
        sin => Sin,
        cos => Cos,
        tan => Tan,
        asin => Asin,
        acos => Acos,
        atan => Atan,
        sinh => Sinh,
        cosh => Cosh,
        abs => Abs,
        /// Same as [`abs`](ExpressionExt::abs), printed as `fabs`.
        fabs => Fabs,
        expm1 => Expm1,
        exp2 => Exp2,
        log1p => Log1p,
        asinh => Asinh,
        acosh => Acosh,
        atanh => Atanh,
        erf => Erf,
        erfc => Erfc,
        exp => Exp,
        sqrt => Sqrt,
        cbrt => Cbrt,
        tanh => Tanh,
        round => Round,
        ceil => Ceil,
        floor => Floor,
        trunc => Trunc,
        /// Round half to even.
        rint => Rint,
        nearbyint => Nearbyint,
        /// Unary `+`.
        identity => UnaryPlus,
        /// 1 where the operand is zero, 0 elsewhere.
        logical_not => Not,
    }

    /// Assert that this expression does not alias the assignment destination.
    #[inline]
    fn noalias(self) -> NoAlias<Self> {
        NoAlias::new(self)
    }

    #[inline]
    fn pow<R: Expression<Value = Real>>(self, exponent: R) -> BinaryOperation<Self, R> {
        BinaryOperation::new(BinaryFunc::Pow, self, exponent)
    }

    #[inline]
    fn atan2<R: Expression<Value = Real>>(self, other: R) -> BinaryOperation<Self, R> {
        BinaryOperation::new(BinaryFunc::Atan2, self, other)
    }

    #[inline]
    fn max<R: Expression<Value = Real>>(self, other: R) -> BinaryOperation<Self, R> {
        BinaryOperation::new(BinaryFunc::Max, self, other)
    }

    #[inline]
    fn min<R: Expression<Value = Real>>(self, other: R) -> BinaryOperation<Self, R> {
        BinaryOperation::new(BinaryFunc::Min, self, other)
    }

    fn is_nan(self) -> UnaryBoolOperation<Self> {
        UnaryBoolOperation::new(PredicateFunc::IsNan, self)
    }

    fn is_inf(self) -> UnaryBoolOperation<Self> {
        UnaryBoolOperation::new(PredicateFunc::IsInf, self)
    }

    fn is_finite(self) -> UnaryBoolOperation<Self> {
        UnaryBoolOperation::new(PredicateFunc::IsFinite, self)
    }

    fn less<R: Expression<Value = Real>>(self, other: R) -> BinaryBoolOperation<Self, R> {
        BinaryBoolOperation::new(CompareFunc::Lt, self, other)
    }

    fn less_equal<R: Expression<Value = Real>>(self, other: R) -> BinaryBoolOperation<Self, R> {
        BinaryBoolOperation::new(CompareFunc::Le, self, other)
    }

    fn greater<R: Expression<Value = Real>>(self, other: R) -> BinaryBoolOperation<Self, R> {
        BinaryBoolOperation::new(CompareFunc::Gt, self, other)
    }

    fn greater_equal<R: Expression<Value = Real>>(
        self,
        other: R,
    ) -> BinaryBoolOperation<Self, R> {
        BinaryBoolOperation::new(CompareFunc::Ge, self, other)
    }

    fn equal<R: Expression<Value = Real>>(self, other: R) -> BinaryBoolOperation<Self, R> {
        BinaryBoolOperation::new(CompareFunc::Eq, self, other)
    }

    fn not_equal<R: Expression<Value = Real>>(self, other: R) -> BinaryBoolOperation<Self, R> {
        BinaryBoolOperation::new(CompareFunc::Ne, self, other)
    }
}

impl<E: Expression<Value = Real>> ExpressionExt for E {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::evaluate_scalar;
    use crate::stack::Stack;
    use approx::assert_relative_eq;

    #[test]
    fn test_operators_build_nodes() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 2.0);
        let y = Active::new(&mut stack, 3.0);

        assert_eq!(evaluate_scalar(&(&x + &y)), 5.0);
        assert_eq!(evaluate_scalar(&(&x - &y)), -1.0);
        assert_eq!(evaluate_scalar(&(&x * &y)), 6.0);
        assert_relative_eq!(evaluate_scalar(&(&x / &y)), 2.0 / 3.0);
        assert_eq!(evaluate_scalar(&(-&x)), -2.0);
        assert_eq!(evaluate_scalar(&(1.0 - &x)), -1.0);
        assert_eq!(evaluate_scalar(&(6.0 / &y)), 2.0);
        // Building a tree records nothing.
        assert!(stack.is_empty());
        assert_eq!(stack.n_operations(), 0);
    }

    #[test]
    fn test_operators_on_nested_nodes() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.5);
        let e = -(x.sin() * 2.0 + x.cos().noalias()) / (1.0 + x.exp());
        let v = 0.5_f64;
        let expected = -(v.sin() * 2.0 + v.cos()) / (1.0 + v.exp());
        assert_relative_eq!(evaluate_scalar(&e), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_method_functions() {
        let mut stack = Stack::new();
        let x = Active::new(&mut stack, 0.25);
        assert_relative_eq!(evaluate_scalar(&x.erf()), libm::erf(0.25));
        assert_relative_eq!(evaluate_scalar(&x.pow(2.0)), 0.0625);
        assert_relative_eq!(evaluate_scalar(&x.atan2(1.0)), 0.25_f64.atan2(1.0));
        assert_eq!(evaluate_scalar(&x.max(1.0)), 1.0);
        assert_eq!(evaluate_scalar(&x.min(1.0)), 0.25);
        assert_eq!(evaluate_scalar(&x.identity()), 0.25);
        assert_eq!(evaluate_scalar(&x.logical_not()), 0.0);
        assert!(evaluate_scalar(&x.less(0.5)));
        assert!(!evaluate_scalar(&x.equal(0.5)));
    }
}
