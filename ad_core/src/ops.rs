//! Elementary function tables.
//!
//! Each table is an enum whose variants carry no data; `match` arms supply
//! the forward formula, the symbolic name and the local derivative.

use crate::Real;

/// What a unary local derivative is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeFamily {
    /// Needs the operand value `x`.
    OfInput,
    /// Cheaper from the result `y` (`exp`, `sqrt`, `cbrt`, `tanh`).
    OfOutput,
    /// Does not depend on either.
    Constant,
}

/// Unary numeric functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFunc {
    Log,
    Log10,
    Log2,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Abs,
    Fabs,
    Expm1,
    Exp2,
    Log1p,
    Asinh,
    Acosh,
    Atanh,
    Erf,
    Erfc,
    Exp,
    Sqrt,
    Cbrt,
    Tanh,
    Round,
    Ceil,
    Floor,
    Trunc,
    Rint,
    Nearbyint,
    UnaryPlus,
    UnaryMinus,
    Not,
}

// 2/sqrt(pi)
const TWO_OVER_SQRT_PI: Real = 1.128_379_167_095_51;

impl UnaryFunc {
    pub const ALL: [UnaryFunc; 34] = [
        UnaryFunc::Log,
        UnaryFunc::Log10,
        UnaryFunc::Log2,
        UnaryFunc::Sin,
        UnaryFunc::Cos,
        UnaryFunc::Tan,
        UnaryFunc::Asin,
        UnaryFunc::Acos,
        UnaryFunc::Atan,
        UnaryFunc::Sinh,
        UnaryFunc::Cosh,
        UnaryFunc::Abs,
        UnaryFunc::Fabs,
        UnaryFunc::Expm1,
        UnaryFunc::Exp2,
        UnaryFunc::Log1p,
        UnaryFunc::Asinh,
        UnaryFunc::Acosh,
        UnaryFunc::Atanh,
        UnaryFunc::Erf,
        UnaryFunc::Erfc,
        UnaryFunc::Exp,
        UnaryFunc::Sqrt,
        UnaryFunc::Cbrt,
        UnaryFunc::Tanh,
        UnaryFunc::Round,
        UnaryFunc::Ceil,
        UnaryFunc::Floor,
        UnaryFunc::Trunc,
        UnaryFunc::Rint,
        UnaryFunc::Nearbyint,
        UnaryFunc::UnaryPlus,
        UnaryFunc::UnaryMinus,
        UnaryFunc::Not,
    ];

    /// Name used in expression strings. Operators use their symbol.
    pub fn name(self) -> &'static str {
        match self {
            UnaryFunc::Log => "log",
            UnaryFunc::Log10 => "log10",
            UnaryFunc::Log2 => "log2",
            UnaryFunc::Sin => "sin",
            UnaryFunc::Cos => "cos",
            UnaryFunc::Tan => "tan",
            UnaryFunc::Asin => "asin",
            UnaryFunc::Acos => "acos",
            UnaryFunc::Atan => "atan",
            UnaryFunc::Sinh => "sinh",
            UnaryFunc::Cosh => "cosh",
            UnaryFunc::Abs => "abs",
            UnaryFunc::Fabs => "fabs",
            UnaryFunc::Expm1 => "expm1",
            UnaryFunc::Exp2 => "exp2",
            UnaryFunc::Log1p => "log1p",
            UnaryFunc::Asinh => "asinh",
            UnaryFunc::Acosh => "acosh",
            UnaryFunc::Atanh => "atanh",
            UnaryFunc::Erf => "erf",
            UnaryFunc::Erfc => "erfc",
            UnaryFunc::Exp => "exp",
            UnaryFunc::Sqrt => "sqrt",
            UnaryFunc::Cbrt => "cbrt",
            UnaryFunc::Tanh => "tanh",
            UnaryFunc::Round => "round",
            UnaryFunc::Ceil => "ceil",
            UnaryFunc::Floor => "floor",
            UnaryFunc::Trunc => "trunc",
            UnaryFunc::Rint => "rint",
            UnaryFunc::Nearbyint => "nearbyint",
            UnaryFunc::UnaryPlus => "+",
            UnaryFunc::UnaryMinus => "-",
            UnaryFunc::Not => "!",
        }
    }

    /// Whether the function is written as a prefix operator (`-x`) rather
    /// than a call (`sin(x)`).
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            UnaryFunc::UnaryPlus | UnaryFunc::UnaryMinus | UnaryFunc::Not
        )
    }

    pub fn family(self) -> DerivativeFamily {
        match self {
            UnaryFunc::Exp | UnaryFunc::Sqrt | UnaryFunc::Cbrt | UnaryFunc::Tanh => {
                DerivativeFamily::OfOutput
            }
            UnaryFunc::Round
            | UnaryFunc::Ceil
            | UnaryFunc::Floor
            | UnaryFunc::Trunc
            | UnaryFunc::Rint
            | UnaryFunc::Nearbyint
            | UnaryFunc::UnaryPlus
            | UnaryFunc::UnaryMinus
            | UnaryFunc::Not => DerivativeFamily::Constant,
            _ => DerivativeFamily::OfInput,
        }
    }

    /// Forward value.
    #[inline]
    pub fn apply(self, x: Real) -> Real {
        match self {
            UnaryFunc::Log => x.ln(),
            UnaryFunc::Log10 => x.log10(),
            UnaryFunc::Log2 => x.log2(),
            UnaryFunc::Sin => x.sin(),
            UnaryFunc::Cos => x.cos(),
            UnaryFunc::Tan => x.tan(),
            UnaryFunc::Asin => x.asin(),
            UnaryFunc::Acos => x.acos(),
            UnaryFunc::Atan => x.atan(),
            UnaryFunc::Sinh => x.sinh(),
            UnaryFunc::Cosh => x.cosh(),
            UnaryFunc::Abs | UnaryFunc::Fabs => x.abs(),
            UnaryFunc::Expm1 => x.exp_m1(),
            UnaryFunc::Exp2 => x.exp2(),
            UnaryFunc::Log1p => x.ln_1p(),
            UnaryFunc::Asinh => x.asinh(),
            UnaryFunc::Acosh => x.acosh(),
            UnaryFunc::Atanh => x.atanh(),
            UnaryFunc::Erf => libm::erf(x),
            UnaryFunc::Erfc => libm::erfc(x),
            UnaryFunc::Exp => x.exp(),
            UnaryFunc::Sqrt => x.sqrt(),
            UnaryFunc::Cbrt => x.cbrt(),
            UnaryFunc::Tanh => x.tanh(),
            UnaryFunc::Round => x.round(),
            UnaryFunc::Ceil => x.ceil(),
            UnaryFunc::Floor => x.floor(),
            UnaryFunc::Trunc => x.trunc(),
            // Default rounding mode: ties to even.
            UnaryFunc::Rint | UnaryFunc::Nearbyint => x.round_ties_even(),
            UnaryFunc::UnaryPlus => x,
            UnaryFunc::UnaryMinus => -x,
            UnaryFunc::Not => {
                if x == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Local derivative dy/dx given the operand `x` and result `y`.
    #[inline]
    pub fn derivative(self, x: Real, y: Real) -> Real {
        match self {
            UnaryFunc::Log => 1.0 / x,
            UnaryFunc::Log10 => std::f64::consts::LOG10_E / x,
            UnaryFunc::Log2 => std::f64::consts::LOG2_E / x,
            UnaryFunc::Sin => x.cos(),
            UnaryFunc::Cos => -x.sin(),
            UnaryFunc::Tan => {
                let c = x.cos();
                1.0 / (c * c)
            }
            UnaryFunc::Asin => 1.0 / (1.0 - x * x).sqrt(),
            UnaryFunc::Acos => -1.0 / (1.0 - x * x).sqrt(),
            UnaryFunc::Atan => 1.0 / (1.0 + x * x),
            UnaryFunc::Sinh => x.cosh(),
            UnaryFunc::Cosh => x.sinh(),
            UnaryFunc::Abs | UnaryFunc::Fabs => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            UnaryFunc::Expm1 => x.exp(),
            UnaryFunc::Exp2 => std::f64::consts::LN_2 * x.exp2(),
            UnaryFunc::Log1p => 1.0 / (1.0 + x),
            UnaryFunc::Asinh => 1.0 / (x * x + 1.0).sqrt(),
            UnaryFunc::Acosh => 1.0 / (x * x - 1.0).sqrt(),
            UnaryFunc::Atanh => 1.0 / (1.0 - x * x),
            UnaryFunc::Erf => TWO_OVER_SQRT_PI * (-x * x).exp(),
            UnaryFunc::Erfc => -TWO_OVER_SQRT_PI * (-x * x).exp(),
            UnaryFunc::Exp => y,
            UnaryFunc::Sqrt => 0.5 / y,
            UnaryFunc::Cbrt => (1.0 / 3.0) / (y * y),
            UnaryFunc::Tanh => 1.0 - y * y,
            UnaryFunc::Round
            | UnaryFunc::Ceil
            | UnaryFunc::Floor
            | UnaryFunc::Trunc
            | UnaryFunc::Rint
            | UnaryFunc::Nearbyint
            | UnaryFunc::Not => 0.0,
            UnaryFunc::UnaryPlus => 1.0,
            UnaryFunc::UnaryMinus => -1.0,
        }
    }
}

/// Binary numeric functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFunc {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
    Max,
    Min,
}

impl BinaryFunc {
    pub const ALL: [BinaryFunc; 8] = [
        BinaryFunc::Add,
        BinaryFunc::Sub,
        BinaryFunc::Mul,
        BinaryFunc::Div,
        BinaryFunc::Pow,
        BinaryFunc::Atan2,
        BinaryFunc::Max,
        BinaryFunc::Min,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryFunc::Add => "+",
            BinaryFunc::Sub => "-",
            BinaryFunc::Mul => "*",
            BinaryFunc::Div => "/",
            BinaryFunc::Pow => "pow",
            BinaryFunc::Atan2 => "atan2",
            BinaryFunc::Max => "max",
            BinaryFunc::Min => "min",
        }
    }

    /// Whether the function is written between its operands.
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            BinaryFunc::Add | BinaryFunc::Sub | BinaryFunc::Mul | BinaryFunc::Div
        )
    }

    #[inline]
    pub fn apply(self, l: Real, r: Real) -> Real {
        match self {
            BinaryFunc::Add => l + r,
            BinaryFunc::Sub => l - r,
            BinaryFunc::Mul => l * r,
            BinaryFunc::Div => l / r,
            BinaryFunc::Pow => l.powf(r),
            BinaryFunc::Atan2 => l.atan2(r),
            BinaryFunc::Max => {
                if l >= r {
                    l
                } else {
                    r
                }
            }
            BinaryFunc::Min => {
                if l <= r {
                    l
                } else {
                    r
                }
            }
        }
    }

    /// Partial derivatives `(dy/dl, dy/dr)` given both operands and the result.
    ///
    /// `max`/`min` route the whole gradient to the selected operand, the left
    /// one on ties.
    #[inline]
    pub fn derivative(self, l: Real, r: Real, y: Real) -> (Real, Real) {
        match self {
            BinaryFunc::Add => (1.0, 1.0),
            BinaryFunc::Sub => (1.0, -1.0),
            BinaryFunc::Mul => (r, l),
            BinaryFunc::Div => (1.0 / r, -l / (r * r)),
            BinaryFunc::Pow => (r * l.powf(r - 1.0), y * l.ln()),
            BinaryFunc::Atan2 => {
                let d = l * l + r * r;
                (r / d, -l / d)
            }
            BinaryFunc::Max => {
                if l >= r {
                    (1.0, 0.0)
                } else {
                    (0.0, 1.0)
                }
            }
            BinaryFunc::Min => {
                if l <= r {
                    (1.0, 0.0)
                } else {
                    (0.0, 1.0)
                }
            }
        }
    }
}

/// Boolean predicates on one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateFunc {
    IsNan,
    IsInf,
    IsFinite,
}

impl PredicateFunc {
    pub fn name(self) -> &'static str {
        match self {
            PredicateFunc::IsNan => "isnan",
            PredicateFunc::IsInf => "isinf",
            PredicateFunc::IsFinite => "isfinite",
        }
    }

    #[inline]
    pub fn apply(self, x: Real) -> bool {
        match self {
            PredicateFunc::IsNan => x.is_nan(),
            PredicateFunc::IsInf => x.is_infinite(),
            PredicateFunc::IsFinite => x.is_finite(),
        }
    }
}

/// Comparisons between two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareFunc {
    pub fn name(self) -> &'static str {
        match self {
            CompareFunc::Lt => "<",
            CompareFunc::Le => "<=",
            CompareFunc::Gt => ">",
            CompareFunc::Ge => ">=",
            CompareFunc::Eq => "==",
            CompareFunc::Ne => "!=",
        }
    }

    #[inline]
    pub fn apply(self, l: Real, r: Real) -> bool {
        match self {
            CompareFunc::Lt => l < r,
            CompareFunc::Le => l <= r,
            CompareFunc::Gt => l > r,
            CompareFunc::Ge => l >= r,
            CompareFunc::Eq => l == r,
            CompareFunc::Ne => l != r,
        }
    }
}
