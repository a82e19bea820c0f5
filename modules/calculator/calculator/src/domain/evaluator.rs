//! Numeric evaluation of a single operation.
//!
//! The evaluator repeats the checks that matter at run time (zero divisors,
//! root domains, shift ranges) so it is safe to call without the validator.
//! Any NaN or infinite result is reported as an error.

use calculator_sdk::Operator;
use calculator_sdk::validation::split_radix_pair;

/// Failure raised while computing a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("root degree must not be zero")]
    ZeroRootDegree,

    #[error("{0}")]
    Domain(&'static str),

    #[error("shift amount {0} is outside [0, 63]")]
    ShiftOutOfRange(f64),

    #[error("invalid base pair {0}")]
    InvalidRadix(f64),

    #[error("'{digits}' is not a valid base-{radix} number")]
    InvalidNumeral { digits: String, radix: u32 },

    #[error("result of '{operator}' is not a finite number")]
    NonFinite { operator: Operator },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),
}

/// Parse `token` and evaluate it.
///
/// # Errors
/// [`EvalError::UnsupportedOperator`] for tokens outside the registry and
/// [`EvalError::Arithmetic`] when the computation is undefined.
pub fn evaluate(operand1: f64, operand2: f64, token: &str) -> Result<f64, EvalError> {
    let op = Operator::parse(token).ok_or_else(|| EvalError::UnsupportedOperator(token.to_owned()))?;
    Ok(apply(op, operand1, operand2)?)
}

/// Evaluate an already parsed operator. Unary operators ignore `b`.
///
/// # Errors
/// Returns an [`ArithmeticError`] when the result is undefined or not finite.
pub fn apply(op: Operator, a: f64, b: f64) -> Result<f64, ArithmeticError> {
    let value = match op {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => {
            if b == 0.0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            a / b
        }
        Operator::Modulo => {
            if b == 0.0 {
                return Err(ArithmeticError::ModuloByZero);
            }
            a % b
        }
        Operator::Power | Operator::Pow => a.powf(b),
        Operator::Sqrt => {
            if a < 0.0 {
                return Err(ArithmeticError::Domain("square root of a negative number"));
            }
            a.sqrt()
        }
        Operator::Cbrt => a.cbrt(),
        Operator::NthRoot => nth_root(a, b)?,
        Operator::Exp => a.exp(),
        Operator::Log | Operator::Ln | Operator::Log10 => {
            if a <= 0.0 {
                return Err(ArithmeticError::Domain("logarithm of a non-positive number"));
            }
            if op == Operator::Log10 { a.log10() } else { a.ln() }
        }
        Operator::Sin => a.to_radians().sin(),
        Operator::Cos => a.to_radians().cos(),
        Operator::Tan => a.to_radians().tan(),
        Operator::Asin | Operator::Acos => {
            if !(-1.0..=1.0).contains(&a) {
                return Err(ArithmeticError::Domain("inverse trigonometric argument outside [-1, 1]"));
            }
            if op == Operator::Asin { a.asin().to_degrees() } else { a.acos().to_degrees() }
        }
        Operator::Atan => a.atan().to_degrees(),
        Operator::Sinh => a.sinh(),
        Operator::Cosh => a.cosh(),
        Operator::Tanh => a.tanh(),
        Operator::Abs => a.abs(),
        Operator::Ceil => a.ceil(),
        Operator::Floor => a.floor(),
        Operator::Round => (a + 0.5).floor(),
        Operator::Max => a.max(b),
        Operator::Min => a.min(b),
        Operator::And => from_bits(to_bits(a) & to_bits(b)),
        Operator::Or => from_bits(to_bits(a) | to_bits(b)),
        Operator::Xor => from_bits(to_bits(a) ^ to_bits(b)),
        Operator::Not => from_bits(!to_bits(a)),
        Operator::ShiftLeft => from_bits(to_bits(a).wrapping_shl(shift_amount(b)?)),
        Operator::ShiftRight => from_bits(to_bits(a).wrapping_shr(shift_amount(b)?)),
        Operator::ConvertBase => convert_base(a, b)?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(ArithmeticError::NonFinite { operator: op })
    }
}

fn nth_root(a: f64, n: f64) -> Result<f64, ArithmeticError> {
    if n == 0.0 {
        return Err(ArithmeticError::ZeroRootDegree);
    }
    if a >= 0.0 {
        return Ok(a.powf(n.recip()));
    }
    let odd = n.fract() == 0.0 && (n / 2.0).fract() != 0.0;
    if odd {
        Ok(-(-a).powf(n.recip()))
    } else {
        Err(ArithmeticError::Domain("even or non-integer root of a negative number"))
    }
}

/// Truncate toward zero into a signed 64-bit integer. Out-of-range values
/// saturate and NaN becomes zero.
#[allow(clippy::cast_possible_truncation)]
fn to_bits(value: f64) -> i64 {
    value as i64
}

#[allow(clippy::cast_precision_loss)]
fn from_bits(value: i64) -> f64 {
    value as f64
}

fn shift_amount(b: f64) -> Result<u32, ArithmeticError> {
    if b.fract() != 0.0 || !(0.0..=63.0).contains(&b) {
        return Err(ArithmeticError::ShiftOutOfRange(b));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let amount = b as u32;
    Ok(amount)
}

/// Read the decimal digits of `trunc(|a|)` as a numeral in the source radix
/// packed into `encoded` (`from*100 + to`). The sign of `a` is kept.
fn convert_base(a: f64, encoded: f64) -> Result<f64, ArithmeticError> {
    let (from, _to) = split_radix_pair(encoded).ok_or(ArithmeticError::InvalidRadix(encoded))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let digits = (a.abs().trunc() as u64).to_string();
    let parsed = u64::from_str_radix(&digits, from)
        .map_err(|_| ArithmeticError::InvalidNumeral { digits, radix: from })?;
    #[allow(clippy::cast_precision_loss)]
    let magnitude = parsed as f64;
    Ok(if a < 0.0 { -magnitude } else { magnitude })
}
