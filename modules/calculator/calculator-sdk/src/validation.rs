//! Input validation shared by the dispatch client and the service.
//!
//! Every check runs and reports its own [`Violation`]; a request is valid only
//! when none fired. The same [`InputValidator`] instance is used for the local
//! pre-check and for the server-side re-check, so both sides agree on limits.

use std::fmt;

use crate::config::ValidationLimits;
use crate::operator::{Operator, OperatorClass, classify};

/// Which operand a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    First,
    Second,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first operand"),
            Self::Second => f.write_str("second operand"),
        }
    }
}

/// A single failed check. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("invalid operator: operator must not be empty")]
    EmptyOperator,

    #[error("invalid operator '{token}'; {hint}")]
    InvalidOperator { token: String, hint: &'static str },

    #[error("{0} is not a number")]
    NotANumber(Operand),

    #[error("{0} must be finite")]
    Infinite(Operand),

    #[error("{operand} too large (> {limit})")]
    TooLarge { operand: Operand, limit: f64 },

    #[error("{operand} too small (< {limit})")]
    TooSmall { operand: Operand, limit: f64 },

    #[error("cannot divide by zero")]
    DivisionByZero,

    #[error("cannot take modulo by zero")]
    ModuloByZero,

    #[error("exponent too large (|exponent| > {limit})")]
    ExponentTooLarge { limit: f64 },

    #[error("cannot raise a negative number to a non-integer power")]
    FractionalPowerOfNegative,

    #[error("cannot take the square root of a negative number")]
    NegativeSquareRoot,

    #[error("root degree must not be zero")]
    ZeroRootDegree,

    #[error("cannot take an even or non-integer root of a negative number")]
    RootOfNegative,

    #[error("logarithm is only defined for positive numbers")]
    NonPositiveLogarithm,

    #[error("inverse sine and cosine are only defined on [-1, 1]")]
    InverseTrigDomain,

    #[error("shift amount must be an integer in [0, 63]")]
    ShiftOutOfRange,

    #[error("invalid base pair {0}: expected from*100 + to with both bases in [2, 36]")]
    InvalidRadix(f64),

    #[error("multiplication result would overflow")]
    MultiplicationOverflow,

    #[error("power result would overflow")]
    PowerOverflow,
}

/// Outcome of a validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violation messages joined into one line, or `None` when valid.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        if self.is_valid() {
            return None;
        }
        let messages: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        Some(messages.join("; "))
    }

    fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

const BASIC_HINT: &str = "supported operators are + - * / % ^";
const EXTENDED_HINT: &str = "not a supported operation";

/// Split a packed `from*100 + to` radix pair. Both radices must be in `2..=36`.
#[must_use]
pub fn split_radix_pair(encoded: f64) -> Option<(u32, u32)> {
    if !encoded.is_finite() || encoded.fract() != 0.0 || !(0.0..=3636.0).contains(&encoded) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let packed = encoded as u32;
    let (from, to) = (packed / 100, packed % 100);
    let valid = |radix: u32| (2..=36).contains(&radix);
    (valid(from) && valid(to)).then_some((from, to))
}

/// Stateless validator parameterized by [`ValidationLimits`].
#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    limits: ValidationLimits,
}

impl InputValidator {
    #[must_use]
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate with the mode inferred from the token: basic operators (and
    /// unknown tokens) use basic mode, every other known token extended mode.
    #[must_use]
    pub fn validate_request(&self, operand1: f64, operand2: f64, token: &str) -> ValidationResult {
        let extended = matches!(
            classify(token),
            OperatorClass::ExtendedUnary | OperatorClass::ExtendedBinary
        );
        self.validate(operand1, operand2, token, extended)
    }

    /// Run every applicable check.
    ///
    /// Basic mode accepts only `+ - * / % ^` and enables the overflow
    /// heuristic for `*` and `^`. Extended mode accepts the whole registry.
    #[must_use]
    pub fn validate(
        &self,
        operand1: f64,
        operand2: f64,
        token: &str,
        extended: bool,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        let op = Self::check_operator(token, extended, &mut result);

        self.check_operand(operand1, Operand::First, &mut result);
        if !op.is_some_and(Operator::is_unary) {
            self.check_operand(operand2, Operand::Second, &mut result);
        }

        let Some(op) = op else {
            return result;
        };

        self.check_domain(op, operand1, operand2, &mut result);

        if !extended {
            Self::check_overflow(op, operand1, operand2, &mut result);
        }

        result
    }

    fn check_operator(token: &str, extended: bool, result: &mut ValidationResult) -> Option<Operator> {
        if token.trim().is_empty() {
            result.push(Violation::EmptyOperator);
            return None;
        }
        let hint = if extended { EXTENDED_HINT } else { BASIC_HINT };
        match Operator::parse(token) {
            Some(op) if extended || op.is_basic() => Some(op),
            _ => {
                result.push(Violation::InvalidOperator {
                    token: token.trim().to_owned(),
                    hint,
                });
                None
            }
        }
    }

    fn check_operand(&self, value: f64, operand: Operand, result: &mut ValidationResult) {
        if value.is_nan() {
            result.push(Violation::NotANumber(operand));
        } else if value.is_infinite() {
            result.push(Violation::Infinite(operand));
        } else if value > self.limits.max_safe_value {
            result.push(Violation::TooLarge {
                operand,
                limit: self.limits.max_safe_value,
            });
        } else if value < self.limits.min_safe_value {
            result.push(Violation::TooSmall {
                operand,
                limit: self.limits.min_safe_value,
            });
        }
    }

    fn check_domain(&self, op: Operator, a: f64, b: f64, result: &mut ValidationResult) {
        match op {
            Operator::Divide if b == 0.0 => result.push(Violation::DivisionByZero),
            Operator::Modulo if b == 0.0 => result.push(Violation::ModuloByZero),
            Operator::Power | Operator::Pow => {
                if b.abs() > self.limits.max_exponent {
                    result.push(Violation::ExponentTooLarge {
                        limit: self.limits.max_exponent,
                    });
                }
                if a < 0.0 && b.fract() != 0.0 {
                    result.push(Violation::FractionalPowerOfNegative);
                }
            }
            Operator::Sqrt if a < 0.0 => result.push(Violation::NegativeSquareRoot),
            Operator::NthRoot => {
                if b == 0.0 {
                    result.push(Violation::ZeroRootDegree);
                } else if a < 0.0 && !is_odd_integer(b) {
                    result.push(Violation::RootOfNegative);
                }
            }
            Operator::Log | Operator::Ln | Operator::Log10 if a <= 0.0 => {
                result.push(Violation::NonPositiveLogarithm);
            }
            Operator::Asin | Operator::Acos if !(-1.0..=1.0).contains(&a) => {
                result.push(Violation::InverseTrigDomain);
            }
            Operator::ShiftLeft | Operator::ShiftRight
                if b.fract() != 0.0 || !(0.0..=63.0).contains(&b) =>
            {
                result.push(Violation::ShiftOutOfRange);
            }
            Operator::ConvertBase if split_radix_pair(b).is_none() => {
                result.push(Violation::InvalidRadix(b));
            }
            _ => {}
        }
    }

    fn check_overflow(op: Operator, a: f64, b: f64, result: &mut ValidationResult) {
        let magnitude = a.abs();
        if magnitude <= 1.0 {
            return;
        }
        match op {
            Operator::Multiply if b.abs() > f64::MAX / magnitude => {
                result.push(Violation::MultiplicationOverflow);
            }
            Operator::Power if b > f64::MAX.ln() / magnitude.ln() => {
                result.push(Violation::PowerOverflow);
            }
            _ => {}
        }
    }
}

/// True for finite integral values with an odd magnitude.
pub(crate) fn is_odd_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && (value / 2.0).fract() != 0.0
}
