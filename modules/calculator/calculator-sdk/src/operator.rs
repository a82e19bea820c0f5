//! Operator registry.
//!
//! A fixed table maps every recognized token to an [`Operator`] and its
//! [`OperatorClass`]. Parsing is the only place where tokens are strings;
//! everything downstream works on the closed enum.

use std::fmt;
use std::str::FromStr;

/// Every operation the calculator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Pow,
    Sqrt,
    Cbrt,
    NthRoot,
    Exp,
    Log,
    Ln,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Abs,
    Ceil,
    Floor,
    Round,
    Max,
    Min,
    And,
    Or,
    Xor,
    Not,
    ShiftLeft,
    ShiftRight,
    ConvertBase,
}

/// Classification of an operator token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorClass {
    Unknown,
    BasicBinary,
    ExtendedUnary,
    ExtendedBinary,
}

/// Number of operands an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Unary,
    Binary,
}

use OperatorClass::{BasicBinary, ExtendedBinary, ExtendedUnary};

const REGISTRY: [(Operator, &str, OperatorClass); 36] = [
    (Operator::Add, "+", BasicBinary),
    (Operator::Subtract, "-", BasicBinary),
    (Operator::Multiply, "*", BasicBinary),
    (Operator::Divide, "/", BasicBinary),
    (Operator::Modulo, "%", BasicBinary),
    (Operator::Power, "^", BasicBinary),
    (Operator::Pow, "pow", ExtendedBinary),
    (Operator::Sqrt, "sqrt", ExtendedUnary),
    (Operator::Cbrt, "cbrt", ExtendedUnary),
    (Operator::NthRoot, "nthroot", ExtendedBinary),
    (Operator::Exp, "exp", ExtendedUnary),
    (Operator::Log, "log", ExtendedUnary),
    (Operator::Ln, "ln", ExtendedUnary),
    (Operator::Log10, "log10", ExtendedUnary),
    (Operator::Sin, "sin", ExtendedUnary),
    (Operator::Cos, "cos", ExtendedUnary),
    (Operator::Tan, "tan", ExtendedUnary),
    (Operator::Asin, "asin", ExtendedUnary),
    (Operator::Acos, "acos", ExtendedUnary),
    (Operator::Atan, "atan", ExtendedUnary),
    (Operator::Sinh, "sinh", ExtendedUnary),
    (Operator::Cosh, "cosh", ExtendedUnary),
    (Operator::Tanh, "tanh", ExtendedUnary),
    (Operator::Abs, "abs", ExtendedUnary),
    (Operator::Ceil, "ceil", ExtendedUnary),
    (Operator::Floor, "floor", ExtendedUnary),
    (Operator::Round, "round", ExtendedUnary),
    (Operator::Max, "max", ExtendedBinary),
    (Operator::Min, "min", ExtendedBinary),
    (Operator::And, "AND", ExtendedBinary),
    (Operator::Or, "OR", ExtendedBinary),
    (Operator::Xor, "XOR", ExtendedBinary),
    (Operator::Not, "NOT", ExtendedUnary),
    (Operator::ShiftLeft, "LSH", ExtendedBinary),
    (Operator::ShiftRight, "RSH", ExtendedBinary),
    (Operator::ConvertBase, "convertBase", ExtendedBinary),
];

// Rows are in declaration order so a variant indexes its own row.
const _: () = {
    assert!(REGISTRY.len() == Operator::ConvertBase as usize + 1);
    let mut i = 0;
    while i < REGISTRY.len() {
        assert!(REGISTRY[i].0 as usize == i, "registry row out of order");
        i += 1;
    }
};

/// Error returned when a token is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operator '{0}'")]
pub struct UnknownOperator(pub String);

impl Operator {
    /// Look up a token. Surrounding whitespace is ignored; matching is case-sensitive.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        REGISTRY
            .iter()
            .find(|(_, t, _)| *t == token)
            .map(|(op, _, _)| *op)
    }

    /// Iterate over all registered operators.
    pub fn all() -> impl Iterator<Item = Self> {
        REGISTRY.iter().map(|(op, _, _)| *op)
    }

    /// Iterate over the basic arithmetic operators.
    pub fn basic() -> impl Iterator<Item = Self> {
        Self::all().filter(|op| op.is_basic())
    }

    /// Canonical wire token.
    #[must_use]
    pub fn token(self) -> &'static str {
        self.entry().1
    }

    #[must_use]
    pub fn class(self) -> OperatorClass {
        self.entry().2
    }

    #[must_use]
    pub fn arity(self) -> Arity {
        match self.class() {
            ExtendedUnary => Arity::Unary,
            _ => Arity::Binary,
        }
    }

    #[must_use]
    pub fn is_unary(self) -> bool {
        self.arity() == Arity::Unary
    }

    #[must_use]
    pub fn is_basic(self) -> bool {
        self.class() == BasicBinary
    }

    fn entry(self) -> &'static (Operator, &'static str, OperatorClass) {
        &REGISTRY[self as usize]
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownOperator(s.to_owned()))
    }
}

/// Classify a raw token.
#[must_use]
pub fn classify(token: &str) -> OperatorClass {
    Operator::parse(token).map_or(OperatorClass::Unknown, Operator::class)
}
