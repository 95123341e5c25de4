use crate::{CompareError, Operand};
use serde::{Deserialize, Serialize};

/// Relational operator of a condition step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compare {
    #[serde(alias = "<")]
    Less,
    #[serde(alias = "<=")]
    LessOrEqual,
    #[serde(alias = "==")]
    Equal,
    #[serde(alias = ">=")]
    GreaterOrEqual,
    #[serde(alias = ">")]
    Greater,
    #[serde(alias = "!=")]
    NotEqual,
}

impl Compare {
    pub fn symbol(self) -> &'static str {
        match self {
            Compare::Less => "<",
            Compare::LessOrEqual => "<=",
            Compare::Equal => "==",
            Compare::GreaterOrEqual => ">=",
            Compare::Greater => ">",
            Compare::NotEqual => "!=",
        }
    }

    fn apply<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Compare::Less => a < b,
            Compare::LessOrEqual => a <= b,
            Compare::Equal => a == b,
            Compare::GreaterOrEqual => a >= b,
            Compare::Greater => a > b,
            Compare::NotEqual => a != b,
        }
    }
}

/// Compare two operands of the same type.
///
/// Vectors compare by squared magnitude, so `Equal` and `NotEqual` on
/// vectors are exact float comparisons. Vectors of different dimension are
/// different types.
pub fn evaluate(op: Compare, a: &Operand, b: &Operand) -> Result<bool, CompareError> {
    match (a, b) {
        (Operand::Int(x), Operand::Int(y)) => Ok(op.apply(x, y)),
        (Operand::Float(x), Operand::Float(y)) => Ok(op.apply(x, y)),
        (Operand::Vector(x), Operand::Vector(y)) if x.len() == y.len() => {
            Ok(op.apply(sqr_magnitude(x), sqr_magnitude(y)))
        }
        _ => Err(CompareError::TypeMismatch {
            left: a.kind(),
            right: b.kind(),
        }),
    }
}

fn sqr_magnitude(v: &[f64]) -> f64 {
    v.iter().map(|c| c * c).sum()
}
