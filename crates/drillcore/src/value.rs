use serde::{Deserialize, Serialize};

/// Typed operand for condition steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum Operand {
    Int(i64),
    Float(f64),
    Vector(Vec<f64>),
}

impl Operand {
    /// Type name used in mismatch reports; vectors carry their dimension.
    pub fn kind(&self) -> String {
        match self {
            Operand::Int(_) => "int".to_string(),
            Operand::Float(_) => "float".to_string(),
            Operand::Vector(v) => format!("vector{}", v.len()),
        }
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Int(n)
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Operand::Int(n as i64)
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Float(n)
    }
}

impl From<Vec<f64>> for Operand {
    fn from(v: Vec<f64>) -> Self {
        Operand::Vector(v)
    }
}

impl<const N: usize> From<[f64; N]> for Operand {
    fn from(v: [f64; N]) -> Self {
        Operand::Vector(v.to_vec())
    }
}
