use thiserror::Error;

/// Witness generation failure.
///
/// An input outside of a gadget's domain can never satisfy its constraints,
/// so these are reported before any proving work is done.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("value does not fit into {limbs} 16-bit limbs")]
    DecompositionOverflow { limbs: usize },

    #[error("expected a non-negative value")]
    NegativeValue,

    #[error("divisor must be strictly positive")]
    NonPositiveDivisor,

    #[error("division by zero")]
    DivisionByZero,

    #[error("{gadget}: {reason}")]
    OutOfDomain {
        gadget: &'static str,
        reason: &'static str,
    },

    #[error("key is missing from lookup table `{table}`")]
    TableMiss { table: &'static str },

    #[error("unsupported precision: m1 = {m1}, m2 = {m2}")]
    InvalidPrecision { m1: u8, m2: u8 },
}
