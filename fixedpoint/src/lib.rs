#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

mod error;
mod precision;

#[cfg(test)]
mod test_utils;

pub mod circuit;
pub mod gadgets;
pub mod lookup;
pub mod utils;

pub use error::Error;
pub use gadgets::{
    Acos, Asin, Atan, Atanh, AtanhDivByPos, Columns, Decomposition, DivByPositive, Exp, ExpRanged,
    Gadget, Log, Range, Rem, Rounding, Sqrt, Trig, TrigFunction,
};
pub use precision::Precision;

pub(crate) const LOG_TARGET: &str = "nexus-fixedpoint";
