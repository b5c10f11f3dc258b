use serde::Deserialize;

use super::Config;

/// Fixed-point layout shared by every gadget of a circuit.
///
/// Read from `NEXUS_FIXEDPOINT_M1`, `NEXUS_FIXEDPOINT_M2` and
/// `NEXUS_FIXEDPOINT_COLUMNS`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct FixedPointConfig {
    /// Number of pre-comma 16-bit limbs.
    pub m1: u8,
    /// Number of post-comma 16-bit limbs.
    pub m2: u8,
    /// Witness columns available to a gadget.
    pub columns: usize,
}

impl Config for FixedPointConfig {
    const PREFIX: &'static str = "FIXEDPOINT";
}
