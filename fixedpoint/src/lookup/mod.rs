//! Precomputed lookup tables.
//!
//! Every table is keyed by its first column, which holds `0..len`. Tables are
//! generated on first use and cached for the lifetime of the process, once per
//! field type.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use ark_ff::PrimeField;

use crate::{utils, LOG_TARGET};

mod exp;
mod range;
mod trig;

pub use exp::{EXP_INTEGER_KEYS, EXP_KEY_OFFSET};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    /// `0..2^16`.
    Range16,
    /// `(k, sin, cos)` of `k * 2^-32` at scale `2^32`.
    Trig32A,
    /// `(k, sin, cos)` of `k * 2^-16` at scale `2^32`.
    Trig32B,
    /// `(k, sin, cos)` of `k` at scale `2^32`.
    Trig32C,
    /// `(k, sin, cos)` of `k * 2^-48` at scale `2^48`.
    Trig48A,
    /// `(k, sin, cos)` of `k * 2^-32` at scale `2^48`.
    Trig48B,
    /// `(k, sin, cos)` of `k * 2^-16` at scale `2^48`.
    Trig48C,
    /// `(k, sin, cos)` of `k` at scale `2^48`.
    Trig48D,
    /// `(k, e^(k - 23))` at scale `2^32`.
    Exp16A,
    /// `(k, e^(k * 2^-16))` at scale `2^16`.
    Exp16B,
    /// `(k, e^(k - 23))` at scale `2^48`.
    Exp32A,
    /// `(k, e^(k * 2^-16))` at scale `2^32`.
    Exp32B,
}

impl TableKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Range16 => "range_16bit/full",
            Self::Trig32A => "fixedpoint_trig_32/a",
            Self::Trig32B => "fixedpoint_trig_32/b",
            Self::Trig32C => "fixedpoint_trig_32/c",
            Self::Trig48A => "fixedpoint_trig_48/a",
            Self::Trig48B => "fixedpoint_trig_48/b",
            Self::Trig48C => "fixedpoint_trig_48/c",
            Self::Trig48D => "fixedpoint_trig_48/d",
            Self::Exp16A => "fixedpoint_exp_16/a",
            Self::Exp16B => "fixedpoint_exp_16/b",
            Self::Exp32A => "fixedpoint_exp_32/a",
            Self::Exp32B => "fixedpoint_exp_32/b",
        }
    }

    /// Trig table with values at scale `2^bits` for angle limbs weighing
    /// `2^-unit_bits`.
    pub fn trig(bits: usize, unit_bits: usize) -> Self {
        match (bits, unit_bits) {
            (32, 32) => Self::Trig32A,
            (32, 16) => Self::Trig32B,
            (32, 0) => Self::Trig32C,
            (48, 48) => Self::Trig48A,
            (48, 32) => Self::Trig48B,
            (48, 16) => Self::Trig48C,
            (48, 0) => Self::Trig48D,
            _ => panic!("no trig table for limbs of 2^-{unit_bits} at scale 2^{bits}"),
        }
    }

    /// Table of `e^i` for the integer part of an exponent with `m2` post-comma limbs.
    pub fn exp_integer(m2: usize) -> Self {
        if m2 == 1 {
            Self::Exp16A
        } else {
            Self::Exp32A
        }
    }

    /// Table of `e^f` for the upper post-comma limb of an exponent.
    pub fn exp_fraction(m2: usize) -> Self {
        if m2 == 1 {
            Self::Exp16B
        } else {
            Self::Exp32B
        }
    }

    fn generate<F: PrimeField>(self) -> LookupTable<F> {
        let columns = match self {
            Self::Range16 => range::range_16(),
            Self::Trig32A => trig::sin_cos(32, 32),
            Self::Trig32B => trig::sin_cos(32, 16),
            Self::Trig32C => trig::sin_cos(32, 0),
            Self::Trig48A => trig::sin_cos(48, 48),
            Self::Trig48B => trig::sin_cos(48, 32),
            Self::Trig48C => trig::sin_cos(48, 16),
            Self::Trig48D => trig::sin_cos(48, 0),
            Self::Exp16A => exp::integer_part(1),
            Self::Exp16B => exp::fractional_part(1),
            Self::Exp32A => exp::integer_part(2),
            Self::Exp32B => exp::fractional_part(2),
        };
        LookupTable {
            kind: self,
            columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable<F: PrimeField> {
    kind: TableKind,
    columns: Vec<Vec<F>>,
}

impl<F: PrimeField> LookupTable<F> {
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, index: usize) -> &[F] {
        &self.columns[index]
    }

    /// Value in `column` of the row keyed by `key`.
    pub fn value(&self, key: usize, column: usize) -> Option<F> {
        self.columns.get(column)?.get(key).copied()
    }

    pub fn contains(&self, row: &[F]) -> bool {
        if row.len() != self.width() {
            return false;
        }
        let Some(key) = utils::to_index(&utils::to_bigint(row[0])) else {
            return false;
        };
        key < self.len()
            && self
                .columns
                .iter()
                .zip(row)
                .all(|(column, value)| column[key] == *value)
    }
}

type Cache = Mutex<HashMap<(TypeId, TableKind), Arc<dyn Any + Send + Sync>>>;

static TABLES: OnceLock<Cache> = OnceLock::new();

/// Returns the table of `kind` over `F`, generating it on first use.
///
/// Concurrent first uses may both generate the table; only the first result
/// is kept.
pub fn table<F: PrimeField>(kind: TableKind) -> Arc<LookupTable<F>> {
    let cache = TABLES.get_or_init(Default::default);
    let key = (TypeId::of::<F>(), kind);

    let cached = cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .cloned();
    if let Some(Ok(table)) = cached.map(|table| table.downcast::<LookupTable<F>>()) {
        return table;
    }

    let generated = Arc::new(kind.generate::<F>());
    tracing::debug!(
        target: LOG_TARGET,
        table = kind.name(),
        rows = generated.len(),
        "generated lookup table",
    );
    let stored = cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert_with(|| generated.clone() as Arc<dyn Any + Send + Sync>)
        .clone();
    stored.downcast::<LookupTable<F>>().unwrap_or(generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    use num_bigint::BigInt;

    use crate::utils::to_bigint;

    #[test]
    fn cached_per_field() {
        let a = table::<ark_pallas::Fr>(TableKind::Range16);
        let b = table::<ark_pallas::Fr>(TableKind::Range16);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 1 << 16);

        let c = table::<ark_bn254::Fr>(TableKind::Range16);
        assert_eq!(c.len(), a.len());
        assert_eq!(c.name(), "range_16bit/full");
    }

    #[test]
    fn range_membership() {
        let range = table::<ark_pallas::Fr>(TableKind::Range16);
        assert!(range.contains(&[ark_pallas::Fr::from(0u64)]));
        assert!(range.contains(&[ark_pallas::Fr::from(65535u64)]));
        assert!(!range.contains(&[ark_pallas::Fr::from(65536u64)]));
        assert!(!range.contains(&[-ark_pallas::Fr::from(1u64)]));
    }

    #[test]
    fn trig_tables() {
        let a = table::<ark_pallas::Fr>(TableKind::Trig32B);
        let b = table::<ark_pallas::Fr>(TableKind::Trig32C);
        assert_eq!(a.width(), 3);

        // sin(0) = 0, cos(0) = 1.
        assert_eq!(to_bigint(a.column(1)[0]), BigInt::from(0));
        assert_eq!(to_bigint(a.column(2)[0]), BigInt::from(1i64 << 32));

        // sin(1), cos(1) at scale 2^32.
        assert_eq!(to_bigint(b.column(1)[1]), BigInt::from(3_614_090_360i64));
        assert_eq!(to_bigint(b.column(2)[1]), BigInt::from(2_320_580_734i64));
        // cos(2) < 0.
        assert_eq!(to_bigint(b.column(2)[2]), BigInt::from(-1_787_337_053i64));

        // sin(2^-16) at scale 2^48 is 2^32 up to the cubic term.
        let c = table::<ark_pallas::Fr>(TableKind::Trig48C);
        assert_eq!(to_bigint(c.column(1)[1]), BigInt::from(1i64 << 32));

        let row = [a.column(0)[7], a.column(1)[7], a.column(2)[7]];
        assert!(a.contains(&row));
        assert!(!a.contains(&[row[0], row[2], row[1]]));
    }

    #[test]
    fn exp_tables() {
        let a = table::<ark_pallas::Fr>(TableKind::Exp16A);
        assert_eq!(a.len(), EXP_INTEGER_KEYS);
        // e^0 at scale 2^32.
        let zero = EXP_KEY_OFFSET as usize;
        assert_eq!(to_bigint(a.column(1)[zero]), BigInt::from(1i64 << 32));

        let b = table::<ark_pallas::Fr>(TableKind::Exp32B);
        assert_eq!(b.len(), 1 << 16);
        assert_eq!(to_bigint(b.column(1)[0]), BigInt::from(1i64 << 32));
    }

    #[test]
    #[should_panic]
    fn no_table_at_16_bit_scale() {
        TableKind::trig(16, 0);
    }
}
