//! Fixed-point gadgets.
//!
//! A gadget owns a set of witness columns and a fixed number of rows. Its
//! variables are laid out relative to a caller-supplied start row, its inputs
//! are copied into its own cells, and gadgets built from other gadgets own
//! those children and place them below their own rows.

use ark_ff::PrimeField;
use num_bigint::BigInt;

use nexus_config::FixedPointConfig;

use crate::{
    circuit::{Assignment, Cell, Column, ConstraintSystem, Expression, Gate, Lookup},
    lookup::TableKind,
    utils::{self, LIMB_BITS},
    Error,
};

mod asin;
mod atan;
mod atanh;
mod decomposition;
mod division;
mod exp;
mod layout;
mod log;
mod range;
mod rem;
mod sqrt;
mod trig;

pub use asin::{Acos, Asin};
pub use atan::Atan;
pub use atanh::{Atanh, AtanhDivByPos};
pub use decomposition::{Decomposition, DecompositionOutput};
pub use division::DivByPositive;
pub use exp::{Exp, ExpRanged};
pub use layout::{CellLayout, RowLayout, Slot, SlotAllocator};
pub use log::Log;
pub use range::{Range, RangeOutput};
pub use rem::Rem;
pub use sqrt::{Rounding, Sqrt};
pub use trig::{Trig, TrigFunction};

pub trait Gadget<F: PrimeField> {
    type Input;
    type Output;

    /// Rows occupied by the gadget and all of its children.
    fn rows(&self) -> usize;

    /// Own gates, each paired with the row offset its selector is enabled on.
    fn gates(&self) -> Vec<(usize, Gate<F>)>;

    /// Tables used by the gadget and all of its children.
    fn lookup_tables(&self) -> Vec<TableKind>;

    /// Position of every named variable of the gadget itself.
    fn cell_layout(&self, start_row: usize) -> CellLayout;

    /// Writes the witness of the gadget and its children. Input cells must
    /// already be assigned.
    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Self::Input,
        start_row: usize,
    ) -> Result<Self::Output, Error>;

    /// Registers gates, enables selectors, adds copy constraints from the
    /// input cells and fills constant cells.
    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &Self::Input,
        start_row: usize,
    ) -> Self::Output;

    fn gate_count(&self) -> usize {
        self.gates().len()
    }
}

/// Column indices a gadget may use.
///
/// Children share the constant and public-input columns of their parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    pub witness: Vec<usize>,
    pub constant: Vec<usize>,
    pub public_input: Vec<usize>,
}

impl Columns {
    pub fn new(witness: Vec<usize>, constant: Vec<usize>, public_input: Vec<usize>) -> Self {
        Self {
            witness,
            constant,
            public_input,
        }
    }

    /// Columns `0..witness`, `0..constant` and `0..public_input`.
    pub fn contiguous(witness: usize, constant: usize, public_input: usize) -> Self {
        Self::new(
            (0..witness).collect(),
            (0..constant).collect(),
            (0..public_input).collect(),
        )
    }

    pub fn witness_amount(&self) -> usize {
        self.witness.len()
    }

    pub fn cell(&self, slot: Slot, start_row: usize) -> Cell {
        Column::witness(self.witness[slot.column]).cell(start_row + slot.row)
    }

    pub fn cells(&self, slots: &[Slot], start_row: usize) -> Vec<Cell> {
        slots.iter().map(|&slot| self.cell(slot, start_row)).collect()
    }

    /// Query of `slot` from a gate enabled on `gate_row`.
    pub fn query<F: PrimeField>(&self, slot: Slot, gate_row: usize) -> Expression<F> {
        Expression::query(
            Column::witness(self.witness[slot.column]),
            slot.row as i32 - gate_row as i32,
        )
    }

    pub fn queries<F: PrimeField>(&self, slots: &[Slot], gate_row: usize) -> Vec<Expression<F>> {
        slots
            .iter()
            .map(|&slot| self.query(slot, gate_row))
            .collect()
    }

    pub fn constant_cell(&self, index: usize, row: usize) -> Cell {
        Column::constant(self.constant[index]).cell(row)
    }

    pub fn constant_query<F: PrimeField>(&self, index: usize, rotation: i32) -> Expression<F> {
        Expression::query(Column::constant(self.constant[index]), rotation)
    }

    pub(crate) fn require(&self, gadget: &str, witness: usize, constant: usize) {
        assert!(
            self.witness.len() >= witness,
            "{gadget} needs at least {witness} witness columns, got {}",
            self.witness.len()
        );
        assert!(
            self.constant.len() >= constant,
            "{gadget} needs at least {constant} constant columns, got {}",
            self.constant.len()
        );
    }
}

/// The configured number of witness columns, one constant column and one
/// public-input column.
impl From<&FixedPointConfig> for Columns {
    fn from(config: &FixedPointConfig) -> Self {
        Self::contiguous(config.columns, 1, 1)
    }
}

/// Witness writer for one gadget instance.
pub(crate) struct Region<'a, F: PrimeField> {
    assignment: &'a mut Assignment<F>,
    columns: &'a Columns,
    start_row: usize,
}

impl<'a, F: PrimeField> Region<'a, F> {
    pub fn new(assignment: &'a mut Assignment<F>, columns: &'a Columns, start_row: usize) -> Self {
        Self {
            assignment,
            columns,
            start_row,
        }
    }

    pub fn cell(&self, slot: Slot) -> Cell {
        self.columns.cell(slot, self.start_row)
    }

    pub fn read(&self, cell: Cell) -> BigInt {
        utils::to_bigint(self.assignment.value(cell))
    }

    pub fn assign(&mut self, slot: Slot, value: &BigInt) {
        let cell = self.cell(slot);
        self.assignment.assign(cell, utils::from_bigint(value));
    }

    pub fn assign_limbs(&mut self, slots: &[Slot], limbs: &[u16]) {
        debug_assert_eq!(slots.len(), limbs.len());
        for (&slot, &limb) in slots.iter().zip(limbs) {
            let cell = self.cell(slot);
            self.assignment.assign(cell, F::from(limb));
        }
    }

    /// Decomposes a non-negative `value` into `slots.len()` limbs.
    pub fn assign_unsigned(&mut self, slots: &[Slot], value: &BigInt) -> Result<(), Error> {
        let limbs = utils::decompose_unsigned(value, slots.len())?;
        self.assign_limbs(slots, &limbs);
        Ok(())
    }

    pub fn assign_constant(&mut self, index: usize, row: usize, value: &BigInt) {
        let cell = self.columns.constant_cell(index, self.start_row + row);
        self.assignment.assign(cell, utils::from_bigint(value));
    }

    /// Access for assigning children.
    pub fn assignment(&mut self) -> &mut Assignment<F> {
        &mut *self.assignment
    }
}

/// Registers `gates` and enables each on `start_row` plus its offset.
pub(crate) fn place_gates<F: PrimeField>(
    cs: &mut ConstraintSystem<F>,
    assignment: &mut Assignment<F>,
    gates: Vec<(usize, Gate<F>)>,
    start_row: usize,
) {
    for (offset, gate) in gates {
        let selector = cs.add_gate(gate);
        assignment.enable_selector(selector, start_row + offset);
    }
}

/// Intermediate identities reach about 2^170, which must not wrap.
pub(crate) fn check_field<F: PrimeField>() {
    assert!(
        F::MODULUS_BIT_SIZE >= 200,
        "field modulus of {} bits is too small for fixed-point gadgets",
        F::MODULUS_BIT_SIZE
    );
}

pub(crate) fn constant<F: PrimeField>(value: &BigInt) -> F {
    utils::from_bigint(value)
}

pub(crate) fn pow2<F: PrimeField>(bits: usize) -> F {
    utils::from_bigint(&utils::pow2(bits))
}

/// `sum(limbs[i] * 2^(16 i))`.
pub(crate) fn compose<F: PrimeField>(limbs: Vec<Expression<F>>) -> Expression<F> {
    limbs
        .into_iter()
        .enumerate()
        .map(|(i, limb)| {
            if i == 0 {
                limb
            } else {
                limb * pow2::<F>(LIMB_BITS * i)
            }
        })
        .sum()
}

pub(crate) fn range_lookups<F: PrimeField>(limbs: &[Expression<F>]) -> Vec<Lookup<F>> {
    limbs
        .iter()
        .map(|limb| Lookup::new(TableKind::Range16, vec![limb.clone()]))
        .collect()
}

/// `b * (b - 1)`.
pub(crate) fn boolean<F: PrimeField>(b: Expression<F>) -> Expression<F> {
    b.clone() * (b - F::ONE)
}

/// `(s - 1) * (s + 1)`.
pub(crate) fn sign<F: PrimeField>(s: Expression<F>) -> Expression<F> {
    s.clone() * s - F::ONE
}

pub(crate) fn dedup_tables(mut tables: Vec<TableKind>) -> Vec<TableKind> {
    tables.sort();
    tables.dedup();
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_pallas::Fr;

    #[test]
    fn columns_map_slots() {
        let columns = Columns::new(vec![4, 7, 9], vec![2], vec![]);
        let slot = Slot { column: 1, row: 1 };
        assert_eq!(columns.cell(slot, 10), Column::witness(7).cell(11));
        assert_eq!(
            columns.query::<Fr>(slot, 0),
            Expression::query(Column::witness(7), 1)
        );
        assert_eq!(columns.constant_cell(0, 3), Column::constant(2).cell(3));
    }

    #[test]
    fn columns_from_config() {
        let config = FixedPointConfig {
            m1: 2,
            m2: 2,
            columns: 15,
        };
        let columns = Columns::from(&config);
        assert_eq!(columns, Columns::contiguous(15, 1, 1));

        let precision = crate::Precision::try_from(&config).unwrap();
        let trig = Trig::<Fr>::sin(columns.clone(), precision);
        assert_eq!(trig.rows(), Trig::<Fr>::rows_amount(15, precision, TrigFunction::Sin));
        Atan::<Fr>::new(columns, precision);
    }

    #[test]
    #[should_panic]
    fn require_witness_columns() {
        Columns::contiguous(3, 1, 1).require("test", 4, 0);
    }

    #[test]
    fn compose_limbs() {
        let mut assignment = Assignment::<Fr>::new(3, 0, 0);
        for (i, limb) in [5u64, 4, 3].into_iter().enumerate() {
            assignment.assign(Column::witness(i).cell(0), Fr::from(limb));
        }
        let limbs = (0..3)
            .map(|i| Expression::query(Column::witness(i), 0))
            .collect();
        let composed = compose::<Fr>(limbs).evaluate(&assignment, 0);
        assert_eq!(composed, Fr::from(5u64 + (4 << 16) + (3 << 32)));
    }
}
