use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::One;

use super::{
    boolean, check_field, compose, constant, place_gates, range_lookups, CellLayout, Columns,
    Gadget, Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Expression, Gate},
    lookup::TableKind,
    utils, Error, Precision, LOG_TARGET,
};

/// Witness of a rounding division `q = round(n / d)` for `d > 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoundedQuotient {
    pub quotient: BigInt,
    pub remainder: BigInt,
    /// Parity of the divisor.
    pub parity: BigInt,
    /// `d - r - 1`, non-negative iff `r < d`.
    pub gap: BigInt,
}

impl RoundedQuotient {
    pub fn new(numerator: &BigInt, divisor: &BigInt) -> Result<Self, Error> {
        let (quotient, remainder) = utils::round_div_mod(numerator, divisor)?;
        let gap = divisor - &remainder - 1u32;
        Ok(Self {
            quotient,
            remainder,
            parity: utils::parity(divisor),
            gap,
        })
    }
}

/// `2n + d - b - 2qd - 2r`, zero iff `q = round(n / d)` given `b` boolean and
/// `0 <= r < d`.
pub(crate) fn rounding_identity<F: PrimeField>(
    numerator: Expression<F>,
    divisor: Expression<F>,
    parity: Expression<F>,
    quotient: Expression<F>,
    remainder: Expression<F>,
) -> Expression<F> {
    let two = F::from(2u64);
    numerator * two + divisor.clone() - parity - quotient * divisor * two - remainder * two
}

/// `d - r - 1 - gap`.
pub(crate) fn remainder_bound<F: PrimeField>(
    divisor: Expression<F>,
    remainder: Expression<F>,
    gap: Expression<F>,
) -> Expression<F> {
    divisor - remainder - F::ONE - gap
}

/// `n + 2^(bits - 1) - q * 2^bits - r`, the rounding identity for a
/// power-of-two divisor, where `r` is range-checked into `bits / 16` limbs.
pub(crate) fn shift_identity<F: PrimeField>(
    numerator: Expression<F>,
    bits: usize,
    quotient: Expression<F>,
    remainder: Expression<F>,
) -> Expression<F> {
    numerator + super::pow2::<F>(bits - 1) - quotient * super::pow2::<F>(bits) - remainder
}

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    y: Slot,
    z: Slot,
    parity: Slot,
    remainder: Vec<Slot>,
    gap: Vec<Slot>,
}

/// Proves `z = round(x * scale / y)` for a strictly positive `y`.
///
/// With `scale = delta` this is fixed-point division; with `scale = 1` it is
/// the integer rounding division. Positivity of `y` follows from
/// `y - r - 1 >= 0` and `r >= 0`.
///
/// ```text
/// | x | y | z | b | r_0 .. r_{m-1} | g_0 .. g_{m-1} |
/// ```
///
/// Constraints:
///
/// ```text
/// b * (b - 1) = 0
/// 2 * scale * x + y - b = 2 * z * y + 2 * r
/// y - r - 1 = g
/// ```
#[derive(Debug, Clone)]
pub struct DivByPositive<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    scale: BigInt,
    row_layout: RowLayout,
    layout: Layout,
    _field: PhantomData<F>,
}

impl<F: PrimeField> DivByPositive<F> {
    /// Fixed-point division, `z = round(x * delta / y)`.
    pub fn new(columns: Columns, precision: Precision) -> Self {
        let delta = precision.delta();
        Self::with_scale(columns, precision, delta)
    }

    /// Integer rounding division, `z = round(x / y)`.
    pub fn integer(columns: Columns, precision: Precision) -> Self {
        Self::with_scale(columns, precision, BigInt::one())
    }

    fn with_scale(columns: Columns, precision: Precision, scale: BigInt) -> Self {
        check_field::<F>();
        columns.require("div_by_positive", Self::witness_columns(precision), 0);

        let m = precision.m();
        let row_layout = RowLayout::choose(Self::cells(precision), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let layout = Layout {
            x: slots.next(),
            y: slots.next(),
            z: slots.next(),
            parity: slots.next(),
            remainder: slots.take(m),
            gap: slots.take(m),
        };
        Self {
            columns,
            precision,
            scale,
            row_layout,
            layout,
            _field: PhantomData,
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        RowLayout::min_width(Self::cells(precision))
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        RowLayout::choose(Self::cells(precision), witness_amount).rows()
    }

    fn cells(precision: Precision) -> usize {
        4 + 2 * precision.m()
    }

    pub fn evaluate(&self, x: &BigInt, y: &BigInt) -> Result<BigInt, Error> {
        utils::round_div(&(x * &self.scale), y)
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.z, start_row)
    }
}

impl<F: PrimeField> Gadget<F> for DivByPositive<F> {
    type Input = (Cell, Cell);
    type Output = Cell;

    fn rows(&self) -> usize {
        self.row_layout.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let q = |slot| self.columns.query::<F>(slot, 0);
        let remainder = self.columns.queries::<F>(&self.layout.remainder, 0);
        let gap = self.columns.queries::<F>(&self.layout.gap, 0);

        let y = q(self.layout.y);
        let constraints = vec![
            boolean(q(self.layout.parity)),
            rounding_identity(
                q(self.layout.x) * constant::<F>(&self.scale),
                y.clone(),
                q(self.layout.parity),
                q(self.layout.z),
                compose(remainder.clone()),
            ),
            remainder_bound(y, compose(remainder.clone()), compose(gap.clone())),
        ];
        let lookups = range_lookups(&[remainder, gap].concat());
        vec![
            (0, Gate::Polynomial(constraints)),
            (0, Gate::Lookup(lookups)),
        ]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        vec![TableKind::Range16]
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let cell = |slot| self.columns.cell(slot, start_row);
        let mut layout = CellLayout::default();
        layout.push("x", vec![cell(self.layout.x)]);
        layout.push("y", vec![cell(self.layout.y)]);
        layout.push("z", vec![cell(self.layout.z)]);
        layout.push("parity", vec![cell(self.layout.parity)]);
        layout.push("remainder", self.columns.cells(&self.layout.remainder, start_row));
        layout.push("gap", self.columns.cells(&self.layout.gap, start_row));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &(Cell, Cell),
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "div_by_positive", start_row).entered();

        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(input.0);
        let y = region.read(input.1);
        let division = RoundedQuotient::new(&(&x * &self.scale), &y)?;

        region.assign(self.layout.x, &x);
        region.assign(self.layout.y, &y);
        region.assign(self.layout.z, &division.quotient);
        region.assign(self.layout.parity, &division.parity);
        region.assign_unsigned(&self.layout.remainder, &division.remainder)?;
        region.assign_unsigned(&self.layout.gap, &division.gap)?;

        Ok(self.output(start_row))
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &(Cell, Cell),
        start_row: usize,
    ) -> Cell {
        place_gates(cs, assignment, self.gates(), start_row);
        cs.add_copy_constraint(input.0, self.columns.cell(self.layout.x, start_row));
        cs.add_copy_constraint(input.1, self.columns.cell(self.layout.y, start_row));
        self.output(start_row)
    }
}
