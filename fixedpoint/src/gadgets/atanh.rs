use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::Signed;

use super::{
    boolean, check_field, compose, constant, dedup_tables,
    division::{remainder_bound, rounding_identity, DivByPositive, RoundedQuotient},
    log::Log,
    place_gates, range_lookups, sign, CellLayout, Columns, Gadget, Region, RowLayout, Slot,
    SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Expression, Gate},
    lookup::TableKind,
    utils, Error, Precision, LOG_TARGET,
};

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    sign: Slot,
    abs: Vec<Slot>,
    headroom: Vec<Slot>,
    z: Slot,
    parity: Slot,
    remainder: Vec<Slot>,
    gap: Vec<Slot>,
}

/// `z = round(delta * (delta + x) / (delta - x))`, the argument of the
/// logarithm in `atanh(x) = log((1 + x) / (1 - x)) / 2`.
///
/// ```text
/// | x | s | |x|_0..m2-1 | h_0..m2-1 | z | b | r_0..m2 | g_0..m2 |
///
/// x = s * |x|
/// delta - 2 - |x| = h
/// 2 delta (delta + x) + (delta - x) - b = 2 z (delta - x) + 2 r
/// (delta - x) - r - 1 = g
/// ```
///
/// `|x| <= delta - 2` keeps the divisor positive and `z` below `delta^2`.
#[derive(Debug, Clone)]
pub struct AtanhDivByPos<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    row_layout: RowLayout,
    layout: Layout,
    _field: PhantomData<F>,
}

impl<F: PrimeField> AtanhDivByPos<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        check_field::<F>();
        columns.require("atanh_div_by_pos", Self::witness_columns(precision), 0);

        let m2 = precision.m2();
        let row_layout = RowLayout::choose(Self::cells(precision), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let layout = Layout {
            x: slots.next(),
            sign: slots.next(),
            abs: slots.take(m2),
            headroom: slots.take(m2),
            z: slots.next(),
            parity: slots.next(),
            remainder: slots.take(m2 + 1),
            gap: slots.take(m2 + 1),
        };
        Self {
            columns,
            precision,
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
        6 + 4 * precision.m2()
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        Ok(self.witness(x)?.1.quotient)
    }

    /// `(headroom, division)`.
    fn witness(&self, x: &BigInt) -> Result<(BigInt, RoundedQuotient), Error> {
        let delta = self.precision.delta();
        let headroom = &delta - 2u32 - x.abs();
        if headroom.is_negative() {
            return Err(Error::OutOfDomain {
                gadget: "atanh",
                reason: "argument must lie strictly inside (-1, 1)",
            });
        }
        let division = RoundedQuotient::new(&(&delta * (&delta + x)), &(&delta - x))?;
        Ok((headroom, division))
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.z, start_row)
    }
}

impl<F: PrimeField> Gadget<F> for AtanhDivByPos<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.row_layout.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let q = |slot| self.columns.query::<F>(slot, 0);
        let abs = self.columns.queries::<F>(&l.abs, 0);
        let headroom = self.columns.queries::<F>(&l.headroom, 0);
        let remainder = self.columns.queries::<F>(&l.remainder, 0);
        let gap = self.columns.queries::<F>(&l.gap, 0);

        let delta: F = constant(&self.precision.delta());
        let divisor = Expression::constant(delta) - q(l.x);
        let constraints = vec![
            q(l.x) - q(l.sign) * compose(abs.clone()),
            sign(q(l.sign)),
            Expression::constant(delta - F::from(2u64))
                - compose(abs.clone())
                - compose(headroom.clone()),
            boolean(q(l.parity)),
            rounding_identity(
                (q(l.x) + delta) * delta,
                divisor.clone(),
                q(l.parity),
                q(l.z),
                compose(remainder.clone()),
            ),
            remainder_bound(divisor, compose(remainder.clone()), compose(gap.clone())),
        ];
        vec![
            (0, Gate::Polynomial(constraints)),
            (
                0,
                Gate::Lookup(range_lookups(&[abs, headroom, remainder, gap].concat())),
            ),
        ]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        vec![TableKind::Range16]
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let l = &self.layout;
        let cell = |slot| vec![self.columns.cell(slot, start_row)];
        let cells = |slots: &[Slot]| self.columns.cells(slots, start_row);
        let mut layout = CellLayout::default();
        layout.push("x", cell(l.x));
        layout.push("sign", cell(l.sign));
        layout.push("abs", cells(&l.abs));
        layout.push("headroom", cells(&l.headroom));
        layout.push("z", cell(l.z));
        layout.push("parity", cell(l.parity));
        layout.push("remainder", cells(&l.remainder));
        layout.push("gap", cells(&l.gap));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span =
            tracing::debug_span!(target: LOG_TARGET, "atanh_div_by_pos", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let (headroom, division) = self.witness(&x)?;

        region.assign(l.x, &x);
        region.assign(l.sign, &utils::sign(&x));
        region.assign_unsigned(&l.abs, &x.abs())?;
        region.assign_unsigned(&l.headroom, &headroom)?;
        region.assign(l.z, &division.quotient);
        region.assign(l.parity, &division.parity);
        region.assign_unsigned(&l.remainder, &division.remainder)?;
        region.assign_unsigned(&l.gap, &division.gap)?;

        Ok(self.output(start_row))
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Cell {
        place_gates(cs, assignment, self.gates(), start_row);
        cs.add_copy_constraint(*input, self.columns.cell(self.layout.x, start_row));
        self.output(start_row)
    }
}

/// Fixed-point hyperbolic arctangent, `atanh(x) = log(z) / 2` with `z` from
/// [`AtanhDivByPos`].
///
/// Children in row order: the ratio, the logarithm, and a division of the
/// logarithm by the constant `2 * delta` held in the first constant column
/// at the start row.
///
/// With one integer limb and two post-comma limbs `z` exceeds `m` limbs for
/// `x > delta - 131071`, roughly `x > 0.99997`; such inputs fail in the
/// logarithm. Every other precision accepts all of `|x| <= delta - 2`.
#[derive(Debug, Clone)]
pub struct Atanh<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    ratio: AtanhDivByPos<F>,
    log: Log<F>,
    halve: DivByPositive<F>,
}

impl<F: PrimeField> Atanh<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        check_field::<F>();
        columns.require("atanh", Self::witness_columns(precision), 1);

        Self {
            ratio: AtanhDivByPos::new(columns.clone(), precision),
            log: Log::new(columns.clone(), precision),
            halve: DivByPositive::new(columns.clone(), precision),
            columns,
            precision,
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        AtanhDivByPos::<F>::witness_columns(precision)
            .max(Log::<F>::witness_columns(precision))
            .max(DivByPositive::<F>::witness_columns(precision))
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        AtanhDivByPos::<F>::rows_amount(witness_amount, precision)
            + Log::<F>::rows_amount(witness_amount, precision)
            + DivByPositive::<F>::rows_amount(witness_amount, precision)
    }

    fn two_delta(&self) -> BigInt {
        self.precision.delta() * 2u32
    }

    fn log_row(&self) -> usize {
        self.ratio.rows()
    }

    fn halve_row(&self) -> usize {
        self.ratio.rows() + self.log.rows()
    }
}

impl<F: PrimeField> Gadget<F> for Atanh<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.ratio.rows() + self.log.rows() + self.halve.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        Vec::new()
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        dedup_tables(
            [
                self.ratio.lookup_tables(),
                self.log.lookup_tables(),
                self.halve.lookup_tables(),
            ]
            .concat(),
        )
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let mut layout = CellLayout::default();
        layout.push("two_delta", vec![self.columns.constant_cell(0, start_row)]);
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "atanh", start_row).entered();

        Region::new(assignment, &self.columns, start_row).assign_constant(
            0,
            0,
            &self.two_delta(),
        );
        let ratio = self.ratio.assign(assignment, input, start_row)?;
        let log = self
            .log
            .assign(assignment, &ratio, start_row + self.log_row())?;
        let two_delta = self.columns.constant_cell(0, start_row);
        self.halve
            .assign(assignment, &(log, two_delta), start_row + self.halve_row())
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Cell {
        Region::new(assignment, &self.columns, start_row).assign_constant(
            0,
            0,
            &self.two_delta(),
        );
        let two_delta = self.columns.constant_cell(0, start_row);

        let ratio = self.ratio.build_circuit(cs, assignment, input, start_row);
        let log = self
            .log
            .build_circuit(cs, assignment, &ratio, start_row + self.log_row());
        self.halve.build_circuit(
            cs,
            assignment,
            &(log, two_delta),
            start_row + self.halve_row(),
        )
    }
}
