use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::{One, Zero};

use super::{
    boolean, check_field, compose, constant, place_gates, range_lookups, CellLayout, Columns,
    Gadget, Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Expression, Gate},
    lookup::TableKind,
    utils, Error, Precision, LOG_TARGET,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rounding {
    /// `y = round(sqrt(x * delta))`.
    Nearest,
    /// `y = floor(sqrt(x * delta))`.
    Floor,
}

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    y: Slot,
    /// Set when `y` is the floor plus one.
    rounded: Option<Slot>,
    d1: Vec<Slot>,
    d2: Vec<Slot>,
    d3: Vec<Slot>,
}

/// Fixed-point square root of a non-negative input.
///
/// With `a = x * delta` and `f = y - r` the floor of `sqrt(a)`:
///
/// ```text
/// d1 = a - f^2                                   >= 0
/// d2 = f^2 + 2f - a                              >= 0
/// d3 = r (a - f^2 - f - 1) + (1 - r)(f^2 + f - a) >= 0
/// r * (r - 1) = 0
/// ```
///
/// The floor variant drops `r` and `d3`. Negative radicands have no
/// witness.
#[derive(Debug, Clone)]
pub struct Sqrt<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    rounding: Rounding,
    row_layout: RowLayout,
    layout: Layout,
    _field: PhantomData<F>,
}

impl<F: PrimeField> Sqrt<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        Self::with_rounding(columns, precision, Rounding::Nearest)
    }

    pub fn floor(columns: Columns, precision: Precision) -> Self {
        Self::with_rounding(columns, precision, Rounding::Floor)
    }

    pub fn with_rounding(columns: Columns, precision: Precision, rounding: Rounding) -> Self {
        check_field::<F>();
        columns.require("sqrt", Self::witness_columns(precision, rounding), 0);

        let m = precision.m();
        let row_layout =
            RowLayout::choose(Self::cells(precision, rounding), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let x = slots.next();
        let y = slots.next();
        let rounded = (rounding == Rounding::Nearest).then(|| slots.next());
        let d1 = slots.take(m);
        let d2 = slots.take(m);
        let d3 = if rounded.is_some() {
            slots.take(m)
        } else {
            Vec::new()
        };
        Self {
            columns,
            precision,
            rounding,
            row_layout,
            layout: Layout {
                x,
                y,
                rounded,
                d1,
                d2,
                d3,
            },
            _field: PhantomData,
        }
    }

    pub fn witness_columns(precision: Precision, rounding: Rounding) -> usize {
        RowLayout::min_width(Self::cells(precision, rounding))
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision, rounding: Rounding) -> usize {
        RowLayout::choose(Self::cells(precision, rounding), witness_amount).rows()
    }

    fn cells(precision: Precision, rounding: Rounding) -> usize {
        match rounding {
            Rounding::Nearest => 3 + 3 * precision.m(),
            Rounding::Floor => 2 + 2 * precision.m(),
        }
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        Ok(self.witness(x)?.y)
    }

    fn witness(&self, x: &BigInt) -> Result<SqrtWitness, Error> {
        let a = x * self.precision.delta();
        let f = utils::isqrt(&a)?;
        let f2 = &f * &f;
        let d1 = &a - &f2;
        let d2 = &f2 + &f * 2u32 - &a;

        let (r, d3) = match self.rounding {
            Rounding::Floor => (BigInt::zero(), BigInt::zero()),
            Rounding::Nearest => {
                let up = &a - &f2 - &f - 1u32;
                if up >= BigInt::zero() {
                    (BigInt::one(), up)
                } else {
                    (BigInt::zero(), &f2 + &f - &a)
                }
            }
        };
        Ok(SqrtWitness {
            y: &f + &r,
            r,
            d1,
            d2,
            d3,
        })
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.y, start_row)
    }
}

struct SqrtWitness {
    y: BigInt,
    r: BigInt,
    d1: BigInt,
    d2: BigInt,
    d3: BigInt,
}

impl<F: PrimeField> Gadget<F> for Sqrt<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.row_layout.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let q = |slot| self.columns.query::<F>(slot, 0);
        let d1 = self.columns.queries::<F>(&self.layout.d1, 0);
        let d2 = self.columns.queries::<F>(&self.layout.d2, 0);
        let d3 = self.columns.queries::<F>(&self.layout.d3, 0);

        let a = q(self.layout.x) * constant::<F>(&self.precision.delta());
        let r = self
            .layout
            .rounded
            .map_or_else(Expression::zero, |slot| q(slot));
        let f = q(self.layout.y) - r.clone();
        let f2 = f.clone().square();

        let mut constraints = vec![
            a.clone() - f2.clone() - compose(d1.clone()),
            f2.clone() + f.clone() * F::from(2u64) - a.clone() - compose(d2.clone()),
        ];
        if self.rounding == Rounding::Nearest {
            let above = a.clone() - f2.clone() - f.clone() - F::ONE;
            let below = f2 + f - a;
            constraints.push(boolean(r.clone()));
            constraints.push(
                r.clone() * above + (Expression::one() - r) * below - compose(d3.clone()),
            );
        }

        let lookups = range_lookups(&[d1, d2, d3].concat());
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
        if let Some(slot) = self.layout.rounded {
            layout.push("rounded", vec![cell(slot)]);
        }
        layout.push("d1", self.columns.cells(&self.layout.d1, start_row));
        layout.push("d2", self.columns.cells(&self.layout.d2, start_row));
        if !self.layout.d3.is_empty() {
            layout.push("d3", self.columns.cells(&self.layout.d3, start_row));
        }
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "sqrt", start_row).entered();

        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let witness = self.witness(&x)?;

        region.assign(self.layout.x, &x);
        region.assign(self.layout.y, &witness.y);
        region.assign_unsigned(&self.layout.d1, &witness.d1)?;
        region.assign_unsigned(&self.layout.d2, &witness.d2)?;
        if let Some(slot) = self.layout.rounded {
            region.assign(slot, &witness.r);
            region.assign_unsigned(&self.layout.d3, &witness.d3)?;
        }
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
