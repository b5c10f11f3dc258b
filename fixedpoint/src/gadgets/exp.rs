use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};

use super::{
    check_field, compose, constant, dedup_tables,
    division::shift_identity,
    place_gates, pow2, range_lookups,
    range::{Range, RangeOutput},
    CellLayout, Columns, Gadget, Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Expression, Gate, Lookup},
    lookup::{self, TableKind, EXP_INTEGER_KEYS, EXP_KEY_OFFSET},
    utils, Error, Precision, LOG_TARGET,
};

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    key: Slot,
    /// Upper post-comma limb, only present with two post-comma limbs.
    f1: Option<Slot>,
    f0: Slot,
    a: Slot,
    b: Slot,
    /// `round(a * b / 2^48)` before the first-order correction by `f0`.
    t: Option<Slot>,
    rt: Vec<Slot>,
    y: Slot,
    ry: Vec<Slot>,
}

/// Table-based fixed-point exponential.
///
/// The input splits as `x = (key - 23) * delta + f`. The integer part is
/// looked up as `A = e^(key - 23) * delta * 2^16`, the upper 16 bits of `f`
/// as `B = e^(f1 / 2^16) * delta`.
///
/// With one post-comma limb:
///
/// ```text
/// | x | key | f0 | A | B | y | ry_0 ry_1 |
///
/// x = (key - 23) * 2^16 + f0
/// y = round(A * B / 2^32)
/// ```
///
/// With two, the lower limb enters through `e^(f0 / 2^32) ~ 1 + f0 / 2^32`:
///
/// ```text
/// | x | key | f1 | f0 | A | B | t | rt_0..2 | y | ry_0 ry_1 |
///
/// x = (key - 23) * 2^32 + f1 * 2^16 + f0
/// t = round(A * B / 2^48)
/// y = round(t * (2^32 + f0) / 2^32)
/// ```
///
/// `key` outside `[0, 46)` has no witness; callers clip first, see
/// [`ExpRanged`].
#[derive(Debug, Clone)]
pub struct Exp<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    row_layout: RowLayout,
    layout: Layout,
    _field: PhantomData<F>,
}

#[derive(Debug, Clone)]
struct ExpWitness {
    key: BigInt,
    f1: BigInt,
    f0: BigInt,
    a: BigInt,
    b: BigInt,
    t: BigInt,
    rt: BigInt,
    y: BigInt,
    ry: BigInt,
}

impl<F: PrimeField> Exp<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        check_field::<F>();
        columns.require("exp", Self::witness_columns(precision), 0);

        let two_limbs = precision.m2() == 2;
        let row_layout = RowLayout::choose(Self::cells(precision), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let x = slots.next();
        let key = slots.next();
        let f1 = two_limbs.then(|| slots.next());
        let f0 = slots.next();
        let a = slots.next();
        let b = slots.next();
        let t = two_limbs.then(|| slots.next());
        let rt = if two_limbs { slots.take(3) } else { Vec::new() };
        let y = slots.next();
        let ry = slots.take(2);

        Self {
            columns,
            precision,
            row_layout,
            layout: Layout {
                x,
                key,
                f1,
                f0,
                a,
                b,
                t,
                rt,
                y,
                ry,
            },
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
        if precision.m2() == 1 {
            8
        } else {
            14
        }
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        Ok(self.witness(x)?.y)
    }

    fn witness(&self, x: &BigInt) -> Result<ExpWitness, Error> {
        let m2 = self.precision.m2();
        let (integer, fraction) = x.div_mod_floor(&self.precision.delta());
        let key = integer + EXP_KEY_OFFSET;
        let index = utils::to_index(&key)
            .filter(|&index| index < EXP_INTEGER_KEYS)
            .ok_or(Error::OutOfDomain {
                gadget: "exp",
                reason: "exponent outside the table domain",
            })?;

        // With one post-comma limb the whole fraction is the table key.
        let (f1, f0) = if m2 == 1 {
            (BigInt::zero(), fraction)
        } else {
            (&fraction >> 16u32, fraction & BigInt::from(0xffff))
        };
        let fraction_key = if m2 == 1 { &f0 } else { &f1 };
        let a = table_value::<F>(TableKind::exp_integer(m2), index)?;
        let b = utils::to_index(fraction_key)
            .ok_or(Error::TableMiss {
                table: TableKind::exp_fraction(m2).name(),
            })
            .and_then(|key| table_value::<F>(TableKind::exp_fraction(m2), key))?;

        let (t, rt, y, ry) = if m2 == 1 {
            let (y, ry) = utils::round_div_mod(&(&a * &b), &utils::pow2(32))?;
            (BigInt::zero(), BigInt::zero(), y, ry)
        } else {
            let (t, rt) = utils::round_div_mod(&(&a * &b), &utils::pow2(48))?;
            let (y, ry) =
                utils::round_div_mod(&(&t * (utils::pow2(32) + &f0)), &utils::pow2(32))?;
            (t, rt, y, ry)
        };
        Ok(ExpWitness {
            key,
            f1,
            f0,
            a,
            b,
            t,
            rt,
            y,
            ry,
        })
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.y, start_row)
    }
}

fn table_value<F: PrimeField>(kind: TableKind, key: usize) -> Result<BigInt, Error> {
    lookup::table::<F>(kind)
        .value(key, 1)
        .map(utils::to_bigint)
        .ok_or(Error::TableMiss { table: kind.name() })
}

impl<F: PrimeField> Gadget<F> for Exp<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.row_layout.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let m2 = self.precision.m2();
        let q = |slot| self.columns.query::<F>(slot, 0);
        let rt = self.columns.queries::<F>(&l.rt, 0);
        let ry = self.columns.queries::<F>(&l.ry, 0);

        let integer = (q(l.key) - F::from(EXP_KEY_OFFSET as u64))
            * constant::<F>(&self.precision.delta());
        let product = q(l.a) * q(l.b);

        let (constraints, fraction_key, mut lookups) = match (l.f1, l.t) {
            (Some(f1), Some(t)) => {
                let constraints = vec![
                    q(l.x) - integer - q(f1) * pow2::<F>(16) - q(l.f0),
                    shift_identity(product, 48, q(t), compose(rt.clone())),
                    shift_identity(
                        q(t) * (q(l.f0) + pow2::<F>(32)),
                        32,
                        q(l.y),
                        compose(ry.clone()),
                    ),
                ];
                let lookups = range_lookups(&[vec![q(l.f0)], rt, ry].concat());
                (constraints, q(f1), lookups)
            }
            _ => {
                let constraints = vec![
                    q(l.x) - integer - q(l.f0),
                    shift_identity(product, 32, q(l.y), compose(ry.clone())),
                ];
                (constraints, q(l.f0), range_lookups(&ry))
            }
        };
        lookups.push(Lookup::new(
            TableKind::exp_integer(m2),
            vec![q(l.key), q(l.a)],
        ));
        lookups.push(Lookup::new(
            TableKind::exp_fraction(m2),
            vec![fraction_key, q(l.b)],
        ));

        vec![
            (0, Gate::Polynomial(constraints)),
            (0, Gate::Lookup(lookups)),
        ]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        let m2 = self.precision.m2();
        vec![
            TableKind::Range16,
            TableKind::exp_integer(m2),
            TableKind::exp_fraction(m2),
        ]
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let l = &self.layout;
        let cell = |slot| vec![self.columns.cell(slot, start_row)];
        let mut layout = CellLayout::default();
        layout.push("x", cell(l.x));
        layout.push("key", cell(l.key));
        if let Some(f1) = l.f1 {
            layout.push("f1", cell(f1));
        }
        layout.push("f0", cell(l.f0));
        layout.push("a", cell(l.a));
        layout.push("b", cell(l.b));
        if let Some(t) = l.t {
            layout.push("t", cell(t));
            layout.push("rt", self.columns.cells(&l.rt, start_row));
        }
        layout.push("y", cell(l.y));
        layout.push("ry", self.columns.cells(&l.ry, start_row));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "exp", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let w = self.witness(&x)?;

        region.assign(l.x, &x);
        region.assign(l.key, &w.key);
        if let Some(f1) = l.f1 {
            region.assign(f1, &w.f1);
        }
        region.assign(l.f0, &w.f0);
        region.assign(l.a, &w.a);
        region.assign(l.b, &w.b);
        if let Some(t) = l.t {
            region.assign(t, &w.t);
            region.assign_unsigned(&l.rt, &w.rt)?;
        }
        region.assign(l.y, &w.y);
        region.assign_unsigned(&l.ry, &w.ry)?;

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

#[derive(Debug, Clone)]
struct SelectLayout {
    x: Slot,
    lt: Slot,
    gt: Slot,
    x_in: Slot,
    e: Slot,
    y: Slot,
}

/// Exponential clipped to the representable range.
///
/// A [`Range`] check flags inputs below the point where the result rounds to
/// zero (`lt`) and above the point where it overflows `m` limbs (`gt`). The
/// inner [`Exp`] sees `x_in = in * x` with `in = 1 - lt - gt`, and the select
/// row proves
///
/// ```text
/// in * (e - y) + (1 - in) * (lt * min + gt * max - y) = 0
/// ```
///
/// with `min = 0` and `max = 2^(16 m) - 1`.
///
/// Rows: range check, select row, inner exp.
#[derive(Debug, Clone)]
pub struct ExpRanged<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    range: Range<F>,
    exp: Exp<F>,
    layout: SelectLayout,
    _field: PhantomData<F>,
}

impl<F: PrimeField> ExpRanged<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        check_field::<F>();
        columns.require("exp_ranged", Self::witness_columns(precision), 0);

        let (lo, hi) = precision.exp_bounds();
        let range = Range::new(columns.clone(), precision, lo, hi);
        let exp = Exp::new(columns.clone(), precision);

        let mut slots = SlotAllocator::starting_at(columns.witness_amount(), range.rows());
        let layout = SelectLayout {
            x: slots.next(),
            lt: slots.next(),
            gt: slots.next(),
            x_in: slots.next(),
            e: slots.next(),
            y: slots.next(),
        };
        Self {
            columns,
            precision,
            range,
            exp,
            layout,
            _field: PhantomData,
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        Range::<F>::witness_columns(precision)
            .max(Exp::<F>::witness_columns(precision))
            .max(6)
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        Range::<F>::rows_amount(witness_amount, precision)
            + 1
            + Exp::<F>::rows_amount(witness_amount, precision)
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        Ok(match self.range.evaluate(x) {
            (true, _) => BigInt::zero(),
            (_, true) => self.precision.max_value(),
            _ => self.exp.evaluate(x)?,
        })
    }

    fn select_row(&self) -> usize {
        self.range.rows()
    }

    fn exp_row(&self) -> usize {
        self.range.rows() + 1
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.y, start_row)
    }
}

impl<F: PrimeField> Gadget<F> for ExpRanged<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.range.rows() + 1 + self.exp.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let row = self.select_row();
        let q = |slot| self.columns.query::<F>(slot, row);

        let (lt, gt) = (q(l.lt), q(l.gt));
        let inside = Expression::one() - lt.clone() - gt.clone();
        let max = constant::<F>(&self.precision.max_value());
        let constraints = vec![
            q(l.x_in) - inside.clone() * q(l.x),
            inside.clone() * (q(l.e) - q(l.y))
                + (Expression::one() - inside) * (gt * max - q(l.y)),
        ];
        vec![(row, Gate::Polynomial(constraints))]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        dedup_tables([self.range.lookup_tables(), self.exp.lookup_tables()].concat())
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let l = &self.layout;
        let cell = |slot| vec![self.columns.cell(slot, start_row)];
        let mut layout = CellLayout::default();
        layout.push("x", cell(l.x));
        layout.push("lt", cell(l.lt));
        layout.push("gt", cell(l.gt));
        layout.push("x_in", cell(l.x_in));
        layout.push("e", cell(l.e));
        layout.push("y", cell(l.y));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "exp_ranged", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);

        let RangeOutput { lt, gt } = self.range.assign(region.assignment(), input, start_row)?;
        let (lt, gt) = (region.read(lt), region.read(gt));
        let inside = BigInt::one() - &lt - &gt;
        let x_in = &inside * &x;

        region.assign(l.x, &x);
        region.assign(l.lt, &lt);
        region.assign(l.gt, &gt);
        region.assign(l.x_in, &x_in);

        let x_in_cell = region.cell(l.x_in);
        let e = self
            .exp
            .assign(region.assignment(), &x_in_cell, start_row + self.exp_row())?;
        let e = region.read(e);
        let y = if inside.is_one() {
            e.clone()
        } else if gt.is_one() {
            self.precision.max_value()
        } else {
            BigInt::zero()
        };
        region.assign(l.e, &e);
        region.assign(l.y, &y);

        Ok(self.output(start_row))
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Cell {
        let l = &self.layout;
        let cell = |slot| self.columns.cell(slot, start_row);

        let flags = self.range.build_circuit(cs, assignment, input, start_row);
        place_gates(cs, assignment, self.gates(), start_row);
        let e = self
            .exp
            .build_circuit(cs, assignment, &cell(l.x_in), start_row + self.exp_row());

        cs.add_copy_constraint(*input, cell(l.x));
        cs.add_copy_constraint(flags.lt, cell(l.lt));
        cs.add_copy_constraint(flags.gt, cell(l.gt));
        cs.add_copy_constraint(e, cell(l.e));
        self.output(start_row)
    }
}
