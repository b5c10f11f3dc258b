use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use super::{
    boolean, check_field, compose, constant,
    division::{remainder_bound, rounding_identity, shift_identity, RoundedQuotient},
    place_gates, range_lookups, sign, CellLayout, Columns, Gadget, Region, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Expression, Gate},
    lookup::TableKind,
    utils, Error, Precision, LOG_TARGET,
};

const ROWS: usize = 6;

#[derive(Debug, Clone)]
struct Layout {
    // row 0: |x| and the reciprocal flag
    x: Slot,
    sign: Slot,
    abs: Vec<Slot>,
    gt1: Slot,
    d1: Vec<Slot>,
    // row 1: v = 1 / |x| if |x| > 1
    q: Slot,
    b1: Slot,
    r1: Vec<Slot>,
    e1: Vec<Slot>,
    v: Slot,
    // row 2: compare against tan(pi / 12)
    v2: Slot,
    gt2: Slot,
    d2: Vec<Slot>,
    num: Slot,
    // row 3: t = tan(atan(v) - pi / 6) if v > tan(pi / 12), u = t^2
    w: Slot,
    b2: Slot,
    r2: Vec<Slot>,
    e2: Vec<Slot>,
    t: Slot,
    u: Slot,
    ru: Vec<Slot>,
    // row 4: odd series up to t^7 / 7
    p: Slot,
    rp: Vec<Slot>,
    gp: Vec<Slot>,
    // row 5: undo the reductions
    sign5: Slot,
    gt1_5: Slot,
    gt2_5: Slot,
    y: Slot,
}

/// Fixed-point arctangent.
///
/// The argument is reduced twice: `|x| > 1` is replaced by `1 / |x|` and
/// reflected through `pi / 2` at the end, then values above `tan(pi / 12)`
/// are shifted by `pi / 6` through `tan(a - pi / 6) = (sqrt(3) v - 1) / (sqrt(3) + v)`.
/// What remains satisfies `|t| <= tan(pi / 12)` and goes through
///
/// ```text
/// atan(t) ~ t - t^3 / 3 + t^5 / 5 - t^7 / 7
///         = t (105 - 35 u + 21 u^2 - 15 u^3) / 105,   u = t^2
/// ```
///
/// evaluated with one rounding division by `105 * delta^3`. The first
/// omitted term bounds the truncation by `tan(pi / 12)^9 / 9 < 8e-7`, about
/// 0.05 ulp at `m2 = 1` and 3400 ulp at `m2 = 2`; the roundings add at most
/// two ulp.
///
/// Eleven gates: six polynomial gates, one per row, and five range lookups on
/// rows 0 to 4. Rows 1 to 5 read the previous row at rotation -1.
///
/// ```text
/// | row | cells                                           |
/// |-----|-------------------------------------------------|
/// |  0  | x  s  |x|_0..m-1  gt1  d1_0..m-1                |
/// |  1  | q  b1  r1_0..m-1  e1_0..m-1  v                  |
/// |  2  | v  gt2  d2_0..m2-1  num                         |
/// |  3  | w  b2  r2_0..m2  e2_0..m2  t  u  ru_0..m2-1     |
/// |  4  | p  rp_0..3m2  gp_0..3m2                         |
/// |  5  | s  gt1  gt2  y                                  |
/// ```
#[derive(Debug, Clone)]
pub struct Atan<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    layout: Layout,
    _field: PhantomData<F>,
}

#[derive(Debug, Clone)]
struct AtanWitness {
    x: BigInt,
    sign: BigInt,
    abs: BigInt,
    gt1: BigInt,
    d1: BigInt,
    div1: RoundedQuotient,
    v: BigInt,
    gt2: BigInt,
    d2: BigInt,
    num: BigInt,
    div2: RoundedQuotient,
    t: BigInt,
    u: BigInt,
    ru: BigInt,
    p: BigInt,
    rp: BigInt,
    gp: BigInt,
    y: BigInt,
}

impl<F: PrimeField> Atan<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        check_field::<F>();
        columns.require("atan", Self::witness_columns(precision), 0);

        let (m, m2) = (precision.m(), precision.m2());
        let mut slots = SlotAllocator::new(columns.witness_amount());

        let (x, sign, abs, gt1, d1) = (
            slots.next(),
            slots.next(),
            slots.take(m),
            slots.next(),
            slots.take(m),
        );
        slots.next_row();
        let (q, b1, r1, e1, v) = (
            slots.next(),
            slots.next(),
            slots.take(m),
            slots.take(m),
            slots.next(),
        );
        slots.next_row();
        let (v2, gt2, d2, num) = (slots.next(), slots.next(), slots.take(m2), slots.next());
        slots.next_row();
        let (w, b2, r2, e2, t, u, ru) = (
            slots.next(),
            slots.next(),
            slots.take(m2 + 1),
            slots.take(m2 + 1),
            slots.next(),
            slots.next(),
            slots.take(m2),
        );
        slots.next_row();
        let (p, rp, gp) = (slots.next(), slots.take(3 * m2 + 1), slots.take(3 * m2 + 1));
        slots.next_row();
        let (sign5, gt1_5, gt2_5, y) = (slots.next(), slots.next(), slots.next(), slots.next());
        debug_assert_eq!(slots.rows(), ROWS);

        Self {
            columns,
            precision,
            layout: Layout {
                x,
                sign,
                abs,
                gt1,
                d1,
                q,
                b1,
                r1,
                e1,
                v,
                v2,
                gt2,
                d2,
                num,
                w,
                b2,
                r2,
                e2,
                t,
                u,
                ru,
                p,
                rp,
                gp,
                sign5,
                gt1_5,
                gt2_5,
                y,
            },
            _field: PhantomData,
        }
    }

    /// Width of the widest row.
    pub fn witness_columns(precision: Precision) -> usize {
        let (m, m2) = (precision.m(), precision.m2());
        [3 + 2 * m, 3 + 2 * m, 3 + m2, 6 + 3 * m2, 3 + 6 * m2, 4]
            .into_iter()
            .max()
            .unwrap_or(0)
    }

    pub fn rows_amount() -> usize {
        ROWS
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        Ok(self.witness(x)?.y)
    }

    /// `105 * delta^3`.
    fn series_divisor(&self) -> BigInt {
        BigInt::from(105) * self.precision.delta().pow(3)
    }

    fn witness(&self, x: &BigInt) -> Result<AtanWitness, Error> {
        let delta = self.precision.delta();
        let sqrt3 = self.precision.sqrt3();

        let sign = utils::sign(x);
        let abs = x.abs();
        let (gt1, d1) = flag_above(&abs, &delta);

        let den = if gt1.is_one() { abs.clone() } else { delta.clone() };
        let div1 = RoundedQuotient::new(&(&delta * &delta), &den)?;
        let v = if gt1.is_one() {
            div1.quotient.clone()
        } else {
            abs.clone()
        };

        let (gt2, d2) = flag_above(&v, &self.precision.tan_pi_12());
        let num = if gt2.is_one() {
            &sqrt3 * &v - &delta * &delta
        } else {
            BigInt::zero()
        };
        let div2 = RoundedQuotient::new(&num, &(&sqrt3 + &v))?;
        let t = if gt2.is_one() {
            div2.quotient.clone()
        } else {
            v.clone()
        };

        let (u, ru) = utils::round_div_mod(&(&t * &t), &delta)?;

        let d2_ = &delta * &delta;
        let series = &t
            * (BigInt::from(105) * &d2_ * &delta - BigInt::from(35) * &d2_ * &u
                + BigInt::from(21) * &delta * &u * &u
                - BigInt::from(15) * &u * &u * &u);
        let divisor = self.series_divisor();
        let (p, rp) = utils::round_div_mod(&series, &divisor)?;
        let gp = &divisor - &rp - 1u32;

        let a1 = &p + &gt2 * self.precision.pi_sixth();
        let a2 = if gt1.is_one() {
            self.precision.pi_half() - &a1
        } else {
            a1
        };
        let y = &sign * a2;

        Ok(AtanWitness {
            x: x.clone(),
            sign,
            abs,
            gt1,
            d1,
            div1,
            v,
            gt2,
            d2,
            num,
            div2,
            t,
            u,
            ru,
            p,
            rp,
            gp,
            y,
        })
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.y, start_row)
    }
}

/// `(1, v - bound - 1)` if `v > bound`, else `(0, bound - v)`.
fn flag_above(value: &BigInt, bound: &BigInt) -> (BigInt, BigInt) {
    if value > bound {
        (BigInt::one(), value - bound - 1u32)
    } else {
        (BigInt::zero(), bound - value)
    }
}

/// `flag (v - bound - 1) + (1 - flag)(bound - v)`.
fn flagged_difference<F: PrimeField>(
    flag: Expression<F>,
    value: Expression<F>,
    bound: F,
) -> Expression<F> {
    flag.clone() * (value.clone() - bound - F::ONE)
        + (Expression::one() - flag) * (Expression::constant(bound) - value)
}

/// `flag * a + (1 - flag) * b`.
fn select<F: PrimeField>(flag: Expression<F>, a: Expression<F>, b: Expression<F>) -> Expression<F> {
    flag.clone() * a + (Expression::one() - flag) * b
}

impl<F: PrimeField> Gadget<F> for Atan<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        ROWS
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let q = |slot, row| self.columns.query::<F>(slot, row);
        let qs = |slots: &[Slot], row| self.columns.queries::<F>(slots, row);

        let delta = self.precision.delta();
        let delta_f: F = constant(&delta);
        let delta_sq: F = constant(&(&delta * &delta));
        let sqrt3: F = constant(&self.precision.sqrt3());
        let tan_pi_12: F = constant(&self.precision.tan_pi_12());
        let divisor: F = constant(&self.series_divisor());
        let half_divisor: F = constant(&(self.series_divisor() >> 1u32));

        let mut gates = Vec::new();

        // row 0
        let abs = compose(qs(&l.abs, 0));
        gates.push((
            0,
            Gate::Polynomial(vec![
                q(l.x, 0) - q(l.sign, 0) * abs.clone(),
                sign(q(l.sign, 0)),
                boolean(q(l.gt1, 0)),
                flagged_difference(q(l.gt1, 0), abs, delta_f) - compose(qs(&l.d1, 0)),
            ]),
        ));
        gates.push((0, Gate::Lookup(range_lookups(&[qs(&l.abs, 0), qs(&l.d1, 0)].concat()))));

        // row 1
        let abs = compose(qs(&l.abs, 1));
        let gt1 = q(l.gt1, 1);
        let den = select(gt1.clone(), abs.clone(), Expression::constant(delta_f));
        let r1 = compose(qs(&l.r1, 1));
        gates.push((
            1,
            Gate::Polynomial(vec![
                boolean(q(l.b1, 1)),
                rounding_identity(
                    Expression::constant(delta_sq),
                    den.clone(),
                    q(l.b1, 1),
                    q(l.q, 1),
                    r1.clone(),
                ),
                remainder_bound(den, r1, compose(qs(&l.e1, 1))),
                q(l.v, 1) - select(gt1, q(l.q, 1), abs),
            ]),
        ));
        gates.push((1, Gate::Lookup(range_lookups(&[qs(&l.r1, 1), qs(&l.e1, 1)].concat()))));

        // row 2
        let v = q(l.v2, 2);
        let gt2 = q(l.gt2, 2);
        gates.push((
            2,
            Gate::Polynomial(vec![
                boolean(gt2.clone()),
                flagged_difference(gt2.clone(), v.clone(), tan_pi_12) - compose(qs(&l.d2, 2)),
                q(l.num, 2) - gt2 * (v * sqrt3 - delta_sq),
            ]),
        ));
        gates.push((2, Gate::Lookup(range_lookups(&qs(&l.d2, 2)))));

        // row 3
        let v = q(l.v2, 3);
        let gt2 = q(l.gt2, 3);
        let den2 = v.clone() + sqrt3;
        let r2 = compose(qs(&l.r2, 3));
        let t = q(l.t, 3);
        gates.push((
            3,
            Gate::Polynomial(vec![
                boolean(q(l.b2, 3)),
                rounding_identity(q(l.num, 3), den2.clone(), q(l.b2, 3), q(l.w, 3), r2.clone()),
                remainder_bound(den2, r2, compose(qs(&l.e2, 3))),
                t.clone() - select(gt2, q(l.w, 3), v),
                shift_identity(
                    t.square(),
                    self.precision.delta_bits(),
                    q(l.u, 3),
                    compose(qs(&l.ru, 3)),
                ),
            ]),
        ));
        gates.push((
            3,
            Gate::Lookup(range_lookups(
                &[qs(&l.r2, 3), qs(&l.e2, 3), qs(&l.ru, 3)].concat(),
            )),
        ));

        // row 4
        let t = q(l.t, 4);
        let u = q(l.u, 4);
        let d3: F = delta_sq * delta_f;
        let series = t
            * (Expression::constant(d3 * F::from(105u64))
                - u.clone() * (delta_sq * F::from(35u64))
                + u.clone().square() * (delta_f * F::from(21u64))
                - u.clone().square() * u * F::from(15u64));
        let rp = compose(qs(&l.rp, 4));
        gates.push((
            4,
            Gate::Polynomial(vec![
                series + half_divisor - q(l.p, 4) * divisor - rp.clone(),
                Expression::constant(divisor - F::ONE) - rp - compose(qs(&l.gp, 4)),
            ]),
        ));
        gates.push((4, Gate::Lookup(range_lookups(&[qs(&l.rp, 4), qs(&l.gp, 4)].concat()))));

        // row 5
        let pi_half: F = constant(&self.precision.pi_half());
        let pi_sixth: F = constant(&self.precision.pi_sixth());
        let a1 = q(l.p, 4) + q(l.gt2_5, 5) * pi_sixth;
        let reflected = Expression::constant(pi_half) - a1.clone();
        gates.push((
            5,
            Gate::Polynomial(vec![
                q(l.y, 5) - q(l.sign5, 5) * select(q(l.gt1_5, 5), reflected, a1),
            ]),
        ));

        gates
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
        layout.push("gt1", cell(l.gt1));
        layout.push("d1", cells(&l.d1));
        layout.push("q", cell(l.q));
        layout.push("b1", cell(l.b1));
        layout.push("r1", cells(&l.r1));
        layout.push("e1", cells(&l.e1));
        layout.push("v", cell(l.v));
        layout.push("v2", cell(l.v2));
        layout.push("gt2", cell(l.gt2));
        layout.push("d2", cells(&l.d2));
        layout.push("num", cell(l.num));
        layout.push("w", cell(l.w));
        layout.push("b2", cell(l.b2));
        layout.push("r2", cells(&l.r2));
        layout.push("e2", cells(&l.e2));
        layout.push("t", cell(l.t));
        layout.push("u", cell(l.u));
        layout.push("ru", cells(&l.ru));
        layout.push("p", cell(l.p));
        layout.push("rp", cells(&l.rp));
        layout.push("gp", cells(&l.gp));
        layout.push("sign5", cell(l.sign5));
        layout.push("gt1_5", cell(l.gt1_5));
        layout.push("gt2_5", cell(l.gt2_5));
        layout.push("y", cell(l.y));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "atan", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let w = self.witness(&x)?;

        region.assign(l.x, &w.x);
        region.assign(l.sign, &w.sign);
        region.assign_unsigned(&l.abs, &w.abs)?;
        region.assign(l.gt1, &w.gt1);
        region.assign_unsigned(&l.d1, &w.d1)?;

        region.assign(l.q, &w.div1.quotient);
        region.assign(l.b1, &w.div1.parity);
        region.assign_unsigned(&l.r1, &w.div1.remainder)?;
        region.assign_unsigned(&l.e1, &w.div1.gap)?;
        region.assign(l.v, &w.v);

        region.assign(l.v2, &w.v);
        region.assign(l.gt2, &w.gt2);
        region.assign_unsigned(&l.d2, &w.d2)?;
        region.assign(l.num, &w.num);

        region.assign(l.w, &w.div2.quotient);
        region.assign(l.b2, &w.div2.parity);
        region.assign_unsigned(&l.r2, &w.div2.remainder)?;
        region.assign_unsigned(&l.e2, &w.div2.gap)?;
        region.assign(l.t, &w.t);
        region.assign(l.u, &w.u);
        region.assign_unsigned(&l.ru, &w.ru)?;

        region.assign(l.p, &w.p);
        region.assign_unsigned(&l.rp, &w.rp)?;
        region.assign_unsigned(&l.gp, &w.gp)?;

        region.assign(l.sign5, &w.sign);
        region.assign(l.gt1_5, &w.gt1);
        region.assign(l.gt2_5, &w.gt2);
        region.assign(l.y, &w.y);

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

        place_gates(cs, assignment, self.gates(), start_row);
        cs.add_copy_constraint(*input, cell(l.x));
        cs.add_copy_constraint(cell(l.v), cell(l.v2));
        cs.add_copy_constraint(cell(l.sign), cell(l.sign5));
        cs.add_copy_constraint(cell(l.gt1), cell(l.gt1_5));
        cs.add_copy_constraint(cell(l.gt2), cell(l.gt2_5));
        self.output(start_row)
    }
}
