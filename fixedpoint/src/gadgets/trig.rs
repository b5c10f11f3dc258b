use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use super::{
    boolean, check_field, compose, constant, dedup_tables,
    division::{remainder_bound, rounding_identity, shift_identity, RoundedQuotient},
    place_gates, range_lookups,
    rem::Rem,
    sign, CellLayout, Columns, Gadget, Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Gate, Lookup},
    lookup::{self, TableKind},
    utils, Error, Precision, LOG_TARGET,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrigFunction {
    Sin,
    Cos,
    Tan,
}

impl TrigFunction {
    const fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
        }
    }
}

#[derive(Debug, Clone)]
struct AngleLayout {
    x: Slot,
    sign: Slot,
    low: Vec<Slot>,
    limbs: Vec<Slot>,
    sin: Vec<Slot>,
    cos: Vec<Slot>,
}

#[derive(Debug, Clone)]
struct SumLayout {
    sin: Slot,
    cos: Slot,
    sin_rem: Vec<Slot>,
    cos_rem: Vec<Slot>,
}

#[derive(Debug, Clone)]
struct TanLayout {
    cos_sign: Slot,
    cos_abs: Vec<Slot>,
    tan: Slot,
    parity: Slot,
    remainder: Vec<Slot>,
    gap: Vec<Slot>,
}

#[derive(Debug, Clone)]
struct Layout {
    angle: AngleLayout,
    sum: SumLayout,
    tan: Option<TanLayout>,
    rows: usize,
}

/// Angle and value scales of the lookup tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Granularity {
    /// The lowest angle limb weighs `2^-angle_bits`.
    angle_bits: usize,
    /// Table values are scaled by `2^value_bits`.
    value_bits: usize,
    /// Lowest angle limbs that are range-checked but not looked up.
    dropped: usize,
    /// Looked-up angle limbs.
    limbs: usize,
}

impl Granularity {
    fn of(precision: Precision) -> Self {
        let (angle_bits, value_bits, dropped, limbs) = match (precision.m1(), precision.m2()) {
            (1, 1) => (16, 32, 0, 2),
            (2, 1) => (32, 32, 0, 3),
            (1, _) => (32, 48, 0, 3),
            _ => (64, 48, 1, 4),
        };
        Self {
            angle_bits,
            value_bits,
            dropped,
            limbs,
        }
    }

    fn decomposed(self) -> usize {
        self.dropped + self.limbs
    }

    /// Bits shifted out of the angle-addition products to land on `delta`.
    fn shift(self, precision: Precision) -> usize {
        self.value_bits * self.limbs - precision.delta_bits()
    }

    fn table(self, limb: usize) -> TableKind {
        TableKind::trig(self.value_bits, self.angle_bits - 16 * (self.dropped + limb))
    }
}

/// `x * 2^(angle_bits - delta_bits) mod 2 pi` for two integer limbs.
#[derive(Debug, Clone)]
struct Reduction<F: PrimeField> {
    rem: Rem<F>,
    modulus: BigInt,
}

/// Fixed-point sine, cosine and tangent through per-limb lookup tables.
///
/// The angle `|x| = sum(a_k * 2^(16 k))` at scale `2^angle_bits` is split into
/// 16-bit limbs, each looked up as `(a_k, sin_k, cos_k)` with values at scale
/// `2^value_bits`. The angle-addition identities
///
/// ```text
/// sin(a + b) = sin a cos b + cos a sin b
/// cos(a + b) = cos a cos b - sin a sin b
/// ```
///
/// folded over all limbs give products at scale `2^(value_bits * limbs)`,
/// which one power-of-two division rounds down to `delta`. Tables carry at
/// least 16 bits more than `delta`, so the only visible error is that final
/// rounding.
///
/// | `(m1, m2)` | angle scale | table scale | limbs             |
/// |------------|-------------|-------------|-------------------|
/// | `(1, 1)`   | `2^16`      | `2^32`      | 2                 |
/// | `(2, 1)`   | `2^32`      | `2^32`      | 3                 |
/// | `(1, 2)`   | `2^32`      | `2^48`      | 3                 |
/// | `(2, 2)`   | `2^64`      | `2^48`      | 4, plus 1 dropped |
///
/// With one integer limb the angle is `x` itself. With two, `x` is first
/// reduced modulo `round(2 pi * 2^angle_bits)` by [`Rem`]; at `(2, 2)` the
/// lowest limb of the reduced angle weighs `2^-64` and is only range-checked.
///
/// Rows: optional reduction, angle row, angle-sum rows, and for the tangent
/// a division row `t = round(sin * delta / cos)`. Each gate reads the
/// earlier rows through negative rotations.
#[derive(Debug, Clone)]
pub struct Trig<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    function: TrigFunction,
    granularity: Granularity,
    reduction: Option<Reduction<F>>,
    layout: Layout,
    _field: PhantomData<F>,
}

#[derive(Debug, Clone)]
struct TrigWitness {
    angle: BigInt,
    sign: BigInt,
    low: Vec<BigInt>,
    limbs: Vec<BigInt>,
    sin: Vec<BigInt>,
    cos: Vec<BigInt>,
    sum_sin: BigInt,
    sin_rem: BigInt,
    sum_cos: BigInt,
    cos_rem: BigInt,
    tan: Option<(BigInt, RoundedQuotient)>,
}

impl<F: PrimeField> Trig<F> {
    pub fn sin(columns: Columns, precision: Precision) -> Self {
        Self::new(columns, precision, TrigFunction::Sin)
    }

    pub fn cos(columns: Columns, precision: Precision) -> Self {
        Self::new(columns, precision, TrigFunction::Cos)
    }

    pub fn tan(columns: Columns, precision: Precision) -> Self {
        Self::new(columns, precision, TrigFunction::Tan)
    }

    pub fn new(columns: Columns, precision: Precision, function: TrigFunction) -> Self {
        check_field::<F>();
        let constants = usize::from(precision.m1() == 2);
        columns.require(
            function.name(),
            Self::witness_columns(precision, function),
            constants,
        );

        let granularity = Granularity::of(precision);
        let reduction = precision.trig_modulus().map(|modulus| {
            let scaler = utils::pow2(granularity.angle_bits - precision.delta_bits());
            Reduction {
                rem: Rem::with_limbs(columns.clone(), precision, scaler, granularity.decomposed()),
                modulus,
            }
        });
        let layout = Self::layout(columns.witness_amount(), precision, function);

        Self {
            columns,
            precision,
            function,
            granularity,
            reduction,
            layout,
            _field: PhantomData,
        }
    }

    fn layout(witness_amount: usize, precision: Precision, function: TrigFunction) -> Layout {
        let granularity = Granularity::of(precision);
        let first_row = if precision.m1() == 2 {
            RowLayout::choose(Rem::<F>::cells(granularity.decomposed()), witness_amount).rows()
        } else {
            0
        };

        let n = granularity.limbs;
        let l = granularity.shift(precision) / 16;
        let mut slots = SlotAllocator::starting_at(witness_amount, first_row);
        let angle = AngleLayout {
            x: slots.next(),
            sign: slots.next(),
            low: slots.take(granularity.dropped),
            limbs: slots.take(n),
            sin: slots.take(n),
            cos: slots.take(n),
        };
        slots.next_row();
        // may wrap onto a second row
        let sum = SumLayout {
            sin: slots.next(),
            cos: slots.next(),
            sin_rem: slots.take(l),
            cos_rem: slots.take(l),
        };
        slots.next_row();
        let tan = (function == TrigFunction::Tan).then(|| {
            let m2 = precision.m2();
            TanLayout {
                cos_sign: slots.next(),
                cos_abs: slots.take(m2 + 1),
                tan: slots.next(),
                parity: slots.next(),
                remainder: slots.take(m2 + 1),
                gap: slots.take(m2 + 1),
            }
        });

        Layout {
            angle,
            sum,
            tan,
            rows: slots.rows(),
        }
    }

    /// Width of the angle row, the tangent row and the reduction. The
    /// angle-sum block wraps as needed.
    pub fn witness_columns(precision: Precision, function: TrigFunction) -> usize {
        let granularity = Granularity::of(precision);
        let angle = 2 + granularity.decomposed() + 2 * granularity.limbs;
        let tan = match function {
            TrigFunction::Tan => 3 + 3 * (precision.m2() + 1),
            _ => 0,
        };
        let reduction = if precision.m1() == 2 {
            RowLayout::min_width(Rem::<F>::cells(granularity.decomposed()))
        } else {
            0
        };
        angle.max(tan).max(reduction)
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision, function: TrigFunction) -> usize {
        Self::layout(witness_amount, precision, function).rows
    }

    pub fn function(&self) -> TrigFunction {
        self.function
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        let w = self.witness(x)?;
        Ok(match (self.function, w.tan) {
            (TrigFunction::Sin, _) => w.sum_sin,
            (TrigFunction::Cos, _) => w.sum_cos,
            (TrigFunction::Tan, Some((_, division))) => division.quotient,
            (TrigFunction::Tan, None) => return Err(Error::DivisionByZero),
        })
    }

    fn witness(&self, x: &BigInt) -> Result<TrigWitness, Error> {
        let angle = match &self.reduction {
            Some(reduction) => reduction.rem.evaluate(x, &reduction.modulus)?,
            None => x.clone(),
        };
        let g = self.granularity;
        let mut digits: Vec<BigInt> = utils::decompose_into(&angle, g.decomposed())?
            .1
            .into_iter()
            .map(BigInt::from)
            .collect();
        let limbs = digits.split_off(g.dropped);
        let low = digits;

        let mut sin = Vec::with_capacity(g.limbs);
        let mut cos = Vec::with_capacity(g.limbs);
        for (k, limb) in limbs.iter().enumerate() {
            let table = lookup::table::<F>(g.table(k));
            let key = utils::to_index(limb).ok_or(Error::TableMiss {
                table: table.name(),
            })?;
            let value = |column| {
                table
                    .value(key, column)
                    .map(utils::to_bigint)
                    .ok_or(Error::TableMiss {
                        table: table.name(),
                    })
            };
            sin.push(value(1)?);
            cos.push(value(2)?);
        }

        let sign = utils::sign(&angle);
        let (sin_sum, cos_sum) = angle_sum(&sin, &cos);
        let divisor = utils::pow2(g.shift(self.precision));
        let (sum_sin, sin_rem) = utils::round_div_mod(&(&sign * sin_sum), &divisor)?;
        let (sum_cos, cos_rem) = utils::round_div_mod(&cos_sum, &divisor)?;

        let tan = match self.function {
            TrigFunction::Tan if sum_cos.is_zero() => return Err(Error::DivisionByZero),
            TrigFunction::Tan => {
                let cos_sign = utils::sign(&sum_cos);
                let numerator = &cos_sign * &sum_sin * self.precision.delta();
                let division = RoundedQuotient::new(&numerator, &sum_cos.abs())?;
                Some((cos_sign, division))
            }
            _ => None,
        };

        Ok(TrigWitness {
            angle,
            sign,
            low,
            limbs,
            sin,
            cos,
            sum_sin,
            sin_rem,
            sum_cos,
            cos_rem,
            tan,
        })
    }

    fn output(&self, start_row: usize) -> Cell {
        let l = &self.layout;
        let slot = match (self.function, &l.tan) {
            (TrigFunction::Tan, Some(tan)) => tan.tan,
            (TrigFunction::Cos, _) => l.sum.cos,
            _ => l.sum.sin,
        };
        self.columns.cell(slot, start_row)
    }
}

/// Unscaled `(sin, cos)` of the sum of all limb angles.
fn angle_sum<T>(sin: &[T], cos: &[T]) -> (T, T)
where
    T: Clone + std::ops::Add<Output = T> + std::ops::Sub<Output = T> + std::ops::Mul<Output = T>,
{
    let mut s = sin[0].clone();
    let mut c = cos[0].clone();
    for (sk, ck) in sin.iter().zip(cos).skip(1) {
        let next_s = s.clone() * ck.clone() + c.clone() * sk.clone();
        let next_c = c * ck.clone() - s * sk.clone();
        s = next_s;
        c = next_c;
    }
    (s, c)
}

impl<F: PrimeField> Gadget<F> for Trig<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.layout.rows
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let a = &self.layout.angle;
        let s = &self.layout.sum;
        let g = self.granularity;
        let bits = g.shift(self.precision);
        let mut gates = Vec::new();

        let row = a.x.row;
        let q = |slot| self.columns.query::<F>(slot, row);
        let qs = |slots: &[Slot]| self.columns.queries::<F>(slots, row);
        gates.push((
            row,
            Gate::Polynomial(vec![
                q(a.x) - q(a.sign) * compose(qs(&[a.low.as_slice(), a.limbs.as_slice()].concat())),
                sign(q(a.sign)),
            ]),
        ));
        let mut lookups: Vec<Lookup<F>> = (0..g.limbs)
            .map(|k| {
                Lookup::new(
                    g.table(k),
                    vec![q(a.limbs[k]), q(a.sin[k]), q(a.cos[k])],
                )
            })
            .collect();
        lookups.extend(range_lookups(&qs(&a.low)));
        gates.push((row, Gate::Lookup(lookups)));

        let row = s.sin.row;
        let q = |slot| self.columns.query::<F>(slot, row);
        let qs = |slots: &[Slot]| self.columns.queries::<F>(slots, row);
        let (sin_sum, cos_sum) = angle_sum(&qs(&a.sin), &qs(&a.cos));
        gates.push((
            row,
            Gate::Polynomial(vec![
                shift_identity(
                    q(a.sign) * sin_sum,
                    bits,
                    q(s.sin),
                    compose(qs(&s.sin_rem)),
                ),
                shift_identity(cos_sum, bits, q(s.cos), compose(qs(&s.cos_rem))),
            ]),
        ));
        gates.push((
            row,
            Gate::Lookup(range_lookups(&[qs(&s.sin_rem), qs(&s.cos_rem)].concat())),
        ));

        if let Some(t) = &self.layout.tan {
            let row = t.cos_sign.row;
            let q = |slot| self.columns.query::<F>(slot, row);
            let qs = |slots: &[Slot]| self.columns.queries::<F>(slots, row);
            let cos_abs = compose(qs(&t.cos_abs));
            let remainder = compose(qs(&t.remainder));
            let delta: F = constant(&self.precision.delta());
            gates.push((
                row,
                Gate::Polynomial(vec![
                    q(s.cos) - q(t.cos_sign) * cos_abs.clone(),
                    sign(q(t.cos_sign)),
                    boolean(q(t.parity)),
                    rounding_identity(
                        q(t.cos_sign) * q(s.sin) * delta,
                        cos_abs.clone(),
                        q(t.parity),
                        q(t.tan),
                        remainder.clone(),
                    ),
                    remainder_bound(cos_abs, remainder, compose(qs(&t.gap))),
                ]),
            ));
            gates.push((
                row,
                Gate::Lookup(range_lookups(
                    &[qs(&t.cos_abs), qs(&t.remainder), qs(&t.gap)].concat(),
                )),
            ));
        }

        gates
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        let mut tables: Vec<TableKind> = (0..self.granularity.limbs)
            .map(|k| self.granularity.table(k))
            .collect();
        tables.push(TableKind::Range16);
        dedup_tables(tables)
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let a = &self.layout.angle;
        let s = &self.layout.sum;
        let cell = |slot| vec![self.columns.cell(slot, start_row)];
        let cells = |slots: &[Slot]| self.columns.cells(slots, start_row);

        let mut layout = CellLayout::default();
        layout.push("x", cell(a.x));
        layout.push("sign", cell(a.sign));
        if !a.low.is_empty() {
            layout.push("low", cells(&a.low));
        }
        layout.push("limbs", cells(&a.limbs));
        layout.push("limb_sin", cells(&a.sin));
        layout.push("limb_cos", cells(&a.cos));
        layout.push("sin", cell(s.sin));
        layout.push("cos", cell(s.cos));
        layout.push("sin_rem", cells(&s.sin_rem));
        layout.push("cos_rem", cells(&s.cos_rem));
        if let Some(t) = &self.layout.tan {
            layout.push("cos_sign", cell(t.cos_sign));
            layout.push("cos_abs", cells(&t.cos_abs));
            layout.push("tan", cell(t.tan));
            layout.push("parity", cell(t.parity));
            layout.push("remainder", cells(&t.remainder));
            layout.push("gap", cells(&t.gap));
        }
        if self.reduction.is_some() {
            layout.push("two_pi", vec![self.columns.constant_cell(0, start_row)]);
        }
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span =
            tracing::debug_span!(target: LOG_TARGET, "trig", function = self.function.name(), start_row)
                .entered();

        let a = &self.layout.angle;
        let s = &self.layout.sum;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let w = self.witness(&x)?;

        if let Some(reduction) = &self.reduction {
            region.assign_constant(0, 0, &reduction.modulus);
            let two_pi = self.columns.constant_cell(0, start_row);
            reduction
                .rem
                .assign(region.assignment(), &(*input, two_pi), start_row)?;
        }

        region.assign(a.x, &w.angle);
        region.assign(a.sign, &w.sign);
        for (slot, limb) in a.low.iter().zip(&w.low) {
            region.assign(*slot, limb);
        }
        for (k, limb) in w.limbs.iter().enumerate() {
            region.assign(a.limbs[k], limb);
            region.assign(a.sin[k], &w.sin[k]);
            region.assign(a.cos[k], &w.cos[k]);
        }

        region.assign(s.sin, &w.sum_sin);
        region.assign(s.cos, &w.sum_cos);
        region.assign_unsigned(&s.sin_rem, &w.sin_rem)?;
        region.assign_unsigned(&s.cos_rem, &w.cos_rem)?;

        if let (Some(t), Some((cos_sign, division))) = (&self.layout.tan, &w.tan) {
            region.assign(t.cos_sign, cos_sign);
            region.assign_unsigned(&t.cos_abs, &w.sum_cos.abs())?;
            region.assign(t.tan, &division.quotient);
            region.assign(t.parity, &division.parity);
            region.assign_unsigned(&t.remainder, &division.remainder)?;
            region.assign_unsigned(&t.gap, &division.gap)?;
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
        let angle_input = match &self.reduction {
            Some(reduction) => {
                Region::new(assignment, &self.columns, start_row).assign_constant(
                    0,
                    0,
                    &reduction.modulus,
                );
                let two_pi = self.columns.constant_cell(0, start_row);
                reduction
                    .rem
                    .build_circuit(cs, assignment, &(*input, two_pi), start_row)
            }
            None => *input,
        };
        place_gates(cs, assignment, self.gates(), start_row);
        cs.add_copy_constraint(
            angle_input,
            self.columns.cell(self.layout.angle.x, start_row),
        );
        self.output(start_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_std::{rand::Rng, test_rng};

    use crate::test_utils::{eval_unary, setup_logger, Fr, Harness, PRECISIONS};

    const ONE: i64 = 1 << 16;

    fn build(precision: Precision, function: TrigFunction) -> (Trig<Fr>, usize) {
        let width = Trig::<Fr>::witness_columns(precision, function);
        let columns = Columns::contiguous(width, 1, 1);
        (Trig::new(columns, precision, function), width)
    }

    #[test]
    fn values_at_one() {
        setup_logger();

        let precision = Precision::new(1, 1);
        let (sin, width) = build(precision, TrigFunction::Sin);
        assert_eq!(eval_unary(&sin, width, 0), Ok(BigInt::from(0)));
        assert_eq!(eval_unary(&sin, width, ONE), Ok(BigInt::from(55147)));
        assert_eq!(eval_unary(&sin, width, -ONE), Ok(BigInt::from(-55147)));

        let (cos, width) = build(precision, TrigFunction::Cos);
        assert_eq!(eval_unary(&cos, width, 0), Ok(BigInt::from(ONE)));
        assert_eq!(eval_unary(&cos, width, ONE), Ok(BigInt::from(35409)));
        assert_eq!(eval_unary(&cos, width, -ONE), Ok(BigInt::from(35409)));

        let (tan, width) = build(precision, TrigFunction::Tan);
        assert_eq!(tan.rows(), 3);
        assert_eq!(eval_unary(&tan, width, ONE), Ok(BigInt::from(102068)));
        assert_eq!(eval_unary(&tan, width, -ONE), Ok(BigInt::from(-102068)));
    }

    #[test]
    fn layout_per_precision() {
        let widths: Vec<(usize, usize)> = PRECISIONS
            .iter()
            .map(|&(m1, m2)| {
                let precision = Precision::new(m1, m2);
                (
                    Trig::<Fr>::witness_columns(precision, TrigFunction::Sin),
                    Trig::<Fr>::witness_columns(precision, TrigFunction::Tan),
                )
            })
            .collect();
        assert_eq!(widths, vec![(8, 9), (11, 11), (11, 12), (15, 15)]);

        let precision = Precision::new(2, 1);
        let (tan, _) = build(precision, TrigFunction::Tan);
        // the reduction and the angle sum both wrap onto two rows at this width.
        assert_eq!(tan.rows(), 6);
        assert_eq!(Trig::<Fr>::rows_amount(11, precision, TrigFunction::Tan), 6);
        assert_eq!(Trig::<Fr>::rows_amount(17, precision, TrigFunction::Tan), 4);

        let (sin, _) = build(Precision::new(2, 2), TrigFunction::Sin);
        assert_eq!(
            sin.lookup_tables(),
            vec![
                TableKind::Range16,
                TableKind::Trig48A,
                TableKind::Trig48B,
                TableKind::Trig48C,
                TableKind::Trig48D,
            ]
        );
    }

    #[test]
    fn matches_f64() {
        let mut rng = test_rng();
        for (m1, m2) in PRECISIONS {
            let precision = Precision::new(m1, m2);
            let ulp = precision.decode(&BigInt::from(1));
            let functions = [
                (TrigFunction::Sin, f64::sin as fn(f64) -> f64),
                (TrigFunction::Cos, f64::cos),
                (TrigFunction::Tan, f64::tan),
            ];
            for (function, reference) in functions {
                let (gadget, width) = build(precision, function);
                // half an ulp on sin and cos each, amplified by 1 / cos^2.
                let tolerance = ulp * if function == TrigFunction::Tan { 8.0 } else { 1.0 };
                let mut checked = 0;
                while checked < 20 {
                    let x = precision.encode(rng.gen_range(-6.0..6.0));
                    let xf = precision.decode(&x);
                    if function == TrigFunction::Tan && xf.cos().abs() < 0.3 {
                        continue;
                    }
                    let y = precision.decode(&eval_unary(&gadget, width, x).unwrap());
                    assert!(
                        (y - reference(xf)).abs() <= tolerance,
                        "{function:?}({xf}) = {y} at ({m1}, {m2})"
                    );
                    checked += 1;
                }
            }
        }
    }

    #[test]
    fn limb_combinations_match_f64() {
        // without a reduction every limb pattern is a reachable angle.
        let mut rng = test_rng();
        for m2 in [1, 2] {
            let precision = Precision::new(1, m2);
            let ulp = precision.decode(&BigInt::from(1));
            let (sin, width) = build(precision, TrigFunction::Sin);
            let (cos, _) = build(precision, TrigFunction::Cos);
            for _ in 0..20 {
                let limbs: Vec<u16> = (0..precision.m()).map(|_| rng.gen()).collect();
                let mut x = utils::compose(&limbs);
                if rng.gen() {
                    x = -x;
                }
                let xf = precision.decode(&x);
                let s = precision.decode(&eval_unary(&sin, width, x.clone()).unwrap());
                let c = precision.decode(&eval_unary(&cos, width, x).unwrap());
                assert!((s - xf.sin()).abs() <= ulp, "sin({xf}) = {s} at (1, {m2})");
                assert!((c - xf.cos()).abs() <= ulp, "cos({xf}) = {c} at (1, {m2})");
            }
        }
    }

    #[test]
    fn reduces_large_angles() {
        let precision = Precision::new(2, 2);
        let (sin, width) = build(precision, TrigFunction::Sin);
        let x = precision.encode(1000.0);
        let y = precision.decode(&eval_unary(&sin, width, x).unwrap());
        assert!((y - 1000f64.sin()).abs() < 1e-9);
    }

    #[test]
    fn tan_of_right_angle_has_no_witness() {
        // cos(pi / 2) rounds to zero at scale 2^16, one unit below it to one.
        let precision = Precision::new(1, 1);
        let (tan, width) = build(precision, TrigFunction::Tan);
        let pi_half = precision.pi_half();
        assert_eq!(
            eval_unary(&tan, width, pi_half.clone()),
            Err(Error::DivisionByZero)
        );
        assert_eq!(
            eval_unary(&tan, width, pi_half - 1u32),
            Ok(BigInt::from(1i64 << 32))
        );
    }

    #[test]
    fn assign_writes_its_own_constants() {
        for m2 in [1, 2] {
            let precision = Precision::new(2, m2);
            let width = Trig::<Fr>::witness_columns(precision, TrigFunction::Sin);
            let mut harness = Harness::<Fr>::new(width);
            let gadget = Trig::<Fr>::sin(harness.columns(), precision);
            let input = harness.input(precision.delta());
            let y = harness.assign_then_build(&gadget, &input, 1).unwrap();
            assert_eq!(harness.is_satisfied(), Ok(()));

            let expected = precision.encode(1f64.sin());
            assert!((harness.value(y) - expected).abs() <= BigInt::from(1));
        }
    }

    #[test]
    fn detects_tampering() {
        let precision = Precision::new(2, 1);
        let width = Trig::<Fr>::witness_columns(precision, TrigFunction::Tan);
        let mut harness = Harness::<Fr>::new(width);
        let gadget = Trig::<Fr>::tan(harness.columns(), precision);
        let input = harness.input(-3 * ONE);
        let y = harness.synthesize(&gadget, &input, 2).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));

        harness.assert_tamper_detected(y);
        let layout = gadget.cell_layout(2);
        for name in ["x", "sign", "sin", "cos", "cos_sign", "two_pi"] {
            harness.assert_tamper_detected(layout.cell(name).unwrap());
        }
        for name in ["limbs", "limb_sin", "limb_cos", "sin_rem"] {
            harness.assert_tamper_detected(layout.get(name).unwrap()[0]);
        }
    }

    #[test]
    fn dropped_limb_is_range_checked() {
        let precision = Precision::new(2, 2);
        let width = Trig::<Fr>::witness_columns(precision, TrigFunction::Cos);
        let mut harness = Harness::<Fr>::new(width);
        let gadget = Trig::<Fr>::cos(harness.columns(), precision);
        let input = harness.input(precision.encode(2.5));
        harness.synthesize(&gadget, &input, 0).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));

        let low = gadget.cell_layout(0).get("low").unwrap()[0];
        harness.assert_tamper_detected(low);
    }
}
