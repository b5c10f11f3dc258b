use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::{One, Zero};

use super::{
    atan::Atan,
    check_field, compose, constant, dedup_tables,
    division::shift_identity,
    place_gates, range_lookups,
    sqrt::{Rounding, Sqrt},
    CellLayout, Columns, DivByPositive, Gadget, Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Expression, Gate},
    lookup::TableKind,
    utils, Error, Precision, LOG_TARGET,
};

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    square: Slot,
    square_rem: Vec<Slot>,
    radicand: Slot,
    root: Slot,
    zero: Slot,
    inverse: Slot,
    numerator: Slot,
    denominator: Slot,
    atan: Slot,
    y: Slot,
}

/// Fixed-point arcsine, `asin(x) = atan(x / sqrt(1 - x^2))`.
///
/// The main row squares `x`, hands `1 - x^2` to a square root, and feeds the
/// quotient to an arctangent:
///
/// ```text
/// | x | q | rq_0..m2-1 | rad | root | zf | inv | xn | den | at | y |
///
/// x^2 + delta / 2 = q * delta + rq
/// rad = delta - q
/// zf = 1 - root * inv,  zf * root = 0
/// xn = (1 - zf) * x,    den = root + zf
/// delta (y - add) = mul * ((1 - zf) * at * delta + zf * x * pi / 2)
/// ```
///
/// At `|x| = 1` the root vanishes; `zf` then replaces the division by
/// `0 / 1` and selects `sign(x) * pi / 2`. `add` and `mul` sit in the first
/// constant column at the start row and the row below, `(0, 1)` for the
/// arcsine and `(pi / 2, -1)` for [`Acos`].
///
/// Children in row order: square root (rounded with one post-comma limb,
/// floored with two), division, arctangent.
#[derive(Debug, Clone)]
pub struct Asin<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    offset: BigInt,
    factor: BigInt,
    row_layout: RowLayout,
    layout: Layout,
    sqrt: Sqrt<F>,
    div: DivByPositive<F>,
    atan: Atan<F>,
    _field: PhantomData<F>,
}

#[derive(Debug, Clone)]
struct AsinWitness {
    square: BigInt,
    square_rem: BigInt,
    radicand: BigInt,
    root: BigInt,
    zero: BigInt,
    numerator: BigInt,
    denominator: BigInt,
    atan: BigInt,
    y: BigInt,
}

impl<F: PrimeField> Asin<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        Self::with_offsets(columns, precision, BigInt::zero(), BigInt::one())
    }

    /// `y = offset + factor * asin(x)`.
    fn with_offsets(
        columns: Columns,
        precision: Precision,
        offset: BigInt,
        factor: BigInt,
    ) -> Self {
        check_field::<F>();
        columns.require("asin", Self::witness_columns(precision), 1);

        let row_layout = RowLayout::choose(Self::cells(precision), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let layout = Layout {
            x: slots.next(),
            square: slots.next(),
            square_rem: slots.take(precision.m2()),
            radicand: slots.next(),
            root: slots.next(),
            zero: slots.next(),
            inverse: slots.next(),
            numerator: slots.next(),
            denominator: slots.next(),
            atan: slots.next(),
            y: slots.next(),
        };
        Self {
            sqrt: Sqrt::with_rounding(columns.clone(), precision, Self::rounding(precision)),
            div: DivByPositive::new(columns.clone(), precision),
            atan: Atan::new(columns.clone(), precision),
            columns,
            precision,
            offset,
            factor,
            row_layout,
            layout,
            _field: PhantomData,
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        RowLayout::min_width(Self::cells(precision))
            .max(Sqrt::<F>::witness_columns(precision, Self::rounding(precision)))
            .max(DivByPositive::<F>::witness_columns(precision))
            .max(Atan::<F>::witness_columns(precision))
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        RowLayout::choose(Self::cells(precision), witness_amount).rows()
            + Sqrt::<F>::rows_amount(witness_amount, precision, Self::rounding(precision))
            + DivByPositive::<F>::rows_amount(witness_amount, precision)
            + Atan::<F>::rows_amount()
    }

    fn cells(precision: Precision) -> usize {
        10 + precision.m2()
    }

    fn rounding(precision: Precision) -> Rounding {
        if precision.m2() == 1 {
            Rounding::Nearest
        } else {
            Rounding::Floor
        }
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        Ok(self.witness(x)?.y)
    }

    fn witness(&self, x: &BigInt) -> Result<AsinWitness, Error> {
        let delta = self.precision.delta();
        let (square, square_rem) = utils::round_div_mod(&(x * x), &delta)?;
        let radicand = &delta - &square;
        let root = self.sqrt.evaluate(&radicand)?;

        let zero = if root.is_zero() {
            BigInt::one()
        } else {
            BigInt::zero()
        };
        let (numerator, denominator) = if zero.is_one() {
            (BigInt::zero(), BigInt::one())
        } else {
            (x.clone(), root.clone())
        };
        let quotient = self.div.evaluate(&numerator, &denominator)?;
        let atan = self.atan.evaluate(&quotient)?;

        let angle = if zero.is_one() {
            utils::sign(x) * self.precision.pi_half()
        } else {
            atan.clone()
        };
        Ok(AsinWitness {
            square,
            square_rem,
            radicand,
            root,
            zero,
            numerator,
            denominator,
            atan,
            y: &self.offset + &self.factor * angle,
        })
    }

    fn sqrt_row(&self) -> usize {
        self.row_layout.rows()
    }

    fn div_row(&self) -> usize {
        self.sqrt_row() + self.sqrt.rows()
    }

    fn atan_row(&self) -> usize {
        self.div_row() + self.div.rows()
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.y, start_row)
    }
}

impl<F: PrimeField> Gadget<F> for Asin<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.atan_row() + self.atan.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let q = |slot| self.columns.query::<F>(slot, 0);
        let square_rem = self.columns.queries::<F>(&l.square_rem, 0);

        let delta: F = constant(&self.precision.delta());
        let pi_half: F = constant(&self.precision.pi_half());
        let (x, zero) = (q(l.x), q(l.zero));
        let not_zero = Expression::one() - zero.clone();
        let offset = self.columns.constant_query::<F>(0, 0);
        let factor = self.columns.constant_query::<F>(0, 1);

        let constraints = vec![
            shift_identity(
                x.clone().square(),
                self.precision.delta_bits(),
                q(l.square),
                compose(square_rem.clone()),
            ),
            q(l.radicand) - delta + q(l.square),
            zero.clone() - F::ONE + q(l.root) * q(l.inverse),
            zero.clone() * q(l.root),
            q(l.numerator) - not_zero.clone() * x.clone(),
            q(l.denominator) - q(l.root) - zero.clone(),
            (q(l.y) - offset) * delta
                - factor * (not_zero * q(l.atan) * delta + zero * x * pi_half),
        ];
        vec![
            (0, Gate::Polynomial(constraints)),
            (0, Gate::Lookup(range_lookups(&square_rem))),
        ]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        dedup_tables(
            [
                vec![TableKind::Range16],
                self.sqrt.lookup_tables(),
                self.div.lookup_tables(),
                self.atan.lookup_tables(),
            ]
            .concat(),
        )
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let l = &self.layout;
        let cell = |slot| vec![self.columns.cell(slot, start_row)];
        let mut layout = CellLayout::default();
        layout.push("x", cell(l.x));
        layout.push("square", cell(l.square));
        layout.push("square_rem", self.columns.cells(&l.square_rem, start_row));
        layout.push("radicand", cell(l.radicand));
        layout.push("root", cell(l.root));
        layout.push("zero", cell(l.zero));
        layout.push("inverse", cell(l.inverse));
        layout.push("numerator", cell(l.numerator));
        layout.push("denominator", cell(l.denominator));
        layout.push("atan", cell(l.atan));
        layout.push("y", cell(l.y));
        layout.push(
            "offsets",
            vec![
                self.columns.constant_cell(0, start_row),
                self.columns.constant_cell(0, start_row + 1),
            ],
        );
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "asin", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        region.assign_constant(0, 0, &self.offset);
        region.assign_constant(0, 1, &self.factor);
        let x = region.read(*input);
        let w = self.witness(&x)?;

        region.assign(l.x, &x);
        region.assign(l.square, &w.square);
        region.assign_unsigned(&l.square_rem, &w.square_rem)?;
        region.assign(l.radicand, &w.radicand);
        let radicand = region.cell(l.radicand);
        let root = self
            .sqrt
            .assign(region.assignment(), &radicand, start_row + self.sqrt_row())?;
        debug_assert_eq!(region.read(root), w.root);

        let inverse = utils::from_bigint::<F>(&w.root)
            .inverse()
            .unwrap_or(F::ZERO);
        region.assign(l.root, &w.root);
        region.assign(l.zero, &w.zero);
        region.assign(l.inverse, &utils::to_bigint(inverse));
        region.assign(l.numerator, &w.numerator);
        region.assign(l.denominator, &w.denominator);

        let fraction = (region.cell(l.numerator), region.cell(l.denominator));
        let quotient = self
            .div
            .assign(region.assignment(), &fraction, start_row + self.div_row())?;
        self.atan
            .assign(region.assignment(), &quotient, start_row + self.atan_row())?;

        region.assign(l.atan, &w.atan);
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

        let mut region = Region::new(assignment, &self.columns, start_row);
        region.assign_constant(0, 0, &self.offset);
        region.assign_constant(0, 1, &self.factor);

        place_gates(cs, assignment, self.gates(), start_row);
        let root = self
            .sqrt
            .build_circuit(cs, assignment, &cell(l.radicand), start_row + self.sqrt_row());
        let quotient = self.div.build_circuit(
            cs,
            assignment,
            &(cell(l.numerator), cell(l.denominator)),
            start_row + self.div_row(),
        );
        let atan = self
            .atan
            .build_circuit(cs, assignment, &quotient, start_row + self.atan_row());

        cs.add_copy_constraint(*input, cell(l.x));
        cs.add_copy_constraint(root, cell(l.root));
        cs.add_copy_constraint(atan, cell(l.atan));
        self.output(start_row)
    }
}

/// Fixed-point arccosine, `acos(x) = pi / 2 - asin(x)`.
///
/// The arcsine circuit with its output offsets set to `(pi / 2, -1)`.
#[derive(Debug, Clone)]
pub struct Acos<F: PrimeField> {
    asin: Asin<F>,
}

impl<F: PrimeField> Acos<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        Self {
            asin: Asin::with_offsets(columns, precision, precision.pi_half(), -BigInt::one()),
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        Asin::<F>::witness_columns(precision)
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        Asin::<F>::rows_amount(witness_amount, precision)
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        self.asin.evaluate(x)
    }
}

impl<F: PrimeField> Gadget<F> for Acos<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.asin.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        self.asin.gates()
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        self.asin.lookup_tables()
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        self.asin.cell_layout(start_row)
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "acos", start_row).entered();
        self.asin.assign(assignment, input, start_row)
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Cell {
        self.asin.build_circuit(cs, assignment, input, start_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_std::{rand::Rng, test_rng};
    use num_traits::Signed;

    use crate::test_utils::{eval_unary, setup_logger, Fr, Harness, PRECISIONS};

    const ONE: i64 = 1 << 16;

    #[test]
    fn asin_at_the_edges() {
        setup_logger();

        let precision = Precision::new(1, 1);
        let width = Asin::<Fr>::witness_columns(precision);
        let gadget = Asin::<Fr>::new(Columns::contiguous(width, 1, 1), precision);

        assert_eq!(eval_unary(&gadget, width, ONE), Ok(BigInt::from(102944)));
        assert_eq!(eval_unary(&gadget, width, -ONE), Ok(BigInt::from(-102944)));
        assert_eq!(eval_unary(&gadget, width, 0), Ok(BigInt::from(0)));

        let half = eval_unary(&gadget, width, ONE / 2).unwrap();
        assert!((half - BigInt::from(34315)).abs() <= BigInt::from(2));
    }

    #[test]
    fn acos_at_the_edges() {
        let precision = Precision::new(1, 1);
        let width = Acos::<Fr>::witness_columns(precision);
        let gadget = Acos::<Fr>::new(Columns::contiguous(width, 1, 1), precision);

        assert_eq!(eval_unary(&gadget, width, ONE), Ok(BigInt::from(0)));
        assert_eq!(eval_unary(&gadget, width, 0), Ok(BigInt::from(102944)));
        assert_eq!(eval_unary(&gadget, width, -ONE), Ok(BigInt::from(205888)));

        let mut harness = Harness::<Fr>::new(width);
        let gadget = Acos::<Fr>::new(harness.columns(), precision);
        let input = harness.input(-ONE);
        let y = harness.assign_then_build(&gadget, &input, 2).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));
        assert_eq!(harness.value(y), BigInt::from(205888));
    }

    #[test]
    fn matches_f64() {
        let mut rng = test_rng();
        for (m1, m2) in PRECISIONS {
            let precision = Precision::new(m1, m2);
            let width = Asin::<Fr>::witness_columns(precision);
            let asin = Asin::<Fr>::new(Columns::contiguous(width, 1, 1), precision);
            let acos = Acos::<Fr>::new(Columns::contiguous(width, 1, 1), precision);
            for _ in 0..5 {
                let x: f64 = rng.gen_range(-0.95..0.95);
                let xe = precision.encode(x);
                let asin_raw = eval_unary(&asin, width, xe.clone()).unwrap();
                let acos_raw = eval_unary(&acos, width, xe).unwrap();
                assert_eq!(&asin_raw + &acos_raw, precision.pi_half());

                let s = precision.decode(&asin_raw);
                let c = precision.decode(&acos_raw);
                assert!((s - x.asin()).abs() < 1e-3, "asin({x}) = {s} at ({m1}, {m2})");
                assert!((c - x.acos()).abs() < 1e-3, "acos({x}) = {c} at ({m1}, {m2})");
            }
        }
    }

    #[test]
    fn rejects_outside_unit_interval() {
        let precision = Precision::new(2, 1);
        let width = Asin::<Fr>::witness_columns(precision);
        let gadget = Asin::<Fr>::new(Columns::contiguous(width, 1, 1), precision);
        assert_eq!(
            eval_unary(&gadget, width, ONE + 256),
            Err(Error::NegativeValue)
        );
    }

    #[test]
    #[should_panic]
    fn needs_constant_column() {
        let precision = Precision::new(1, 1);
        Asin::<Fr>::new(Columns::contiguous(15, 0, 1), precision);
    }

    #[test]
    fn detects_tampering() {
        let precision = Precision::new(1, 1);
        let width = Asin::<Fr>::witness_columns(precision);
        let mut harness = Harness::<Fr>::new(width);
        let gadget = Asin::<Fr>::new(harness.columns(), precision);
        let input = harness.input(ONE / 2);
        let y = harness.synthesize(&gadget, &input, 0).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));

        harness.assert_tamper_detected(y);
        let layout = gadget.cell_layout(0);
        for name in ["zero", "inverse", "numerator", "denominator", "radicand"] {
            harness.assert_tamper_detected(layout.cell(name).unwrap());
        }
        harness.assert_tamper_detected(layout.get("offsets").unwrap()[1]);
    }

    #[test]
    fn zero_flag_is_bound() {
        let precision = Precision::new(1, 1);
        let width = Asin::<Fr>::witness_columns(precision);
        let mut harness = Harness::<Fr>::new(width);
        let gadget = Asin::<Fr>::new(harness.columns(), precision);
        let input = harness.input(-ONE);
        let y = harness.synthesize(&gadget, &input, 0).unwrap();
        assert_eq!(harness.value(y), BigInt::from(-102944));

        let layout = gadget.cell_layout(0);
        harness.assert_tamper_detected(y);
        harness.assert_tamper_detected(layout.cell("zero").unwrap());
        harness.assert_tamper_detected(layout.cell("numerator").unwrap());
    }
}
