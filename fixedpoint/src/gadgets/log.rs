use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::{One, Signed};

use super::{
    check_field, compose, dedup_tables, exp::ExpRanged, place_gates, range_lookups, CellLayout,
    Columns, Gadget, Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Gate},
    lookup::TableKind,
    Error, Precision, LOG_TARGET,
};

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    y: Slot,
    y_prev: Slot,
    upper: Slot,
    lower: Slot,
    upper_gap: Vec<Slot>,
    lower_gap: Vec<Slot>,
}

/// Fixed-point natural logarithm of a positive input.
///
/// `y` is the smallest fixed-point value whose clipped exponential reaches
/// `x`, so with `y' = y - 1` (one unit in the last place):
///
/// ```text
/// exp(y') < x <= exp(y)
/// ```
///
/// Both exponentials are [`ExpRanged`] children placed below the main row:
///
/// ```text
/// | x | y | y' | e | e' | g_0..m-1 | g'_0..m-1 |
///
/// y' = y - 1
/// e - x = g
/// x - e' - 1 = g'
/// ```
#[derive(Debug, Clone)]
pub struct Log<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    row_layout: RowLayout,
    layout: Layout,
    exp: ExpRanged<F>,
    exp_prev: ExpRanged<F>,
    _field: PhantomData<F>,
}

impl<F: PrimeField> Log<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        check_field::<F>();
        columns.require("log", Self::witness_columns(precision), 0);

        let m = precision.m();
        let row_layout = RowLayout::choose(Self::cells(precision), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let layout = Layout {
            x: slots.next(),
            y: slots.next(),
            y_prev: slots.next(),
            upper: slots.next(),
            lower: slots.next(),
            upper_gap: slots.take(m),
            lower_gap: slots.take(m),
        };
        Self {
            exp: ExpRanged::new(columns.clone(), precision),
            exp_prev: ExpRanged::new(columns.clone(), precision),
            columns,
            precision,
            row_layout,
            layout,
            _field: PhantomData,
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        RowLayout::min_width(Self::cells(precision))
            .max(ExpRanged::<F>::witness_columns(precision))
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        RowLayout::choose(Self::cells(precision), witness_amount).rows()
            + 2 * ExpRanged::<F>::rows_amount(witness_amount, precision)
    }

    fn cells(precision: Precision) -> usize {
        5 + 2 * precision.m()
    }

    pub fn evaluate(&self, x: &BigInt) -> Result<BigInt, Error> {
        if !x.is_positive() || x > &self.precision.max_value() {
            return Err(Error::OutOfDomain {
                gadget: "log",
                reason: "argument must be positive and representable",
            });
        }

        let mut y = self.precision.encode(self.precision.decode(x).ln());
        while &self.exp.evaluate(&y)? < x {
            y += 1;
        }
        while &self.exp.evaluate(&(&y - 1u32))? >= x {
            y -= 1;
        }
        Ok(y)
    }

    fn exp_row(&self) -> usize {
        self.row_layout.rows()
    }

    fn exp_prev_row(&self) -> usize {
        self.row_layout.rows() + self.exp.rows()
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.y, start_row)
    }
}

impl<F: PrimeField> Gadget<F> for Log<F> {
    type Input = Cell;
    type Output = Cell;

    fn rows(&self) -> usize {
        self.row_layout.rows() + self.exp.rows() + self.exp_prev.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let q = |slot| self.columns.query::<F>(slot, 0);
        let upper_gap = self.columns.queries::<F>(&l.upper_gap, 0);
        let lower_gap = self.columns.queries::<F>(&l.lower_gap, 0);

        let constraints = vec![
            q(l.y_prev) - q(l.y) + F::ONE,
            q(l.upper) - q(l.x) - compose(upper_gap.clone()),
            q(l.x) - q(l.lower) - F::ONE - compose(lower_gap.clone()),
        ];
        vec![
            (0, Gate::Polynomial(constraints)),
            (0, Gate::Lookup(range_lookups(&[upper_gap, lower_gap].concat()))),
        ]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        dedup_tables([vec![TableKind::Range16], self.exp.lookup_tables()].concat())
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let l = &self.layout;
        let cell = |slot| vec![self.columns.cell(slot, start_row)];
        let mut layout = CellLayout::default();
        layout.push("x", cell(l.x));
        layout.push("y", cell(l.y));
        layout.push("y_prev", cell(l.y_prev));
        layout.push("upper", cell(l.upper));
        layout.push("lower", cell(l.lower));
        layout.push("upper_gap", self.columns.cells(&l.upper_gap, start_row));
        layout.push("lower_gap", self.columns.cells(&l.lower_gap, start_row));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "log", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let y = self.evaluate(&x)?;
        let y_prev = &y - BigInt::one();

        region.assign(l.x, &x);
        region.assign(l.y, &y);
        region.assign(l.y_prev, &y_prev);

        let (y_cell, y_prev_cell) = (region.cell(l.y), region.cell(l.y_prev));
        let upper = self
            .exp
            .assign(region.assignment(), &y_cell, start_row + self.exp_row())?;
        let lower = self.exp_prev.assign(
            region.assignment(),
            &y_prev_cell,
            start_row + self.exp_prev_row(),
        )?;
        let (upper, lower) = (region.read(upper), region.read(lower));

        region.assign(l.upper, &upper);
        region.assign(l.lower, &lower);
        region.assign_unsigned(&l.upper_gap, &(&upper - &x))?;
        region.assign_unsigned(&l.lower_gap, &(&x - &lower - 1u32))?;

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
        let upper = self
            .exp
            .build_circuit(cs, assignment, &cell(l.y), start_row + self.exp_row());
        let lower = self.exp_prev.build_circuit(
            cs,
            assignment,
            &cell(l.y_prev),
            start_row + self.exp_prev_row(),
        );

        cs.add_copy_constraint(*input, cell(l.x));
        cs.add_copy_constraint(upper, cell(l.upper));
        cs.add_copy_constraint(lower, cell(l.lower));
        self.output(start_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_std::{rand::Rng, test_rng};
    use num_traits::Zero;

    use crate::test_utils::{eval_unary, setup_logger, Fr, Harness, PRECISIONS};

    #[test]
    fn log_of_one() {
        setup_logger();

        let precision = Precision::new(1, 1);
        let width = Log::<Fr>::witness_columns(precision);
        let gadget = Log::<Fr>::new(Columns::contiguous(width, 1, 1), precision);
        assert_eq!(eval_unary(&gadget, width, 65536), Ok(BigInt::zero()));
    }

    #[test]
    fn brackets_the_argument() {
        let mut rng = test_rng();
        for (m1, m2) in PRECISIONS {
            let precision = Precision::new(m1, m2);
            let width = Log::<Fr>::witness_columns(precision);
            let gadget = Log::<Fr>::new(Columns::contiguous(width, 1, 1), precision);
            let top = precision.decode(&precision.max_value());

            for _ in 0..5 {
                let x = precision.encode(rng.gen_range(0.01..top));
                let y = eval_unary(&gadget, width, x.clone()).unwrap();
                assert!(gadget.exp.evaluate(&y).unwrap() >= x);
                assert!(gadget.exp.evaluate(&(&y - 1u32)).unwrap() < x);

                let expected = precision.decode(&x).ln();
                assert!(
                    (precision.decode(&y) - expected).abs() < 1e-3,
                    "log({}) = {} at ({m1}, {m2})",
                    precision.decode(&x),
                    precision.decode(&y)
                );
            }
        }
    }

    #[test]
    fn domain_edges() {
        let precision = Precision::new(1, 1);
        let width = Log::<Fr>::witness_columns(precision);
        let gadget = Log::<Fr>::new(Columns::contiguous(width, 1, 1), precision);

        let smallest = eval_unary(&gadget, width, 1).unwrap();
        assert!(precision.decode(&smallest) < -11.0);
        let largest = eval_unary(&gadget, width, precision.max_value()).unwrap();
        assert_eq!(largest, precision.exp_bounds().1 + 1);

        for x in [BigInt::zero(), BigInt::from(-65536), precision.max_value() + 1u32] {
            assert!(matches!(
                eval_unary(&gadget, width, x),
                Err(Error::OutOfDomain { gadget: "log", .. })
            ));
        }
    }

    #[test]
    fn detects_tampering() {
        let precision = Precision::new(1, 1);
        let width = Log::<Fr>::witness_columns(precision);
        let mut harness = Harness::<Fr>::new(width);
        let gadget = Log::<Fr>::new(harness.columns(), precision);
        let input = harness.input(precision.encode(10.0));
        let y = harness.synthesize(&gadget, &input, 0).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));

        harness.assert_tamper_detected(y);
        let layout = gadget.cell_layout(0);
        harness.assert_tamper_detected(layout.cell("y_prev").unwrap());
        harness.assert_tamper_detected(layout.cell("lower").unwrap());
    }
}
