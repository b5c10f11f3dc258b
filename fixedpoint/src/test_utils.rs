use ark_ff::PrimeField;
use num_bigint::BigInt;
use tracing_subscriber::{
    filter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
    circuit::{self, Assignment, Cell, Column, ConstraintSystem},
    gadgets::{Columns, Gadget},
    utils, Error, LOG_TARGET,
};

pub(crate) type Fr = ark_pallas::Fr;

pub(crate) fn setup_logger() {
    let filter = filter::Targets::new().with_target(LOG_TARGET, tracing::Level::DEBUG);
    // tests share one global subscriber; later installs are no-ops.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE))
        .with(filter)
        .try_init();
}

/// Fresh circuit with inputs placed in the first public-input column.
pub(crate) struct Harness<F: PrimeField> {
    pub cs: ConstraintSystem<F>,
    pub assignment: Assignment<F>,
    witness_amount: usize,
    inputs: usize,
}

impl<F: PrimeField> Harness<F> {
    pub fn new(witness_amount: usize) -> Self {
        Self {
            cs: ConstraintSystem::new(),
            assignment: Assignment::new(witness_amount, 1, 1),
            witness_amount,
            inputs: 0,
        }
    }

    pub fn columns(&self) -> Columns {
        Columns::contiguous(self.witness_amount, 1, 1)
    }

    pub fn input(&mut self, value: impl Into<BigInt>) -> Cell {
        let cell = Column::public_input(0).cell(self.inputs);
        self.inputs += 1;
        self.set(cell, &value.into());
        cell
    }

    pub fn synthesize<G: Gadget<F>>(
        &mut self,
        gadget: &G,
        input: &G::Input,
        start_row: usize,
    ) -> Result<G::Output, Error> {
        for table in gadget.lookup_tables() {
            self.cs.register_lookup_table(table);
        }
        gadget.build_circuit(&mut self.cs, &mut self.assignment, input, start_row);
        gadget.assign(&mut self.assignment, input, start_row)
    }

    /// Assigns the witness into a fresh region before any gate or constant is
    /// placed, then wires the circuit around it.
    pub fn assign_then_build<G: Gadget<F>>(
        &mut self,
        gadget: &G,
        input: &G::Input,
        start_row: usize,
    ) -> Result<G::Output, Error> {
        let output = gadget.assign(&mut self.assignment, input, start_row)?;
        for table in gadget.lookup_tables() {
            self.cs.register_lookup_table(table);
        }
        gadget.build_circuit(&mut self.cs, &mut self.assignment, input, start_row);
        Ok(output)
    }

    pub fn value(&self, cell: Cell) -> BigInt {
        utils::to_bigint(self.assignment.value(cell))
    }

    pub fn set(&mut self, cell: Cell, value: &BigInt) {
        self.assignment.assign(cell, utils::from_bigint(value));
    }

    pub fn is_satisfied(&self) -> Result<(), circuit::Error> {
        self.cs.is_satisfied(&self.assignment)
    }

    /// Shifts `cell` by one and expects the circuit to reject the result.
    pub fn assert_tamper_detected(&mut self, cell: Cell) {
        let original = self.value(cell);
        self.set(cell, &(&original + 1u32));
        assert!(
            self.is_satisfied().is_err(),
            "changing {cell:?} went unnoticed"
        );
        self.set(cell, &original);
        assert_eq!(self.is_satisfied(), Ok(()));
    }
}

/// Runs a single-input gadget on `x` at row zero, checks that the circuit is
/// satisfied and returns the output value.
pub(crate) fn eval_unary<G>(gadget: &G, witness_amount: usize, x: impl Into<BigInt>) -> Result<BigInt, Error>
where
    G: Gadget<Fr, Input = Cell, Output = Cell>,
{
    let mut harness = Harness::new(witness_amount);
    let input = harness.input(x);
    let output = harness.synthesize(gadget, &input, 0)?;
    assert_eq!(harness.is_satisfied(), Ok(()));
    Ok(harness.value(output))
}

pub(crate) fn eval_binary<G>(
    gadget: &G,
    witness_amount: usize,
    x: impl Into<BigInt>,
    y: impl Into<BigInt>,
) -> Result<BigInt, Error>
where
    G: Gadget<Fr, Input = (Cell, Cell), Output = Cell>,
{
    let mut harness = Harness::new(witness_amount);
    let input = (harness.input(x), harness.input(y));
    let output = harness.synthesize(gadget, &input, 0)?;
    assert_eq!(harness.is_satisfied(), Ok(()));
    Ok(harness.value(output))
}

/// Every `(m1, m2)` combination.
pub(crate) const PRECISIONS: [(u8, u8); 4] = [(1, 1), (2, 1), (1, 2), (2, 2)];
