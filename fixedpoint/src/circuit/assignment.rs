use ark_ff::Field;

use super::{Cell, Column, ColumnKind, Selector};

/// Values of every trace column together with selector activations.
///
/// Columns grow on demand; cells never written read as zero.
#[derive(Debug, Clone)]
pub struct Assignment<F: Field> {
    witness: Vec<Vec<F>>,
    constant: Vec<Vec<F>>,
    public_input: Vec<Vec<F>>,
    selectors: Vec<Vec<bool>>,
}

impl<F: Field> Assignment<F> {
    pub fn new(witness_amount: usize, constant_amount: usize, public_input_amount: usize) -> Self {
        Self {
            witness: vec![Vec::new(); witness_amount],
            constant: vec![Vec::new(); constant_amount],
            public_input: vec![Vec::new(); public_input_amount],
            selectors: Vec::new(),
        }
    }

    pub fn witness_amount(&self) -> usize {
        self.witness.len()
    }

    pub fn constant_amount(&self) -> usize {
        self.constant.len()
    }

    pub fn public_input_amount(&self) -> usize {
        self.public_input.len()
    }

    /// Number of rows touched by any column or selector.
    pub fn rows(&self) -> usize {
        self.witness
            .iter()
            .chain(&self.constant)
            .chain(&self.public_input)
            .map(Vec::len)
            .chain(self.selectors.iter().map(Vec::len))
            .max()
            .unwrap_or(0)
    }

    pub fn value(&self, cell: Cell) -> F {
        self.column(cell.column)
            .get(cell.row)
            .copied()
            .unwrap_or(F::ZERO)
    }

    pub fn assign(&mut self, cell: Cell, value: F) {
        let column = self.column_mut(cell.column);
        if column.len() <= cell.row {
            column.resize(cell.row + 1, F::ZERO);
        }
        column[cell.row] = value;
    }

    pub fn enable_selector(&mut self, selector: Selector, row: usize) {
        let index = selector.index();
        if self.selectors.len() <= index {
            self.selectors.resize(index + 1, Vec::new());
        }
        let column = &mut self.selectors[index];
        if column.len() <= row {
            column.resize(row + 1, false);
        }
        column[row] = true;
    }

    pub fn is_enabled(&self, selector: Selector, row: usize) -> bool {
        self.selectors
            .get(selector.index())
            .and_then(|column| column.get(row))
            .copied()
            .unwrap_or(false)
    }

    /// Rows the selector is enabled on, in increasing order.
    pub fn enabled_rows(&self, selector: Selector) -> Vec<usize> {
        self.selectors
            .get(selector.index())
            .map(|column| {
                column
                    .iter()
                    .enumerate()
                    .filter_map(|(row, enabled)| enabled.then_some(row))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn column(&self, column: Column) -> &Vec<F> {
        let columns = match column.kind {
            ColumnKind::Witness => &self.witness,
            ColumnKind::Constant => &self.constant,
            ColumnKind::PublicInput => &self.public_input,
        };
        assert!(
            column.index < columns.len(),
            "column {column:?} is out of bounds"
        );
        &columns[column.index]
    }

    fn column_mut(&mut self, column: Column) -> &mut Vec<F> {
        let columns = match column.kind {
            ColumnKind::Witness => &mut self.witness,
            ColumnKind::Constant => &mut self.constant,
            ColumnKind::PublicInput => &mut self.public_input,
        };
        assert!(
            column.index < columns.len(),
            "column {column:?} is out of bounds"
        );
        &mut columns[column.index]
    }
}
