//! Minimal PLONK-ish circuit container: a grid of witness, constant and
//! public-input columns, polynomial and lookup gates activated by
//! selectors, and copy constraints between cells.

mod assignment;
mod constraint_system;
mod expression;

pub use assignment::Assignment;
pub use constraint_system::{ConstraintSystem, Error, Gate, Lookup, Selector};
pub use expression::{Expression, Query};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKind {
    Witness,
    Constant,
    PublicInput,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column {
    pub kind: ColumnKind,
    pub index: usize,
}

impl Column {
    pub const fn witness(index: usize) -> Self {
        Self {
            kind: ColumnKind::Witness,
            index,
        }
    }

    pub const fn constant(index: usize) -> Self {
        Self {
            kind: ColumnKind::Constant,
            index,
        }
    }

    pub const fn public_input(index: usize) -> Self {
        Self {
            kind: ColumnKind::PublicInput,
            index,
        }
    }

    pub const fn cell(self, row: usize) -> Cell {
        Cell { column: self, row }
    }
}

/// Absolute position in the trace.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub column: Column,
    pub row: usize,
}
