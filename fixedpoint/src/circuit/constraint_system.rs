use std::{collections::BTreeMap, sync::Arc};

use ark_ff::PrimeField;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};

use super::{Assignment, Cell, Expression};
use crate::{
    lookup::{self, LookupTable, TableKind},
    LOG_TARGET,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("gate {selector} is not satisfied at row {row} (constraint {constraint})")]
    GateNotSatisfied {
        selector: usize,
        row: usize,
        constraint: usize,
    },

    #[error("lookup into `{table}` is not satisfied at row {row} (gate {selector})")]
    LookupNotSatisfied {
        selector: usize,
        row: usize,
        table: &'static str,
    },

    #[error("copy constraint between {left:?} and {right:?} is violated")]
    CopyConstraintViolated { left: Cell, right: Cell },

    #[error("lookup table `{0}` is not registered")]
    UnknownTable(&'static str),
}

/// Activates one gate on the rows it is enabled on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(pub(crate) usize);

impl Selector {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Tuple of expressions that must equal some row of `table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lookup<F: PrimeField> {
    pub table: TableKind,
    pub inputs: Vec<Expression<F>>,
}

impl<F: PrimeField> Lookup<F> {
    pub fn new(table: TableKind, inputs: Vec<Expression<F>>) -> Self {
        Self { table, inputs }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Gate<F: PrimeField> {
    /// Every expression must vanish.
    Polynomial(Vec<Expression<F>>),
    Lookup(Vec<Lookup<F>>),
}

impl<F: PrimeField> Gate<F> {
    pub fn degree(&self) -> usize {
        match self {
            Self::Polynomial(constraints) => {
                constraints.iter().map(Expression::degree).max().unwrap_or(0)
            }
            Self::Lookup(lookups) => lookups
                .iter()
                .flat_map(|lookup| lookup.inputs.iter().map(Expression::degree))
                .max()
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintSystem<F: PrimeField> {
    gates: Vec<Gate<F>>,
    tables: BTreeMap<TableKind, Arc<LookupTable<F>>>,
    copy_constraints: Vec<(Cell, Cell)>,
}

impl<F: PrimeField> ConstraintSystem<F> {
    pub fn new() -> Self {
        Self {
            gates: Vec::new(),
            tables: BTreeMap::new(),
            copy_constraints: Vec::new(),
        }
    }

    /// Adds a gate, reusing the selector of an identical gate if one exists.
    pub fn add_gate(&mut self, gate: Gate<F>) -> Selector {
        if let Some(index) = self.gates.iter().position(|existing| existing == &gate) {
            return Selector(index);
        }
        self.gates.push(gate);
        Selector(self.gates.len() - 1)
    }

    pub fn gates(&self) -> &[Gate<F>] {
        &self.gates
    }

    /// Registers a cached table; registering the same table twice is a no-op.
    pub fn register_lookup_table(&mut self, kind: TableKind) {
        self.tables
            .entry(kind)
            .or_insert_with(|| lookup::table::<F>(kind));
    }

    pub fn lookup_tables(&self) -> impl Iterator<Item = TableKind> + '_ {
        self.tables.keys().copied()
    }

    pub fn add_copy_constraint(&mut self, left: Cell, right: Cell) {
        self.copy_constraints.push((left, right));
    }

    pub fn copy_constraints(&self) -> &[(Cell, Cell)] {
        &self.copy_constraints
    }

    /// Checks every gate on every row its selector is enabled on, then every
    /// copy constraint.
    pub fn is_satisfied(&self, assignment: &Assignment<F>) -> Result<(), Error> {
        let result = self.check(assignment);
        if let Err(err) = &result {
            tracing::debug!(target: LOG_TARGET, %err, "constraint system is not satisfied");
        }
        result
    }

    fn check(&self, assignment: &Assignment<F>) -> Result<(), Error> {
        for (index, gate) in self.gates.iter().enumerate() {
            let rows = assignment.enabled_rows(Selector(index));
            match gate {
                Gate::Polynomial(constraints) => {
                    ark_std::cfg_into_iter!(rows).try_for_each(|row| {
                        constraints
                            .iter()
                            .position(|constraint| constraint.evaluate(assignment, row) != F::ZERO)
                            .map_or(Ok(()), |constraint| {
                                Err(Error::GateNotSatisfied {
                                    selector: index,
                                    row,
                                    constraint,
                                })
                            })
                    })?;
                }
                Gate::Lookup(lookups) => {
                    for lookup in lookups {
                        let table = self
                            .tables
                            .get(&lookup.table)
                            .ok_or(Error::UnknownTable(lookup.table.name()))?;
                        ark_std::cfg_iter!(rows).try_for_each(|&row| {
                            let values: Vec<F> = lookup
                                .inputs
                                .iter()
                                .map(|input| input.evaluate(assignment, row))
                                .collect();
                            if table.contains(&values) {
                                Ok(())
                            } else {
                                Err(Error::LookupNotSatisfied {
                                    selector: index,
                                    row,
                                    table: lookup.table.name(),
                                })
                            }
                        })?;
                    }
                }
            }
        }

        for &(left, right) in &self.copy_constraints {
            if assignment.value(left) != assignment.value(right) {
                return Err(Error::CopyConstraintViolated { left, right });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_ff::Field;
    use ark_pallas::Fr;

    use crate::circuit::Column;

    #[test]
    fn identical_gates_share_selector() {
        let mut cs = ConstraintSystem::<Fr>::new();
        let a = Expression::query(Column::witness(0), 0);
        let s1 = cs.add_gate(Gate::Polynomial(vec![a.clone() - Fr::ONE]));
        let s2 = cs.add_gate(Gate::Polynomial(vec![a.clone() - Fr::ONE]));
        let s3 = cs.add_gate(Gate::Polynomial(vec![a.square()]));
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
        assert_eq!(cs.gates().len(), 2);
        assert_eq!(cs.gates()[1].degree(), 2);
    }

    #[test]
    fn reports_gate_violation() {
        let mut cs = ConstraintSystem::<Fr>::new();
        let mut assignment = Assignment::new(2, 0, 0);
        let a = Expression::query(Column::witness(0), 0);
        let b = Expression::query(Column::witness(1), 1);
        let selector = cs.add_gate(Gate::Polynomial(vec![a * Fr::from(2u64) - b]));

        assignment.assign(Column::witness(0).cell(0), Fr::from(3u64));
        assignment.assign(Column::witness(1).cell(1), Fr::from(6u64));
        assignment.enable_selector(selector, 0);
        assert_eq!(cs.is_satisfied(&assignment), Ok(()));

        assignment.enable_selector(selector, 1);
        assert_eq!(
            cs.is_satisfied(&assignment),
            Err(Error::GateNotSatisfied {
                selector: 0,
                row: 1,
                constraint: 0
            })
        );
    }

    #[test]
    fn checks_lookups_and_copies() {
        let mut cs = ConstraintSystem::<Fr>::new();
        let mut assignment = Assignment::new(2, 0, 0);
        let a = Column::witness(0);
        let b = Column::witness(1);
        let selector = cs.add_gate(Gate::Lookup(vec![Lookup::new(
            TableKind::Range16,
            vec![Expression::query(a, 0)],
        )]));
        assignment.assign(a.cell(0), Fr::from(65535u64));
        assignment.enable_selector(selector, 0);
        assert_eq!(
            cs.is_satisfied(&assignment),
            Err(Error::UnknownTable("range_16bit/full"))
        );

        cs.register_lookup_table(TableKind::Range16);
        cs.register_lookup_table(TableKind::Range16);
        assert_eq!(cs.lookup_tables().count(), 1);
        assert_eq!(cs.is_satisfied(&assignment), Ok(()));

        assignment.assign(a.cell(0), Fr::from(65536u64));
        assert!(matches!(
            cs.is_satisfied(&assignment),
            Err(Error::LookupNotSatisfied { row: 0, .. })
        ));
        assignment.assign(a.cell(0), Fr::from(1u64));

        cs.add_copy_constraint(a.cell(0), b.cell(3));
        assert_eq!(
            cs.is_satisfied(&assignment),
            Err(Error::CopyConstraintViolated {
                left: a.cell(0),
                right: b.cell(3)
            })
        );
        assignment.assign(b.cell(3), Fr::from(1u64));
        assert_eq!(cs.is_satisfied(&assignment), Ok(()));
    }
}
