use std::{
    iter::Sum,
    ops::{Add, Mul, Neg, Sub},
};

use ark_ff::Field;

use super::{Assignment, Column};

/// Reference to a cell relative to the row a gate is enabled on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub column: Column,
    pub rotation: i32,
}

/// Multivariate polynomial over trace cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression<F: Field> {
    Constant(F),
    Query(Query),
    Sum(Box<Self>, Box<Self>),
    Product(Box<Self>, Box<Self>),
    Negated(Box<Self>),
}

impl<F: Field> Expression<F> {
    pub fn query(column: Column, rotation: i32) -> Self {
        Self::Query(Query { column, rotation })
    }

    pub fn constant(value: F) -> Self {
        Self::Constant(value)
    }

    pub fn zero() -> Self {
        Self::Constant(F::ZERO)
    }

    pub fn one() -> Self {
        Self::Constant(F::ONE)
    }

    pub fn square(self) -> Self {
        self.clone() * self
    }

    pub fn degree(&self) -> usize {
        match self {
            Self::Constant(_) => 0,
            Self::Query(_) => 1,
            Self::Sum(a, b) => a.degree().max(b.degree()),
            Self::Product(a, b) => a.degree() + b.degree(),
            Self::Negated(a) => a.degree(),
        }
    }

    /// Evaluates the expression with queries resolved against `row`.
    ///
    /// Cells outside of the assigned trace read as zero.
    pub fn evaluate(&self, assignment: &Assignment<F>, row: usize) -> F {
        match self {
            Self::Constant(value) => *value,
            Self::Query(query) => row
                .checked_add_signed(query.rotation as isize)
                .map(|row| assignment.value(query.column.cell(row)))
                .unwrap_or(F::ZERO),
            Self::Sum(a, b) => a.evaluate(assignment, row) + b.evaluate(assignment, row),
            Self::Product(a, b) => a.evaluate(assignment, row) * b.evaluate(assignment, row),
            Self::Negated(a) => -a.evaluate(assignment, row),
        }
    }

    /// Every query the expression depends on.
    pub fn queries(&self) -> Vec<Query> {
        let mut queries = Vec::new();
        self.collect_queries(&mut queries);
        queries
    }

    fn collect_queries(&self, queries: &mut Vec<Query>) {
        match self {
            Self::Constant(_) => {}
            Self::Query(query) => queries.push(*query),
            Self::Sum(a, b) | Self::Product(a, b) => {
                a.collect_queries(queries);
                b.collect_queries(queries);
            }
            Self::Negated(a) => a.collect_queries(queries),
        }
    }
}

impl<F: Field> From<F> for Expression<F> {
    fn from(value: F) -> Self {
        Self::Constant(value)
    }
}

impl<F: Field> Add for Expression<F> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::Sum(Box::new(self), Box::new(rhs))
    }
}

impl<F: Field> Add<F> for Expression<F> {
    type Output = Self;

    fn add(self, rhs: F) -> Self {
        self + Self::Constant(rhs)
    }
}

impl<F: Field> Sub for Expression<F> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl<F: Field> Sub<F> for Expression<F> {
    type Output = Self;

    fn sub(self, rhs: F) -> Self {
        self + Self::Constant(-rhs)
    }
}

impl<F: Field> Mul for Expression<F> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::Product(Box::new(self), Box::new(rhs))
    }
}

impl<F: Field> Mul<F> for Expression<F> {
    type Output = Self;

    fn mul(self, rhs: F) -> Self {
        self * Self::Constant(rhs)
    }
}

impl<F: Field> Neg for Expression<F> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::Negated(Box::new(self))
    }
}

impl<F: Field> Sum for Expression<F> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.reduce(|acc, term| acc + term).unwrap_or_else(Self::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_pallas::Fr;

    #[test]
    fn evaluate_with_rotation() {
        let mut assignment = Assignment::<Fr>::new(2, 0, 0);
        let a = Column::witness(0);
        let b = Column::witness(1);
        assignment.assign(a.cell(0), Fr::from(3u64));
        assignment.assign(b.cell(1), Fr::from(5u64));

        // a[-1] * b - 2
        let expr = Expression::query(a, -1) * Expression::query(b, 0) - Fr::from(2u64);
        assert_eq!(expr.degree(), 2);
        assert_eq!(expr.evaluate(&assignment, 1), Fr::from(13u64));
        // rotation before the first row reads zero.
        assert_eq!(expr.evaluate(&assignment, 0), -Fr::from(2u64));
        assert_eq!(expr.queries().len(), 2);
    }

    #[test]
    fn sum_of_terms() {
        let assignment = Assignment::<Fr>::new(1, 0, 0);
        let terms = (1..=4u64).map(|i| Expression::constant(Fr::from(i)));
        let expr: Expression<Fr> = terms.sum();
        assert_eq!(expr.evaluate(&assignment, 0), Fr::from(10u64));

        let empty: Expression<Fr> = std::iter::empty().sum();
        assert_eq!(empty, Expression::zero());
    }
}
