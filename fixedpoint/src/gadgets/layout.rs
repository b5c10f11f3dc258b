use crate::circuit::Cell;

/// Position of a logical variable relative to a gadget's first row and first
/// witness column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub column: usize,
    pub row: usize,
}

/// Row/column trade-off for gadgets whose variables fit into at most two rows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RowLayout {
    OneRow,
    TwoRows,
}

impl RowLayout {
    /// Panics if `cells` cannot be packed into two rows of `witness_amount`.
    pub fn choose(cells: usize, witness_amount: usize) -> Self {
        if witness_amount >= cells {
            return Self::OneRow;
        }
        assert!(
            witness_amount >= Self::min_width(cells),
            "{cells} cells do not fit into two rows of {witness_amount} columns"
        );
        Self::TwoRows
    }

    /// Fewest columns that still fit `cells` into two rows.
    pub const fn min_width(cells: usize) -> usize {
        cells.div_ceil(2)
    }

    pub const fn rows(self) -> usize {
        match self {
            Self::OneRow => 1,
            Self::TwoRows => 2,
        }
    }
}

/// Hands out slots row by row, left to right.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    width: usize,
    row: usize,
    column: usize,
}

impl SlotAllocator {
    pub fn new(width: usize) -> Self {
        Self::starting_at(width, 0)
    }

    pub fn starting_at(width: usize, row: usize) -> Self {
        assert!(width > 0, "gadget needs at least one witness column");
        Self {
            width,
            row,
            column: 0,
        }
    }

    pub fn next(&mut self) -> Slot {
        if self.column == self.width {
            self.row += 1;
            self.column = 0;
        }
        let slot = Slot {
            column: self.column,
            row: self.row,
        };
        self.column += 1;
        slot
    }

    pub fn take(&mut self, amount: usize) -> Vec<Slot> {
        (0..amount).map(|_| self.next()).collect()
    }

    /// Moves to the start of the next row unless the current one is empty.
    pub fn next_row(&mut self) {
        if self.column > 0 {
            self.row += 1;
            self.column = 0;
        }
    }

    /// Number of rows touched so far, counted from row zero.
    pub fn rows(&self) -> usize {
        self.row + usize::from(self.column > 0)
    }
}

/// Named cells of a gadget instance, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellLayout {
    entries: Vec<(&'static str, Vec<Cell>)>,
}

impl CellLayout {
    pub fn push(&mut self, name: &'static str, cells: Vec<Cell>) {
        self.entries.push((name, cells));
    }

    pub fn get(&self, name: &str) -> Option<&[Cell]> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, cells)| cells.as_slice())
    }

    /// First cell of `name`.
    pub fn cell(&self, name: &str) -> Option<Cell> {
        self.get(name).and_then(|cells| cells.first().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[Cell])> {
        self.entries
            .iter()
            .map(|(name, cells)| (*name, cells.as_slice()))
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.entries.iter().flat_map(|(_, cells)| cells.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_layout() {
        assert_eq!(RowLayout::choose(9, 9), RowLayout::OneRow);
        assert_eq!(RowLayout::choose(9, 5), RowLayout::TwoRows);
        assert_eq!(RowLayout::min_width(9), 5);
        assert_eq!(RowLayout::TwoRows.rows(), 2);
    }

    #[test]
    #[should_panic]
    fn too_few_columns() {
        RowLayout::choose(9, 4);
    }

    #[test]
    fn allocator_fills_rows() {
        let mut slots = SlotAllocator::new(3);
        let first = slots.take(4);
        assert_eq!(first[2], Slot { column: 2, row: 0 });
        assert_eq!(first[3], Slot { column: 0, row: 1 });
        assert_eq!(slots.rows(), 2);

        slots.next_row();
        assert_eq!(slots.next(), Slot { column: 0, row: 2 });
        slots.next_row();
        slots.next_row();
        assert_eq!(slots.rows(), 3);
    }
}
