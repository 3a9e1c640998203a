/// A move of the focus by one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// Row-major grid of selectable cells. Moves wrap around: stepping right
/// from the last cell of a row continues on the next row, and stepping past
/// the last cell goes back to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    columns: usize,
    cells: usize,
}

impl Grid {
    pub fn new(columns: usize, cells: usize) -> Grid {
        let cells = cells.max(1);
        Grid {
            columns: columns.clamp(1, cells),
            cells,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn step(&self, focus: usize, direction: Direction) -> usize {
        let n = self.cells;
        let focus = focus % n;
        match direction {
            Direction::Right => (focus + 1) % n,
            Direction::Left => (focus + n - 1) % n,
            Direction::Down if focus + self.columns < n => focus + self.columns,
            Direction::Down => focus % self.columns,
            Direction::Up if focus >= self.columns => focus - self.columns,
            Direction::Up => self.bottom_of(focus),
        }
    }

    /// Last cell in the column of `focus`. A short last row may not reach
    /// every column.
    fn bottom_of(&self, focus: usize) -> usize {
        let column = focus % self.columns;
        let rows = (self.cells - 1 - column) / self.columns;
        column + rows * self.columns
    }
}
