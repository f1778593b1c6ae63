use std::ops::{Index, IndexMut};

use owo_colors::OwoColorize;

use crate::env::Vec2D;

/// Represents a single tile of the board
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Cell {
    #[default]
    Free,
    Food,
    Occupied,
}

impl Cell {
    /// Food does not block the snake.
    pub fn is_free(self) -> bool {
        self != Cell::Occupied
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Cell::Free => write!(f, "."),
            Cell::Food => write!(f, "{}", "o".red()),
            Cell::Occupied => write!(f, "{}", "X".green()),
        }
    }
}

/// The board representation as grid of free and occupied cells.
///
/// This allows constant time occupancy lookups, the snake body itself is
/// kept by the world.
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
}

impl Grid {
    /// Creates a new grid with the provided dimensions.
    pub fn new(width: usize, height: usize) -> Grid {
        Grid {
            width,
            height,
            cells: vec![Cell::default(); width * height],
        }
    }

    /// Clears the grid.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::Free);
    }

    /// Returns if `p` is within the boundaries of the board.
    pub fn has(&self, p: Vec2D) -> bool {
        p.within(self.width, self.height)
    }

    /// Returns if `p` is on the board and not blocked.
    pub fn is_free(&self, p: Vec2D) -> bool {
        self.has(p) && self[p].is_free()
    }

    /// Position of the cell at the linear index `i`.
    pub fn position(&self, i: usize) -> Vec2D {
        Vec2D::new((i % self.width) as _, (i / self.width) as _)
    }

    /// Iterates over all positions that are not blocked.
    pub fn free_cells(&self) -> impl Iterator<Item = Vec2D> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_free())
            .map(|(i, _)| self.position(i))
    }

    /// Number of positions that are not blocked.
    pub fn count_free(&self) -> usize {
        self.cells.iter().filter(|c| c.is_free()).count()
    }
}

impl Index<Vec2D> for Grid {
    type Output = Cell;

    fn index(&self, p: Vec2D) -> &Self::Output {
        assert!(self.has(p));
        &self.cells[p.x as usize + p.y as usize * self.width]
    }
}

impl IndexMut<Vec2D> for Grid {
    fn index_mut(&mut self, p: Vec2D) -> &mut Self::Output {
        assert!(self.has(p));
        &mut self.cells[p.x as usize + p.y as usize * self.width]
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Grid {{")?;
        for y in (0..self.height as i16).rev() {
            write!(f, "  ")?;
            for x in 0..self.width as i16 {
                write!(f, "{:?} ", self[Vec2D::new(x, y)])?;
            }
            writeln!(f)?;
        }
        write!(f, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::v2;

    #[test]
    fn grid_size() {
        use std::mem;
        assert_eq!(mem::size_of::<Cell>(), 1);
    }

    #[test]
    fn free_cells() {
        let mut grid = Grid::new(3, 2);
        assert_eq!(grid.count_free(), 6);

        grid[v2(1, 0)] = Cell::Occupied;
        grid[v2(2, 1)] = Cell::Food;
        let free: Vec<_> = grid.free_cells().collect();
        assert_eq!(
            free,
            vec![v2(0, 0), v2(2, 0), v2(0, 1), v2(1, 1), v2(2, 1)]
        );
        assert_eq!(grid.count_free(), 5);
        assert!(grid.is_free(v2(2, 1)));
        assert!(!grid.is_free(v2(1, 0)));
        assert!(!grid.is_free(v2(3, 0)));

        grid.clear();
        assert_eq!(grid.count_free(), 6);
    }
}
