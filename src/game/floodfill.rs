use std::collections::VecDeque;

use super::Grid;
use crate::env::{Direction, Vec2D};

const UNLABELED: u32 = 0;

/// Flood fill over the free cells of a grid.
///
/// This struct also contains all necessary buffers for the floodfill algorithm,
/// so that it can be reused every tick without allocating.
#[derive(Clone)]
pub struct FloodFill {
    /// Component label per cell, `0` for blocked or not yet visited cells
    labels: Vec<u32>,
    /// Component sizes indexed by `label - 1`
    sizes: Vec<usize>,
    queue: VecDeque<Vec2D>,
    pub width: usize,
    pub height: usize,
}

impl FloodFill {
    #[must_use]
    pub fn new(width: usize, height: usize) -> FloodFill {
        FloodFill {
            labels: vec![UNLABELED; width * height],
            sizes: Vec::new(),
            queue: VecDeque::with_capacity(width * height),
            width,
            height,
        }
    }

    /// Returns if `p` is within the boundaries of the board.
    pub fn has(&self, p: Vec2D) -> bool {
        p.within(self.width, self.height)
    }

    /// Clears the board so that it can be reused for another floodfill computation.
    pub fn clear(&mut self) {
        self.labels.fill(UNLABELED);
        self.sizes.clear();
    }

    fn idx(&self, p: Vec2D) -> usize {
        p.x as usize + p.y as usize * self.width
    }

    /// Breadth first search from `start` that marks everything reachable
    /// with `label`. Returns the number of marked cells.
    fn fill(&mut self, grid: &Grid, start: Vec2D, label: u32) -> usize {
        let i = self.idx(start);
        self.labels[i] = label;
        self.queue.clear();
        self.queue.push_back(start);

        let mut count = 0;
        while let Some(p) = self.queue.pop_front() {
            count += 1;
            for next in Direction::iter().map(|d| p.apply(d)) {
                if grid.is_free(next) {
                    let i = self.idx(next);
                    if self.labels[i] == UNLABELED {
                        self.labels[i] = label;
                        self.queue.push_back(next);
                    }
                }
            }
        }
        count
    }

    /// Number of free cells connected to `from`, including `from` itself.
    /// Returns 0 if `from` is outside or blocked.
    pub fn reachable_area(&mut self, grid: &Grid, from: Vec2D) -> usize {
        debug_assert_eq!((grid.width, grid.height), (self.width, self.height));
        self.clear();
        if !grid.is_free(from) {
            return 0;
        }
        self.fill(grid, from, 1)
    }

    /// Labels all connected components of free cells.
    ///
    /// Afterwards `area` answers the reachable area of any position in
    /// constant time, which covers all candidate moves of a tick with a
    /// single pass over the board.
    pub fn label(&mut self, grid: &Grid) {
        debug_assert_eq!((grid.width, grid.height), (self.width, self.height));
        self.clear();
        for i in 0..grid.cells.len() {
            if self.labels[i] == UNLABELED && grid.cells[i].is_free() {
                let label = self.sizes.len() as u32 + 1;
                let size = self.fill(grid, grid.position(i), label);
                self.sizes.push(size);
            }
        }
    }

    /// Size of the component containing `p` after `label`.
    pub fn area(&self, p: Vec2D) -> usize {
        if !self.has(p) {
            return 0;
        }
        match self.labels[self.idx(p)] {
            UNLABELED => 0,
            label => self.sizes[label as usize - 1],
        }
    }

    /// Number of components found by the last `label`.
    pub fn components(&self) -> usize {
        self.sizes.len()
    }
}

impl std::fmt::Debug for FloodFill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "FloodFill {{")?;
        for y in (0..self.height as i16).rev() {
            write!(f, "  ")?;
            for x in 0..self.width as i16 {
                match self.labels[self.idx(Vec2D::new(x, y))] {
                    UNLABELED => write!(f, "___ ")?,
                    label => write!(f, "{label:0>3} ")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, "}}")?;
        Ok(())
    }
}
