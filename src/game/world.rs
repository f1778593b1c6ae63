use std::collections::VecDeque;
use std::fmt::{self, Debug};

use owo_colors::OwoColorize;
use rand::seq::IteratorRandom;
use rand::Rng;
use serde::Serialize;

use super::{Cell, FloodFill, Grid};
use crate::env::{Direction, Vec2D};

/// Why a move was blocked.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collision {
    Wall,
    Body,
}

/// The result of advancing the snake by one cell.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The move would leave the board or bite the snake.
    /// Nothing has been changed.
    Blocked(Collision),
    /// The snake ate and grew by one.
    Fed,
    /// Ordinary step, the length is unchanged.
    Moved,
}

impl Outcome {
    pub fn is_blocked(self) -> bool {
        matches!(self, Outcome::Blocked(_))
    }
}

/// Public snapshot of the board for drivers and renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub head: Vec2D,
    pub score: usize,
    /// head to tail
    pub snake: Vec<Vec2D>,
    pub food: Option<Vec2D>,
}

/// The authoritative board state of a single snake and its food.
///
/// The grid mirrors the snake and food for constant time occupancy checks.
#[derive(Clone)]
pub struct World {
    grid: Grid,
    /// head to tail
    snake: VecDeque<Vec2D>,
    direction: Direction,
    food: Option<Vec2D>,
    initial_length: usize,
    score: usize,
    steps: usize,
    steps_since_food: usize,
    flood_fill: FloodFill,
}

impl World {
    /// Creates a board with the start snake and without food.
    ///
    /// `initial_length` has to fit into the left half of the middle row.
    pub fn new(width: usize, height: usize, initial_length: usize) -> World {
        let mut world = World {
            grid: Grid::new(width, height),
            snake: VecDeque::with_capacity(width * height),
            direction: Direction::Right,
            food: None,
            initial_length,
            score: 0,
            steps: 0,
            steps_since_food: 0,
            flood_fill: FloodFill::new(width, height),
        };
        world.place_snake();
        world
    }

    /// Creates a board with the given snake (head first) and food.
    ///
    /// Returns `None` if a segment is outside, segments overlap or are not
    /// adjacent, or the food lies on the snake.
    pub fn with_snake(
        width: usize,
        height: usize,
        body: impl IntoIterator<Item = Vec2D>,
        food: Option<Vec2D>,
    ) -> Option<World> {
        let snake: VecDeque<Vec2D> = body.into_iter().collect();
        if snake.is_empty() {
            return None;
        }

        let mut grid = Grid::new(width, height);
        for (i, &p) in snake.iter().enumerate() {
            if !grid.has(p) || grid[p] == Cell::Occupied {
                return None;
            }
            if i > 0 && (p - snake[i - 1]).manhattan() != 1 {
                return None;
            }
            grid[p] = Cell::Occupied;
        }
        if let Some(food) = food {
            if !grid.is_free(food) {
                return None;
            }
            grid[food] = Cell::Food;
        }

        let direction = if snake.len() > 1 {
            Direction::from(snake[0] - snake[1])
        } else {
            Direction::Right
        };

        Some(World {
            grid,
            direction,
            food,
            initial_length: snake.len(),
            snake,
            score: 0,
            steps: 0,
            steps_since_food: 0,
            flood_fill: FloodFill::new(width, height),
        })
    }

    fn place_snake(&mut self) {
        self.grid.clear();
        self.snake.clear();
        let head = Vec2D::new(
            (self.grid.width / 2) as i16,
            (self.grid.height / 2) as i16,
        );
        for i in 0..self.initial_length {
            let p = Vec2D::new(head.x - i as i16, head.y);
            if self.grid.is_free(p) {
                self.grid[p] = Cell::Occupied;
                self.snake.push_back(p);
            }
        }
        self.direction = Direction::Right;
        self.food = None;
    }

    /// Starts a new episode: start snake, cleared counters and new food.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.place_snake();
        self.score = 0;
        self.steps = 0;
        self.steps_since_food = 0;
        self.spawn_food(rng);
    }

    /// Length of the snake placed by `reset`.
    pub fn set_initial_length(&mut self, initial_length: usize) {
        self.initial_length = initial_length;
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// head to tail
    pub fn snake(&self) -> &VecDeque<Vec2D> {
        &self.snake
    }

    pub fn head(&self) -> Vec2D {
        self.snake[0]
    }

    pub fn len(&self) -> usize {
        self.snake.len()
    }

    /// Direction of the last move.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn food(&self) -> Option<Vec2D> {
        self.food
    }

    /// Food eaten in this episode.
    pub fn score(&self) -> usize {
        self.score
    }

    /// Moves made in this episode.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn steps_since_food(&self) -> usize {
        self.steps_since_food
    }

    /// Returns if `p` is within the boundaries of the board.
    pub fn is_valid_position(&self, p: Vec2D) -> bool {
        self.grid.has(p)
    }

    /// Returns if `p` is part of the snake.
    /// The head only counts if `include_head` is set.
    pub fn is_occupied_by_snake(&self, p: Vec2D, include_head: bool) -> bool {
        self.grid.has(p)
            && self.grid[p] == Cell::Occupied
            && (include_head || p != self.head())
    }

    /// All positions that are not occupied by the snake, food included.
    pub fn free_cells(&self) -> impl Iterator<Item = Vec2D> + '_ {
        self.grid.free_cells()
    }

    /// Moves the food to a uniformly chosen free cell.
    /// If the board is packed the food stays absent.
    pub fn spawn_food<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Vec2D> {
        if let Some(old) = self.food.take() {
            if self.grid[old] == Cell::Food {
                self.grid[old] = Cell::Free;
            }
        }
        self.food = self.grid.free_cells().choose(rng);
        if let Some(food) = self.food {
            self.grid[food] = Cell::Food;
        }
        self.food
    }

    /// Returns the outcome of moving into `dir` without applying it.
    pub fn peek(&self, dir: Direction) -> Outcome {
        let p = self.head().apply(dir);
        if !self.grid.has(p) {
            Outcome::Blocked(Collision::Wall)
        } else if self.grid[p] == Cell::Occupied {
            // The tail blocks as well, it only moves after the head
            Outcome::Blocked(Collision::Body)
        } else if self.food == Some(p) {
            Outcome::Fed
        } else {
            Outcome::Moved
        }
    }

    /// Moves the snake one cell into `dir`.
    ///
    /// Blocked moves leave the board unchanged for inspection.
    /// Eating respawns the food.
    pub fn advance<R: Rng + ?Sized>(&mut self, dir: Direction, rng: &mut R) -> Outcome {
        let outcome = self.peek(dir);
        let head = self.head().apply(dir);
        match outcome {
            Outcome::Blocked(_) => return outcome,
            Outcome::Fed => {
                self.grid[head] = Cell::Occupied;
                self.snake.push_front(head);
                self.food = None;
                self.score += 1;
                self.steps_since_food = 0;
                self.spawn_food(rng);
            }
            Outcome::Moved => {
                if let Some(tail) = self.snake.pop_back() {
                    self.grid[tail] = Cell::Free;
                }
                self.grid[head] = Cell::Occupied;
                self.snake.push_front(head);
                self.steps_since_food += 1;
            }
        }
        self.direction = dir;
        self.steps += 1;
        outcome
    }

    /// Number of free cells connected to `from`.
    pub fn reachable_area(&mut self, from: Vec2D) -> usize {
        self.flood_fill.reachable_area(&self.grid, from)
    }

    /// Labels all free regions of the board.
    /// The returned flood fill answers the area of every cell.
    pub fn label_areas(&mut self) -> &FloodFill {
        self.flood_fill.label(&self.grid);
        &self.flood_fill
    }

    pub fn frame(&self) -> Frame {
        Frame {
            head: self.head(),
            score: self.score,
            snake: self.snake.iter().copied().collect(),
            food: self.food,
        }
    }
}

impl World {
    /// Parses textual human readable board representation used in tests.
    ///
    /// `.` is free, `o` food, `0` the head and the arrows `^ > v <` body
    /// segments pointing to the next segment towards the head.
    /// The top line is the highest row.
    pub fn parse(txt: &str) -> Option<World> {
        let txt = txt.trim();

        #[derive(PartialEq)]
        enum RawCell {
            Free,
            Food,
            Head,
            Body(Direction),
        }

        let raw_cells: Vec<RawCell> = txt
            .lines()
            .rev()
            .flat_map(|l| {
                l.split_whitespace().flat_map(|s| {
                    s.chars().next().map(|c| match c {
                        'o' => RawCell::Food,
                        '0' => RawCell::Head,
                        '^' => RawCell::Body(Direction::Up),
                        '>' => RawCell::Body(Direction::Right),
                        'v' => RawCell::Body(Direction::Down),
                        '<' => RawCell::Body(Direction::Left),
                        _ => RawCell::Free,
                    })
                })
            })
            .collect();
        let height = txt.lines().count();

        if height == 0 || raw_cells.len() % height != 0 {
            return None;
        }
        let width = raw_cells.len() / height;
        let at = |p: Vec2D| &raw_cells[p.x as usize + p.y as usize * width];

        let head = raw_cells.iter().position(|c| *c == RawCell::Head)?;
        let mut p = Vec2D::new((head % width) as _, (head / width) as _);
        let mut body = vec![p];
        while let Some(next) = Direction::iter().find_map(|d| {
            let next = p.apply(d);
            if next.within(width, height)
                && *at(next) == RawCell::Body(d.invert())
                && !body.contains(&next)
            {
                Some(next)
            } else {
                None
            }
        }) {
            p = next;
            body.push(p);
        }

        let food = raw_cells
            .iter()
            .position(|c| *c == RawCell::Food)
            .map(|i| Vec2D::new((i % width) as _, (i / width) as _));

        World::with_snake(width, height, body, food)
    }
}

impl Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.grid.width;
        let mut cells = vec![String::from("."); width * self.grid.height];

        if let Some(food) = self.food {
            cells[food.x as usize + food.y as usize * width] = "o".red().to_string();
        }
        for (i, &p) in self.snake.iter().enumerate() {
            cells[p.x as usize + p.y as usize * width] = if i == 0 {
                "0".bright_green().to_string()
            } else {
                let symbol = match Direction::from(self.snake[i - 1] - p) {
                    Direction::Up => "^",
                    Direction::Right => ">",
                    Direction::Down => "v",
                    Direction::Left => "<",
                };
                symbol.green().to_string()
            };
        }

        writeln!(f, "World {{")?;
        for y in (0..self.grid.height).rev() {
            write!(f, "  ")?;
            for x in 0..width {
                write!(f, "{} ", cells[x + y * width])?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "  Score: {}, Steps: {} ({} since food)",
            self.score, self.steps, self.steps_since_food
        )?;
        writeln!(f, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::v2;
    use crate::logging;
    use log::info;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn world_parse() {
        logging();
        let world = World::parse(
            r#"
            . . . . . . . .
            . . . . . . o .
            . . . 0 < < . .
            . . . . . ^ . .
            . . . > > ^ . .
            . . . . . . . ."#,
        )
        .unwrap();
        info!("{world:?}");

        assert_eq!(world.width(), 8);
        assert_eq!(world.height(), 6);
        assert_eq!(world.food(), Some(v2(6, 4)));
        assert_eq!(
            world.snake().iter().copied().collect::<Vec<_>>(),
            vec![
                v2(3, 3),
                v2(4, 3),
                v2(5, 3),
                v2(5, 2),
                v2(5, 1),
                v2(4, 1),
                v2(3, 1)
            ]
        );
        assert_eq!(world.direction(), Direction::Left);
        assert!(world.is_occupied_by_snake(v2(4, 1), false));
        assert!(world.is_occupied_by_snake(v2(3, 3), true));
        assert!(!world.is_occupied_by_snake(v2(3, 3), false));
        assert!(!world.is_occupied_by_snake(v2(6, 4), true));
        assert!(!world.is_occupied_by_snake(v2(-1, 0), true));
    }

    #[test]
    fn with_snake_rejects_invalid() {
        assert!(World::with_snake(5, 5, Vec::new(), None).is_none());
        assert!(World::with_snake(5, 5, [v2(0, 0), v2(2, 0)], None).is_none());
        assert!(World::with_snake(5, 5, [v2(0, 0), v2(1, 0), v2(0, 0)], None).is_none());
        assert!(World::with_snake(5, 5, [v2(0, 0), v2(-1, 0)], None).is_none());
        assert!(World::with_snake(5, 5, [v2(0, 0)], Some(v2(0, 0))).is_none());
        assert!(World::with_snake(5, 5, [v2(0, 0)], Some(v2(1, 0))).is_some());
    }

    #[test]
    fn start_position() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = World::new(10, 10, 3);
        world.reset(&mut rng);
        assert_eq!(
            world.snake().iter().copied().collect::<Vec<_>>(),
            vec![v2(5, 5), v2(4, 5), v2(3, 5)]
        );
        assert_eq!(world.direction(), Direction::Right);
        let food = world.food().unwrap();
        assert!(!world.is_occupied_by_snake(food, true));
        assert_eq!(world.free_cells().count(), 97);
    }

    #[test]
    fn valid_positions() {
        let world = World::new(4, 3, 1);
        assert!(world.is_valid_position(v2(0, 0)));
        assert!(world.is_valid_position(v2(3, 2)));
        assert!(!world.is_valid_position(v2(4, 2)));
        assert!(!world.is_valid_position(v2(3, 3)));
        assert!(!world.is_valid_position(v2(-1, 0)));
    }

    #[test]
    fn advance_moves() {
        use Direction::*;
        let mut rng = SmallRng::seed_from_u64(2);
        let mut world =
            World::with_snake(10, 10, [v2(5, 5), v2(4, 5), v2(3, 5)], Some(v2(9, 9))).unwrap();

        assert_eq!(world.peek(Right), Outcome::Moved);
        assert_eq!(world.advance(Right, &mut rng), Outcome::Moved);
        assert_eq!(world.head(), v2(6, 5));
        assert_eq!(world.len(), 3);
        assert!(!world.is_occupied_by_snake(v2(3, 5), true));
        assert_eq!(world.steps(), 1);
        assert_eq!(world.steps_since_food(), 1);

        assert_eq!(world.advance(Up, &mut rng), Outcome::Moved);
        assert_eq!(world.direction(), Up);
        assert_eq!(world.head(), v2(6, 6));
    }

    #[test]
    fn advance_feeds() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut world = World::with_snake(10, 10, [v2(5, 5), v2(4, 5)], Some(v2(6, 5))).unwrap();

        assert_eq!(world.peek(Direction::Right), Outcome::Fed);
        assert_eq!(world.advance(Direction::Right, &mut rng), Outcome::Fed);
        assert_eq!(world.len(), 3);
        assert_eq!(world.score(), 1);
        assert_eq!(world.steps_since_food(), 0);
        let food = world.food().unwrap();
        assert!(!world.snake().contains(&food));
        assert_eq!(world.grid()[food], Cell::Food);
    }

    #[test]
    fn advance_blocked() {
        use Direction::*;
        let mut rng = SmallRng::seed_from_u64(4);
        let world = World::parse(
            r#"
            . . . .
            0 < < .
            . . ^ .
            . . ^ <"#,
        )
        .unwrap();

        let mut wall = world.clone();
        assert_eq!(wall.advance(Left, &mut rng), Outcome::Blocked(Collision::Wall));
        let mut body = world.clone();
        assert_eq!(body.advance(Right, &mut rng), Outcome::Blocked(Collision::Body));

        // Nothing changed
        for w in [wall, body] {
            assert_eq!(w.frame(), world.frame());
            assert_eq!(w.steps(), 0);
        }
    }

    #[test]
    fn tail_blocks() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut world = World::parse(
            r#"
            > v .
            ^ 0 .
            . . ."#,
        )
        .unwrap();
        // The tail at (0, 1) is directly left of the head
        assert_eq!(world.len(), 4);
        assert_eq!(
            world.advance(Direction::Left, &mut rng),
            Outcome::Blocked(Collision::Body)
        );
    }

    #[test]
    fn spawn_food_last_cell() {
        let mut rng = SmallRng::seed_from_u64(6);
        let mut world =
            World::with_snake(2, 2, [v2(0, 0), v2(1, 0), v2(1, 1)], None).unwrap();
        assert_eq!(world.spawn_food(&mut rng), Some(v2(0, 1)));
        assert_eq!(world.food(), Some(v2(0, 1)));

        let mut world =
            World::with_snake(2, 2, [v2(0, 0), v2(1, 0), v2(1, 1), v2(0, 1)], None).unwrap();
        assert_eq!(world.spawn_food(&mut rng), None);
        assert_eq!(world.food(), None);
        assert_eq!(world.free_cells().count(), 0);
    }

    #[test]
    fn eating_the_last_cell() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut world =
            World::with_snake(2, 2, [v2(0, 0), v2(1, 0), v2(1, 1)], Some(v2(0, 1))).unwrap();
        assert_eq!(world.advance(Direction::Up, &mut rng), Outcome::Fed);
        assert_eq!(world.len(), 4);
        assert_eq!(world.food(), None);
    }

    #[test]
    fn free_cells_idempotent() {
        let mut rng = SmallRng::seed_from_u64(8);
        let mut world = World::new(7, 5, 3);
        world.reset(&mut rng);
        let a: HashSet<_> = world.free_cells().collect();
        let b: HashSet<_> = world.free_cells().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 7 * 5 - 3);
        assert!(world.snake().iter().all(|p| !a.contains(p)));
    }

    #[test]
    fn reachable_area() {
        let mut world = World::parse(
            r#"
            . . v . .
            . . v . .
            . . 0 . ."#,
        )
        .unwrap();
        assert_eq!(world.reachable_area(v2(0, 0)), 6);
        assert_eq!(world.reachable_area(v2(4, 2)), 6);
        assert_eq!(world.reachable_area(v2(2, 1)), 0);

        let areas = world.label_areas();
        assert_eq!(areas.area(v2(1, 1)), 6);
        assert_eq!(areas.area(v2(3, 1)), 6);
        assert_eq!(areas.components(), 2);
    }
}
