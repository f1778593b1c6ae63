use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, Neg, Sub};

/// Position on the board, `x` is the column and `y` the row.
#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Vec2D {
    pub x: i16,
    pub y: i16,
}

/// Shorthand for `Vec2D::new`.
pub const fn v2(x: i16, y: i16) -> Vec2D {
    Vec2D::new(x, y)
}

impl Vec2D {
    pub const fn new(x: i16, y: i16) -> Vec2D {
        Vec2D { x, y }
    }

    pub fn apply(self, d: Direction) -> Vec2D {
        self + d.into()
    }

    pub fn manhattan(&self) -> u64 {
        self.x.unsigned_abs() as u64 + self.y.unsigned_abs() as u64
    }

    /// Distance in which diagonal neighbors count as one step.
    pub fn chebyshev(&self) -> u64 {
        self.x.unsigned_abs().max(self.y.unsigned_abs()) as u64
    }

    /// Component-wise sign, each in `-1..=1`.
    pub fn signum(self) -> Vec2D {
        Vec2D::new(self.x.signum(), self.y.signum())
    }

    pub fn within(self, width: usize, height: usize) -> bool {
        0 <= self.x && self.x < width as _ && 0 <= self.y && self.y < height as _
    }
}

impl From<(i16, i16)> for Vec2D {
    fn from(val: (i16, i16)) -> Self {
        Vec2D::new(val.0, val.1)
    }
}

impl From<Direction> for Vec2D {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Up => Vec2D::new(0, 1),
            Direction::Right => Vec2D::new(1, 0),
            Direction::Down => Vec2D::new(0, -1),
            Direction::Left => Vec2D::new(-1, 0),
        }
    }
}

impl Add for Vec2D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for Vec2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Neg for Vec2D {
    type Output = Vec2D;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// The four moves of the snake.
/// The discriminant is the action id used to index the value table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    Right,
    Left,
    Down,
    Up,
}

impl Direction {
    /// Action id order, greedy ties go to the earlier direction.
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Down,
        Direction::Up,
    ];

    pub fn iter() -> impl Iterator<Item = Direction> {
        Self::ALL.iter().copied()
    }

    /// Action id in `0..4`.
    pub const fn id(self) -> usize {
        self as usize
    }

    pub fn invert(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }
}

impl From<Vec2D> for Direction {
    fn from(p: Vec2D) -> Direction {
        if p.x < 0 {
            Direction::Left
        } else if p.x > 0 {
            Direction::Right
        } else if p.y < 0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}

impl From<u8> for Direction {
    fn from(v: u8) -> Direction {
        assert!(v < 4, "Invalid direction");
        Self::ALL[v as usize]
    }
}
