use crate::config::StateConfig;
use crate::env::{Direction, Vec2D};
use crate::game::World;

/// Index used for heads that are not on the board.
pub const SENTINEL_STATE: usize = 0;

const DIRECTIONS: usize = 4;
/// Sign of the food offset per axis: -1, 0, 1
const FOOD_SIGNS: usize = 3 * 3;
const DANGER_MASKS: usize = 1 << 4;
const EXTRA_FEATURES: usize = 2 * 2;

/// What the head sees around itself, computed once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Surroundings {
    /// Per action id: the neighbor is on the board and not part of the snake.
    pub safe: [bool; 4],
    /// Per action id: free cells reachable from the neighbor, 0 if unsafe.
    pub areas: [usize; 4],
}

impl Surroundings {
    /// Looks at the four neighbors of the head.
    /// This runs a single flood fill over the whole board.
    pub fn observe(world: &mut World) -> Surroundings {
        let head = world.head();
        let mut safe = [false; 4];
        for d in Direction::iter() {
            safe[d.id()] = world.grid().is_free(head.apply(d));
        }

        let flood_fill = world.label_areas();
        let mut areas = [0; 4];
        for d in Direction::iter() {
            if safe[d.id()] {
                areas[d.id()] = flood_fill.area(head.apply(d));
            }
        }
        Surroundings { safe, areas }
    }

    pub fn is_safe(&self, d: Direction) -> bool {
        self.safe[d.id()]
    }

    pub fn area(&self, d: Direction) -> usize {
        self.areas[d.id()]
    }

    /// Returns if any neighbor can be entered.
    pub fn has_escape(&self) -> bool {
        self.safe.iter().any(|&s| s)
    }
}

/// Composite key of a discretized board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// Coarse head block in `0..regions²`
    pub region: usize,
    pub direction: Direction,
    /// Sign of `food - head` per axis, zero without food
    pub food: Vec2D,
    /// Bit `d` is set if moving into direction id `d` is deadly
    pub danger: u8,
    pub near_wall: bool,
    pub long: bool,
}

/// Shape and bounds of the state space.
///
/// Keys are packed with mixed radix:
/// `region × direction × food signs × danger mask × extra features`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    width: usize,
    height: usize,
    regions: usize,
    extra_features: bool,
    long_snake: usize,
}

impl StateLayout {
    pub fn new(width: usize, height: usize, config: &StateConfig) -> StateLayout {
        StateLayout {
            width,
            height,
            regions: config.regions.clamp(1, width.min(height).max(1)),
            extra_features: config.extra_features,
            long_snake: config.long_snake,
        }
    }

    /// Number of distinct indices, the required table size.
    pub const fn capacity(&self) -> usize {
        let base = self.regions * self.regions * DIRECTIONS * FOOD_SIGNS * DANGER_MASKS;
        if self.extra_features {
            base * EXTRA_FEATURES
        } else {
            base
        }
    }

    /// Discretizes the current board.
    /// Returns `None` if the head is not on the board.
    pub fn key(&self, world: &World) -> Option<StateKey> {
        let head = world.head();
        if !head.within(self.width, self.height) {
            return None;
        }

        let rx = head.x as usize * self.regions / self.width;
        let ry = head.y as usize * self.regions / self.height;

        let food = world
            .food()
            .map(|food| (food - head).signum())
            .unwrap_or_default();

        let mut danger = 0;
        for d in Direction::iter() {
            if !world.grid().is_free(head.apply(d)) {
                danger |= 1 << d.id();
            }
        }

        let near_wall = head.x == 0
            || head.y == 0
            || head.x as usize == self.width - 1
            || head.y as usize == self.height - 1;

        Some(StateKey {
            region: ry * self.regions + rx,
            direction: world.direction(),
            food,
            danger,
            near_wall,
            long: world.len() >= self.long_snake,
        })
    }

    /// Packs the key into `0..capacity`.
    /// Keys that do not fit the layout map to the sentinel.
    pub fn pack(&self, key: &StateKey) -> usize {
        let food = (key.food.x.clamp(-1, 1) + 1) as usize * 3 + (key.food.y.clamp(-1, 1) + 1) as usize;
        if key.region >= self.regions * self.regions || key.danger as usize >= DANGER_MASKS {
            return SENTINEL_STATE;
        }

        let mut index = key.region;
        index = index * DIRECTIONS + key.direction.id();
        index = index * FOOD_SIGNS + food;
        index = index * DANGER_MASKS + key.danger as usize;
        if self.extra_features {
            index = index * EXTRA_FEATURES + (key.near_wall as usize) * 2 + key.long as usize;
        }

        if index < self.capacity() {
            index
        } else {
            SENTINEL_STATE
        }
    }

    /// Index of the current board in the value table.
    pub fn index(&self, world: &World) -> usize {
        self.key(world)
            .map(|key| self.pack(&key))
            .unwrap_or(SENTINEL_STATE)
    }
}
