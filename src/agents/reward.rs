use std::collections::VecDeque;

use serde::Serialize;

use crate::config::RewardConfig;
use crate::env::Vec2D;
use crate::game::World;

/// A candidate transition, known before it is applied to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub from: Vec2D,
    pub to: Vec2D,
    pub fed: bool,
    /// Blocked, no escape or trapped
    pub crashed: bool,
    /// Reachable area of `to` before the move
    pub area: usize,
}

/// The individual shaping terms of a reward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RewardBreakdown {
    pub collision: f64,
    pub food: f64,
    pub distance: f64,
    pub proximity: f64,
    pub exploration: f64,
    pub trap: f64,
    pub step: f64,
}

impl RewardBreakdown {
    pub fn total(&self) -> f64 {
        self.collision
            + self.food
            + self.distance
            + self.proximity
            + self.exploration
            + self.trap
            + self.step
    }
}

/// Weighted sum of shaping terms with a trailing history of visited cells.
#[derive(Debug, Clone)]
pub struct RewardShaper {
    config: RewardConfig,
    trap_ratio: f64,
    history: VecDeque<Vec2D>,
}

impl RewardShaper {
    pub fn new(config: RewardConfig, trap_ratio: f64) -> RewardShaper {
        RewardShaper {
            history: VecDeque::with_capacity(config.history_len),
            config,
            trap_ratio,
        }
    }

    /// Scores `step` against the current, not yet advanced, world.
    pub fn reward(&self, world: &World, step: &Step) -> RewardBreakdown {
        let c = &self.config;
        if step.crashed {
            return RewardBreakdown {
                collision: c.collision,
                ..RewardBreakdown::default()
            };
        }

        let len = world.len() + step.fed as usize;
        let mut reward = RewardBreakdown {
            step: c.step,
            ..RewardBreakdown::default()
        };

        if step.fed {
            reward.food = c.food + c.food_length_bonus * len as f64;
        }

        if let Some(food) = world.food() {
            let before = (food - step.from).manhattan() as f64;
            let after = (food - step.to).manhattan() as f64;
            reward.distance = c.distance * (before - after);
        }

        // Skip head and neck, the tail moves away unless the snake grows
        let end = if step.fed {
            world.len()
        } else {
            world.len().saturating_sub(1)
        };
        let close = world
            .snake()
            .iter()
            .take(end)
            .skip(2)
            .filter(|&&p| (p - step.to).chebyshev() <= c.proximity_radius)
            .count();
        reward.proximity = c.proximity * close as f64;

        if c.history_len > 0 && !self.history.contains(&step.to) {
            reward.exploration = c.exploration_bonus;
        }

        if (step.area as f64) < self.trap_ratio * len as f64 {
            reward.trap = c.trap;
        }
        reward
    }

    /// Remembers a cell the head entered.
    pub fn visit(&mut self, p: Vec2D) {
        if self.config.history_len == 0 {
            return;
        }
        if self.history.len() >= self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(p);
    }

    /// Forgets the history at the end of an episode.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}
