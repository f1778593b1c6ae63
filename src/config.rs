use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Largest supported board side.
pub const MAX_BOARD_SIZE: usize = 1024;

/// Complete configuration of a training run.
///
/// Every section falls back to its defaults, so partial JSON like
/// `{"board":{"width":10,"height":10}}` is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub board: BoardConfig,
    pub rewards: RewardConfig,
    pub learning: LearningConfig,
    pub state: StateConfig,
    pub traps: TrapConfig,
    pub episode: EpisodeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    pub width: usize,
    pub height: usize,
    /// Length of the snake at the start of every episode.
    pub initial_length: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            initial_length: 3,
        }
    }
}

/// Weights of the reward terms.
/// Penalties are stored with their sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewardConfig {
    /// Hitting a wall or the own body, or running into a trap.
    pub collision: f64,
    pub food: f64,
    /// Added to `food` per body segment, late food is worth more.
    pub food_length_bonus: f64,
    /// Per cell of manhattan distance gained towards the food.
    pub distance: f64,
    /// Per own body segment close to the head.
    pub proximity: f64,
    pub proximity_radius: u64,
    /// For entering a cell that is not in the recent history.
    pub exploration_bonus: f64,
    pub history_len: usize,
    /// For entering a cell whose reachable area is smaller than the snake.
    pub trap: f64,
    /// Living cost of a single step.
    pub step: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            collision: -100.0,
            food: 50.0,
            food_length_bonus: 1.0,
            distance: 1.0,
            proximity: -0.5,
            proximity_radius: 1,
            exploration_bonus: 0.2,
            history_len: 24,
            trap: -20.0,
            step: -0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LearningConfig {
    /// α at the start of the run.
    pub learning_rate: f64,
    pub min_learning_rate: f64,
    /// Factor applied to α after every episode, `1.0` keeps it fixed.
    pub learning_rate_decay: f64,
    /// γ
    pub discount: f64,
    /// ε at the start of the run.
    pub exploration: f64,
    pub min_exploration: f64,
    pub exploration_decay: f64,
    /// Value of every table slot before learning.
    pub initial_value: f64,
    /// Restrict the candidates to moves that do not die immediately.
    pub safe_moves: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            min_learning_rate: 0.01,
            learning_rate_decay: 1.0,
            discount: 0.9,
            exploration: 1.0,
            min_exploration: 0.01,
            exploration_decay: 0.995,
            initial_value: 0.0,
            safe_moves: true,
        }
    }
}

/// Shape of the discretized state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    /// The head position is quantized into `regions × regions` blocks.
    pub regions: usize,
    /// Encode "near wall" and "long snake".
    pub extra_features: bool,
    /// Length from which the snake counts as long.
    pub long_snake: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            regions: 4,
            extra_features: true,
            long_snake: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrapConfig {
    /// Drop candidates that lead into a too small area.
    pub avoid: bool,
    /// An area below `ratio × length` is a trap.
    pub ratio: f64,
    /// Ends the episode if the chosen area is below `terminal_ratio × length`.
    pub terminal_ratio: f64,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            avoid: true,
            ratio: 1.0,
            terminal_ratio: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpisodeConfig {
    /// Steps without food after which the episode ends.
    pub starvation_steps: usize,
    /// Telemetry is emitted every n episodes, `0` disables it.
    pub telemetry_interval: usize,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            starvation_steps: 400,
            telemetry_interval: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("board of {0}x{1} is empty")]
    EmptyBoard(usize, usize),
    #[error("board of {0}x{1} exceeds {}x{}", MAX_BOARD_SIZE, MAX_BOARD_SIZE)]
    BoardTooLarge(usize, usize),
    #[error("initial snake length must be at least 1")]
    NoSnake,
    #[error("initial snake of length {0} does not fit into a row of {1}")]
    SnakeTooLong(usize, usize),
    #[error("{0} = {1} is not within [0, 1]")]
    NotAProbability(&'static str, f64),
    #[error("regions must be within 1..={0}")]
    InvalidRegions(usize),
}

impl Config {
    /// Default configuration on a board of the given size.
    pub fn with_board(width: usize, height: usize) -> Config {
        Config {
            board: BoardConfig {
                width,
                height,
                ..BoardConfig::default()
            },
            ..Config::default()
        }
    }

    /// Checks everything the simulation relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let BoardConfig {
            width,
            height,
            initial_length,
        } = self.board;
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyBoard(width, height));
        }
        if width > MAX_BOARD_SIZE || height > MAX_BOARD_SIZE {
            return Err(ConfigError::BoardTooLarge(width, height));
        }
        if initial_length == 0 {
            return Err(ConfigError::NoSnake);
        }
        // The snake starts in the middle row and extends to the left
        if initial_length > width / 2 + 1 {
            return Err(ConfigError::SnakeTooLong(initial_length, width));
        }

        let l = &self.learning;
        for (name, value) in [
            ("learning_rate", l.learning_rate),
            ("min_learning_rate", l.min_learning_rate),
            ("learning_rate_decay", l.learning_rate_decay),
            ("discount", l.discount),
            ("exploration", l.exploration),
            ("min_exploration", l.min_exploration),
            ("exploration_decay", l.exploration_decay),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotAProbability(name, value));
            }
        }

        let max_regions = width.min(height);
        if self.state.regions == 0 || self.state.regions > max_regions {
            return Err(ConfigError::InvalidRegions(max_regions));
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}
