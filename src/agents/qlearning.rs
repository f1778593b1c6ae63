use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use super::{RewardBreakdown, RewardShaper, StateLayout, Step, Surroundings, ValueTable};
use crate::config::{Config, LearningConfig, TrapConfig};
use crate::env::Direction;
use crate::game::World;
use crate::util::argmax;

/// Decision of the policy for a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Move {
        direction: Direction,
        /// Chosen at random instead of greedily
        explored: bool,
    },
    /// Every neighbor of the head is blocked.
    NoEscape,
}

/// What the agent knows about the board before it acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub state: usize,
    pub surroundings: Surroundings,
}

/// Geometric decay floored at a minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    value: f64,
    min: f64,
    decay: f64,
}

impl Schedule {
    pub fn new(value: f64, min: f64, decay: f64) -> Schedule {
        Schedule { value, min, decay }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Decays once, never increases and never drops below the floor
    /// unless it started there.
    pub fn decay(&mut self) -> f64 {
        let next = (self.value * self.decay).max(self.min);
        self.value = next.min(self.value);
        self.value
    }
}

/// Tabular Q-learning agent with an ε-greedy policy.
///
/// Candidates are filtered by immediate safety and by the reachable area
/// before the table is consulted.
#[derive(Debug, Clone)]
pub struct QAgent {
    layout: StateLayout,
    table: ValueTable,
    shaper: RewardShaper,
    exploration: Schedule,
    learning_rate: Schedule,
    discount: f64,
    safe_moves: bool,
    traps: TrapConfig,
}

impl QAgent {
    pub fn new(config: &Config) -> QAgent {
        let LearningConfig {
            learning_rate,
            min_learning_rate,
            learning_rate_decay,
            discount,
            exploration,
            min_exploration,
            exploration_decay,
            initial_value,
            safe_moves,
        } = config.learning;

        let layout = StateLayout::new(config.board.width, config.board.height, &config.state);
        let table = ValueTable::new(layout.capacity(), initial_value);
        debug!("value table with {} states", table.len());
        QAgent {
            layout,
            table,
            shaper: RewardShaper::new(config.rewards.clone(), config.traps.ratio),
            exploration: Schedule::new(exploration, min_exploration, exploration_decay),
            learning_rate: Schedule::new(learning_rate, min_learning_rate, learning_rate_decay),
            discount,
            safe_moves,
            traps: config.traps.clone(),
        }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ValueTable {
        &mut self.table
    }

    /// ε
    pub fn exploration_rate(&self) -> f64 {
        self.exploration.value()
    }

    /// α
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate.value()
    }

    /// Encodes the board and looks at the neighbors of the head.
    pub fn observe(&self, world: &mut World) -> Observation {
        Observation {
            state: self.layout.index(world),
            surroundings: Surroundings::observe(world),
        }
    }

    /// Index of the board in the value table.
    pub fn state_index(&self, world: &World) -> usize {
        self.layout.index(world)
    }

    /// Returns if an area is too small for a snake of `len`.
    pub fn is_trap(&self, area: usize, len: usize) -> bool {
        (area as f64) < self.traps.ratio * len as f64
    }

    /// Returns if entering an area ends the episode.
    pub fn is_fatal_trap(&self, area: usize, len: usize) -> bool {
        (area as f64) < self.traps.terminal_ratio * len as f64
    }

    /// Directions the policy may choose from, in action id order.
    ///
    /// Each filter is skipped if it would remove every candidate.
    pub fn candidates(&self, world: &World, surroundings: &Surroundings) -> Vec<Direction> {
        let mut candidates: Vec<Direction> = Direction::iter().collect();
        if self.safe_moves {
            let safe: Vec<_> = candidates
                .iter()
                .copied()
                .filter(|&d| surroundings.is_safe(d))
                .collect();
            if !safe.is_empty() {
                candidates = safe;
            }
        }
        if self.traps.avoid {
            let roomy: Vec<_> = candidates
                .iter()
                .copied()
                .filter(|&d| !self.is_trap(surroundings.area(d), world.len()))
                .collect();
            if !roomy.is_empty() {
                candidates = roomy;
            }
        }
        candidates
    }

    /// ε-greedy action selection.
    pub fn choose_action<R: Rng + ?Sized>(
        &self,
        world: &World,
        observation: &Observation,
        rng: &mut R,
    ) -> Choice {
        if !observation.surroundings.has_escape() {
            return Choice::NoEscape;
        }

        let candidates = self.candidates(world, &observation.surroundings);

        if rng.gen::<f64>() < self.exploration.value() {
            let reverse = world.direction().invert();
            let forward: Vec<_> = candidates
                .iter()
                .copied()
                .filter(|&d| d != reverse || world.len() == 1)
                .collect();
            let pool = if forward.is_empty() {
                &candidates
            } else {
                &forward
            };
            if let Some(&direction) = pool.choose(rng) {
                return Choice::Move {
                    direction,
                    explored: true,
                };
            }
        }

        let row = self.table.get(observation.state).copied().unwrap_or_default();
        let best = argmax(candidates.iter().map(|d| row[d.id()])).unwrap_or_default();
        Choice::Move {
            direction: candidates[best],
            explored: false,
        }
    }

    /// Shaped reward of a candidate transition.
    pub fn reward(&self, world: &World, step: &Step) -> RewardBreakdown {
        self.shaper.reward(world, step)
    }

    /// Remembers the cell the head entered for the exploration bonus.
    pub fn visit(&mut self, step: &Step) {
        self.shaper.visit(step.to);
    }

    /// Temporal difference update, `next` is `None` for terminal transitions.
    pub fn learn(
        &mut self,
        state: usize,
        action: Direction,
        reward: f64,
        next: Option<usize>,
    ) -> Option<f64> {
        self.table.update(
            state,
            action,
            reward,
            next,
            self.learning_rate.value(),
            self.discount,
        )
    }

    /// Decays ε and α once and forgets the visit history.
    pub fn end_episode(&mut self) {
        self.exploration.decay();
        self.learning_rate.decay();
        self.shaper.clear();
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

    fn greedy() -> Config {
        let mut config = Config::with_board(10, 10);
        config.learning.exploration = 0.0;
        config
    }

    #[test]
    fn schedule() {
        let mut s = Schedule::new(1.0, 0.5, 0.5);
        assert_eq!(s.decay(), 0.5);
        assert_eq!(s.decay(), 0.5);

        let mut s = Schedule::new(0.1, 0.01, 1.0);
        assert_eq!(s.decay(), 0.1);

        // Starting below the floor never raises the value
        let mut s = Schedule::new(0.0, 0.01, 0.9);
        assert_eq!(s.decay(), 0.0);
    }

    #[test]
    fn greedy_ignores_unsafe_values() {
        logging();
        let mut rng = SmallRng::seed_from_u64(0);
        let mut world = World::parse(
            r#"
            . . . . .
            . . 0 . .
            . . ^ . .
            . . ^ . .
            . . . . ."#,
        )
        .unwrap();
        let mut config = greedy();
        config.board.width = 5;
        config.board.height = 5;
        let mut agent = QAgent::new(&config);
        let observation = agent.observe(&mut world);
        // Down bites the own body
        agent.table_mut().set(observation.state, Direction::Down, 100.0);
        agent.table_mut().set(observation.state, Direction::Left, 1.0);
        info!("{world:?}");
        assert_eq!(
            agent.choose_action(&world, &observation, &mut rng),
            Choice::Move {
                direction: Direction::Left,
                explored: false
            }
        );
    }

    #[test]
    fn first_max_on_ties() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut world = World::with_snake(10, 10, [v2(5, 5), v2(4, 5)], None).unwrap();
        let agent = QAgent::new(&greedy());
        let observation = agent.observe(&mut world);
        // Right comes first in action id order
        assert_eq!(
            agent.choose_action(&world, &observation, &mut rng),
            Choice::Move {
                direction: Direction::Right,
                explored: false
            }
        );
    }

    #[test]
    fn no_escape() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut world = World::parse(
            r#"
            > v .
            ^ v .
            0 < ."#,
        )
        .unwrap();
        let agent = QAgent::new(&greedy());
        let observation = agent.observe(&mut world);
        assert_eq!(
            agent.choose_action(&world, &observation, &mut rng),
            Choice::NoEscape
        );
        for d in Direction::iter() {
            assert!(world.peek(d).is_blocked());
        }
    }

    #[test]
    fn avoids_traps() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut world = World::parse(
            r#"
            . . . . .
            > > > v .
            ^ . . v .
            ^ < 0 < .
            . . . . ."#,
        )
        .unwrap();
        let mut config = greedy();
        config.board.width = 5;
        config.board.height = 5;
        let mut agent = QAgent::new(&config);
        let observation = agent.observe(&mut world);
        agent.table_mut().set(observation.state, Direction::Up, 10.0);
        assert_eq!(
            agent.candidates(&world, &observation.surroundings),
            vec![Direction::Down]
        );
        assert_eq!(
            agent.choose_action(&world, &observation, &mut rng),
            Choice::Move {
                direction: Direction::Down,
                explored: false
            }
        );

        // Without avoidance the table wins
        config.traps.avoid = false;
        let mut agent = QAgent::new(&config);
        agent.table_mut().set(observation.state, Direction::Up, 10.0);
        assert_eq!(
            agent.choose_action(&world, &observation, &mut rng),
            Choice::Move {
                direction: Direction::Up,
                explored: false
            }
        );
    }

    #[test]
    fn exploration_is_safe() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut config = Config::with_board(10, 10);
        config.learning.exploration = 1.0;
        let agent = QAgent::new(&config);
        let mut world = World::with_snake(10, 10, [v2(0, 5), v2(0, 4), v2(0, 3)], None).unwrap();
        let observation = agent.observe(&mut world);
        for _ in 0..100 {
            match agent.choose_action(&world, &observation, &mut rng) {
                Choice::Move {
                    direction,
                    explored,
                } => {
                    assert!(explored);
                    assert!(direction == Direction::Up || direction == Direction::Right);
                }
                Choice::NoEscape => panic!("there are safe moves"),
            }
        }
    }

    #[test]
    fn end_episode_decays() {
        let mut agent = QAgent::new(&Config::default());
        assert_eq!(agent.exploration_rate(), 1.0);
        agent.end_episode();
        assert_eq!(agent.exploration_rate(), 0.995);
        assert_eq!(agent.learning_rate(), 0.1);
        for _ in 0..10_000 {
            agent.end_episode();
        }
        assert_eq!(agent.exploration_rate(), 0.01);
    }

    #[test]
    fn end_episode_decays_learning_rate() {
        let mut config = Config::default();
        config.learning.learning_rate = 0.1;
        config.learning.learning_rate_decay = 0.5;
        config.learning.min_learning_rate = 0.03;
        let mut agent = QAgent::new(&config);
        assert_eq!(agent.learning_rate(), 0.1);
        agent.end_episode();
        assert_eq!(agent.learning_rate(), 0.1 * 0.5);
        agent.end_episode();
        assert_eq!(agent.learning_rate(), 0.03);
        for _ in 0..10 {
            agent.end_episode();
        }
        assert_eq!(agent.learning_rate(), 0.03);
    }
}
