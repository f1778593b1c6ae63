use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::agents::{Choice, QAgent, Step};
use crate::config::{Config, ConfigError};
use crate::env::Direction;
use crate::game::{Collision, Frame, Outcome, World};
use crate::telemetry::{Telemetry, TelemetrySink};

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    Collision(Collision),
    /// No neighbor of the head could be entered.
    NoEscape,
    /// Too many steps without food.
    Starved,
    /// The head entered an area too small to survive.
    Trapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Running,
    Terminal(Termination),
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Terminal(_))
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub status: Status,
    /// `None` if the snake had no escape
    pub action: Option<Direction>,
    pub explored: bool,
    pub reward: f64,
    /// The board after the move, before a terminal reset
    pub frame: Frame,
}

/// Summary of a finished episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Episode {
    /// One based
    pub episode: usize,
    pub score: usize,
    pub steps: usize,
    pub termination: Termination,
}

/// The owned simulation context: world, agent, random source and counters.
pub struct Simulation {
    config: Config,
    world: World,
    agent: QAgent,
    rng: SmallRng,
    run: usize,
    episode: usize,
    lifetime_score: usize,
    last_episode: Option<Episode>,
    telemetry: Option<Box<dyn TelemetrySink + Send>>,
}

impl Simulation {
    /// Validates the config and starts the first episode.
    /// Without a seed the random source is seeded from the OS.
    pub fn new(config: Config, seed: Option<u64>) -> Result<Simulation, ConfigError> {
        config.validate()?;
        let mut rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let b = &config.board;
        let mut world = World::new(b.width, b.height, b.initial_length);
        world.reset(&mut rng);
        Ok(Simulation::with_world(config, world, rng))
    }

    /// Starts from a prepared world, the board size of `config` is adjusted.
    /// Later episodes start from the regular start position.
    pub fn from_world(
        mut config: Config,
        mut world: World,
        seed: u64,
    ) -> Result<Simulation, ConfigError> {
        config.board.width = world.width();
        config.board.height = world.height();
        config.validate()?;
        world.set_initial_length(config.board.initial_length);
        Ok(Simulation::with_world(
            config,
            world,
            SmallRng::seed_from_u64(seed),
        ))
    }

    fn with_world(config: Config, world: World, rng: SmallRng) -> Simulation {
        Simulation {
            agent: QAgent::new(&config),
            config,
            world,
            rng,
            run: 0,
            episode: 0,
            lifetime_score: 0,
            last_episode: None,
            telemetry: None,
        }
    }

    /// Identifier reported in the telemetry.
    pub fn with_run(mut self, run: usize) -> Self {
        self.run = run;
        self
    }

    pub fn with_telemetry(mut self, sink: impl TelemetrySink + Send + 'static) -> Self {
        self.telemetry = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn agent(&self) -> &QAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut QAgent {
        &mut self.agent
    }

    /// Completed episodes.
    pub fn episode(&self) -> usize {
        self.episode
    }

    /// Food eaten over all completed episodes.
    pub fn lifetime_score(&self) -> usize {
        self.lifetime_score
    }

    pub fn last_episode(&self) -> Option<Episode> {
        self.last_episode
    }

    /// Performs one transition and one table update.
    pub fn tick(&mut self) -> Tick {
        let observation = self.agent.observe(&mut self.world);
        let choice = self
            .agent
            .choose_action(&self.world, &observation, &mut self.rng);

        let (direction, explored) = match choice {
            Choice::Move {
                direction,
                explored,
            } => (direction, explored),
            Choice::NoEscape => {
                // Every action is deadly here
                let reward = self.config.rewards.collision;
                for d in Direction::iter() {
                    self.agent.learn(observation.state, d, reward, None);
                }
                let frame = self.world.frame();
                self.end_episode(Termination::NoEscape);
                return Tick {
                    status: Status::Terminal(Termination::NoEscape),
                    action: None,
                    explored: false,
                    reward,
                    frame,
                };
            }
        };

        let outcome = self.world.peek(direction);
        let from = self.world.head();
        let to = from.apply(direction);
        let fed = outcome == Outcome::Fed;
        let area = observation.surroundings.area(direction);
        // The area before the move still contains the tail and the target
        let suspect = !outcome.is_blocked()
            && self
                .agent
                .is_fatal_trap(area, self.world.len() + fed as usize);
        let step = Step {
            from,
            to,
            fed,
            crashed: outcome.is_blocked(),
            area,
        };
        let mut reward = self.agent.reward(&self.world, &step);
        trace!("{direction:?} {outcome:?} {reward:?}");

        let outcome = self.world.advance(direction, &mut self.rng);
        if !outcome.is_blocked() {
            self.agent.visit(&step);
        }

        let trapped = suspect && self.confined();
        if trapped {
            reward = self.agent.reward(
                &self.world,
                &Step {
                    crashed: true,
                    ..step
                },
            );
        }

        let termination = match outcome {
            Outcome::Blocked(collision) => Some(Termination::Collision(collision)),
            _ if trapped => Some(Termination::Trapped),
            _ if self.world.steps_since_food() > self.config.episode.starvation_steps => {
                Some(Termination::Starved)
            }
            _ => None,
        };

        let next = match termination {
            Some(_) => None,
            None => Some(self.agent.state_index(&self.world)),
        };
        let reward = reward.total();
        self.agent.learn(observation.state, direction, reward, next);

        let frame = self.world.frame();
        let status = match termination {
            Some(termination) => {
                self.end_episode(termination);
                Status::Terminal(termination)
            }
            None => Status::Running,
        };
        Tick {
            status,
            action: Some(direction),
            explored,
            reward,
            frame,
        }
    }

    /// Returns if the head has no room left to survive in.
    /// Measured after the move, a snake filling the whole board is not confined.
    fn confined(&mut self) -> bool {
        let len = self.world.len();
        if len >= self.world.width() * self.world.height() {
            return false;
        }
        let head = self.world.head();
        let flood_fill = self.world.label_areas();
        let room = Direction::iter()
            .map(|d| flood_fill.area(head.apply(d)))
            .max()
            .unwrap_or_default();
        self.agent.is_fatal_trap(room, len)
    }

    /// Ticks until the current episode ends.
    pub fn run_episode(&mut self) -> Episode {
        loop {
            if let Status::Terminal(termination) = self.tick().status {
                return self.last_episode.unwrap_or(Episode {
                    episode: self.episode,
                    score: 0,
                    steps: 0,
                    termination,
                });
            }
        }
    }

    fn end_episode(&mut self, termination: Termination) {
        self.episode += 1;
        let episode = Episode {
            episode: self.episode,
            score: self.world.score(),
            steps: self.world.steps(),
            termination,
        };
        self.lifetime_score += episode.score;
        self.last_episode = Some(episode);
        self.agent.end_episode();
        debug!(
            "episode {}: {:?} score={} steps={}",
            episode.episode, termination, episode.score, episode.steps
        );

        let interval = self.config.episode.telemetry_interval;
        if interval > 0 && self.episode % interval == 0 {
            if let Some(sink) = &mut self.telemetry {
                sink.push(Telemetry {
                    run: self.run,
                    episode: self.episode,
                    score: episode.score,
                    steps: episode.steps,
                    lifetime_score: self.lifetime_score,
                    average_value: self.agent.table().average(),
                    exploration_rate: self.agent.exploration_rate(),
                    learning_rate: self.agent.learning_rate(),
                });
            }
        }

        self.world.reset(&mut self.rng);
    }
}
