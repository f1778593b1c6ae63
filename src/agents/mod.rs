//! Tabular Q-learning on a discretized view of the world.

mod qlearning;
pub use qlearning::*;
mod reward;
pub use reward::*;
mod state;
pub use state::*;
mod table;
pub use table::*;
