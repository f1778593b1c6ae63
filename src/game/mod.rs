//! The grid world the snake lives in.

mod floodfill;
pub use floodfill::*;
mod grid;
pub use grid::*;
mod world;
pub use world::*;
