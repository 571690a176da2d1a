//! Data models for the booking engine

mod availability;
mod block;
mod furniture;
mod reservation;
mod state;

pub use availability::*;
pub use block::*;
pub use furniture::*;
pub use reservation::*;
pub use state::*;
