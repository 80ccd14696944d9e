mod config;
mod controller;
mod state;

pub use config::NavigationConfig;
pub use controller::{AdvanceOutcome, Departure, NavigationController};
pub use state::{BatchWindow, NavState, Refusal};

/// Navigation that is not a plain step to the next reel. Counted in `total_skips`.
pub fn is_non_sequential(from: usize, to: usize) -> bool {
    to != from + 1
}

/// Navigation that jumps more than one reel ahead. Starts `time_to_first_skip`.
pub fn is_forward_jump(from: usize, to: usize) -> bool {
    to > from + 1
}
