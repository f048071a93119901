pub mod counting;

pub use counting::{CountAction, CountOutcome, CountingSession};
