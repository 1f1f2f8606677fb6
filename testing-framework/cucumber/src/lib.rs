mod steps;
pub mod world;

pub use world::{AccountSlot, LedgerWorld, StepError, StepResult, parse_backend};
