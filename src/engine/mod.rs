pub mod clock;
pub mod scoring;
mod session;

pub use clock::RoundClock;
pub use session::{EngineError, TriviaEngine};
