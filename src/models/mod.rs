pub mod judgement;
pub mod task;
pub mod term;

pub use judgement::*;
pub use task::*;
pub use term::*;
