pub mod collector;
pub mod droid;
pub mod enricher;
pub mod pipeline;
pub mod search;
pub mod sentinel;

pub use collector::*;
pub use droid::*;
pub use enricher::*;
pub use pipeline::*;
pub use search::*;
pub use sentinel::*;
