mod engine;
mod naming;

pub use engine::*;
pub use naming::*;
