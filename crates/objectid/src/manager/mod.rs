mod allocation;
mod config;
mod source;

pub use allocation::*;
pub use config::*;
pub use source::*;
