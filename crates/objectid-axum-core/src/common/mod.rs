pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

#[cfg(test)]
mod tests;
