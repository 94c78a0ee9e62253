mod file;
mod interface;
mod memory;
#[cfg(test)]
mod tests;

pub use file::*;
pub use interface::*;
pub use memory::*;
