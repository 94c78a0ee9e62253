mod local;
#[cfg(test)]
mod tests;

pub use local::*;
