pub mod failing_store;
pub mod fixtures;
pub mod strategies;

pub use failing_store::*;
pub use fixtures::*;
pub use strategies::*;
