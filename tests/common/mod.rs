pub mod harness;
pub mod strategies;

// Each test binary uses only part of the shared helpers
#[allow(unused_imports)]
pub use harness::*;
#[allow(unused_imports)]
pub use strategies::*;
