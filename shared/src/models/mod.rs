//! Domain models for the reconciliation engine

mod batch;
mod measurement;
mod reception;
mod threshold;

pub use batch::*;
pub use measurement::*;
pub use reception::*;
pub use threshold::*;
