//! HTTP handlers

mod batch;
mod health;
mod measurement;
mod reception;
mod threshold;

pub use batch::*;
pub use health::*;
pub use measurement::*;
pub use reception::*;
pub use threshold::*;
