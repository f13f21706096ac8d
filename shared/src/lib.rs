//! Shared types and pure engine logic for reception weight reconciliation
//!
//! This crate contains the models, the discount calculator, the
//! reconciliation arithmetic and the batch allocator. It does no I/O and is
//! used by the backend and by the WASM client previews.

pub mod batch;
pub mod discount;
pub mod error;
pub mod models;
pub mod reconciliation;
pub mod types;
pub mod validation;

pub use batch::*;
pub use discount::*;
pub use error::*;
pub use models::*;
pub use reconciliation::*;
pub use types::*;
pub use validation::*;
