//! Business logic services for reception reconciliation

pub mod batch;
pub mod measurement;
pub mod reception;
pub mod reconciliation;
pub mod threshold;
