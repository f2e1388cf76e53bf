//! Shared types for `modelsync`: the registry document, the error taxonomy
//! and the events that flow out of a transfer.

pub mod error;
pub mod hub;
pub mod manifest;
pub mod protocol;

pub use error::{Result, SyncError};
