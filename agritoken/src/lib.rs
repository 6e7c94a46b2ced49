//! AgriToken farm tokenization platform
//!
//! This crate re-exports all the components of the platform.

pub use agritoken_core::*;
pub use agritoken_runtime::*;
pub use agritoken_storage::*;
