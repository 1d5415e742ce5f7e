//! Workflow configuration types
//!
//! Provides structs for parsing and validating JSON workflow definitions.

pub mod types;

pub use types::*;
