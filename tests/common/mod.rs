//! Shared test utilities for termed integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Index helpers open in-memory indexes with scheduled
//! refresh effectively disabled so tests control visibility explicitly.

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
