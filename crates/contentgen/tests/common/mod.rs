//! Shared utilities for contentgen integration tests.
//!
//! - `builders`: collections and scripted generation providers
//! - `harness`: runs jobs against a store and captures their event streams

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
