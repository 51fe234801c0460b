//! # Unit Tests
//!
//! Fine-grained tests for each resolution stage.

mod document;
mod expand;
mod normalize;
