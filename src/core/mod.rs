//! Core record types, address heuristics, and normalization.
//!
//! This module provides the canonical invoice record shape that the
//! encoders consume and the decoders produce, plus the leaf heuristics
//! (address parsing, country detection) and the normalizer that turns a
//! raw, possibly-incomplete record into a consistent one.

mod address;
mod country;
mod error;
mod normalize;
mod types;

pub use address::*;
pub use country::*;
pub use error::*;
pub use normalize::*;
pub use types::*;
