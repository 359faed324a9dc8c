//! Core abstractions shared by the extractor, loader and verifier.
//!
//! - [`value`]: dynamically typed cell values and raw rows
//! - [`traits`]: the [`SourceReader`] and [`TargetWriter`] seams
//! - [`identifier`]: identifier validation and quoting
//!
//! The engine components only ever talk to the two traits, so they can be
//! exercised against an in-memory destination in tests.

pub mod identifier;
pub mod traits;
pub mod value;

pub use traits::{SourceReader, TargetWriter};
pub use value::{Row, SqlValue};
