//! # docmill-core
//!
//! Core types, traits, and abstractions for the docmill conversion
//! service.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the engine and API crates depend on: the document
//! kind taxonomy and classifier, the intermediate page/element model,
//! chunk and job types, the error taxonomy, token counting, and the
//! extractor/persistence trait seams.

pub mod classify;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod safety;
pub mod tokenizer;
pub mod traits;

// Re-export commonly used types at crate root
pub use classify::classify;
pub use error::{Error, Result};
pub use models::*;
pub use safety::{validate_upload, ValidationResult};
pub use tokenizer::*;
pub use traits::*;
