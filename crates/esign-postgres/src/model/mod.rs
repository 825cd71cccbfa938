//! Database models for the document store.
//!
//! Diesel structs for querying, inserting and updating `documents` rows.

mod document;

pub use document::{Document, NewDocument, SignDocument};
