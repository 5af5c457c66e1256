//! Source flashcards for export
//!
//! This module provides:
//! - The deck hierarchy as an owned arena (`DeckTree`)
//! - Cards as a tagged union of the two supported layouts
//! - A read-only JSON card store

pub mod models;
pub mod storage;

pub use models::*;
pub use storage::{CardRow, CardStore, FlashcardStorageError, StoreFile};
