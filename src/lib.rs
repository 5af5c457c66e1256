//! Export of nested flashcard decks into Anki `.apkg` packages

pub mod anki;
pub mod config;
pub mod download;
pub mod flashcards;

pub use anki::{export_cards, inspect_package, ExportError, ExportOptions, ExportSummary, PackageSummary};
pub use config::{load_config, ExportConfig};
pub use download::{download_deck, DownloadError, DownloadRequest, DownloadResponse};
pub use flashcards::{CardStore, DeckTree, SourceCard};
