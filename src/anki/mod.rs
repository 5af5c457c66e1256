//! Anki package (`.apkg`) export
//!
//! The pipeline runs in five steps, each in its own module:
//! - `decks`: flatten the deck tree into integer-indexed decks
//! - `models`: synthesize one note type per exported root deck and card kind
//! - `notes`: encode every card into a note, collecting media
//! - `collection`: write the SQLite snapshot in one transaction
//! - `package`: zip the snapshot and media with the media manifest

pub mod collection;
pub mod decks;
pub mod models;
pub mod notes;
pub mod package;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;

use crate::flashcards::{CardKind, DeckId, DeckTree, SourceCard};

pub use collection::{CollectionRecord, PlannedNote, SnapshotStats};
pub use decks::{flatten_decks, DeckFlattener, DeckRecord, ExportDeck, FlattenedDecks, DEFAULT_DECK_INDEX};
pub use models::{synthesize_models, ModelRecord, NoteModel, DEFAULT_STYLESHEET};
pub use notes::{
    field_checksum, join_fields, search_field, split_fields, strip_html, EncodedNote, MediaFile,
    MediaRegistry, NoteEncoder, FIELD_SEPARATOR,
};
pub use package::{inspect_package, write_package, PackageSummary, COLLECTION_ENTRY, MEDIA_MANIFEST_ENTRY};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to move package into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Card references unknown deck {0}")]
    UnknownDeck(DeckId),

    #[error("No {kind:?} note model for deck tree {root}")]
    MissingModel { root: i64, kind: CardKind },

    #[error("Media file not found: {0:?}")]
    MediaMissing(PathBuf),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Monotonic source of synthetic deck and model indices
#[derive(Debug, Clone)]
pub struct IndexCounter {
    next: i64,
}

impl IndexCounter {
    pub fn starting_at(first: i64) -> Self {
        Self { next: first }
    }

    pub fn next_index(&mut self) -> i64 {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// Everything an export needs besides the cards themselves
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Seconds since the epoch, stamped on every record
    pub timestamp: i64,
    pub feedback_form_url: String,
    pub feedback_link_text: String,
    pub basic_model_name: String,
    pub phrase_model_name: String,
    pub stylesheet: String,
    /// Directory relative audio paths are resolved against
    pub media_root: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::at(Utc::now().timestamp())
    }
}

impl ExportOptions {
    /// Default options with a fixed timestamp
    pub fn at(timestamp: i64) -> Self {
        Self {
            timestamp,
            feedback_form_url: "https://dvmn.org/anki/feedback/".to_string(),
            feedback_link_text: "Сообщить о проблеме".to_string(),
            basic_model_name: "Devman lesson card with input".to_string(),
            phrase_model_name: "Devman english card".to_string(),
            stylesheet: DEFAULT_STYLESHEET.to_string(),
            media_root: PathBuf::from("."),
        }
    }
}

/// Counts of what went into a package
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub decks: usize,
    pub models: usize,
    pub notes: usize,
    pub cards: usize,
    pub media: usize,
}

/// Everything computed before touching the disk
#[derive(Debug)]
pub struct ExportPlan {
    pub decks: FlattenedDecks,
    pub models: Vec<NoteModel>,
    pub notes: Vec<PlannedNote>,
    pub media: Vec<MediaFile>,
    pub collection: CollectionRecord,
}

/// Flatten decks, synthesize models and encode notes for `cards`
pub fn plan_export(tree: &DeckTree, cards: &[SourceCard], options: &ExportOptions) -> Result<ExportPlan> {
    let decks = flatten_decks(tree, cards, options.timestamp)?;

    let mut placements = Vec::with_capacity(cards.len());
    for card in cards {
        let unknown = || ExportError::UnknownDeck(card.deck_id.unwrap_or_default());
        let deck_index = decks.index_of(card.deck_id).ok_or_else(unknown)?;
        let root_index = decks.root_index_of(card.deck_id).ok_or_else(unknown)?;
        placements.push((deck_index, root_index));
    }

    let model_keys: BTreeSet<(i64, CardKind)> = cards
        .iter()
        .zip(&placements)
        .map(|(card, &(_, root))| (root, card.kind()))
        .collect();
    let mut model_counter = IndexCounter::starting_at(1);
    let models = synthesize_models(&model_keys, &mut model_counter, options);
    let model_by_key: HashMap<(i64, CardKind), i64> = models
        .iter()
        .map(|model| ((model.root_deck_index, model.kind), model.index))
        .collect();

    let mut encoder = NoteEncoder::new(options);
    let mut notes = Vec::with_capacity(cards.len());
    for (card, &(deck_index, root_index)) in cards.iter().zip(&placements) {
        let kind = card.kind();
        let model_index = *model_by_key
            .get(&(root_index, kind))
            .ok_or(ExportError::MissingModel { root: root_index, kind })?;

        notes.push(PlannedNote {
            note: encoder.encode(card, model_index),
            deck_index,
        });
    }
    let media = encoder.into_media().into_files();

    let collection = CollectionRecord::new(options.timestamp, &decks, &models)?;

    Ok(ExportPlan {
        decks,
        models,
        notes,
        media,
        collection,
    })
}

/// Export `cards` into a complete package at `output_path`.
///
/// Either the whole package is written or nothing is: the collection is
/// built in a private temporary directory that is removed on every exit
/// path, and the archive is moved into place only when complete.
pub fn export_cards(
    tree: &DeckTree,
    cards: &[SourceCard],
    output_path: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    let plan = plan_export(tree, cards, options)?;
    log::info!(
        "Exporting {} cards: {} decks, {} models, {} media files",
        cards.len(),
        plan.decks.len(),
        plan.models.len(),
        plan.media.len()
    );

    let work_dir = TempDir::new()?;
    let collection_path = work_dir.path().join(COLLECTION_ENTRY);
    let stats = collection::create_snapshot(
        &collection_path,
        &plan.collection,
        &plan.notes,
        options.timestamp,
    )?;

    write_package(&collection_path, &plan.media, output_path)?;

    Ok(ExportSummary {
        decks: plan.decks.len(),
        models: plan.models.len(),
        notes: stats.notes,
        cards: stats.cards,
        media: plan.media.len(),
    })
}
