//! Read-only card store
//!
//! The store is a single JSON document:
//! ```text
//! {
//!   "decks": [{ "id": 1, "name": "python", "slug": "python", "parentId": null }],
//!   "cards": [{ "id": 7, "guid": "...", "deckId": 1, "published": true,
//!               "basic": { "front": "<p>...</p>", "answer": "", "explanation": "" } }]
//! }
//! ```
//! Every card row carries exactly one of `basic` or `localizedPhrase`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::models::*;

#[derive(Error, Debug)]
pub enum FlashcardStorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deck not found: {0}")]
    DeckNotFound(String),

    #[error("Duplicate deck id: {0}")]
    DuplicateDeck(DeckId),

    #[error("Deck {deck} references unknown parent {parent}")]
    UnknownParent { deck: DeckId, parent: DeckId },

    #[error("Deck name {0:?} is used twice under the same parent")]
    DuplicateDeckName(String),

    #[error("Deck hierarchy contains a cycle through deck {0}")]
    DeckCycle(DeckId),

    #[error("Card {0} has neither a basic nor a localized phrase detail")]
    MissingCardDetail(CardId),

    #[error("Card {0} has both a basic and a localized phrase detail")]
    AmbiguousCardDetail(CardId),
}

pub type Result<T> = std::result::Result<T, FlashcardStorageError>;

fn generate_card_guid() -> String {
    Uuid::new_v4().to_string()
}

/// A card row as stored, before classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRow {
    pub id: CardId,
    #[serde(default = "generate_card_guid")]
    pub guid: String,
    #[serde(default)]
    pub deck_id: Option<DeckId>,
    #[serde(default)]
    pub lesson: Option<String>,
    #[serde(default)]
    pub enhancement: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_phrase: Option<PhraseCard>,
}

impl CardRow {
    /// Resolve the row into exactly one card layout
    pub fn classify(self) -> Result<SourceCard> {
        let detail = match (self.basic, self.localized_phrase) {
            (Some(basic), None) => CardDetail::Basic(basic),
            (None, Some(phrase)) => CardDetail::LocalizedPhrase(phrase),
            (None, None) => return Err(FlashcardStorageError::MissingCardDetail(self.id)),
            (Some(_), Some(_)) => return Err(FlashcardStorageError::AmbiguousCardDetail(self.id)),
        };

        Ok(SourceCard {
            id: self.id,
            guid: self.guid,
            deck_id: self.deck_id,
            lesson: self.lesson,
            enhancement: self.enhancement,
            published: self.published,
            detail,
        })
    }
}

/// On-disk layout of the store file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub decks: Vec<Deck>,
    #[serde(default)]
    pub cards: Vec<CardRow>,
}

/// Decks and classified cards, loaded once and only read afterwards
#[derive(Debug, Clone, Default)]
pub struct CardStore {
    tree: DeckTree,
    cards: Vec<SourceCard>,
}

impl CardStore {
    /// Load a store file from disk
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: StoreFile = serde_json::from_str(&content)?;
        let store = Self::from_file(file)?;
        log::info!(
            "Loaded card store {:?}: {} decks, {} cards",
            path,
            store.tree.len(),
            store.cards.len()
        );
        Ok(store)
    }

    pub fn from_file(file: StoreFile) -> Result<Self> {
        let tree = DeckTree::build(file.decks)?;
        let cards = file
            .cards
            .into_iter()
            .map(CardRow::classify)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tree, cards })
    }

    pub fn tree(&self) -> &DeckTree {
        &self.tree
    }

    /// All cards in store order
    pub fn cards(&self) -> &[SourceCard] {
        &self.cards
    }

    pub fn get_deck_by_slug(&self, slug: &str) -> Result<&Deck> {
        self.tree
            .find_by_slug(slug)
            .ok_or_else(|| FlashcardStorageError::DeckNotFound(slug.to_string()))
    }

    /// Look up several decks at once, returning the found decks and the
    /// slugs that matched nothing
    pub fn find_decks<'a>(&self, slugs: impl IntoIterator<Item = &'a str>) -> (Vec<&Deck>, Vec<String>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for slug in slugs {
            match self.tree.find_by_slug(slug) {
                Some(deck) => found.push(deck),
                None => missing.push(slug.to_string()),
            }
        }
        (found, missing)
    }

    /// Ids of the given decks and all of their descendants
    pub fn subtree_ids(&self, decks: &[&Deck]) -> HashSet<DeckId> {
        decks
            .iter()
            .flat_map(|deck| self.tree.descendants(deck.id))
            .map(|deck| deck.id)
            .collect()
    }

    /// Published cards filed under one of `deck_ids`, in store order
    pub fn published_cards_in<'a, 'b>(
        &'a self,
        deck_ids: &'b HashSet<DeckId>,
    ) -> impl Iterator<Item = &'a SourceCard> + 'b
    where
        'a: 'b,
    {
        self.cards.iter().filter(move |card| {
            card.published && card.deck_id.map_or(false, |id| deck_ids.contains(&id))
        })
    }
}
