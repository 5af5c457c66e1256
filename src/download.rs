//! Deck download: turn a request for deck slugs into a ready `.apkg`

use std::collections::BTreeSet;
use std::fs;

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;

use crate::anki::{self, ExportError, ExportSummary};
use crate::config::{ConfigError, ExportConfig};
use crate::flashcards::{CardStore, FlashcardStorageError, SourceCard};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("No decks requested")]
    NothingRequested,

    #[error("Decks not found: {}", .0.join(", "))]
    DecksNotFound(Vec<String>),

    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    #[error("Storage error: {0}")]
    Storage(#[from] FlashcardStorageError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Which cards to download and under what name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub decks: Vec<String>,
    pub lessons: Vec<String>,
    pub enhancements: Vec<String>,
    pub name: Option<String>,
}

impl DownloadRequest {
    pub fn for_decks<I, S>(decks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            decks: decks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse `deck=a&deck=b&lesson=x&enhancement=y&name=z.apkg`.
    /// Repeated keys accumulate; unknown keys are ignored.
    pub fn from_query(query: &str) -> Result<Self> {
        let mut request = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;
            match decode_component(key)?.as_str() {
                "deck" => request.decks.push(value.trim().to_string()),
                "lesson" => request.lessons.push(value.trim().to_string()),
                "enhancement" => request.enhancements.push(value.trim().to_string()),
                "name" => request.name = Some(value),
                other => log::debug!("Ignoring query parameter {:?}", other),
            }
        }
        Ok(request)
    }

    /// Whether `card` passes the lesson and enhancement filters
    fn accepts(&self, card: &SourceCard) -> bool {
        let matches = |filter: &[String], value: &Option<String>| {
            filter.is_empty() || value.as_ref().map_or(false, |v| filter.contains(v))
        };
        matches(&self.lessons, &card.lesson) && matches(&self.enhancements, &card.enhancement)
    }
}

fn decode_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| DownloadError::InvalidQuery(e.to_string()))
}

/// A finished package ready to be sent
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
    pub content_disposition: String,
    pub summary: ExportSummary,
}

/// `attachment; filename="<percent-encoded name>"`
pub fn content_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{}\"", urlencoding::encode(file_name))
}

/// Published cards under the requested decks (and their descendants),
/// narrowed by the request's lesson and enhancement filters
pub fn select_cards<'a>(store: &'a CardStore, request: &DownloadRequest) -> Result<Vec<&'a SourceCard>> {
    let slugs: BTreeSet<&str> = request
        .decks
        .iter()
        .map(|slug| slug.trim())
        .filter(|slug| !slug.is_empty())
        .collect();
    if slugs.is_empty() {
        return Err(DownloadError::NothingRequested);
    }

    let (decks, missing) = store.find_decks(slugs);
    if !missing.is_empty() {
        return Err(DownloadError::DecksNotFound(missing));
    }

    let deck_ids = store.subtree_ids(&decks);
    Ok(store
        .published_cards_in(&deck_ids)
        .filter(|card| request.accepts(card))
        .collect())
}

/// Build the package for `request` and read it into memory
pub fn download_deck(
    store: &CardStore,
    request: &DownloadRequest,
    config: &ExportConfig,
) -> Result<DownloadResponse> {
    let mut cards: Vec<SourceCard> = select_cards(store, request)?.into_iter().cloned().collect();

    // Consecutive cards often drill the same lesson
    if config.shuffle {
        cards.shuffle(&mut rand::thread_rng());
    }

    let file_name = request
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| config.default_file_name.clone());

    let options = config.export_options(Utc::now().timestamp())?;
    let work_dir = TempDir::new()?;
    let package_path = work_dir.path().join("export.apkg");
    let summary = anki::export_cards(store.tree(), &cards, &package_path, &options)?;
    let bytes = fs::read(&package_path)?;

    log::info!(
        "Prepared {} ({} bytes, {} notes) for decks {:?}",
        file_name,
        bytes.len(),
        summary.notes,
        request.decks
    );

    Ok(DownloadResponse {
        bytes,
        content_disposition: content_disposition(&file_name),
        file_name,
        content_type: "application/force-download",
        summary,
    })
}
