//! Flattening of the deck hierarchy into Anki's integer-indexed decks

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use super::{ExportError, IndexCounter, Result};
use crate::flashcards::{DeckId, DeckTree, SourceCard, DECK_NAME_SEPARATOR};

/// Index of the deck Anki requires to exist, whatever gets exported
pub const DEFAULT_DECK_INDEX: i64 = 1;
pub const DEFAULT_DECK_NAME: &str = "Default";

/// Deck entry of `col.decks`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRecord {
    pub id: i64,
    pub name: String,
    pub conf: i64,
    #[serde(rename = "mod")]
    pub modified: i64,
    pub browser_collapsed: bool,
    pub collapsed: bool,
    pub desc: String,
    #[serde(rename = "dyn")]
    pub dynamic: i64,
    pub extend_new: i64,
    pub extend_rev: i64,
    pub lrn_today: [i64; 2],
    pub new_today: [i64; 2],
    pub rev_today: [i64; 2],
    pub time_today: [i64; 2],
    pub usn: i64,
}

impl DeckRecord {
    pub fn new(id: i64, name: &str, timestamp: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            conf: 1,
            modified: timestamp,
            browser_collapsed: false,
            collapsed: false,
            desc: String::new(),
            dynamic: 0,
            extend_new: 0,
            extend_rev: 0,
            lrn_today: [0, 0],
            new_today: [0, 0],
            rev_today: [0, 0],
            time_today: [0, 0],
            usn: -1,
        }
    }
}

/// One exported deck
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDeck {
    /// `None` for the synthetic default deck
    pub source_id: Option<DeckId>,
    pub index: i64,
    pub record: DeckRecord,
    /// Source id of the top-level ancestor, `None` for the default deck
    pub root_source_id: Option<DeckId>,
}

/// Result of flattening: the deck entries plus lookups into them
#[derive(Debug, Clone)]
pub struct FlattenedDecks {
    entries: Vec<ExportDeck>,
    index_by_source: HashMap<Option<DeckId>, i64>,
    root_by_source: HashMap<Option<DeckId>, Option<DeckId>>,
    has_unfiled_cards: bool,
}

impl FlattenedDecks {
    /// Entries in emission order, the default deck first
    pub fn entries(&self) -> &[ExportDeck] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Anki index of a source deck; `None` maps to the default deck
    pub fn index_of(&self, source_id: Option<DeckId>) -> Option<i64> {
        self.index_by_source.get(&source_id).copied()
    }

    /// Anki index of the root of a source deck's tree.
    /// Cards without a deck belong to the default deck's tree.
    pub fn root_index_of(&self, source_id: Option<DeckId>) -> Option<i64> {
        match self.root_by_source.get(&source_id)? {
            Some(root) => self.index_of(Some(*root)),
            None => Some(DEFAULT_DECK_INDEX),
        }
    }

    /// Distinct root indices that cards can end up under
    pub fn root_indices(&self) -> BTreeSet<i64> {
        let mut roots: BTreeSet<i64> = self
            .entries
            .iter()
            .filter_map(|entry| entry.root_source_id)
            .filter_map(|root| self.index_of(Some(root)))
            .collect();
        if self.has_unfiled_cards {
            roots.insert(DEFAULT_DECK_INDEX);
        }
        roots
    }

    /// `col.decks` contents, keyed by index
    pub fn records(&self) -> BTreeMap<String, &DeckRecord> {
        self.entries
            .iter()
            .map(|entry| (entry.index.to_string(), &entry.record))
            .collect()
    }
}

/// Single-pass deck flattener.
///
/// Holds its own index counter, so two exports never share numbering.
pub struct DeckFlattener<'a> {
    tree: &'a DeckTree,
    timestamp: i64,
    counter: IndexCounter,
    emitted: HashSet<Option<DeckId>>,
    entries: Vec<ExportDeck>,
    index_by_source: HashMap<Option<DeckId>, i64>,
    root_by_source: HashMap<Option<DeckId>, Option<DeckId>>,
    has_unfiled_cards: bool,
}

impl<'a> DeckFlattener<'a> {
    pub fn new(tree: &'a DeckTree, timestamp: i64) -> Self {
        let mut flattener = Self {
            tree,
            timestamp,
            counter: IndexCounter::starting_at(DEFAULT_DECK_INDEX + 1),
            emitted: HashSet::new(),
            entries: Vec::new(),
            index_by_source: HashMap::new(),
            root_by_source: HashMap::new(),
            has_unfiled_cards: false,
        };
        flattener.emit(
            None,
            DEFAULT_DECK_INDEX,
            DeckRecord::new(DEFAULT_DECK_INDEX, DEFAULT_DECK_NAME, timestamp),
            None,
        );
        flattener
    }

    /// Emit every not yet emitted deck on the path from the root to `deck_id`
    pub fn add(&mut self, deck_id: Option<DeckId>) -> Result<()> {
        let Some(deck_id) = deck_id else {
            self.has_unfiled_cards = true;
            return Ok(());
        };
        if self.emitted.contains(&Some(deck_id)) {
            return Ok(());
        }

        let tree = self.tree;
        let chain = tree
            .ancestors(deck_id)
            .ok_or(ExportError::UnknownDeck(deck_id))?;
        let root_id = chain[0].id;

        let mut name_chunks: Vec<&str> = Vec::with_capacity(chain.len());
        for ancestor in chain {
            name_chunks.push(&ancestor.name);
            if self.emitted.contains(&Some(ancestor.id)) {
                continue;
            }

            let index = self.counter.next_index();
            let full_name = name_chunks.join(DECK_NAME_SEPARATOR);
            let record = DeckRecord::new(index, &full_name, self.timestamp);
            self.emit(Some(ancestor.id), index, record, Some(root_id));
        }
        Ok(())
    }

    fn emit(
        &mut self,
        source_id: Option<DeckId>,
        index: i64,
        record: DeckRecord,
        root_source_id: Option<DeckId>,
    ) {
        self.emitted.insert(source_id);
        self.index_by_source.insert(source_id, index);
        self.root_by_source.insert(source_id, root_source_id);
        self.entries.push(ExportDeck {
            source_id,
            index,
            record,
            root_source_id,
        });
    }

    pub fn finish(self) -> FlattenedDecks {
        FlattenedDecks {
            entries: self.entries,
            index_by_source: self.index_by_source,
            root_by_source: self.root_by_source,
            has_unfiled_cards: self.has_unfiled_cards,
        }
    }
}

/// Flatten the decks reachable from `cards`, in card order
pub fn flatten_decks(tree: &DeckTree, cards: &[SourceCard], timestamp: i64) -> Result<FlattenedDecks> {
    let mut flattener = DeckFlattener::new(tree, timestamp);
    for card in cards {
        flattener.add(card.deck_id)?;
    }
    Ok(flattener.finish())
}
