//! Data models for the source side of an export: decks and cards

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::storage::{FlashcardStorageError, Result};

pub type DeckId = i64;
pub type CardId = i64;

/// A named node in the deck hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<DeckId>,
}

impl Deck {
    pub fn new(id: DeckId, name: &str, slug: &str, parent_id: Option<DeckId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            parent_id,
        }
    }
}

#[derive(Debug, Clone)]
struct DeckNode {
    deck: Deck,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Owned deck hierarchy.
///
/// Decks live in a flat arena and refer to their parent and children by
/// arena index, so ancestor and descendant queries never touch the store.
#[derive(Debug, Clone, Default)]
pub struct DeckTree {
    nodes: Vec<DeckNode>,
    by_id: HashMap<DeckId, usize>,
}

impl DeckTree {
    /// Build a tree from an unordered list of decks.
    ///
    /// Fails on duplicate ids, dangling parent references, sibling name
    /// clashes and cycles.
    pub fn build(decks: Vec<Deck>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(decks.len());
        for (index, deck) in decks.iter().enumerate() {
            if by_id.insert(deck.id, index).is_some() {
                return Err(FlashcardStorageError::DuplicateDeck(deck.id));
            }
        }

        let mut nodes: Vec<DeckNode> = Vec::with_capacity(decks.len());
        for deck in decks {
            let parent = match deck.parent_id {
                Some(parent_id) => Some(*by_id.get(&parent_id).ok_or(
                    FlashcardStorageError::UnknownParent {
                        deck: deck.id,
                        parent: parent_id,
                    },
                )?),
                None => None,
            };
            nodes.push(DeckNode {
                deck,
                parent,
                children: Vec::new(),
            });
        }

        // Walking up more than `len` steps means we went around a loop
        for (index, node) in nodes.iter().enumerate() {
            let mut cursor = node.parent;
            let mut steps = 0;
            while let Some(parent) = cursor {
                steps += 1;
                if parent == index || steps > nodes.len() {
                    return Err(FlashcardStorageError::DeckCycle(node.deck.id));
                }
                cursor = nodes[parent].parent;
            }
        }

        for index in 0..nodes.len() {
            if let Some(parent) = nodes[index].parent {
                nodes[parent].children.push(index);
            }
        }

        // Siblings are kept in name order, which also catches duplicate names
        let names: Vec<String> = nodes.iter().map(|n| n.deck.name.clone()).collect();
        for node in nodes.iter_mut() {
            node.children.sort_by(|a, b| names[*a].cmp(&names[*b]));
            if let Some(pair) = node.children.windows(2).find(|w| names[w[0]] == names[w[1]]) {
                return Err(FlashcardStorageError::DuplicateDeckName(names[pair[0]].clone()));
            }
        }
        let mut roots: Vec<usize> = (0..nodes.len()).filter(|i| nodes[*i].parent.is_none()).collect();
        roots.sort_by(|a, b| names[*a].cmp(&names[*b]));
        if let Some(pair) = roots.windows(2).find(|w| names[w[0]] == names[w[1]]) {
            return Err(FlashcardStorageError::DuplicateDeckName(names[pair[0]].clone()));
        }

        Ok(Self { nodes, by_id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: DeckId) -> Option<&Deck> {
        self.by_id.get(&id).map(|index| &self.nodes[*index].deck)
    }

    pub fn contains(&self, id: DeckId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&Deck> {
        self.nodes.iter().map(|n| &n.deck).find(|d| d.slug == slug)
    }

    /// Top-level decks in name order
    pub fn roots(&self) -> Vec<&Deck> {
        let mut roots: Vec<&Deck> = self
            .nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| &n.deck)
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        roots
    }

    pub fn children(&self, id: DeckId) -> Vec<&Deck> {
        match self.by_id.get(&id) {
            Some(index) => self.nodes[*index]
                .children
                .iter()
                .map(|child| &self.nodes[*child].deck)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Ancestor chain of a deck, root first, the deck itself last
    pub fn ancestors(&self, id: DeckId) -> Option<Vec<&Deck>> {
        let mut cursor = Some(*self.by_id.get(&id)?);
        let mut chain = Vec::new();
        while let Some(index) = cursor {
            chain.push(&self.nodes[index].deck);
            cursor = self.nodes[index].parent;
        }
        chain.reverse();
        Some(chain)
    }

    pub fn root_of(&self, id: DeckId) -> Option<&Deck> {
        self.ancestors(id).and_then(|chain| chain.first().copied())
    }

    /// The deck and everything below it, in pre-order
    pub fn descendants(&self, id: DeckId) -> Vec<&Deck> {
        let Some(start) = self.by_id.get(&id) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let mut stack = vec![*start];
        while let Some(index) = stack.pop() {
            found.push(&self.nodes[index].deck);
            stack.extend(self.nodes[index].children.iter().rev());
        }
        found
    }

    /// Fully qualified name as Anki expects it, e.g. `python::lists`
    pub fn full_name(&self, id: DeckId) -> Option<String> {
        self.ancestors(id).map(|chain| {
            chain
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(DECK_NAME_SEPARATOR)
        })
    }
}

/// Separator between ancestor names in a fully qualified deck name
pub const DECK_NAME_SEPARATOR: &str = "::";

/// Which of the two card layouts a card uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Question with a typed answer and an explanation
    Basic,
    /// Foreign word and phrase with translations and optional audio
    LocalizedPhrase,
}

impl CardKind {
    /// Stable slug used to key note models
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Basic => "lesson_card_with_input",
            Self::LocalizedPhrase => "lesson_card_english",
        }
    }
}

/// Question card. `front` and `explanation` are already rendered HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicCard {
    pub front: String,
    /// Expected typed answer; empty means "show answer" button instead of an input
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// Vocabulary card with a phrase in context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseCard {
    #[serde(default)]
    pub word: String,
    pub word_translation: String,
    /// Rendered HTML
    pub phrase: String,
    /// Rendered HTML
    pub phrase_translation: String,
    #[serde(default)]
    pub article_link: String,
    /// Path of the voice-over file, relative to the media root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting_voice: Option<String>,
}

/// Card content, exactly one layout per card
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardDetail {
    Basic(BasicCard),
    LocalizedPhrase(PhraseCard),
}

impl CardDetail {
    pub fn kind(&self) -> CardKind {
        match self {
            Self::Basic(_) => CardKind::Basic,
            Self::LocalizedPhrase(_) => CardKind::LocalizedPhrase,
        }
    }
}

/// A card as read from the store, already classified
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCard {
    pub id: CardId,
    pub guid: String,
    pub deck_id: Option<DeckId>,
    pub lesson: Option<String>,
    pub enhancement: Option<String>,
    pub published: bool,
    pub detail: CardDetail,
}

impl SourceCard {
    pub fn basic(id: CardId, guid: &str, deck_id: Option<DeckId>, card: BasicCard) -> Self {
        Self {
            id,
            guid: guid.to_string(),
            deck_id,
            lesson: None,
            enhancement: None,
            published: true,
            detail: CardDetail::Basic(card),
        }
    }

    pub fn phrase(id: CardId, guid: &str, deck_id: Option<DeckId>, card: PhraseCard) -> Self {
        Self {
            id,
            guid: guid.to_string(),
            deck_id,
            lesson: None,
            enhancement: None,
            published: true,
            detail: CardDetail::LocalizedPhrase(card),
        }
    }

    pub fn kind(&self) -> CardKind {
        self.detail.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> DeckTree {
        DeckTree::build(vec![
            Deck::new(3, "lists", "python-lists", Some(1)),
            Deck::new(1, "python", "python", None),
            Deck::new(2, "basics", "python-basics", Some(1)),
            Deck::new(4, "slicing", "python-slicing", Some(3)),
            Deck::new(5, "git", "git", None),
        ])
        .unwrap()
    }

    #[test]
    fn test_ancestors_are_root_first() {
        let tree = sample_tree();
        let names: Vec<&str> = tree.ancestors(4).unwrap().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["python", "lists", "slicing"]);
        assert_eq!(tree.root_of(4).unwrap().id, 1);
        assert_eq!(tree.root_of(5).unwrap().id, 5);
        assert!(tree.ancestors(42).is_none());
    }

    #[test]
    fn test_descendants_include_self_in_preorder() {
        let tree = sample_tree();
        let ids: Vec<DeckId> = tree.descendants(1).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(tree.descendants(5).len(), 1);
        assert!(tree.descendants(42).is_empty());
    }

    #[test]
    fn test_full_name() {
        let tree = sample_tree();
        assert_eq!(tree.full_name(4).unwrap(), "python::lists::slicing");
        assert_eq!(tree.full_name(5).unwrap(), "git");
    }

    #[test]
    fn test_roots_and_slugs() {
        let tree = sample_tree();
        let roots: Vec<&str> = tree.roots().iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(roots, vec!["git", "python"]);
        assert_eq!(tree.find_by_slug("python-lists").unwrap().id, 3);
        assert!(tree.find_by_slug("rust").is_none());
    }

    #[test]
    fn test_build_rejects_unknown_parent() {
        let result = DeckTree::build(vec![Deck::new(1, "orphan", "orphan", Some(9))]);
        assert!(matches!(
            result,
            Err(FlashcardStorageError::UnknownParent { deck: 1, parent: 9 })
        ));
    }

    #[test]
    fn test_build_rejects_cycle() {
        let result = DeckTree::build(vec![
            Deck::new(1, "a", "a", Some(2)),
            Deck::new(2, "b", "b", Some(1)),
        ]);
        assert!(matches!(result, Err(FlashcardStorageError::DeckCycle(_))));
    }

    #[test]
    fn test_build_rejects_duplicate_sibling_names() {
        let result = DeckTree::build(vec![
            Deck::new(1, "root", "root", None),
            Deck::new(2, "same", "same-1", Some(1)),
            Deck::new(3, "same", "same-2", Some(1)),
        ]);
        assert!(matches!(result, Err(FlashcardStorageError::DuplicateDeckName(name)) if name == "same"));

        // Same name under different parents is fine
        let tree = DeckTree::build(vec![
            Deck::new(1, "a", "a", None),
            Deck::new(2, "b", "b", None),
            Deck::new(3, "same", "same-a", Some(1)),
            Deck::new(4, "same", "same-b", Some(2)),
        ]);
        assert!(tree.is_ok());
    }

    #[test]
    fn test_card_kind_slugs() {
        assert_eq!(CardKind::Basic.slug(), "lesson_card_with_input");
        assert_eq!(CardKind::LocalizedPhrase.slug(), "lesson_card_english");
    }
}
