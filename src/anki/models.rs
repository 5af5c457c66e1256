//! Note types ("models") synthesized for each exported deck tree

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{ExportOptions, IndexCounter};
use crate::flashcards::CardKind;

/// Stylesheet shared by every model unless the configuration overrides it
pub const DEFAULT_STYLESHEET: &str = include_str!("../../assets/devman_anki_cards.css");

/// Static description of one card layout
#[derive(Debug)]
pub(crate) struct ModelLayout {
    pub(crate) fields: &'static [&'static str],
    pub(crate) question: &'static str,
    pub(crate) answer: &'static str,
    /// Fields of which at least one must be non-empty for the card to exist
    pub(crate) required: &'static [u32],
}

/// Front, typed answer and explanation
pub(crate) static BASIC_LAYOUT: ModelLayout = ModelLayout {
    fields: &["Front", "Input", "Explanation"],
    question: "{{Front}}\n\n{{type:Input}}",
    answer: "\n{{Front}}\n\n<hr id=answer>\n\n{{type:Input}}\n{{Explanation}}\n",
    required: &[0, 1],
};

/// Word and phrase with audio on the front, the word's translation typed
/// in, all translations on the back
pub(crate) static PHRASE_LAYOUT: ModelLayout = ModelLayout {
    fields: &["Front", "Input", "Back"],
    question: "{{Front}}\n\n{{type:Input}}",
    answer: "\n{{Front}}\n\n<hr id=answer>\n\n{{type:Input}}\n{{Back}}\n",
    required: &[0],
};

pub(crate) fn layout_for(kind: CardKind) -> &'static ModelLayout {
    match kind {
        CardKind::Basic => &BASIC_LAYOUT,
        CardKind::LocalizedPhrase => &PHRASE_LAYOUT,
    }
}

/// Field entry of a model. Font and size are required by Anki Desktop even
/// though the stylesheet overrides them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRecord {
    pub name: String,
    pub font: String,
    pub ord: u32,
    pub rtl: bool,
    pub size: u32,
    pub sticky: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateRecord {
    pub afmt: String,
    pub bafmt: String,
    pub bfont: String,
    pub bqfmt: String,
    pub bsize: u32,
    pub did: Option<i64>,
    pub name: String,
    pub ord: u32,
    pub qfmt: String,
}

/// Model entry of `col.models`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRecord {
    /// Deck new cards of this type go to by default
    pub did: i64,
    pub id: i64,
    pub css: String,
    pub flds: Vec<FieldRecord>,
    #[serde(rename = "mod")]
    pub modified: i64,
    pub name: String,
    pub req: Vec<(u32, String, Vec<u32>)>,
    pub sortf: u32,
    pub tmpls: Vec<TemplateRecord>,
    #[serde(rename = "type")]
    pub model_type: u32,
    pub usn: i64,
}

impl ModelRecord {
    pub fn new(kind: CardKind, id: i64, deck_index: i64, options: &ExportOptions) -> Self {
        let layout = layout_for(kind);
        let name = match kind {
            CardKind::Basic => options.basic_model_name.clone(),
            CardKind::LocalizedPhrase => options.phrase_model_name.clone(),
        };

        let flds = layout
            .fields
            .iter()
            .zip(0u32..)
            .map(|(field, ord)| FieldRecord {
                name: field.to_string(),
                font: "Arial".to_string(),
                ord,
                rtl: false,
                size: 20,
                sticky: false,
            })
            .collect();

        Self {
            did: deck_index,
            id,
            css: options.stylesheet.clone(),
            flds,
            modified: options.timestamp,
            name,
            req: vec![(0, "any".to_string(), layout.required.to_vec())],
            sortf: 0,
            tmpls: vec![TemplateRecord {
                afmt: layout.answer.to_string(),
                bafmt: String::new(),
                bfont: String::new(),
                bqfmt: String::new(),
                bsize: 0,
                did: None,
                name: "Card 1".to_string(),
                ord: 0,
                qfmt: layout.question.to_string(),
            }],
            model_type: 0,
            usn: -1,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.flds.iter().map(|f| f.name.as_str()).collect()
    }
}

/// A synthesized model and the deck tree it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct NoteModel {
    pub kind: CardKind,
    pub root_deck_index: i64,
    pub index: i64,
    pub record: ModelRecord,
}

/// One model per (root deck index, card kind) pair present in the batch,
/// numbered in root order, kinds of the same root in declaration order.
///
/// An empty batch produces no models.
pub fn synthesize_models(
    roots: &BTreeSet<(i64, CardKind)>,
    counter: &mut IndexCounter,
    options: &ExportOptions,
) -> Vec<NoteModel> {
    roots
        .iter()
        .map(|&(root, kind)| {
            let index = counter.next_index();
            NoteModel {
                kind,
                root_deck_index: root,
                index,
                record: ModelRecord::new(kind, index, root, options),
            }
        })
        .collect()
}

/// `col.models` contents, keyed by index
pub fn model_records(models: &[NoteModel]) -> BTreeMap<String, &ModelRecord> {
    models
        .iter()
        .map(|model| (model.index.to_string(), &model.record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ExportOptions {
        ExportOptions::at(1_600_000_000)
    }

    #[test]
    fn test_one_model_per_root() {
        let roots: BTreeSet<(i64, CardKind)> = [(9, CardKind::Basic), (2, CardKind::Basic), (5, CardKind::Basic)]
            .into_iter()
            .collect();
        let mut counter = IndexCounter::starting_at(1);
        let models = synthesize_models(&roots, &mut counter, &options());

        assert_eq!(models.len(), 3);
        let pairs: Vec<(i64, i64)> = models.iter().map(|m| (m.index, m.root_deck_index)).collect();
        assert_eq!(pairs, vec![(1, 2), (2, 5), (3, 9)]);
        assert!(models.iter().all(|m| m.record.id == m.index && m.record.did == m.root_deck_index));
        assert_eq!(counter.next_index(), 4);
    }

    #[test]
    fn test_one_model_per_kind_under_the_same_root() {
        let roots: BTreeSet<(i64, CardKind)> = [(2, CardKind::LocalizedPhrase), (2, CardKind::Basic)]
            .into_iter()
            .collect();
        let mut counter = IndexCounter::starting_at(1);
        let models = synthesize_models(&roots, &mut counter, &options());

        let kinds: Vec<(i64, CardKind)> = models.iter().map(|m| (m.index, m.kind)).collect();
        assert_eq!(kinds, vec![(1, CardKind::Basic), (2, CardKind::LocalizedPhrase)]);
        assert_eq!(models[0].record.name, "Devman lesson card with input");
        assert_eq!(models[1].record.name, "Devman english card");
    }

    #[test]
    fn test_empty_batch_means_no_models() {
        let mut counter = IndexCounter::starting_at(1);
        assert!(synthesize_models(&BTreeSet::new(), &mut counter, &options()).is_empty());
        assert_eq!(counter.next_index(), 1);
    }

    #[test]
    fn test_basic_model_layout() {
        let record = ModelRecord::new(CardKind::Basic, 1, 2, &options());
        assert_eq!(record.field_names(), vec!["Front", "Input", "Explanation"]);
        assert_eq!(record.name, "Devman lesson card with input");
        assert_eq!(record.tmpls.len(), 1);
        assert_eq!(record.tmpls[0].qfmt, "{{Front}}\n\n{{type:Input}}");
        assert!(record.tmpls[0].afmt.contains("<hr id=answer>"));
        assert!(record.tmpls[0].afmt.contains("{{Explanation}}"));
        assert_eq!(record.css, DEFAULT_STYLESHEET);
        assert_eq!(record.modified, 1_600_000_000);
    }

    #[test]
    fn test_phrase_model_layout() {
        let record = ModelRecord::new(CardKind::LocalizedPhrase, 4, 7, &options());
        assert_eq!(record.field_names(), vec!["Front", "Input", "Back"]);
        assert_eq!(record.name, "Devman english card");
        assert_eq!(record.tmpls[0].qfmt, "{{Front}}\n\n{{type:Input}}");
        assert!(record.tmpls[0].qfmt.contains("{{type:"));
        assert!(record.tmpls[0].afmt.contains("{{type:Input}}"));
        assert!(record.tmpls[0].afmt.contains("{{Back}}"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["req"], serde_json::json!([[0, "any", [0]]]));
    }

    #[test]
    fn test_model_record_json_shape() {
        let record = ModelRecord::new(CardKind::Basic, 1, 2, &options());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["req"], serde_json::json!([[0, "any", [0, 1]]]));
        assert_eq!(json["type"], 0);
        assert_eq!(json["mod"], 1_600_000_000);
        assert_eq!(json["did"], 2);
        assert_eq!(json["flds"][1]["name"], "Input");
        assert_eq!(json["flds"][1]["ord"], 1);
        assert!(json["tmpls"][0]["did"].is_null());
        assert_eq!(json["usn"], -1);
    }
}
