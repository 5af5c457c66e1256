//! Note encoding: fields, search field, checksum and media references

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use sha1::{Digest, Sha1};

use super::ExportOptions;
use crate::flashcards::{BasicCard, CardDetail, PhraseCard, SourceCard};

/// Separator between the fields of `notes.flds`
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Join note fields the way Anki stores them. No trailing separator.
pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut joined = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            joined.push(FIELD_SEPARATOR);
        }
        joined.push_str(field.as_ref());
    }
    joined
}

pub fn split_fields(flds: &str) -> Vec<&str> {
    flds.split(FIELD_SEPARATOR).collect()
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap())
}

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Plain text of an HTML fragment: comments, scripts, styles and tags
/// removed, entities decoded. Whitespace is left alone.
pub fn strip_html(html: &str) -> String {
    let text = comment_re().replace_all(html, "");
    let text = script_style_re().replace_all(&text, "");
    let text = tag_re().replace_all(&text, "");
    html_escape::decode_html_entities(&text).into_owned()
}

/// Search field derived from a note's first field
pub fn search_field(first_field: &str) -> String {
    strip_html(first_field).trim().to_string()
}

/// Raw SHA-1 digest of the text
pub fn field_digest(text: &str) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Anki's duplicate-detection checksum: the first 8 hex digits of the
/// SHA-1 digest read as an integer.
pub fn field_checksum(text: &str) -> u32 {
    let digest = field_digest(text);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// A fully encoded note, ready for the `notes` table
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedNote {
    pub guid: String,
    pub model_index: i64,
    pub fields: Vec<String>,
    pub flds: String,
    pub sfld: String,
    pub csum: u32,
}

impl EncodedNote {
    pub fn new(guid: &str, model_index: i64, fields: Vec<String>) -> Self {
        let flds = join_fields(&fields);
        let sfld = fields.first().map(|f| search_field(f)).unwrap_or_default();
        let csum = field_checksum(&sfld);
        Self {
            guid: guid.to_string(),
            model_index,
            fields,
            flds,
            sfld,
            csum,
        }
    }
}

/// A media file referenced by some note
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    /// Position in the package; also the zip entry name
    pub index: usize,
    pub source_path: PathBuf,
    /// Name the importing application stores the file under
    pub file_name: String,
}

/// Media files in encounter order, one entry per distinct source path.
///
/// Indices count distinct files, not audio-bearing cards: a file shared by
/// several cards keeps the index of its first use.
#[derive(Debug, Default)]
pub struct MediaRegistry {
    files: Vec<MediaFile>,
    by_path: HashMap<PathBuf, usize>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file, returning its existing entry if already seen
    pub fn register(&mut self, source_path: &Path) -> &MediaFile {
        if let Some(index) = self.by_path.get(source_path) {
            return &self.files[*index];
        }

        let file_name = source_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| source_path.to_string_lossy().to_string());
        if self.files.iter().any(|f| f.file_name == file_name) {
            log::warn!(
                "Media file name {} is used by more than one source file, the importer will keep only one",
                file_name
            );
        }

        let index = self.files.len();
        self.files.push(MediaFile {
            index,
            source_path: source_path.to_path_buf(),
            file_name,
        });
        self.by_path.insert(source_path.to_path_buf(), index);
        &self.files[index]
    }

    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<MediaFile> {
        self.files
    }
}

/// Turns source cards into notes, collecting media along the way
pub struct NoteEncoder<'a> {
    options: &'a ExportOptions,
    media: MediaRegistry,
}

impl<'a> NoteEncoder<'a> {
    pub fn new(options: &'a ExportOptions) -> Self {
        Self {
            options,
            media: MediaRegistry::new(),
        }
    }

    pub fn encode(&mut self, card: &SourceCard, model_index: i64) -> EncodedNote {
        let fields = match &card.detail {
            CardDetail::Basic(basic) => self.basic_fields(card, basic),
            CardDetail::LocalizedPhrase(phrase) => self.phrase_fields(phrase),
        };
        EncodedNote::new(&card.guid, model_index, fields)
    }

    pub fn media(&self) -> &MediaRegistry {
        &self.media
    }

    pub fn into_media(self) -> MediaRegistry {
        self.media
    }

    fn basic_fields(&self, card: &SourceCard, basic: &BasicCard) -> Vec<String> {
        let explanation = format!("{}{}", basic.explanation, self.feedback_link(&card.guid));
        vec![basic.front.clone(), basic.answer.clone(), explanation]
    }

    fn feedback_link(&self, guid: &str) -> String {
        format!(
            "\n<a class=\"feedback-link\" href=\"{}?card={}\">{}</a>\n",
            html_escape::encode_double_quoted_attribute(&self.options.feedback_form_url),
            html_escape::encode_double_quoted_attribute(guid),
            html_escape::encode_text(&self.options.feedback_link_text),
        )
    }

    fn phrase_fields(&mut self, phrase: &PhraseCard) -> Vec<String> {
        let mut front = vec![phrase.word.clone(), phrase.phrase.clone()];
        match phrase.acting_voice.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(voice) => {
                let path = self.options.media_root.join(voice);
                let media = self.media.register(&path);
                log::debug!("Card audio {:?} packaged as {}", media.source_path, media.index);
                front.push(format!("[sound:{}]", media.file_name));
            }
            None => log::warn!(
                "Phrase card {:?} has no acting voice, exporting without audio",
                phrase.word
            ),
        }

        let mut back = vec![phrase.phrase_translation.clone(), phrase.word_translation.clone()];
        if !phrase.article_link.is_empty() {
            let href = html_escape::encode_double_quoted_attribute(&phrase.article_link);
            back.push(format!("<a class=\"article-link\" href=\"{}\">{}</a>", href, href));
        }

        vec![
            join_non_empty(&front),
            phrase.word_translation.clone(),
            join_non_empty(&back),
        ]
    }
}

fn join_non_empty(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// File names referenced by `[sound:...]` directives in a field
pub fn sound_references(field: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\[sound:([^\]]+)\]").unwrap());
    re.captures_iter(field).map(|caps| caps[1].to_string()).collect()
}
