//! Export configuration
//!
//! Read from a TOML file, by default `<config dir>/deckpack/config.toml`.
//! Every key is optional:
//! ```toml
//! feedback_form_url = "https://dvmn.org/anki/feedback/"
//! feedback_link_text = "Сообщить о проблеме"
//! basic_model_name = "Devman lesson card with input"
//! phrase_model_name = "Devman english card"
//! stylesheet = "/path/to/cards.css"
//! media_root = "/srv/media"
//! default_file_name = "devman_decks.apkg"
//! shuffle = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anki::{ExportOptions, DEFAULT_STYLESHEET};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Form the feedback link on basic cards points to
    pub feedback_form_url: String,
    pub feedback_link_text: String,
    pub basic_model_name: String,
    pub phrase_model_name: String,
    /// CSS file replacing the built-in stylesheet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<PathBuf>,
    /// Directory audio paths are relative to
    pub media_root: PathBuf,
    /// Package name used when a request names none
    pub default_file_name: String,
    /// Shuffle cards before export
    pub shuffle: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let options = ExportOptions::at(0);
        Self {
            feedback_form_url: options.feedback_form_url,
            feedback_link_text: options.feedback_link_text,
            basic_model_name: options.basic_model_name,
            phrase_model_name: options.phrase_model_name,
            stylesheet: None,
            media_root: options.media_root,
            default_file_name: "devman_decks.apkg".to_string(),
            shuffle: true,
        }
    }
}

impl ExportConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Options for an export happening at `timestamp`.
    ///
    /// Reads the stylesheet override from disk when one is configured.
    pub fn export_options(&self, timestamp: i64) -> Result<ExportOptions> {
        let stylesheet = match &self.stylesheet {
            Some(path) => fs::read_to_string(path)?,
            None => DEFAULT_STYLESHEET.to_string(),
        };

        Ok(ExportOptions {
            timestamp,
            feedback_form_url: self.feedback_form_url.clone(),
            feedback_link_text: self.feedback_link_text.clone(),
            basic_model_name: self.basic_model_name.clone(),
            phrase_model_name: self.phrase_model_name.clone(),
            stylesheet,
            media_root: self.media_root.clone(),
        })
    }
}

/// Default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deckpack").join("config.toml"))
}

/// Load the config at `path`, falling back to defaults when the file does not exist
pub fn load_config(path: &Path) -> Result<ExportConfig> {
    if !path.exists() {
        log::debug!("No config at {:?}, using defaults", path);
        return Ok(ExportConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config = ExportConfig::from_toml(&content)?;
    log::info!("Loaded config from {:?}", path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.feedback_form_url, "https://dvmn.org/anki/feedback/");
        assert_eq!(config.default_file_name, "devman_decks.apkg");
        assert!(config.shuffle);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "shuffle = false\nmedia_root = \"/srv/media\"\nbasic_model_name = \"Cards\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert!(!config.shuffle);
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.basic_model_name, "Cards");
        assert_eq!(config.phrase_model_name, "Devman english card");
    }

    #[test]
    fn test_invalid_toml() {
        let result = ExportConfig::from_toml("shuffle = \"sometimes\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_export_options_reads_stylesheet() {
        let temp_dir = TempDir::new().unwrap();
        let css = temp_dir.path().join("cards.css");
        fs::write(&css, ".card { color: red; }").unwrap();

        let config = ExportConfig {
            stylesheet: Some(css),
            feedback_link_text: "Report".to_string(),
            ..ExportConfig::default()
        };
        let options = config.export_options(77).unwrap();
        assert_eq!(options.timestamp, 77);
        assert_eq!(options.stylesheet, ".card { color: red; }");
        assert_eq!(options.feedback_link_text, "Report");

        let defaults = ExportConfig::default().export_options(77).unwrap();
        assert_eq!(defaults.stylesheet, DEFAULT_STYLESHEET);
    }

    #[test]
    fn test_missing_stylesheet_is_an_error() {
        let config = ExportConfig {
            stylesheet: Some(PathBuf::from("/nonexistent/cards.css")),
            ..ExportConfig::default()
        };
        assert!(matches!(config.export_options(0), Err(ConfigError::Io(_))));
    }
}
