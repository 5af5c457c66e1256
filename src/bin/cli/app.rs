use std::path::Path;

use anyhow::{Context, Result};

use deckpack::config::{default_config_path, load_config, ExportConfig};
use deckpack::flashcards::CardStore;

/// Shared state for CLI commands
pub struct App {
    pub config: ExportConfig,
    pub store: CardStore,
}

impl App {
    /// Load the config (explicit path, else the default location) and the card store
    pub fn new(config_path: Option<&Path>, store_path: &Path) -> Result<Self> {
        let config = match config_path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => load_config(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ExportConfig::default(),
        };

        let store = CardStore::open(store_path)
            .with_context(|| format!("Failed to open card store {}", store_path.display()))?;

        Ok(Self { config, store })
    }
}
