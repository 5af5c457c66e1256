use std::path::Path;

use anyhow::{Context, Result};

use crate::OutputFormat;
use deckpack::anki::inspect_package;

pub fn run(path: &Path, format: &OutputFormat) -> Result<()> {
    let summary = inspect_package(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Plain => {
            println!("{}", path.display());
            println!("  notes: {}, cards: {}", summary.notes, summary.cards);
            println!("  decks:");
            for name in &summary.deck_names {
                println!("    {}", name);
            }
            println!("  models:");
            for name in &summary.model_names {
                println!("    {}", name);
            }
            if summary.media.is_empty() {
                println!("  media: none");
            } else {
                println!("  media:");
                for (entry, name) in &summary.media {
                    println!("    {} -> {}", entry, name);
                }
            }
        }
    }

    Ok(())
}
