use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;
use deckpack::download::{download_deck, DownloadRequest};

pub fn run(app: &App, request: &DownloadRequest, output_dir: &Path, format: &OutputFormat) -> Result<()> {
    let response = download_deck(&app.store, request, &app.config)?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let path = output_dir.join(&response.file_name);
    fs::write(&path, &response.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": path.to_string_lossy(),
                "bytes": response.bytes.len(),
                "summary": response.summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let summary = &response.summary;
            println!("Wrote {} ({} bytes)", path.display(), response.bytes.len());
            println!(
                "  {} notes in {} decks, {} models, {} media files",
                summary.notes, summary.decks, summary.models, summary.media
            );
        }
    }

    Ok(())
}
