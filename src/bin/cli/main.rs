mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deckpack", about = "Export flashcard decks as Anki packages", version)]
struct Cli {
    /// Config file (default: <config dir>/deckpack/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Export decks (with their subdecks) into an .apkg file
    Export {
        /// Card store JSON file
        #[arg(long)]
        store: PathBuf,
        /// Deck slug, repeatable
        #[arg(long = "deck", required = true)]
        decks: Vec<String>,
        /// Only cards of this lesson, repeatable
        #[arg(long = "lesson")]
        lessons: Vec<String>,
        /// Only cards of this enhancement, repeatable
        #[arg(long = "enhancement")]
        enhancements: Vec<String>,
        /// Package file name (defaults to the configured name)
        #[arg(long)]
        name: Option<String>,
        /// Directory to write the package into
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },

    /// Show the deck hierarchy of a card store
    Tree {
        /// Card store JSON file
        #[arg(long)]
        store: PathBuf,
    },

    /// Print the search field and checksum Anki would store for a field
    Checksum {
        /// Field HTML (use "-" or omit to read from stdin)
        text: Option<String>,
    },

    /// Summarize an existing .apkg file
    Inspect {
        /// Package path
        file: PathBuf,
    },
}

/// Resolve "-" (or nothing) as stdin
fn resolve_text(text: Option<String>) -> anyhow::Result<String> {
    match text.as_deref() {
        Some("-") | None => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)?;
            // Shell pipes end with a newline that is not part of the field
            let trimmed = buf.strip_suffix('\n').map(str::to_string);
            Ok(trimmed.unwrap_or(buf))
        }
        Some(_) => Ok(text.unwrap_or_default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Export {
            store,
            decks,
            lessons,
            enhancements,
            name,
            output,
        } => {
            let app = app::App::new(cli.config.as_deref(), &store)?;
            let request = deckpack::DownloadRequest {
                decks,
                lessons,
                enhancements,
                name,
            };
            commands::export::run(&app, &request, &output, &cli.format)?;
        }
        Command::Tree { store } => {
            let app = app::App::new(cli.config.as_deref(), &store)?;
            commands::tree::run(&app, &cli.format)?;
        }
        Command::Checksum { text } => {
            let text = resolve_text(text)?;
            commands::checksum::run(&text, &cli.format)?;
        }
        Command::Inspect { file } => {
            commands::inspect::run(&file, &cli.format)?;
        }
    }

    Ok(())
}
