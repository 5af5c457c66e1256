use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;
use deckpack::flashcards::{Deck, DeckTree};

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let tree = app.store.tree();

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = tree.roots().into_iter().map(|d| deck_json(tree, d)).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let roots = tree.roots();
            for (idx, deck) in roots.iter().enumerate() {
                print_deck(tree, deck, app, "", idx + 1 == roots.len());
            }
        }
    }

    Ok(())
}

fn card_count(app: &App, deck: &Deck) -> usize {
    app.store
        .cards()
        .iter()
        .filter(|card| card.published && card.deck_id == Some(deck.id))
        .count()
}

fn print_deck(tree: &DeckTree, deck: &Deck, app: &App, prefix: &str, is_last: bool) {
    let connector = if is_last { "\u{2514}\u{2500}\u{2500} " } else { "\u{251c}\u{2500}\u{2500} " };
    println!("{}{}{} [{}] ({})", prefix, connector, deck.name, deck.slug, card_count(app, deck));

    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "\u{2502}   " });
    let children = tree.children(deck.id);
    for (idx, child) in children.iter().enumerate() {
        print_deck(tree, child, app, &child_prefix, idx + 1 == children.len());
    }
}

fn deck_json(tree: &DeckTree, deck: &Deck) -> serde_json::Value {
    serde_json::json!({
        "id": deck.id,
        "name": deck.name,
        "slug": deck.slug,
        "fullName": tree.full_name(deck.id),
        "children": tree
            .children(deck.id)
            .into_iter()
            .map(|child| deck_json(tree, child))
            .collect::<Vec<_>>(),
    })
}
