use anyhow::Result;

use crate::OutputFormat;
use deckpack::anki::notes::{field_checksum, field_digest, search_field};

pub fn run(text: &str, format: &OutputFormat) -> Result<()> {
    let sfld = search_field(text);
    let csum = field_checksum(&sfld);
    let sha1 = hex::encode(field_digest(&sfld));

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "sfld": sfld,
                "csum": csum,
                "sha1": sha1,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("sfld: {}", sfld);
            println!("csum: {}", csum);
            println!("sha1: {}", sha1);
        }
    }

    Ok(())
}
