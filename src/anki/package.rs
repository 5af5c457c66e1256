//! `.apkg` container: the collection database, media files and the media manifest

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::notes::MediaFile;
use super::{ExportError, Result};

/// Entry name Anki looks up the collection database under
pub const COLLECTION_ENTRY: &str = "collection.anki2";
/// Entry mapping media entry names to original file names
pub const MEDIA_MANIFEST_ENTRY: &str = "media";

/// Contents of the `media` entry: `{"0": "voice.mp3", ...}`
pub fn media_manifest(media: &[MediaFile]) -> BTreeMap<String, String> {
    media
        .iter()
        .map(|file| (file.index.to_string(), file.file_name.clone()))
        .collect()
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true)
}

/// Write the package to `output_path`.
///
/// The archive is assembled in a temporary file next to `output_path` and
/// only moved into place once complete, so a failure never leaves a
/// partial package behind.
pub fn write_package(collection_path: &Path, media: &[MediaFile], output_path: &Path) -> Result<()> {
    if let Some(missing) = media.iter().find(|file| !file.source_path.is_file()) {
        return Err(ExportError::MediaMissing(missing.source_path.clone()));
    }

    let output_dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let temp = NamedTempFile::new_in(&output_dir)?;

    {
        let mut zip = ZipWriter::new(temp.as_file());
        let options = entry_options();

        zip.start_file(COLLECTION_ENTRY, options)?;
        io::copy(&mut File::open(collection_path)?, &mut zip)?;

        for file in media {
            log::debug!("Packaging media {:?} as {}", file.source_path, file.index);
            zip.start_file(file.index.to_string(), options)?;
            let mut source = File::open(&file.source_path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ExportError::MediaMissing(file.source_path.clone()),
                _ => ExportError::Io(e),
            })?;
            io::copy(&mut source, &mut zip)?;
        }

        let manifest = serde_json::to_string(&media_manifest(media))?;
        zip.start_file(MEDIA_MANIFEST_ENTRY, options)?;
        zip.write_all(manifest.as_bytes())?;

        zip.finish()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(output_path)?;
    log::info!("Wrote package {:?} with {} media files", output_path, media.len());
    Ok(())
}

/// What a package contains, read back from disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub entries: Vec<String>,
    pub media: BTreeMap<String, String>,
    pub deck_names: Vec<String>,
    pub model_names: Vec<String>,
    pub notes: i64,
    pub cards: i64,
}

/// Read a package back and summarize it
pub fn inspect_package(path: &Path) -> Result<PackageSummary> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let entries: Vec<String> = archive.file_names().map(str::to_string).collect();

    let media: BTreeMap<String, String> = match archive.index_for_name(MEDIA_MANIFEST_ENTRY) {
        Some(index) => {
            let mut contents = String::new();
            archive.by_index(index)?.read_to_string(&mut contents)?;
            serde_json::from_str(&contents)?
        }
        None => BTreeMap::new(),
    };

    let Some(collection_index) = archive.index_for_name(COLLECTION_ENTRY) else {
        return Err(ExportError::Io(io::Error::other(format!(
            "Invalid package: {} not found",
            COLLECTION_ENTRY
        ))));
    };

    // SQLite needs a real file to open
    let mut db_file = NamedTempFile::new()?;
    io::copy(&mut archive.by_index(collection_index)?, db_file.as_file_mut())?;
    db_file.as_file().sync_all()?;

    let conn = Connection::open_with_flags(db_file.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let (decks_json, models_json): (String, String) =
        conn.query_row("SELECT decks, models FROM col", [], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let notes: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
    let cards: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;

    Ok(PackageSummary {
        entries,
        media,
        deck_names: record_names(&decks_json)?,
        model_names: record_names(&models_json)?,
        notes,
        cards,
    })
}

/// Names of the records in a `col.decks`/`col.models` blob, ordered by index
fn record_names(json: &str) -> Result<Vec<String>> {
    let records: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
    let mut named: Vec<(i64, String)> = records
        .iter()
        .map(|(key, record)| {
            let index = key.parse().unwrap_or(i64::MAX);
            let name = record["name"].as_str().unwrap_or_default().to_string();
            (index, name)
        })
        .collect();
    named.sort();
    Ok(named.into_iter().map(|(_, name)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_dummy_collection(dir: &Path) -> PathBuf {
        let path = dir.join("source.anki2");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE col (decks TEXT, models TEXT);
             INSERT INTO col VALUES ('{\"1\": {\"name\": \"Default\"}}', '{}');
             CREATE TABLE notes (id INTEGER);
             CREATE TABLE cards (id INTEGER);",
        )
        .unwrap();
        path
    }

    fn media_file(dir: &Path, index: usize, name: &str, contents: &[u8]) -> MediaFile {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        MediaFile {
            index,
            source_path: path,
            file_name: name.to_string(),
        }
    }

    #[test]
    fn test_package_layout() {
        let temp_dir = TempDir::new().unwrap();
        let collection = write_dummy_collection(temp_dir.path());
        let media = vec![
            media_file(temp_dir.path(), 0, "run.mp3", b"RUN"),
            media_file(temp_dir.path(), 1, "walk.mp3", b"WALK"),
        ];
        let output = temp_dir.path().join("out.apkg");

        write_package(&collection, &media, &output).unwrap();

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["0", "1", "collection.anki2", "media"]);

        let mut contents = Vec::new();
        archive.by_name("1").unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"WALK");

        let mut manifest = String::new();
        archive.by_name("media").unwrap().read_to_string(&mut manifest).unwrap();
        assert_eq!(manifest, r#"{"0":"run.mp3","1":"walk.mp3"}"#);

        let entry = archive.by_name("collection.anki2").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
    }

    #[test]
    fn test_empty_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let collection = write_dummy_collection(temp_dir.path());
        let output = temp_dir.path().join("empty.apkg");

        write_package(&collection, &[], &output).unwrap();

        let summary = inspect_package(&output).unwrap();
        assert!(summary.media.is_empty());
        assert_eq!(summary.deck_names, vec!["Default".to_string()]);
        assert_eq!(summary.notes, 0);

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut manifest = String::new();
        archive.by_name("media").unwrap().read_to_string(&mut manifest).unwrap();
        assert_eq!(manifest, "{}");
    }

    #[test]
    fn test_missing_media_leaves_no_package() {
        let temp_dir = TempDir::new().unwrap();
        let collection = write_dummy_collection(temp_dir.path());
        let media = vec![MediaFile {
            index: 0,
            source_path: temp_dir.path().join("gone.mp3"),
            file_name: "gone.mp3".to_string(),
        }];
        let output = temp_dir.path().join("out.apkg");

        let result = write_package(&collection, &media, &output);
        assert!(matches!(result, Err(ExportError::MediaMissing(path)) if path.ends_with("gone.mp3")));
        assert!(!output.exists());

        // Only the inputs remain; no stray temporary archive
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_media_manifest_keys() {
        let media = vec![MediaFile {
            index: 0,
            source_path: PathBuf::from("/media/acting_voices/run.mp3"),
            file_name: "run.mp3".to_string(),
        }];
        let manifest = media_manifest(&media);
        assert_eq!(manifest.get("0").map(String::as_str), Some("run.mp3"));
    }
}
