//! SQLite snapshot of the exported collection (`collection.anki2`)
//!
//! Schema follows the Anki 2 collection layout. Decks and models live as
//! JSON inside the single `col` row; `revlog` and `graves` stay empty.

use std::path::Path;

use rusqlite::{params, Connection};

use super::decks::FlattenedDecks;
use super::models::{model_records, NoteModel};
use super::notes::EncodedNote;
use super::Result;

pub const COLLECTION_SCHEMA: &str = r#"
CREATE TABLE col (
    id              INTEGER PRIMARY KEY NOT NULL,
    crt             INTEGER NOT NULL,
    mod             INTEGER NOT NULL,
    scm             INTEGER NOT NULL,
    ver             INTEGER NOT NULL,
    dty             INTEGER NOT NULL,
    usn             INTEGER NOT NULL,
    ls              INTEGER NOT NULL,
    conf            TEXT NOT NULL,
    models          TEXT NOT NULL,
    decks           TEXT NOT NULL,
    dconf           TEXT NOT NULL,
    tags            TEXT NOT NULL
);

CREATE TABLE notes (
    id              INTEGER PRIMARY KEY NOT NULL,
    guid            TEXT NOT NULL,
    mid             INTEGER NOT NULL,
    mod             INTEGER NOT NULL,
    usn             INTEGER NOT NULL,
    tags            TEXT NOT NULL,
    flds            TEXT NOT NULL,
    sfld            INTEGER NOT NULL,
    csum            INTEGER NOT NULL,
    flags           INTEGER NOT NULL,
    data            TEXT NOT NULL
);

CREATE TABLE cards (
    id              INTEGER PRIMARY KEY NOT NULL,
    nid             INTEGER NOT NULL,
    did             INTEGER NOT NULL,
    ord             INTEGER NOT NULL,
    mod             INTEGER NOT NULL,
    usn             INTEGER NOT NULL,
    type            INTEGER NOT NULL,
    queue           INTEGER NOT NULL,
    due             INTEGER NOT NULL,
    ivl             INTEGER NOT NULL,
    factor          INTEGER NOT NULL,
    reps            INTEGER NOT NULL,
    lapses          INTEGER NOT NULL,
    left            INTEGER NOT NULL,
    odue            INTEGER NOT NULL,
    odid            INTEGER NOT NULL,
    flags           INTEGER NOT NULL,
    data            TEXT NOT NULL
);

CREATE TABLE revlog (
    id              INTEGER PRIMARY KEY NOT NULL,
    cid             INTEGER NOT NULL,
    usn             INTEGER NOT NULL,
    ease            INTEGER NOT NULL,
    ivl             INTEGER NOT NULL,
    lastIvl         INTEGER NOT NULL,
    factor          INTEGER NOT NULL,
    time            INTEGER NOT NULL,
    type            INTEGER NOT NULL
);

CREATE TABLE graves (
    id              INTEGER PRIMARY KEY NOT NULL,
    usn             INTEGER NOT NULL,
    oid             INTEGER NOT NULL,
    type            INTEGER NOT NULL
);
"#;

/// Collection schema version Anki 2.0 packages carry
pub const SCHEMA_VERSION: i64 = 11;

/// The singleton `col` row
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    pub created: i64,
    pub modified: i64,
    pub schema_modified: i64,
    pub version: i64,
    pub dirty: i64,
    pub usn: i64,
    pub last_sync: i64,
    pub conf: String,
    pub models: String,
    pub decks: String,
    pub dconf: String,
    pub tags: String,
}

impl CollectionRecord {
    pub fn new(timestamp: i64, decks: &FlattenedDecks, models: &[NoteModel]) -> Result<Self> {
        Ok(Self {
            created: timestamp,
            modified: timestamp,
            schema_modified: timestamp,
            version: SCHEMA_VERSION,
            dirty: 0,
            usn: 0,
            last_sync: 0,
            conf: "{}".to_string(),
            models: serde_json::to_string(&model_records(models))?,
            decks: serde_json::to_string(&decks.records())?,
            dconf: "{}".to_string(),
            tags: "{}".to_string(),
        })
    }
}

/// Scheduling state of a card that has never been reviewed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewCardState {
    pub card_type: i64,
    pub queue: i64,
    pub due: i64,
    pub interval: i64,
    pub factor: i64,
    pub reps: i64,
    pub lapses: i64,
    pub left: i64,
    pub original_due: i64,
    pub original_deck: i64,
    pub flags: i64,
}

pub const NEW_CARD: NewCardState = NewCardState {
    card_type: 0,
    queue: 0,
    due: 9,
    interval: 0,
    factor: 0,
    reps: 0,
    lapses: 0,
    left: 0,
    original_due: 0,
    original_deck: 0,
    flags: 0,
};

/// A note together with the deck its single card goes to
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNote {
    pub note: EncodedNote,
    pub deck_index: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnapshotStats {
    pub notes: usize,
    pub cards: usize,
}

/// Create the schema and write the whole batch in one transaction.
///
/// Any error rolls the transaction back; nothing is left in the database.
pub fn write_collection(
    conn: &mut Connection,
    collection: &CollectionRecord,
    notes: &[PlannedNote],
    timestamp: i64,
) -> Result<SnapshotStats> {
    let tx = conn.transaction()?;

    tx.execute_batch(COLLECTION_SCHEMA)?;

    // The collection row goes in first so note and card ids start from a known state
    tx.execute(
        "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            collection.created,
            collection.modified,
            collection.schema_modified,
            collection.version,
            collection.dirty,
            collection.usn,
            collection.last_sync,
            collection.conf,
            collection.models,
            collection.decks,
            collection.dconf,
            collection.tags,
        ],
    )?;

    let mut stats = SnapshotStats::default();
    {
        let mut insert_note = tx.prepare(
            "INSERT INTO notes (guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
             VALUES (?1, ?2, ?3, -1, '', ?4, ?5, ?6, 0, '')",
        )?;
        let mut insert_card = tx.prepare(
            "INSERT INTO cards (nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps,
                                lapses, left, odue, odid, flags, data)
             VALUES (?1, ?2, 0, ?3, -1, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, '')",
        )?;

        for planned in notes {
            let note = &planned.note;
            let note_id = insert_note.insert(params![
                note.guid,
                note.model_index,
                timestamp,
                note.flds,
                note.sfld,
                note.csum,
            ])?;
            stats.notes += 1;

            insert_card.execute(params![
                note_id,
                planned.deck_index,
                timestamp,
                NEW_CARD.card_type,
                NEW_CARD.queue,
                NEW_CARD.due,
                NEW_CARD.interval,
                NEW_CARD.factor,
                NEW_CARD.reps,
                NEW_CARD.lapses,
                NEW_CARD.left,
                NEW_CARD.original_due,
                NEW_CARD.original_deck,
                NEW_CARD.flags,
            ])?;
            stats.cards += 1;
        }
    }

    tx.commit()?;
    Ok(stats)
}

/// Open (or create) the database file at `path` and write the snapshot into it
pub fn create_snapshot(
    path: &Path,
    collection: &CollectionRecord,
    notes: &[PlannedNote],
    timestamp: i64,
) -> Result<SnapshotStats> {
    let mut conn = Connection::open(path)?;
    let stats = write_collection(&mut conn, collection, notes, timestamp)?;
    conn.close().map_err(|(_, e)| e)?;
    log::info!(
        "Wrote collection snapshot {:?}: {} notes, {} cards",
        path,
        stats.notes,
        stats.cards
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anki::decks::flatten_decks;
    use crate::anki::notes::{split_fields, EncodedNote};
    use crate::flashcards::DeckTree;
    use tempfile::TempDir;

    fn empty_collection() -> CollectionRecord {
        let tree = DeckTree::default();
        let decks = flatten_decks(&tree, &[], 42).unwrap();
        CollectionRecord::new(42, &decks, &[]).unwrap()
    }

    fn planned(guid: &str, front: &str) -> PlannedNote {
        PlannedNote {
            note: EncodedNote::new(guid, 1, vec![front.to_string(), String::new(), String::new()]),
            deck_index: 1,
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_write_collection_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        let notes = vec![planned("g1", "<b>one</b>"), planned("g2", "two")];
        let stats = write_collection(&mut conn, &empty_collection(), &notes, 42).unwrap();

        assert_eq!(stats, SnapshotStats { notes: 2, cards: 2 });
        assert_eq!(count(&conn, "col"), 1);
        assert_eq!(count(&conn, "notes"), 2);
        assert_eq!(count(&conn, "cards"), 2);
        assert_eq!(count(&conn, "revlog"), 0);
        assert_eq!(count(&conn, "graves"), 0);

        let (ver, decks, dconf, tags): (i64, String, String, String) = conn
            .query_row("SELECT ver, decks, dconf, tags FROM col", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .unwrap();
        assert_eq!(ver, 11);
        assert!(decks.contains("\"Default\""));
        assert_eq!(dconf, "{}");
        assert_eq!(tags, "{}");

        let (guid, flds, sfld, csum, usn): (String, String, String, u32, i64) = conn
            .query_row(
                "SELECT guid, flds, sfld, csum, usn FROM notes ORDER BY id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .unwrap();
        assert_eq!(guid, "g1");
        assert_eq!(split_fields(&flds), vec!["<b>one</b>", "", ""]);
        assert_eq!(sfld, "one");
        assert_eq!(csum, notes[0].note.csum);
        assert_eq!(usn, -1);
    }

    #[test]
    fn test_new_card_defaults() {
        let mut conn = Connection::open_in_memory().unwrap();
        write_collection(&mut conn, &empty_collection(), &[planned("g1", "x")], 42).unwrap();

        let row: (i64, i64, i64, i64, i64, i64, i64, String) = conn
            .query_row(
                "SELECT nid, did, ord, type, queue, due, ivl, data FROM cards",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                },
            )
            .unwrap();
        assert_eq!(row, (1, 1, 0, 0, 0, 9, 0, String::new()));
    }

    #[test]
    fn test_failed_write_rolls_back_everything() {
        let mut conn = Connection::open_in_memory().unwrap();
        // A pre-existing `notes` table makes the schema batch fail half way
        conn.execute_batch("CREATE TABLE notes (x INTEGER)").unwrap();

        let result = write_collection(&mut conn, &empty_collection(), &[planned("g1", "x")], 42);
        assert!(result.is_err());

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'col'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_create_snapshot_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("collection.anki2");
        let stats = create_snapshot(&path, &empty_collection(), &[], 42).unwrap();
        assert_eq!(stats, SnapshotStats::default());

        let conn = Connection::open(&path).unwrap();
        assert_eq!(count(&conn, "col"), 1);
        assert_eq!(count(&conn, "notes"), 0);
    }
}
