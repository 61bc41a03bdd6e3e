//! Persistent teardown log using redb.
//!
//! # Table design
//!
//! A single `TEARDOWN` table uses a 24-byte composite key:
//! ```text
//! [ sequence: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//!
//! The sequence is one past the current last key, assigned inside the
//! append's write transaction, so key order is persistence order and a
//! plain forward scan lists entries oldest first. Values are JSON-encoded
//! [`TeardownAction`]s.

use std::fmt::Display;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::{DeckError, Result};
use crate::saga::{TeardownAction, TeardownLog};
use crate::types::ContextId;

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

const TEARDOWN: TableDefinition<&[u8], &[u8]> = TableDefinition::new("teardown");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn entry_key(seq: u64, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&seq.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn key_seq(key: &[u8]) -> u64 {
    let mut seq = [0u8; 8];
    seq.copy_from_slice(&key[..8]);
    u64::from_be_bytes(seq)
}

fn key_id(key: &[u8]) -> Option<Uuid> {
    Uuid::from_slice(key.get(8..24)?).ok()
}

fn db_err(e: impl Display) -> DeckError {
    DeckError::TeardownDb(e.to_string())
}

// ---------------------------------------------------------------------------
// TeardownDb
// ---------------------------------------------------------------------------

pub struct TeardownDb {
    db: Database,
}

impl TeardownDb {
    /// Open or create the database at `path`, creating the table so reads
    /// on a fresh file succeed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(TEARDOWN).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }
}

impl TeardownLog for TeardownDb {
    fn append(&self, action: &TeardownAction) -> Result<()> {
        let value = serde_json::to_vec(action).map_err(db_err)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(TEARDOWN).map_err(db_err)?;
            let next = table
                .last()
                .map_err(db_err)?
                .map(|(k, _)| key_seq(k.value()) + 1)
                .unwrap_or(0);
            let key = entry_key(next, action.id);
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn list(&self, context: Option<&ContextId>) -> Result<Vec<TeardownAction>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TEARDOWN).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let action: TeardownAction = serde_json::from_slice(v.value()).map_err(db_err)?;
            if context.is_none() || action.owning_context.as_ref() == context {
                result.push(action);
            }
        }
        Ok(result)
    }

    fn remove(&self, ids: &[Uuid]) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(TEARDOWN).map_err(db_err)?;
            let mut doomed = Vec::new();
            for entry in table.iter().map_err(db_err)? {
                let (k, _) = entry.map_err(db_err)?;
                let key = k.value();
                if key_id(key).is_some_and(|id| ids.contains(&id)) {
                    doomed.push(key.to_vec());
                }
            }
            for key in doomed {
                table.remove(key.as_slice()).map_err(db_err)?;
            }
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saga::Compensation;
    use crate::types::ActionId;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, TeardownDb) {
        let dir = TempDir::new().unwrap();
        let db = TeardownDb::open(&dir.path().join(".deckpipe/teardown.db")).unwrap();
        (dir, db)
    }

    fn entry(action: &str, context: Option<&str>) -> TeardownAction {
        TeardownAction::new(
            ActionId::new(action),
            context.map(ContextId::new),
            Compensation::CloseSecondaryApp {
                window_id: action.to_string(),
            },
        )
    }

    #[test]
    fn empty_db_lists_nothing() {
        let (_dir, db) = open_tmp();
        assert!(db.list(None).unwrap().is_empty());
    }

    #[test]
    fn list_is_in_persistence_order() {
        let (_dir, db) = open_tmp();
        // Random uuids must not influence order.
        for name in ["first", "second", "third", "fourth"] {
            db.append(&entry(name, None)).unwrap();
        }
        let names: Vec<_> = db
            .list(None)
            .unwrap()
            .into_iter()
            .map(|a| a.action_id.to_string())
            .collect();
        assert_eq!(names, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn list_filters_by_context() {
        let (_dir, db) = open_tmp();
        db.append(&entry("a", Some("app-1"))).unwrap();
        db.append(&entry("b", Some("app-2"))).unwrap();
        db.append(&entry("c", None)).unwrap();

        let one = db.list(Some(&ContextId::new("app-1"))).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].action_id, ActionId::new("a"));
        assert_eq!(db.list(None).unwrap().len(), 3);
    }

    #[test]
    fn remove_drops_only_named_entries() {
        let (_dir, db) = open_tmp();
        let a = entry("a", None);
        let b = entry("b", None);
        let c = entry("c", None);
        for e in [&a, &b, &c] {
            db.append(e).unwrap();
        }
        db.remove(&[a.id, c.id]).unwrap();
        let left = db.list(None).unwrap();
        assert_eq!(left, vec![b]);

        // Unknown ids are ignored.
        db.remove(&[Uuid::new_v4()]).unwrap();
        assert_eq!(db.list(None).unwrap().len(), 1);
    }

    #[test]
    fn sequence_continues_after_removal_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("teardown.db");
        {
            let db = TeardownDb::open(&path).unwrap();
            let a = entry("a", None);
            db.append(&a).unwrap();
            db.append(&entry("b", None)).unwrap();
            db.remove(&[a.id]).unwrap();
        }
        let db = TeardownDb::open(&path).unwrap();
        db.append(&entry("c", None)).unwrap();
        let names: Vec<_> = db
            .list(None)
            .unwrap()
            .into_iter()
            .map(|a| a.action_id.to_string())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn key_layout() {
        let id = Uuid::new_v4();
        let key = entry_key(7, id);
        assert_eq!(key_seq(&key), 7);
        assert_eq!(key_id(&key), Some(id));
        assert!(entry_key(1, Uuid::from_bytes([0xff; 16])) < entry_key(2, Uuid::nil()));
    }
}
