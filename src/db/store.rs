use std::rc::Rc;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Thin key/value facade over the `records` table. Cloning is cheap and every
/// clone talks to the same connection, so the library and the view-state
/// store can share one database file.
#[derive(Clone)]
pub struct RecordStore {
    conn: Rc<Connection>,
}

impl RecordStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Rc::new(conn),
        }
    }

    /// Fetch the raw document stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or overwrite the document stored under `key`.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO records (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete `key`, reporting whether a row existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM records WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    /// Write `key` and drop `obsolete` in one transaction. Used by the legacy
    /// migration so a crash cannot leave both records behind.
    pub fn put_and_remove(&self, key: &str, value: &str, obsolete: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO records (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        tx.execute("DELETE FROM records WHERE key = ?1", params![obsolete])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn store() -> RecordStore {
        RecordStore::new(open_in_memory().unwrap())
    }

    #[test]
    fn put_overwrites_existing_value() {
        let store = store();
        store.put("k", "one").unwrap();
        store.put("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn remove_reports_missing_rows() {
        let store = store();
        assert!(!store.remove("absent").unwrap());
        store.put("k", "v").unwrap();
        assert!(store.remove("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn put_and_remove_swaps_records() {
        let store = store();
        store.put("old", "legacy").unwrap();
        store.put_and_remove("new", "fresh", "old").unwrap();
        assert_eq!(store.get("old").unwrap(), None);
        assert_eq!(store.get("new").unwrap().as_deref(), Some("fresh"));
    }
}
