//! Hospital directory operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

impl Database {
    /// Add or rename a hospital.
    pub fn upsert_hospital(&self, id: &str, name: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO hospitals (id, name) VALUES (?1, ?2)
            ON CONFLICT (id) DO UPDATE SET name = excluded.name
            "#,
            params![id, name],
        )?;
        Ok(())
    }

    /// Display name of a hospital.
    pub fn get_hospital_name(&self, id: &str) -> DbResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT name FROM hospitals WHERE id = ?", [id], |row| row.get(0))
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_rename() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_hospital_name("h1").unwrap(), None);

        db.upsert_hospital("h1", "Green Valley Pet Hospital").unwrap();
        assert_eq!(db.get_hospital_name("h1").unwrap().as_deref(), Some("Green Valley Pet Hospital"));

        db.upsert_hospital("h1", "Green Valley Animal Clinic").unwrap();
        assert_eq!(db.get_hospital_name("h1").unwrap().as_deref(), Some("Green Valley Animal Clinic"));
    }
}
