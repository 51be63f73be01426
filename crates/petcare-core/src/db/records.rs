//! Generic record storage for pets, immunizations, diabetes logs and medical documents.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};

/// Which domain a stored record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Pet,
    Immunization,
    Diabetes,
    MedicalDocument,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Pet => "pet",
            RecordKind::Immunization => "immunization",
            RecordKind::Diabetes => "diabetes",
            RecordKind::MedicalDocument => "medical_document",
        }
    }
}

/// One row of the `records` table. `body` is the domain record as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntry {
    pub id: String,
    pub kind: RecordKind,
    pub owner_id: Option<String>,
    pub pet_id: Option<String>,
    pub body: String,
}

impl Database {
    /// Insert a new record.
    pub fn insert_record(&self, entry: &RecordEntry) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO records (id, kind, owner_id, pet_id, body)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.id,
                entry.kind.as_str(),
                entry.owner_id,
                entry.pet_id,
                entry.body,
            ],
        )?;
        Ok(())
    }

    /// Replace the body (and pet link) of an existing record.
    pub fn update_record(&self, entry: &RecordEntry) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE records SET
                pet_id = ?3,
                body = ?4,
                updated_at = datetime('now')
            WHERE id = ?1 AND kind = ?2
            "#,
            params![entry.id, entry.kind.as_str(), entry.pet_id, entry.body],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a record by kind and ID.
    pub fn get_record(&self, kind: RecordKind, id: &str) -> DbResult<Option<RecordEntry>> {
        self.conn
            .query_row(
                r#"
                SELECT id, kind, owner_id, pet_id, body
                FROM records
                WHERE id = ?1 AND kind = ?2
                "#,
                params![id, kind.as_str()],
                record_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Delete a record.
    pub fn delete_record(&self, kind: RecordKind, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM records WHERE id = ?1 AND kind = ?2",
            params![id, kind.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// List records of a kind owned by a user, oldest first.
    pub fn list_records_for_owner(&self, kind: RecordKind, owner_id: &str) -> DbResult<Vec<RecordEntry>> {
        self.list_records_where("owner_id", kind, owner_id)
    }

    /// List records of a kind attached to a pet, oldest first.
    pub fn list_records_for_pet(&self, kind: RecordKind, pet_id: &str) -> DbResult<Vec<RecordEntry>> {
        self.list_records_where("pet_id", kind, pet_id)
    }

    fn list_records_where(&self, column: &str, kind: RecordKind, value: &str) -> DbResult<Vec<RecordEntry>> {
        let sql = format!(
            r#"
            SELECT id, kind, owner_id, pet_id, body
            FROM records
            WHERE kind = ?1 AND {column} = ?2
            ORDER BY created_at, rowid
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.as_str(), value], record_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }
}

fn record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        owner_id: row.get(2)?,
        pet_id: row.get(3)?,
        body: row.get(4)?,
    })
}

/// Intermediate row struct for database mapping.
struct RecordRow {
    id: String,
    kind: String,
    owner_id: Option<String>,
    pet_id: Option<String>,
    body: String,
}

impl TryFrom<RecordRow> for RecordEntry {
    type Error = DbError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(RecordEntry {
            id: row.id,
            kind: string_to_kind(&row.kind)?,
            owner_id: row.owner_id,
            pet_id: row.pet_id,
            body: row.body,
        })
    }
}

fn string_to_kind(s: &str) -> Result<RecordKind, DbError> {
    match s {
        "pet" => Ok(RecordKind::Pet),
        "immunization" => Ok(RecordKind::Immunization),
        "diabetes" => Ok(RecordKind::Diabetes),
        "medical_document" => Ok(RecordKind::MedicalDocument),
        _ => Err(DbError::Constraint(format!("Unknown record kind: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, kind: RecordKind, owner: &str, pet: &str) -> RecordEntry {
        RecordEntry {
            id: id.to_string(),
            kind,
            owner_id: Some(owner.to_string()),
            pet_id: Some(pet.to_string()),
            body: format!(r#"{{"id":"{id}"}}"#),
        }
    }

    #[test]
    fn test_insert_get_update_delete() {
        let db = Database::open_in_memory().unwrap();
        let mut record = entry("r1", RecordKind::Immunization, "owner-1", "pet-1");
        db.insert_record(&record).unwrap();
        assert_eq!(db.get_record(RecordKind::Immunization, "r1").unwrap(), Some(record.clone()));

        record.body = r#"{"id":"r1","edited":true}"#.to_string();
        assert!(db.update_record(&record).unwrap());
        assert_eq!(
            db.get_record(RecordKind::Immunization, "r1").unwrap().unwrap().body,
            record.body
        );

        assert!(db.delete_record(RecordKind::Immunization, "r1").unwrap());
        assert!(!db.delete_record(RecordKind::Immunization, "r1").unwrap());
        assert!(db.get_record(RecordKind::Immunization, "r1").unwrap().is_none());
    }

    #[test]
    fn test_kind_scopes_lookups() {
        let db = Database::open_in_memory().unwrap();
        db.insert_record(&entry("r1", RecordKind::Diabetes, "owner-1", "pet-1")).unwrap();
        assert!(db.get_record(RecordKind::Pet, "r1").unwrap().is_none());
        assert!(db.list_records_for_pet(RecordKind::MedicalDocument, "pet-1").unwrap().is_empty());
    }

    #[test]
    fn test_list_by_owner_and_pet() {
        let db = Database::open_in_memory().unwrap();
        db.insert_record(&entry("r1", RecordKind::MedicalDocument, "owner-1", "pet-1")).unwrap();
        db.insert_record(&entry("r2", RecordKind::MedicalDocument, "owner-1", "pet-2")).unwrap();
        db.insert_record(&entry("r3", RecordKind::MedicalDocument, "owner-2", "pet-3")).unwrap();

        let owned = db.list_records_for_owner(RecordKind::MedicalDocument, "owner-1").unwrap();
        let ids: Vec<_> = owned.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);

        let for_pet = db.list_records_for_pet(RecordKind::MedicalDocument, "pet-3").unwrap();
        assert_eq!(for_pet.len(), 1);
        assert_eq!(for_pet[0].owner_id.as_deref(), Some("owner-2"));
    }
}
