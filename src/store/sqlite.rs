use log::{debug, Level};
use logging_timer::timer;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::db::Database;
use crate::error::UnmigratorError;
use crate::formats::FormatTag;
use crate::markup;
use crate::records::{Record, RecordId};

use super::{AttachmentRenderer, RecordQuery, RecordStore};

/// [`RecordStore`] and [`AttachmentRenderer`] over the SQLite record database.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All side-car entries for a record, ordered by key.
    pub fn all_meta(&self, record_id: RecordId) -> Result<Vec<(String, String)>, UnmigratorError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT meta_key, meta_value
             FROM record_meta
             WHERE record_id = ?
             ORDER BY meta_key ASC",
        )?;

        let rows = stmt.query_map([record_id], |row| Ok((row.get(0)?, row.get(1)?)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(UnmigratorError::DatabaseError)
    }

    /// Renders the query's filter as a single WHERE clause.
    ///
    /// Each format arm becomes `format = ? AND EXISTS (side-car key in ...)`,
    /// with the stored tag trimmed and lowercased the same way
    /// [`FormatTag::from_stored`] reads it;
    /// the arms are OR'ed together and the exclusion key becomes a
    /// NOT EXISTS probe. Keys and format names are bound, never inlined.
    fn where_clause(query: &RecordQuery) -> (String, Vec<Value>) {
        let mut values: Vec<Value> = Vec::new();
        let mut arms: Vec<String> = Vec::new();

        for filter in &query.formats {
            values.push(Value::Text(filter.format.as_ref().to_owned()));

            if filter.any_key.is_empty() {
                arms.push("(lower(trim(r.format)) = ?)".to_owned());
                continue;
            }

            let placeholders = vec!["?"; filter.any_key.len()].join(", ");
            values.extend(filter.any_key.iter().map(|key| Value::Text((*key).to_owned())));

            arms.push(format!(
                "(lower(trim(r.format)) = ? AND EXISTS (
                    SELECT 1 FROM record_meta m
                    WHERE m.record_id = r.record_id AND m.meta_key IN ({})
                ))",
                placeholders
            ));
        }

        let mut clause = format!("({})", arms.join(" OR "));

        if let Some(key) = query.without_key {
            values.push(Value::Text(key.to_owned()));
            clause.push_str(
                " AND NOT EXISTS (
                    SELECT 1 FROM record_meta x
                    WHERE x.record_id = r.record_id AND x.meta_key = ?
                )",
            );
        }

        (clause, values)
    }

    fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<Record> {
        let format: Option<String> = row.get(3)?;
        Ok(Record::new(
            row.get(0)?,
            &row.get::<_, String>(1)?,
            &row.get::<_, String>(2)?,
            FormatTag::from_stored(format.as_deref()),
        ))
    }
}

impl RecordStore for SqliteStore {
    fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, UnmigratorError> {
        let _tmr = timer!(Level::Trace; "SqliteStore::query", "limit={:?}", query.limit);

        if query.formats.is_empty() || query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let (clause, mut values) = Self::where_clause(query);
        let mut sql = format!(
            "SELECT r.record_id, r.title, r.body, r.format
             FROM records r
             WHERE {}
             ORDER BY r.record_id ASC",
            clause
        );

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), Self::record_from_row)?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        debug!("Record query returned {} records", records.len());

        Ok(records)
    }

    fn count(&self, query: &RecordQuery) -> Result<u64, UnmigratorError> {
        if query.formats.is_empty() {
            return Ok(0);
        }

        let (clause, values) = Self::where_clause(query);
        let sql = format!("SELECT COUNT(*) FROM records r WHERE {}", clause);

        let count: i64 = self
            .db
            .conn()
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;

        Ok(count as u64)
    }

    fn get_record(&self, record_id: RecordId) -> Result<Option<Record>, UnmigratorError> {
        self.db
            .conn()
            .query_row(
                "SELECT record_id, title, body, format FROM records WHERE record_id = ?",
                [record_id],
                Self::record_from_row,
            )
            .optional()
            .map_err(UnmigratorError::DatabaseError)
    }

    fn get_meta(&self, record_id: RecordId, key: &str) -> Result<Option<String>, UnmigratorError> {
        self.db
            .conn()
            .query_row(
                "SELECT meta_value FROM record_meta WHERE record_id = ? AND meta_key = ?",
                params![record_id, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(UnmigratorError::DatabaseError)
    }

    fn set_meta(&self, record_id: RecordId, key: &str, value: &str) -> Result<(), UnmigratorError> {
        self.db.conn().execute(
            "INSERT INTO record_meta (record_id, meta_key, meta_value) VALUES (?, ?, ?)
             ON CONFLICT (record_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
            params![record_id, key, value],
        )?;
        Ok(())
    }

    fn update_body(&self, record_id: RecordId, body: &str) -> Result<(), UnmigratorError> {
        let rows = self.db.conn().execute(
            "UPDATE records SET body = ? WHERE record_id = ?",
            params![body, record_id],
        )?;

        if rows == 0 {
            return Err(UnmigratorError::Error(format!(
                "Record {} not found while updating body",
                record_id
            )));
        }

        Ok(())
    }
}

impl AttachmentRenderer for SqliteStore {
    fn render_as_markup(&self, attachment_id: i64, size_hint: &str) -> Result<String, UnmigratorError> {
        let row: Option<(String, String, Option<String>, Option<i64>, Option<i64>)> = self
            .db
            .conn()
            .query_row(
                "SELECT a.url, a.alt, s.url, s.width, s.height
                 FROM attachments a
                 LEFT JOIN attachment_sizes s
                    ON s.attachment_id = a.attachment_id AND s.size_name = ?2
                 WHERE a.attachment_id = ?1",
                params![attachment_id, size_hint],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((full_url, alt, sized_url, width, height)) = row else {
            debug!("Attachment {} not found", attachment_id);
            return Ok(String::new());
        };

        let markup = match (sized_url, width, height) {
            (Some(url), Some(width), Some(height)) => {
                markup::attachment_image(&url, Some((width, height)), size_hint, &alt)
            }
            _ => markup::attachment_image(&full_url, None, size_hint, &alt),
        };

        Ok(markup)
    }
}
