use log::debug;

use crate::error::UnmigratorError;
use crate::formats::{keys, PostFormat};
use crate::records::Record;
use crate::store::{FormatFilter, RecordQuery, RecordStore};

/// Historical batch size: small enough that each batch reports back quickly.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Query for records still needing migration: tagged with one of the five
/// formats, carrying at least one current or legacy side-car key for that
/// format, and not yet bearing the completion marker.
pub fn eligible_query(limit: Option<usize>) -> RecordQuery {
    RecordQuery {
        formats: PostFormat::all()
            .into_iter()
            .map(|format| FormatFilter {
                format,
                any_key: format.sidecar_keys(),
            })
            .collect(),
        without_key: Some(keys::MIGRATED),
        limit,
    }
}

/// Selects batches of records still needing migration, oldest id first.
pub struct Selector<'a, S: RecordStore> {
    store: &'a S,
}

impl<'a, S: RecordStore> Selector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Up to `limit` eligible records, ascending by id. Read-only.
    ///
    /// An empty result means nothing is left to migrate. A `limit` of 0
    /// also returns an empty batch, so callers must not pass it.
    pub fn select(&self, limit: usize) -> Result<Vec<Record>, UnmigratorError> {
        let records = self.store.query(&eligible_query(Some(limit)))?;
        debug!("Selected {} records (limit {})", records.len(), limit);
        Ok(records)
    }

    /// Number of records that still need migration.
    pub fn count_remaining(&self) -> Result<u64, UnmigratorError> {
        self.store.count(&eligible_query(None))
    }
}
