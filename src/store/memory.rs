use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use crate::error::UnmigratorError;
use crate::formats::FormatTag;
use crate::records::{Record, RecordId};

use super::{AttachmentRenderer, RecordQuery, RecordStore};

/// In-memory stand-in for the record store.
///
/// Counts every write made through the [`RecordStore`] interface and can be
/// told to fail body writes or side-car reads. Seeding helpers (`add_*`)
/// bypass the counters.
#[derive(Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<RecordId, Record>>,
    meta: RefCell<HashMap<(RecordId, String), String>>,
    attachments: RefCell<HashMap<i64, String>>,
    rendered_sizes: RefCell<Vec<String>>,
    body_writes: Cell<usize>,
    meta_writes: Cell<usize>,
    queries: Cell<usize>,
    fail_body_writes: Cell<bool>,
    fail_meta_reads: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&self, record_id: RecordId, format: FormatTag, body: &str) {
        let title = format!("Record {}", record_id);
        self.add_titled_record(record_id, &title, format, body);
    }

    pub fn add_titled_record(&self, record_id: RecordId, title: &str, format: FormatTag, body: &str) {
        self.records
            .borrow_mut()
            .insert(record_id, Record::new(record_id, title, body, format));
    }

    pub fn add_meta(&self, record_id: RecordId, key: &str, value: &str) {
        self.meta
            .borrow_mut()
            .insert((record_id, key.to_owned()), value.to_owned());
    }

    pub fn add_attachment(&self, attachment_id: i64, markup: &str) {
        self.attachments
            .borrow_mut()
            .insert(attachment_id, markup.to_owned());
    }

    pub fn body(&self, record_id: RecordId) -> Option<String> {
        self.records
            .borrow()
            .get(&record_id)
            .map(|record| record.body().to_owned())
    }

    pub fn has_meta(&self, record_id: RecordId, key: &str) -> bool {
        self.meta.borrow().contains_key(&(record_id, key.to_owned()))
    }

    pub fn body_writes(&self) -> usize {
        self.body_writes.get()
    }

    pub fn meta_writes(&self) -> usize {
        self.meta_writes.get()
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }

    pub fn rendered_sizes(&self) -> Vec<String> {
        self.rendered_sizes.borrow().clone()
    }

    pub fn fail_body_writes(&self, fail: bool) {
        self.fail_body_writes.set(fail);
    }

    pub fn fail_meta_reads(&self, fail: bool) {
        self.fail_meta_reads.set(fail);
    }

    fn matching(&self, query: &RecordQuery) -> Vec<Record> {
        let meta = self.meta.borrow();
        self.records
            .borrow()
            .values()
            .filter(|record| {
                query.matches(record.format(), |key| {
                    meta.contains_key(&(record.record_id(), key.to_owned()))
                })
            })
            .cloned()
            .collect()
    }
}

impl RecordStore for MemoryStore {
    fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, UnmigratorError> {
        self.queries.set(self.queries.get() + 1);

        let mut records = self.matching(query);
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn count(&self, query: &RecordQuery) -> Result<u64, UnmigratorError> {
        Ok(self.matching(query).len() as u64)
    }

    fn get_record(&self, record_id: RecordId) -> Result<Option<Record>, UnmigratorError> {
        Ok(self.records.borrow().get(&record_id).cloned())
    }

    fn get_meta(&self, record_id: RecordId, key: &str) -> Result<Option<String>, UnmigratorError> {
        if self.fail_meta_reads.get() {
            return Err(UnmigratorError::Error("side-car read failed".into()));
        }
        Ok(self.meta.borrow().get(&(record_id, key.to_owned())).cloned())
    }

    fn set_meta(&self, record_id: RecordId, key: &str, value: &str) -> Result<(), UnmigratorError> {
        self.meta_writes.set(self.meta_writes.get() + 1);
        self.add_meta(record_id, key, value);
        Ok(())
    }

    fn update_body(&self, record_id: RecordId, body: &str) -> Result<(), UnmigratorError> {
        self.body_writes.set(self.body_writes.get() + 1);

        if self.fail_body_writes.get() {
            return Err(UnmigratorError::Error("body write failed".into()));
        }

        let mut records = self.records.borrow_mut();
        let record = records
            .get_mut(&record_id)
            .ok_or_else(|| UnmigratorError::Error(format!("Record {} not found", record_id)))?;
        *record = Record::new(record_id, record.title(), body, record.format().clone());
        Ok(())
    }
}

impl AttachmentRenderer for MemoryStore {
    fn render_as_markup(&self, attachment_id: i64, size_hint: &str) -> Result<String, UnmigratorError> {
        self.rendered_sizes.borrow_mut().push(size_hint.to_owned());
        Ok(self
            .attachments
            .borrow()
            .get(&attachment_id)
            .cloned()
            .unwrap_or_default())
    }
}
