use crate::formats::FormatTag;

pub type RecordId = i64;

/// A content record as read from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    record_id: RecordId,
    title: String,
    body: String,
    format: FormatTag,
}

impl Record {
    pub fn new(record_id: RecordId, title: &str, body: &str, format: FormatTag) -> Self {
        Record {
            record_id,
            title: title.to_owned(),
            body: body.to_owned(),
            format,
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn format(&self) -> &FormatTag {
        &self.format
    }
}
