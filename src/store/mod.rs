mod sqlite;

#[cfg(test)]
pub mod memory;

pub use sqlite::SqliteStore;

use crate::error::UnmigratorError;
#[cfg(test)]
use crate::formats::FormatTag;
use crate::formats::PostFormat;
use crate::records::{Record, RecordId};

/// One arm of a record query: records tagged `format` that carry at least
/// one of `any_key` in their side-car store.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatFilter {
    pub format: PostFormat,
    pub any_key: &'static [&'static str],
}

/// Structured filter handed to a [`RecordStore`].
///
/// A record matches when it satisfies any one of `formats` and does not
/// carry `without_key`. Results are always ordered by record id, ascending.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordQuery {
    pub formats: Vec<FormatFilter>,
    pub without_key: Option<&'static str>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// Evaluates the filter against a single record, for the in-memory
    /// store used in tests.
    #[cfg(test)]
    pub fn matches<F>(&self, format: &FormatTag, has_key: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        let FormatTag::Known(format) = format else {
            return false;
        };

        let format_match = self
            .formats
            .iter()
            .filter(|filter| filter.format == *format)
            .any(|filter| filter.any_key.iter().any(|key| has_key(key)));

        format_match && !self.without_key.is_some_and(|key| has_key(key))
    }
}

/// Narrow interface into the content-record store.
///
/// Every call is blocking and completes before the caller moves on.
pub trait RecordStore {
    /// Records matching `query`, ascending by id, capped at `query.limit`.
    fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, UnmigratorError>;

    /// Number of records matching `query`, ignoring `query.limit`.
    fn count(&self, query: &RecordQuery) -> Result<u64, UnmigratorError>;

    fn get_record(&self, record_id: RecordId) -> Result<Option<Record>, UnmigratorError>;

    fn get_meta(&self, record_id: RecordId, key: &str) -> Result<Option<String>, UnmigratorError>;

    fn set_meta(&self, record_id: RecordId, key: &str, value: &str) -> Result<(), UnmigratorError>;

    fn update_body(&self, record_id: RecordId, body: &str) -> Result<(), UnmigratorError>;
}

/// Renders a stored attachment as image markup. Only the legacy image
/// path, where the side-car value is a bare attachment id, needs this.
pub trait AttachmentRenderer {
    fn render_as_markup(&self, attachment_id: i64, size_hint: &str) -> Result<String, UnmigratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::keys;

    fn image_query() -> RecordQuery {
        RecordQuery {
            formats: vec![FormatFilter {
                format: PostFormat::Image,
                any_key: PostFormat::Image.sidecar_keys(),
            }],
            without_key: Some(keys::MIGRATED),
            limit: None,
        }
    }

    #[test]
    fn test_matches_requires_known_format() {
        let query = image_query();
        assert!(!query.matches(&FormatTag::None, |_| true));
        assert!(!query.matches(&FormatTag::Unrecognized("image2".into()), |_| true));
        assert!(!query.matches(&FormatTag::Known(PostFormat::Link), |_| true));
    }

    #[test]
    fn test_matches_requires_sidecar_key() {
        let query = image_query();
        let format = FormatTag::Known(PostFormat::Image);
        assert!(query.matches(&format, |key| key == keys::LEGACY_IMAGE_REF));
        assert!(!query.matches(&format, |key| key == keys::LINK_TARGET_URL));
    }

    #[test]
    fn test_matches_excludes_marker() {
        let query = image_query();
        let format = FormatTag::Known(PostFormat::Image);
        assert!(!query.matches(&format, |key| {
            key == keys::IMAGE_HTML || key == keys::MIGRATED
        }));
    }
}
