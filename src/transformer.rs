use log::{debug, error, warn};

use crate::error::UnmigratorError;
use crate::formats::{keys, FormatTag, PostFormat};
use crate::markup;
use crate::records::{Record, RecordId};
use crate::store::{AttachmentRenderer, RecordStore};

/// Size requested from the attachment renderer for legacy image ids.
pub const DEFAULT_IMAGE_SIZE: &str = "large";

/// Result of transforming one record.
///
/// `changed` is true only when a new body was synthesized and written.
/// Every kind of "no action" (missing record, no tag, unrecognized tag,
/// no usable side-car data, failed write) reports `changed: false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub changed: bool,
}

impl Outcome {
    const NO_ACTION: Outcome = Outcome { changed: false };
    const CHANGED: Outcome = Outcome { changed: true };
}

/// Rewrites a record's side-car post format data into its body.
///
/// Holds only references to its collaborators, so one instance can process
/// any number of records.
pub struct Transformer<'a, S: RecordStore, R: AttachmentRenderer> {
    store: &'a S,
    renderer: &'a R,
    image_size: String,
}

impl<'a, S: RecordStore, R: AttachmentRenderer> Transformer<'a, S, R> {
    pub fn new(store: &'a S, renderer: &'a R, image_size: &str) -> Self {
        Self {
            store,
            renderer,
            image_size: image_size.to_owned(),
        }
    }

    /// Migrates one record. Never fails: every problem is logged and
    /// reported as `changed: false`.
    pub fn transform(&self, record_id: RecordId) -> Outcome {
        match self.try_transform(record_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Record {}: storage read failed, left pending: {}", record_id, e);
                Outcome::NO_ACTION
            }
        }
    }

    /// Read errors propagate out of here and leave the record unmarked.
    /// Write errors are handled in place.
    fn try_transform(&self, record_id: RecordId) -> Result<Outcome, UnmigratorError> {
        let Some(record) = self.store.get_record(record_id)? else {
            debug!("Record {}: not found", record_id);
            return Ok(Outcome::NO_ACTION);
        };

        if self.store.get_meta(record_id, keys::MIGRATED)?.is_some() {
            debug!("Record {}: already migrated", record_id);
            return Ok(Outcome::NO_ACTION);
        }

        let new_body = match record.format() {
            FormatTag::Unrecognized(tag) => {
                debug!("Record {}: unrecognized format '{}'", record_id, tag);
                return Ok(Outcome::NO_ACTION);
            }
            FormatTag::None => {
                debug!("Record {}: no format tag", record_id);
                None
            }
            FormatTag::Known(format) => self.synthesize(&record, *format)?,
        };

        // The marker goes on even when nothing changed, so records with
        // unusable side-car data are not selected again.
        self.mark_migrated(record_id);

        let Some(new_body) = new_body else {
            debug!("Record {}: no usable side-car data", record_id);
            return Ok(Outcome::NO_ACTION);
        };

        if new_body == record.body() {
            debug!("Record {}: body unchanged, skipping write", record_id);
            return Ok(Outcome::NO_ACTION);
        }

        match self.store.update_body(record_id, &new_body) {
            Ok(()) => {
                debug!("Record {}: body updated", record_id);
                Ok(Outcome::CHANGED)
            }
            Err(e) => {
                warn!("Record {}: body write failed: {}", record_id, e);
                Ok(Outcome::NO_ACTION)
            }
        }
    }

    fn mark_migrated(&self, record_id: RecordId) {
        if let Err(e) = self
            .store
            .set_meta(record_id, keys::MIGRATED, keys::MIGRATED_VALUE)
        {
            warn!("Record {}: failed to set completion marker: {}", record_id, e);
        }
    }

    /// New body for a record of `format`, or `None` when the side-car data
    /// yields nothing usable.
    fn synthesize(&self, record: &Record, format: PostFormat) -> Result<Option<String>, UnmigratorError> {
        let record_id = record.record_id();
        let body = record.body();

        let new_body = match format {
            PostFormat::Image => self
                .image_markup(record_id)?
                .map(|image| markup::prepend(&image, body)),

            PostFormat::Link => self
                .url_value(record_id, keys::LINK_TARGET_URL, keys::LEGACY_LINK_URL)?
                .map(|href| markup::prepend(&markup::anchor(&href, record.title()), body)),

            PostFormat::Video => self
                .value(record_id, keys::VIDEO_EMBED_HTML, keys::LEGACY_MEDIA_EMBED)?
                .map(|embed| markup::prepend(&embed, body)),

            PostFormat::Audio => self
                .value(record_id, keys::AUDIO_EMBED_HTML, keys::LEGACY_MEDIA_EMBED)?
                .map(|embed| markup::prepend(&embed, body)),

            PostFormat::Quote => Some(self.quote(record_id, body)?),
        };

        Ok(new_body)
    }

    fn image_markup(&self, record_id: RecordId) -> Result<Option<String>, UnmigratorError> {
        let image = match self.sidecar(record_id, keys::IMAGE_HTML)? {
            Some(html) => Some(html),
            None => match self.sidecar(record_id, keys::LEGACY_IMAGE_REF)? {
                Some(reference) if markup::is_numeric(&reference) => {
                    self.render_attachment(record_id, &reference)
                }
                other => other,
            },
        };

        let Some(mut image) = image else {
            return Ok(None);
        };

        if !markup::has_markup(&image) {
            match markup::escape_url(&image) {
                Some(src) => image = markup::image_tag(&src),
                None => {
                    debug!("Record {}: image URL unusable after sanitizing", record_id);
                    return Ok(None);
                }
            }
        }

        if let Some(href) = self.url_value(record_id, keys::LINK_URL, keys::LEGACY_LINK_URL)? {
            image = markup::wrap_first_image(&image, &href);
        }

        Ok(Some(image))
    }

    fn render_attachment(&self, record_id: RecordId, reference: &str) -> Option<String> {
        let attachment_id: i64 = match reference.trim().parse() {
            Ok(id) => id,
            Err(e) => {
                warn!("Record {}: bad attachment id '{}': {}", record_id, reference, e);
                return None;
            }
        };

        match self.renderer.render_as_markup(attachment_id, &self.image_size) {
            Ok(html) if !html.trim().is_empty() => Some(html),
            Ok(_) => {
                debug!("Record {}: attachment {} rendered empty", record_id, attachment_id);
                None
            }
            Err(e) => {
                warn!("Record {}: attachment {} failed to render: {}", record_id, attachment_id, e);
                None
            }
        }
    }

    /// Quote source caption, or a plain blockquote when there is no source.
    fn quote(&self, record_id: RecordId, body: &str) -> Result<String, UnmigratorError> {
        let name = self.value(record_id, keys::QUOTE_SOURCE_NAME, keys::LEGACY_QUOTE_SOURCE_NAME)?;
        let url = self.value(record_id, keys::QUOTE_SOURCE_URL, keys::LEGACY_LINK_URL)?;
        let href = url.as_deref().and_then(markup::escape_url);

        let name = match (name, url) {
            (Some(name), _) => Some(name),
            (None, Some(url)) => Some(markup::escape_text(&url)),
            (None, None) => None,
        };

        let wrapped = match (name, href) {
            (Some(name), Some(href)) => markup::quote_figure(body, &markup::anchor(&href, &name)),
            (Some(name), None) => markup::quote_figure(body, &name),
            (None, _) => markup::blockquote(body),
        };

        Ok(wrapped)
    }

    /// Current-schema value if usable, else the legacy one.
    fn value(&self, record_id: RecordId, current: &str, legacy: &str) -> Result<Option<String>, UnmigratorError> {
        match self.sidecar(record_id, current)? {
            Some(value) => Ok(Some(value)),
            None => self.sidecar(record_id, legacy),
        }
    }

    /// Like [`Self::value`], sanitized for an href. A URL that sanitizes to
    /// nothing counts as absent.
    fn url_value(&self, record_id: RecordId, current: &str, legacy: &str) -> Result<Option<String>, UnmigratorError> {
        Ok(self
            .value(record_id, current, legacy)?
            .and_then(|url| markup::escape_url(&url)))
    }

    /// A side-car value, with empty or whitespace-only values treated as
    /// absent so that [`Self::value`] falls back to the legacy key.
    fn sidecar(&self, record_id: RecordId, key: &str) -> Result<Option<String>, UnmigratorError> {
        Ok(self
            .store
            .get_meta(record_id, key)?
            .filter(|value| !value.trim().is_empty()))
    }
}
