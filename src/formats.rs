use log::warn;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Side-car keys written by the two historical generations of the post
/// format UI, plus the completion marker this tool adds.
pub mod keys {
    // Current schema
    pub const IMAGE_HTML: &str = "image_html";
    pub const LINK_URL: &str = "link_url";
    pub const LINK_TARGET_URL: &str = "link_target_url";
    pub const VIDEO_EMBED_HTML: &str = "video_embed_html";
    pub const AUDIO_EMBED_HTML: &str = "audio_embed_html";
    pub const QUOTE_SOURCE_NAME: &str = "quote_source_name";
    pub const QUOTE_SOURCE_URL: &str = "quote_source_url";

    // Legacy schema
    pub const LEGACY_IMAGE_REF: &str = "legacy_image_ref";
    pub const LEGACY_LINK_URL: &str = "legacy_link_url";
    pub const LEGACY_MEDIA_EMBED: &str = "legacy_media_embed";
    pub const LEGACY_QUOTE_SOURCE_NAME: &str = "legacy_quote_source_name";

    /// Completion marker. Presence means the record has been processed.
    pub const MIGRATED: &str = "migrated";
    pub const MIGRATED_VALUE: &str = "1";
}

/// The five post formats that carried side-car data.
///
/// The strum serializations are the values stored in the record's
/// format column.
#[derive(AsRefStr, EnumIter, EnumString, Debug, Display, PartialEq, Eq, Hash, Copy, Clone)]
pub enum PostFormat {
    #[strum(serialize = "image")]
    Image,
    #[strum(serialize = "link")]
    Link,
    #[strum(serialize = "video")]
    Video,
    #[strum(serialize = "audio")]
    Audio,
    #[strum(serialize = "quote")]
    Quote,
}

impl PostFormat {
    /// Every side-car key, current or legacy, that can feed this format.
    /// A record of this format carrying any of these keys is a candidate
    /// for migration.
    pub fn sidecar_keys(&self) -> &'static [&'static str] {
        match self {
            PostFormat::Image => &[
                keys::IMAGE_HTML,
                keys::LINK_URL,
                keys::LEGACY_IMAGE_REF,
                keys::LEGACY_LINK_URL,
            ],
            PostFormat::Link => &[keys::LINK_TARGET_URL, keys::LEGACY_LINK_URL],
            PostFormat::Video => &[keys::VIDEO_EMBED_HTML, keys::LEGACY_MEDIA_EMBED],
            PostFormat::Audio => &[keys::AUDIO_EMBED_HTML, keys::LEGACY_MEDIA_EMBED],
            PostFormat::Quote => &[
                keys::QUOTE_SOURCE_NAME,
                keys::QUOTE_SOURCE_URL,
                keys::LEGACY_QUOTE_SOURCE_NAME,
                keys::LEGACY_LINK_URL,
            ],
        }
    }

    pub fn all() -> Vec<PostFormat> {
        PostFormat::iter().collect()
    }
}

/// Format tag as stored on a record.
///
/// `None` covers both a missing tag and the explicit `none`/`standard`
/// values. Anything else that isn't one of the five formats is kept
/// verbatim as `Unrecognized` so it can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatTag {
    None,
    Known(PostFormat),
    Unrecognized(String),
}

impl FormatTag {
    pub fn from_stored(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return FormatTag::None;
        };

        // Same normalization as lower(trim(..)) in the record query
        let normalized = raw.trim_matches(' ').to_ascii_lowercase();
        if normalized.is_empty() || normalized == "none" || normalized == "standard" {
            return FormatTag::None;
        }

        match normalized.parse::<PostFormat>() {
            Ok(format) => FormatTag::Known(format),
            Err(_) => {
                warn!("Unrecognized format tag in store: '{}'", raw);
                FormatTag::Unrecognized(raw.to_owned())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FormatTag::None => "none",
            FormatTag::Known(format) => format.as_ref(),
            FormatTag::Unrecognized(raw) => raw,
        }
    }
}
