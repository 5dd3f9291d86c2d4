//! HTML fragments synthesized from side-car values.
//!
//! Side-car values come from historical storage and are untrusted. URLs
//! always pass through [`escape_url`] before landing in an attribute.
//! Embed markup and quote source names are stored as authored markup and
//! are inserted as-is.

use html_escape::{encode_double_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use regex::Regex;

/// Schemes a sanitized URL may carry.
const ALLOWED_SCHEMES: [&str; 19] = [
    "http", "https", "ftp", "ftps", "mailto", "news", "irc", "gopher", "nntp", "feed", "telnet",
    "mms", "rtsp", "svn", "tel", "fax", "xmpp", "webcal", "urn",
];

static DISALLOWED_URL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9\-~+_.?#=!&;,/:%@$|*'()\[\]\x{80}-\x{10FFFF}]")
        .expect("valid url character pattern")
});

static ENCODED_CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)%0[0ad]").expect("valid control character pattern"));

/// First `<img ...>` tag, with everything before and after it. Case-insensitive
/// and dot-matches-newline so multi-line markup keeps its surroundings.
static FIRST_IMAGE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(.*?)(<img\s[^>]*>)(.*)$").expect("valid image tag pattern")
});

static URL_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("valid url scheme pattern"));

/// A port after a `host:` prefix, e.g. the `8080/page` of `example.com:8080/page`.
static PORT_AFTER_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(?:[/?#]|$)").expect("valid port pattern"));

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid numeric pattern"));

/// Sanitizes a stored URL for use inside a double-quoted attribute.
///
/// Returns `None` when nothing usable is left: empty input, or a scheme
/// outside [`ALLOWED_SCHEMES`].
pub fn escape_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }

    let url = url.replace("&amp;", "&");
    let mut url = DISALLOWED_URL_CHARS.replace_all(&url, "").into_owned();

    // Strip repeatedly so that "%0%0dd" can't reassemble into "%0d"
    while ENCODED_CONTROL_CHARS.is_match(&url) {
        url = ENCODED_CONTROL_CHARS.replace_all(&url, "").into_owned();
    }

    if url.is_empty() {
        return None;
    }

    let url = match url_scheme(&url) {
        Some(scheme) if !is_allowed_scheme(scheme) => return None,
        Some(_) => url,
        None if url.starts_with(['/', '#', '?']) => url,
        None => format!("http://{}", url),
    };

    Some(encode_double_quoted_attribute(&url).into_owned())
}

fn is_allowed_scheme(scheme: &str) -> bool {
    ALLOWED_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str())
}

/// The scheme of `url`, if it has one.
///
/// Only scheme-shaped text before the first colon counts, so a colon after
/// a `/`, `?` or `#` (as in `/wiki/Help:Contents`) is part of the path. A
/// `host:port` prefix is not a scheme unless the host is an allowed scheme
/// name (`tel:5551234`).
fn url_scheme(url: &str) -> Option<&str> {
    let (candidate, rest) = url.split_once(':')?;
    if !URL_SCHEME.is_match(candidate) {
        return None;
    }
    if !is_allowed_scheme(candidate) && PORT_AFTER_HOST.is_match(rest) {
        return None;
    }
    Some(candidate)
}

/// Escapes plain text for element content.
pub fn escape_text(text: &str) -> String {
    encode_text(text).into_owned()
}

/// True when the value contains markup rather than being a bare URL.
pub fn has_markup(value: &str) -> bool {
    value.contains('<')
}

/// True when the value is a bare attachment id.
pub fn is_numeric(value: &str) -> bool {
    NUMERIC.is_match(value.trim())
}

/// `<img>` tag for a bare, already-escaped image URL.
pub fn image_tag(src: &str) -> String {
    format!(r#"<img src="{}" alt="" />"#, src)
}

/// `<a href="href">text</a>`. `href` must already be escaped.
pub fn anchor(href: &str, text: &str) -> String {
    format!(r#"<a href="{}">{}</a>"#, href, text)
}

/// Wraps the first `<img ...>` tag of `markup` in an anchor to `href`.
///
/// Only the first image tag is wrapped; later tags are left alone. Markup
/// without a complete `<img ...>` tag is returned unchanged.
pub fn wrap_first_image(markup: &str, href: &str) -> String {
    match FIRST_IMAGE_TAG.captures(markup) {
        Some(caps) => format!(
            r#"{}<a href="{}">{}</a>{}"#,
            &caps[1], href, &caps[2], &caps[3]
        ),
        None => markup.to_owned(),
    }
}

/// Markup for an attachment rendered at `size`.
///
/// `dimensions` are present when the attachment has an intermediate image
/// of that size; otherwise the full-size URL is used without dimensions.
pub fn attachment_image(src: &str, dimensions: Option<(i64, i64)>, size: &str, alt: &str) -> String {
    let size = encode_double_quoted_attribute(size);
    let alt = encode_double_quoted_attribute(alt);
    let src = escape_url(src).unwrap_or_default();

    match dimensions {
        Some((width, height)) => format!(
            r#"<img width="{}" height="{}" src="{}" class="attachment-{} size-{}" alt="{}" />"#,
            width, height, src, size, size, alt
        ),
        None => format!(
            r#"<img src="{}" class="attachment-{} size-{}" alt="{}" />"#,
            src, size, size, alt
        ),
    }
}

/// Puts `fragment` in front of `body`, separated by a blank line.
pub fn prepend(fragment: &str, body: &str) -> String {
    format!("{}\n\n{}", fragment, body)
}

pub fn quote_figure(body: &str, source: &str) -> String {
    format!(
        "<figure><blockquote>{}</blockquote><figcaption>\u{2014} {}</figcaption></figure>",
        body, source
    )
}

pub fn blockquote(body: &str) -> String {
    format!("<blockquote>{}</blockquote>", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_url_passes_plain_urls() {
        assert_eq!(
            escape_url("http://site.example").as_deref(),
            Some("http://site.example")
        );
        assert_eq!(
            escape_url("  https://site.example/a?b=1#c  ").as_deref(),
            Some("https://site.example/a?b=1#c")
        );
    }

    #[test]
    fn test_escape_url_encodes_ampersands() {
        assert_eq!(
            escape_url("http://site.example/?a=1&b=2").as_deref(),
            Some("http://site.example/?a=1&amp;b=2")
        );
        // Already-encoded input isn't double encoded
        assert_eq!(
            escape_url("http://site.example/?a=1&amp;b=2").as_deref(),
            Some("http://site.example/?a=1&amp;b=2")
        );
    }

    #[test]
    fn test_escape_url_strips_attribute_breakers() {
        assert_eq!(
            escape_url(r#"http://site.example/"onmouseover="x"#).as_deref(),
            Some("http://site.example/onmouseover=x")
        );
        assert_eq!(
            escape_url("http://site.example/<script>").as_deref(),
            Some("http://site.example/script")
        );
        assert_eq!(
            escape_url("http://site.example/a b").as_deref(),
            Some("http://site.example/ab")
        );
    }

    #[test]
    fn test_escape_url_strips_encoded_line_breaks() {
        assert_eq!(
            escape_url("http://site.example/%0d%0Aheader").as_deref(),
            Some("http://site.example/header")
        );
        assert_eq!(
            escape_url("http://site.example/%0%0dd").as_deref(),
            Some("http://site.example/")
        );
    }

    #[test]
    fn test_escape_url_scheme_handling() {
        assert_eq!(escape_url("javascript:alert(1)"), None);
        assert_eq!(escape_url("JavaScript:alert(1)"), None);
        assert_eq!(escape_url("data:text/html,hi"), None);
        assert_eq!(
            escape_url("MAILTO:someone@site.example").as_deref(),
            Some("MAILTO:someone@site.example")
        );
        assert_eq!(
            escape_url("site.example/page").as_deref(),
            Some("http://site.example/page")
        );
        assert_eq!(escape_url("/relative/path").as_deref(), Some("/relative/path"));
        assert_eq!(escape_url("#anchor").as_deref(), Some("#anchor"));
    }

    #[test]
    fn test_escape_url_keeps_colons_outside_scheme() {
        assert_eq!(
            escape_url("/wiki/Help:Contents").as_deref(),
            Some("/wiki/Help:Contents")
        );
        assert_eq!(
            escape_url("en.wikipedia.org/wiki/Help:Contents").as_deref(),
            Some("http://en.wikipedia.org/wiki/Help:Contents")
        );
        assert_eq!(
            escape_url("example.com:8080/page").as_deref(),
            Some("http://example.com:8080/page")
        );
        assert_eq!(escape_url("localhost:3000").as_deref(), Some("http://localhost:3000"));
        assert_eq!(
            escape_url("?q=a:b#frag:1").as_deref(),
            Some("?q=a:b#frag:1")
        );
        assert_eq!(
            escape_url("https://site.example/a:b").as_deref(),
            Some("https://site.example/a:b")
        );
        assert_eq!(escape_url("tel:5551234").as_deref(), Some("tel:5551234"));
        assert_eq!(escape_url("vbscript:msgbox"), None);
    }

    #[test]
    fn test_escape_url_empty() {
        assert_eq!(escape_url(""), None);
        assert_eq!(escape_url("   "), None);
        assert_eq!(escape_url("\"<>"), None);
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("42"));
        assert!(is_numeric(" 42 "));
        assert!(!is_numeric("42a"));
        assert!(!is_numeric("-42"));
        assert!(!is_numeric(""));
    }

    #[test]
    fn test_wrap_first_image_single() {
        let image = image_tag("http://img.example/a.png");
        assert_eq!(
            wrap_first_image(&image, "http://site.example"),
            r#"<a href="http://site.example"><img src="http://img.example/a.png" alt="" /></a>"#
        );
    }

    #[test]
    fn test_wrap_first_image_keeps_surroundings() {
        let markup = "<p class=\"x\">\n<IMG SRC=\"a.png\">\n</p>";
        assert_eq!(
            wrap_first_image(markup, "http://site.example"),
            "<p class=\"x\">\n<a href=\"http://site.example\"><IMG SRC=\"a.png\"></a>\n</p>"
        );
    }

    #[test]
    fn test_wrap_first_image_only_wraps_first_of_many() {
        let markup = r#"<img src="1.png" /><img src="2.png" />"#;
        assert_eq!(
            wrap_first_image(markup, "http://site.example"),
            r#"<a href="http://site.example"><img src="1.png" /></a><img src="2.png" />"#
        );
    }

    #[test]
    fn test_wrap_first_image_malformed_is_unchanged() {
        // No closing bracket, and an <img> with no attributes
        let unterminated = r#"<img src="1.png""#;
        assert_eq!(wrap_first_image(unterminated, "http://x.example"), unterminated);

        let bare = "<img>";
        assert_eq!(wrap_first_image(bare, "http://x.example"), bare);

        let no_image = "<figure><video src=\"v.mp4\"></video></figure>";
        assert_eq!(wrap_first_image(no_image, "http://x.example"), no_image);
    }

    #[test]
    fn test_wrap_first_image_ignores_lookalike_tags() {
        let markup = r#"<imgx data="1"><img src="real.png">"#;
        assert_eq!(
            wrap_first_image(markup, "http://x.example"),
            r#"<imgx data="1"><a href="http://x.example"><img src="real.png"></a>"#
        );
    }

    #[test]
    fn test_attachment_image() {
        assert_eq!(
            attachment_image("http://img.example/a-1024x768.jpg", Some((1024, 768)), "large", "A \"cat\""),
            r#"<img width="1024" height="768" src="http://img.example/a-1024x768.jpg" class="attachment-large size-large" alt="A &quot;cat&quot;" />"#
        );
        assert_eq!(
            attachment_image("http://img.example/a.jpg", None, "large", ""),
            r#"<img src="http://img.example/a.jpg" class="attachment-large size-large" alt="" />"#
        );
    }

    #[test]
    fn test_quote_wrappers() {
        assert_eq!(
            quote_figure("Body", "Jane"),
            "<figure><blockquote>Body</blockquote><figcaption>\u{2014} Jane</figcaption></figure>"
        );
        assert_eq!(blockquote("Body"), "<blockquote>Body</blockquote>");
    }

    #[test]
    fn test_prepend() {
        assert_eq!(prepend("<b>x</b>", "body"), "<b>x</b>\n\nbody");
        assert_eq!(prepend("<b>x</b>", ""), "<b>x</b>\n\n");
    }
}
