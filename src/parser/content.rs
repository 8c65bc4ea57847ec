//! Picking the one renderable body out of a MIME tree and making it safe.
//!
//! The first `text/plain` leaf in depth-first order wins and is returned
//! verbatim. Only when there is none does the first `text/html` leaf get
//! used, after an allow-list sanitizer and a linkifier have run over it.
//! Leaves whose body failed to decode are skipped as if absent.

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use linkify::{LinkFinder, LinkKind};
use tracing::{debug, warn};

use crate::model::mail::MessageContent;
use crate::model::mime::{MimeNode, MimePart, PartBody};

const LINK_REL: &str = "noopener noreferrer nofollow";

/// Selects and cleans message content.
pub struct ContentExtractor {
    sanitizer: HtmlSanitizer,
}

impl ContentExtractor {
    pub fn new() -> Self {
        Self {
            sanitizer: HtmlSanitizer::new(),
        }
    }

    pub fn extract(&self, mime: &MimeNode) -> MessageContent {
        if let Some(text) = first_decoded(mime, "text/plain") {
            return MessageContent::Text(text.to_string());
        }
        match first_decoded(mime, "text/html") {
            Some(html) => MessageContent::Html(self.sanitizer.clean(html)),
            None => MessageContent::Empty,
        }
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// First leaf of `content_type` whose body decoded to text.
fn first_decoded<'a>(mime: &'a MimeNode, content_type: &str) -> Option<&'a str> {
    mime.leaves()
        .filter(|part| part.content_type == content_type)
        .find_map(|part| match &part.body {
            PartBody::Text(text) => Some(text.as_str()),
            PartBody::Binary(_) | PartBody::Undecodable => {
                skipped(part);
                None
            }
        })
}

fn skipped(part: &MimePart) {
    warn!(
        content_type = %part.content_type,
        "Undecodable body part skipped"
    );
}

/// Allow-list HTML cleaner followed by bare-URL linkification.
pub struct HtmlSanitizer {
    cleaner: ammonia::Builder<'static>,
    finder: LinkFinder,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let mut cleaner = ammonia::Builder::default();
        cleaner
            .strip_comments(true)
            .link_rel(Some(LINK_REL))
            .rm_tags(&["img"]);

        let mut finder = LinkFinder::new();
        finder.kinds(&[LinkKind::Url]).url_must_have_scheme(false);

        Self { cleaner, finder }
    }

    pub fn clean(&self, html: &str) -> String {
        let cleaned = self.cleaner.clean(html).to_string();
        self.linkify(&cleaned)
    }

    /// Wrap bare URLs found in text nodes with anchors.
    ///
    /// Input must be serializer output (tags well formed, text escaped).
    /// Text already inside an `<a>` is left alone.
    fn linkify(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut anchor_depth = 0usize;
        let mut rest = html;

        while !rest.is_empty() {
            if rest.starts_with('<') {
                let end = tag_end(rest);
                let tag = &rest[..end];
                match anchor_change(tag) {
                    Some(true) => anchor_depth += 1,
                    Some(false) => anchor_depth = anchor_depth.saturating_sub(1),
                    None => {}
                }
                out.push_str(tag);
                rest = &rest[end..];
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = &rest[..end];
                if anchor_depth == 0 {
                    self.linkify_text(text, &mut out);
                } else {
                    out.push_str(text);
                }
                rest = &rest[end..];
            }
        }

        out
    }

    /// Links are found in the entity-decoded text so that an escaped
    /// delimiter such as `&gt;` never ends up inside a URL.
    fn linkify_text(&self, text: &str, out: &mut String) {
        let decoded = decode_html_entities(text);
        let links: Vec<_> = self
            .finder
            .links(&decoded)
            .filter_map(|link| href_for(link.as_str()).map(|href| (link, href)))
            .collect();
        if links.is_empty() {
            out.push_str(text);
            return;
        }

        let mut last = 0;
        for (link, href) in links {
            debug!(url = %href, "Linkified bare URL");
            out.push_str(&encode_text(&decoded[last..link.start()]));
            out.push_str("<a href=\"");
            out.push_str(&encode_double_quoted_attribute(&href));
            out.push_str("\" rel=\"");
            out.push_str(LINK_REL);
            out.push_str("\">");
            out.push_str(&encode_text(link.as_str()));
            out.push_str("</a>");
            last = link.end();
        }
        out.push_str(&encode_text(&decoded[last..]));
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte length of the tag at the start of `s`, honoring quoted attribute values.
fn tag_end(s: &str) -> usize {
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return i + 1,
            (None, _) => {}
        }
    }
    s.len()
}

/// `Some(true)` for `<a ...>`, `Some(false)` for `</a>`, `None` otherwise.
fn anchor_change(tag: &str) -> Option<bool> {
    let inner = tag.trim_start_matches('<');
    let (closing, name) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name_end = name
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(name.len());
    if name[..name_end].eq_ignore_ascii_case("a") {
        Some(!closing)
    } else {
        None
    }
}

/// Target of a detected URL: as written when its scheme is allowed,
/// `http://` prepended when it has none, nothing for any other scheme.
fn href_for(url: &str) -> Option<String> {
    if has_safe_scheme(url) {
        return Some(url.to_string());
    }
    if has_explicit_scheme(url) {
        return None;
    }
    Some(format!("http://{url}"))
}

/// `scheme://...` or a dotless `scheme:...` prefix.
fn has_explicit_scheme(url: &str) -> bool {
    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = &url[..colon];
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid && (url[colon..].starts_with("://") || !scheme.contains('.'))
}

fn has_safe_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["http://", "https://", "ftp://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}
