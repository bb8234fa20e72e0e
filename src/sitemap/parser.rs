use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use super::SitemapError;

/// Namespace every `<loc>` must belong to.
pub const SITEMAP_NS: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// Whether a document lists pages or other sitemaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapKind {
    /// `<urlset>`: each `<loc>` is a page.
    UrlSet,
    /// `<sitemapindex>`: each `<loc>` is another sitemap.
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapDocument {
    pub kind: SitemapKind,
    /// `<loc>` values in document order, trimmed, empties dropped.
    pub locs: Vec<String>,
}

/// Parses sitemap XML and extracts its `<loc>` values.
///
/// Only elements in [`SITEMAP_NS`] count; a `loc` from another namespace
/// (image or video extensions, for example) is ignored. The document kind is
/// taken from the root element.
pub fn parse_sitemap(bytes: &[u8]) -> Result<SitemapDocument, SitemapError> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut kind = None;
    let mut locs = Vec::new();
    let mut current: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) => {
                let in_sitemap_ns = matches!(ns, ResolveResult::Bound(Namespace(n)) if n == SITEMAP_NS);
                if kind.is_none() {
                    kind = Some(if in_sitemap_ns && e.local_name().as_ref() == b"sitemapindex" {
                        SitemapKind::Index
                    } else {
                        SitemapKind::UrlSet
                    });
                }
                if in_sitemap_ns && e.local_name().as_ref() == b"loc" {
                    current = Some(String::new());
                }
            }
            Ok((_, Event::Text(t))) => {
                if let Some(loc) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| SitemapError::Parse(e.to_string()))?;
                    loc.push_str(&text);
                }
            }
            Ok((_, Event::CData(c))) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok((_, Event::End(e))) if e.local_name().as_ref() == b"loc" => {
                if let Some(loc) = current.take() {
                    let trimmed = loc.trim();
                    if !trimmed.is_empty() {
                        locs.push(trimmed.to_string());
                    }
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => return Err(SitemapError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let kind = kind.ok_or_else(|| SitemapError::Parse("document has no root element".into()))?;
    Ok(SitemapDocument { kind, locs })
}
