use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use url::Url;

use crate::types::{DocumentLink, FileType};

static SEL_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: anchor"));

impl FileType {
    /// Classifies a document by the extension appearing in its URL.
    pub fn from_url(url: &str) -> FileType {
        let url = url.to_lowercase();
        if url.contains(".pdf") {
            FileType::Pdf
        } else if url.contains(".doc") {
            FileType::Word
        } else if url.contains(".htm") {
            FileType::Html
        } else if url.contains(".txt") {
            FileType::Text
        } else {
            FileType::Unknown
        }
    }
}

/// Resolves an href found on a TLO page against the site root.
///
/// TLO links climb out of `BillLookup/` with `../`; those segments are
/// dropped so every link lands under the base URL.
pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
    let cleaned = href.trim().replace("..", "");
    let base = Url::parse(base_url).ok()?;
    base.join(&cleaned).ok().map(String::from)
}

fn anchor_link(anchor: ElementRef, base_url: &str) -> Option<DocumentLink> {
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let url = resolve_url(base_url, href)?;
    Some(DocumentLink {
        file_type: FileType::from_url(&url),
        url,
    })
}

/// Every document linked from a table cell, in document order.
pub fn extract_document_links(cell: ElementRef, base_url: &str) -> Vec<DocumentLink> {
    cell.select(&SEL_ANCHOR)
        .filter_map(|a| anchor_link(a, base_url))
        .collect()
}

/// Documents under `element` paired with their link text. Links without
/// text (icon-only links) are labelled with the file name.
pub fn extract_labelled_links(element: ElementRef, base_url: &str) -> Vec<(String, DocumentLink)> {
    element
        .select(&SEL_ANCHOR)
        .filter_map(|a| {
            let link = anchor_link(a, base_url)?;
            let text = a.text().collect::<String>();
            let mut label = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if label.is_empty() {
                label = file_name(&link.url);
            }
            Some((label, link))
        })
        .collect()
}

fn file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}
