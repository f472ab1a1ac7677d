use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{cell_text, content_form, next_table, non_empty, parse_date_mdy, record_hash, table_rows};
use crate::links::{extract_document_links, resolve_url};
use crate::types::{BillAmendment, CoAuthors, DocumentCategory};

static SEL_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: anchor"));
static SEL_COAUTHORS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("table#tblCoauthors #cellCoauthors").expect("invalid selector: coauthors")
});
static RE_OPEN_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*javascript:\s*openWindow\(\s*['"]([^'"]+)['"]"#)
        .expect("invalid regex: openWindow")
});

/// An amendment read from the Amendments tab, plus the co-authors page to
/// visit when the row links to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmendmentRow {
    pub amendment: BillAmendment,
    pub coauthors_url: Option<String>,
}

/// Turns the co-author cell's `JavaScript:openWindow('...')` link into an
/// absolute URL for the co-authors page.
pub fn coauthors_url(href: &str, base_url: &str) -> Option<String> {
    let path = match RE_OPEN_WINDOW.captures(href) {
        Some(caps) => caps[1].trim().to_string(),
        None if href.trim().to_lowercase().starts_with("javascript:") => return None,
        None => href.trim().to_string(),
    };
    if path.is_empty() {
        return None;
    }
    if path.starts_with("http") || path.starts_with('/') || path.starts_with("..") {
        resolve_url(base_url, &path)
    } else {
        resolve_url(base_url, &format!("BillLookup/{}", path))
    }
}

/// Names on the co-authors page are separated by `|`.
pub fn parse_coauthors(html: &str) -> Option<Vec<String>> {
    let document = Html::parse_document(html);
    let cell = document.select(&SEL_COAUTHORS).next()?;

    Some(
        cell_text(cell)
            .split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect(),
    )
}

pub fn parse_amendments(html: &str, bill_id: &str, base_url: &str) -> Vec<AmendmentRow> {
    let document = Html::parse_document(html);

    let Some(table) = content_form(&document).and_then(|form| next_table(&document, form)) else {
        log::warn!("No amendments table found for {}", bill_id);
        return Vec::new();
    };

    table_rows(table)
        .into_iter()
        .filter(|cells| cells.len() >= 7)
        .map(|cells| {
            let reading_cell = cell_text(cells[0]);
            let mut tokens = reading_cell.split_whitespace();
            let chamber = tokens.next().unwrap_or_default().to_string();
            let reading = tokens.next().unwrap_or_default().to_string();

            let number = cell_text(cells[1]);
            let amendment_type = cell_text(cells[4]);
            let action_date = parse_date_mdy(&cell_text(cells[6])).ok();

            let coauthors_url = cells[3]
                .select(&SEL_ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| coauthors_url(href, base_url));
            let co_authors = non_empty(cell_text(cells[3])).map(CoAuthors::Raw);

            let mut documents = BTreeMap::new();
            if cells.len() > 7
                && let Some(cell) = cells.last()
            {
                let links = extract_document_links(*cell, base_url);
                if !links.is_empty() {
                    documents.insert(DocumentCategory::Amendment, links);
                }
            }

            let date_key = action_date.map(|d| d.to_string()).unwrap_or_default();
            let id = format!(
                "{}-Amendment-{}",
                bill_id,
                record_hash(&[
                    bill_id,
                    number.as_str(),
                    amendment_type.as_str(),
                    date_key.as_str(),
                ])
            );

            AmendmentRow {
                amendment: BillAmendment {
                    id,
                    chamber,
                    reading,
                    number,
                    author: cell_text(cells[2]),
                    amendment_type,
                    action: cell_text(cells[5]),
                    action_date,
                    co_authors,
                    documents,
                },
                coauthors_url,
            }
        })
        .collect()
}
