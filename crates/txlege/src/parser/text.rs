use std::sync::LazyLock;

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};

use super::{SEL_TABLE, cell_text, content_form, next_table, table_rows};
use crate::links::{extract_document_links, extract_labelled_links};
use crate::types::{BillVersion, DocumentCategory, DocumentLink};

static SEL_ADDL_DOCS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#tblAddlDocs").expect("invalid selector: addl docs"));

/// Document columns of the Text tab, in table order after the version label.
const COLUMNS: [DocumentCategory; 5] = [
    DocumentCategory::BillText,
    DocumentCategory::FiscalNote,
    DocumentCategory::Analysis,
    DocumentCategory::WitnessList,
    DocumentCategory::CommitteeSummary,
];

/// Section header row the Text tab renders inside the versions table.
/// Rows below it list documents that belong to no version.
const ADDITIONAL_DOCUMENTS: &str = "Additional Documents:";

/// Everything read from a bill's Text tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPage {
    pub versions: IndexMap<String, BillVersion>,
    /// Keyed by link text.
    pub additional_documents: IndexMap<String, Vec<DocumentLink>>,
}

impl TextPage {
    fn add_additional(&mut self, labelled: Vec<(String, DocumentLink)>) {
        for (label, link) in labelled {
            let links = self.additional_documents.entry(label).or_default();
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }
}

pub fn parse_text_page(html: &str, base_url: &str) -> TextPage {
    let document = Html::parse_document(html);
    let mut page = TextPage::default();

    let Some(form) = content_form(&document) else {
        log::warn!("No bill versions table found");
        return page;
    };
    let Some(table) = next_table(&document, form) else {
        log::warn!("No bill versions table found");
        return page;
    };

    let mut past_versions = false;
    for cells in table_rows(table) {
        if past_versions {
            for cell in cells {
                page.add_additional(extract_labelled_links(cell, base_url));
            }
            continue;
        }
        if cells.len() < COLUMNS.len() + 1 {
            continue;
        }

        let label = cell_text(cells[0]);
        if label == ADDITIONAL_DOCUMENTS {
            past_versions = true;
            continue;
        }

        let version = page
            .versions
            .entry(label.clone())
            .or_insert_with(|| BillVersion::new(label));
        for (category, cell) in COLUMNS.iter().zip(&cells[1..]) {
            let links = extract_document_links(*cell, base_url);
            if !links.is_empty() {
                version.documents.entry(*category).or_default().extend(links);
            }
        }
    }

    if let Some(addl) = document.select(&SEL_ADDL_DOCS).next() {
        page.add_additional(extract_labelled_links(addl, base_url));
    }

    if let Some(impacts) = fiscal_impact_table(form, table) {
        add_fiscal_impacts(&mut page, impacts, base_url);
    }

    page
}

/// Fiscal impact statements sit in the last table of the form, when that
/// table is neither the versions table nor the additional documents.
fn fiscal_impact_table<'a>(form: ElementRef<'a>, versions: ElementRef<'a>) -> Option<ElementRef<'a>> {
    form.select(&SEL_TABLE)
        .last()
        .filter(|t| (**t).id() != (*versions).id())
        .filter(|t| t.value().id() != Some("tblAddlDocs"))
}

fn add_fiscal_impacts(page: &mut TextPage, table: ElementRef, base_url: &str) {
    for cells in table_rows(table) {
        if cells.len() < 2 {
            continue;
        }
        let label = cell_text(cells[0]);
        let Some(version) = page.versions.get_mut(&label) else {
            log::debug!("Fiscal impact statement for unknown version '{}'", label);
            continue;
        };
        let links = extract_document_links(cells[1], base_url);
        if !links.is_empty() {
            version
                .documents
                .entry(DocumentCategory::FiscalImpact)
                .or_default()
                .extend(links);
        }
    }
}
