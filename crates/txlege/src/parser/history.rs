use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::{ParseError, cell_text, elem_text, find_date, non_empty, normalize_whitespace};
use crate::links::resolve_url;
use crate::types::{BillCompanion, SessionContext};

static SEL_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: anchor"));

/// The flat fields of a bill's history page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillFields {
    pub last_action_date: Option<chrono::NaiveDate>,
    pub caption_version: Option<String>,
    pub caption_text: Option<String>,
    pub authors: Option<String>,
    pub sponsors: Option<String>,
    pub subjects: Vec<String>,
    pub companion: Option<BillCompanion>,
}

/// A committee referral as printed on the history page, before it is
/// checked against the committee registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeSlot {
    pub committee_id: String,
    pub name: Option<String>,
    pub url: String,
    pub status: Option<String>,
    pub vote_text: Option<String>,
}

fn by_id(id: &str) -> Selector {
    Selector::parse(&format!("#{}", id)).unwrap()
}

fn text_by_id(document: &Html, id: &str) -> Option<String> {
    document
        .select(&by_id(id))
        .next()
        .map(cell_text)
        .and_then(non_empty)
}

/// Subjects are rendered one per line, separated by `<br>` tags.
fn parse_subjects(document: &Html) -> Vec<String> {
    let Some(cell) = document.select(&by_id("cellSubjects")).next() else {
        return Vec::new();
    };

    cell.inner_html()
        .split("<br>")
        .map(|fragment| {
            let fragment = Html::parse_fragment(fragment);
            normalize_whitespace(&elem_text(fragment.root_element()))
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_companion(document: &Html, page_url: &str, ctx: &SessionContext) -> Option<BillCompanion> {
    let cell = document.select(&by_id("cellCompanions")).next()?;
    let link = cell.select(&SEL_ANCHOR).next()?;
    let href = link.value().attr("href")?;
    let bill_number: String = elem_text(link).split_whitespace().collect();
    if bill_number.is_empty() {
        return None;
    }

    Some(BillCompanion {
        bill_number,
        url: resolve_url(page_url, href)?,
        session_id: ctx.session_id.clone(),
    })
}

/// Missing cells are expected on TLO pages and come back as `None`.
pub fn parse_bill_fields(html: &str, page_url: &str, ctx: &SessionContext) -> BillFields {
    let document = Html::parse_document(html);

    BillFields {
        last_action_date: text_by_id(&document, "cellLastAction")
            .as_deref()
            .and_then(find_date),
        caption_version: text_by_id(&document, "cellCaptionVersion"),
        caption_text: text_by_id(&document, "cellCaptionText"),
        authors: text_by_id(&document, "cellAuthors"),
        sponsors: text_by_id(&document, "cellSponsors"),
        subjects: parse_subjects(&document),
        companion: parse_companion(&document, page_url, ctx),
    }
}

/// Reads one committee referral slot (`cellComm1` for the House,
/// `cellComm2` for the Senate). `Ok(None)` means the bill was never
/// referred in that chamber.
pub fn parse_committee_slot(
    html: &str,
    slot: &str,
    base_url: &str,
) -> Result<Option<CommitteeSlot>, ParseError> {
    let document = Html::parse_document(html);

    let Some(link) = document
        .select(&by_id(&format!("{}Committee", slot)))
        .next()
        .and_then(|cell| cell.select(&SEL_ANCHOR).next())
    else {
        return Ok(None);
    };

    let href = link.value().attr("href").unwrap_or_default();
    let url = resolve_url(base_url, href)
        .ok_or_else(|| ParseError::UrlParse(format!("Invalid committee link: {}", href)))?;
    let committee_id = Url::parse(&url)
        .map_err(|e| ParseError::UrlParse(format!("{}: {}", url, e)))?
        .query_pairs()
        .find(|(key, _)| key == "CmteCode")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ParseError::MissingField(format!("CmteCode in {}", url)))?;

    Ok(Some(CommitteeSlot {
        committee_id,
        name: non_empty(cell_text(link)),
        url,
        status: text_by_id(&document, &format!("{}CommitteeStatus", slot)),
        vote_text: text_by_id(&document, &format!("{}CommitteeVote", slot)),
    }))
}
