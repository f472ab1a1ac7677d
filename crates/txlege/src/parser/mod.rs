//! Parsers for the Texas Legislature Online bill pages.
//!
//! Every parser takes the raw page body and returns owned data. The parsed
//! `scraper::Html` is never held across an await point, since it is not
//! `Send`.

mod actions;
mod amendments;
mod history;
mod text;

pub use actions::parse_bill_actions;
pub use amendments::{AmendmentRow, coauthors_url, parse_amendments, parse_coauthors};
pub use history::{BillFields, CommitteeSlot, parse_bill_fields, parse_committee_slot};
pub use text::{TextPage, parse_text_page};

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse URL: {0}")]
    UrlParse(String),
    #[error("Failed to parse date: {0}")]
    DateParse(String),
    #[error("Failed to parse time: {0}")]
    TimeParse(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
}

static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}/\d{2}/\d{4}").expect("invalid regex: date"));

static SEL_FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("invalid selector: form"));
static SEL_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("invalid selector: table"));
static SEL_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("invalid selector: row"));
static SEL_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("invalid selector: cell"));

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cell_text(cell: ElementRef) -> String {
    normalize_whitespace(&elem_text(cell))
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

/// Finds the first `MM/DD/YYYY` date anywhere in `text`.
fn find_date(text: &str) -> Option<NaiveDate> {
    RE_DATE
        .find(text)
        .and_then(|m| parse_date_mdy(m.as_str()).ok())
}

fn parse_date_mdy(text: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(text.trim(), "%m/%d/%Y")
        .map_err(|_| ParseError::DateParse(format!("Invalid date: {}", text)))
}

fn parse_time_12h(time_str: &str) -> Result<NaiveTime, ParseError> {
    let s = time_str.trim();
    let pos = s
        .rfind(' ')
        .ok_or_else(|| ParseError::TimeParse(format!("Invalid time: {}", s)))?;
    let (t, ampm) = (&s[..pos], s[pos + 1..].trim());

    let (hour, minute) = t
        .split_once(':')
        .ok_or_else(|| ParseError::TimeParse(format!("Invalid time format: {}", s)))?;
    let hour: u32 = hour
        .trim()
        .parse()
        .map_err(|_| ParseError::TimeParse(format!("Invalid hour: {}", hour)))?;
    let minute: u32 = minute
        .trim()
        .parse()
        .map_err(|_| ParseError::TimeParse(format!("Invalid minute: {}", minute)))?;

    if !(1..=12).contains(&hour) {
        return Err(ParseError::TimeParse(format!("Invalid hour: {}", hour)));
    }
    let hour_24 = match ampm.to_uppercase().as_str() {
        "AM" => hour % 12,
        "PM" => hour % 12 + 12,
        _ => return Err(ParseError::TimeParse(format!("Invalid AM/PM: {}", ampm))),
    };

    NaiveTime::from_hms_opt(hour_24, minute, 0)
        .ok_or_else(|| ParseError::TimeParse(format!("Invalid time: {}:{}", hour_24, minute)))
}

/// The TLO bill tabs render their data inside the page's second form.
fn content_form(document: &Html) -> Option<ElementRef<'_>> {
    document.select(&SEL_FORM).nth(1)
}

/// The first table that starts after `element` in document order, whether
/// or not it is nested inside it.
fn next_table<'a>(document: &'a Html, element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let target = (*element).id();
    document
        .root_element()
        .descendants()
        .skip_while(|node| node.id() != target)
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
}

/// Data rows of a table, header row excluded, each as its list of cells.
fn table_rows(table: ElementRef<'_>) -> Vec<Vec<ElementRef<'_>>> {
    table
        .select(&SEL_ROW)
        .skip(1)
        .map(|row| row.select(&SEL_CELL).collect())
        .collect()
}

/// Stable identifier for records the site gives no id of their own.
fn record_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1f");
    }
    hex::encode(&hasher.finalize()[..8])
}
