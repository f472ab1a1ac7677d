use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::{
    SEL_TABLE, cell_text, content_form, non_empty, parse_date_mdy, parse_time_12h, record_hash,
    table_rows,
};
use crate::links::resolve_url;
use crate::types::BillAction;

static SEL_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: anchor"));

/// Parses the Actions tab. Rows come back in page order, which the site
/// already lists chronologically.
pub fn parse_bill_actions(html: &str, bill_id: &str, base_url: &str) -> Vec<BillAction> {
    let document = Html::parse_document(html);

    // The first table in the form is the bill heading; actions follow it.
    let Some(table) = content_form(&document).and_then(|form| form.select(&SEL_TABLE).nth(1))
    else {
        log::warn!("No actions table found for {}", bill_id);
        return Vec::new();
    };

    table_rows(table)
        .into_iter()
        .filter(|cells| cells.len() >= 3)
        .map(|cells| {
            let text_at = |i: usize| cells.get(i).map(|c| cell_text(*c)).and_then(non_empty);

            let chamber = cell_text(cells[0]);
            let description = cell_text(cells[1]);
            let description_url = cells[1]
                .select(&SEL_ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve_url(base_url, href));
            let date = text_at(3).and_then(|t| parse_date_mdy(&t).ok());
            let time = text_at(4).and_then(|t| parse_time_12h(&t).ok());

            let date_key = date.map(|d| d.to_string()).unwrap_or_default();
            let time_key = time.map(|t| t.to_string()).unwrap_or_default();
            let id = format!(
                "{}-Action-{}",
                bill_id,
                record_hash(&[
                    bill_id,
                    chamber.as_str(),
                    description.as_str(),
                    date_key.as_str(),
                    time_key.as_str(),
                ])
            );

            BillAction {
                id,
                chamber,
                description,
                description_url,
                comment: text_at(2),
                date,
                time,
                journal_page: text_at(5),
            }
        })
        .collect()
}
