use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::committees::CommitteeRegistry;
use crate::config::ScraperConfig;
use crate::fetcher::{FetchError, HttpTransport, PageFetcher, ReqwestTransport};
use crate::parser::{
    parse_amendments, parse_bill_actions, parse_bill_fields, parse_coauthors,
    parse_committee_slot, parse_text_page,
};
use crate::types::{Bill, BillAmendment, BillStub, Chamber, CoAuthors, SessionContext};

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Fetch failed: {0}")]
    FetchError(#[from] FetchError),
}

/// Scrapes bill detail pages for one session and chamber.
#[derive(Debug, Clone)]
pub struct BillDetailScraper {
    fetcher: PageFetcher,
    ctx: SessionContext,
    progress_interval: usize,
}

impl BillDetailScraper {
    pub fn new(ctx: SessionContext, config: &ScraperConfig) -> Result<Self, ScraperError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(ctx, Arc::new(transport), config))
    }

    pub fn with_transport(
        ctx: SessionContext,
        transport: Arc<dyn HttpTransport>,
        config: &ScraperConfig,
    ) -> Self {
        Self {
            fetcher: PageFetcher::new(transport, config),
            ctx,
            progress_interval: config.progress_interval.max(1),
        }
    }

    /// Scrapes every stub, at most `concurrency` bills at a time.
    ///
    /// A bill whose pages fail comes back with whatever was gathered before
    /// the failure. A bill whose task panics is left out. Results keep the
    /// order of `stubs`.
    pub async fn fetch(
        &self,
        stubs: &IndexMap<String, BillStub>,
        registry: &CommitteeRegistry,
        concurrency: usize,
    ) -> IndexMap<String, Bill> {
        let total = stubs.len();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let processed = Arc::new(AtomicUsize::new(0));

        log::info!(
            "Fetching details for {} {} bill(s) in {} ({} at a time)...",
            total,
            self.ctx.chamber,
            self.ctx.session_id,
            concurrency.max(1)
        );

        let mut tasks = JoinSet::new();
        let mut task_bills = HashMap::new();
        for (key, stub) in stubs {
            let scraper = self.clone();
            let registry = registry.clone();
            let semaphore = Arc::clone(&semaphore);
            let processed = Arc::clone(&processed);
            let key = key.clone();
            let stub = stub.clone();
            let bill_number = stub.bill_number.clone();

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let bill = scraper.fetch_bill(&stub, &registry).await;

                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % scraper.progress_interval == 0 {
                    log::info!("Processed {} of {} bills", done, total);
                }
                (key, bill)
            });
            task_bills.insert(handle.id(), bill_number);
        }

        let mut bills = HashMap::with_capacity(total);
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((key, bill)) => {
                    bills.insert(key, bill);
                }
                Err(e) => {
                    let bill_number = task_bills.get(&e.id()).map(String::as_str);
                    log::error!(
                        "Failed to process {}: {}",
                        bill_number.unwrap_or("unknown bill"),
                        e
                    );
                }
            }
        }

        log::info!("Fetched {} of {} bill(s)", bills.len(), total);

        stubs
            .keys()
            .filter_map(|key| bills.remove(key).map(|bill| (key.clone(), bill)))
            .collect()
    }

    /// Runs the History, Text, Actions and Amendments stages for one bill.
    /// A failing stage is logged and the remaining stages still run.
    pub async fn fetch_bill(&self, stub: &BillStub, registry: &CommitteeRegistry) -> Bill {
        let mut bill = Bill::from_stub(&self.ctx, stub);
        log::debug!("Fetching bill {}", stub);

        if let Err(e) = self.fetch_history(&mut bill, stub, registry).await {
            log::error!("Failed to fetch history for {}: {}", bill.bill_number, e);
        }
        if let Err(e) = self.fetch_versions(&mut bill, stub).await {
            log::error!("Failed to fetch versions for {}: {}", bill.bill_number, e);
        }
        if let Err(e) = self.fetch_actions(&mut bill, stub).await {
            log::error!("Failed to fetch actions for {}: {}", bill.bill_number, e);
        }
        if let Err(e) = self.fetch_amendments(&mut bill, stub).await {
            log::error!("Failed to fetch amendments for {}: {}", bill.bill_number, e);
        }

        bill
    }

    async fn fetch_history(
        &self,
        bill: &mut Bill,
        stub: &BillStub,
        registry: &CommitteeRegistry,
    ) -> Result<(), ScraperError> {
        let Some(html) = self.fetcher.fetch(&stub.detail_url).await? else {
            return Ok(());
        };

        let fields = parse_bill_fields(&html, &stub.detail_url, &self.ctx);
        bill.last_action_date = fields.last_action_date;
        bill.caption_version = fields.caption_version;
        bill.caption_text = fields.caption_text;
        bill.authors = fields.authors;
        bill.sponsors = fields.sponsors;
        bill.subjects = fields.subjects;
        bill.companion = fields.companion;

        for chamber in [Chamber::House, Chamber::Senate] {
            let slot = match parse_committee_slot(&html, chamber.committee_slot(), &self.ctx.base_url) {
                Ok(Some(slot)) => slot,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!(
                        "Unreadable {} committee referral on {}: {}",
                        chamber,
                        bill.bill_number,
                        e
                    );
                    continue;
                }
            };
            match registry.resolve(slot, chamber, &bill.bill_number) {
                Ok(referral) => bill.committees.push(referral),
                Err(e) => log::error!("{} referral for {}: {}", chamber, bill.bill_number, e),
            }
        }

        Ok(())
    }

    async fn fetch_versions(&self, bill: &mut Bill, stub: &BillStub) -> Result<(), ScraperError> {
        if let Some(html) = self.fetcher.fetch(&stub.text_url()).await? {
            let page = parse_text_page(&html, &self.ctx.base_url);
            bill.versions = page.versions;
            bill.additional_documents = page.additional_documents;
        }
        Ok(())
    }

    async fn fetch_actions(&self, bill: &mut Bill, stub: &BillStub) -> Result<(), ScraperError> {
        if let Some(html) = self.fetcher.fetch(&stub.actions_url()).await? {
            bill.actions = parse_bill_actions(&html, &bill.id, &self.ctx.base_url);
        }
        Ok(())
    }

    async fn fetch_amendments(&self, bill: &mut Bill, stub: &BillStub) -> Result<(), ScraperError> {
        let Some(html) = self.fetcher.fetch(&stub.amendments_url()).await? else {
            return Ok(());
        };

        for row in parse_amendments(&html, &bill.id, &self.ctx.base_url) {
            let mut amendment = row.amendment;
            if let Some(url) = row.coauthors_url {
                self.fetch_coauthors(&mut amendment, &url).await;
            }
            bill.amendments.push(amendment);
        }
        Ok(())
    }

    /// Replaces the raw co-author text with the names from the co-authors
    /// page. The raw text stays when that page can't be read.
    async fn fetch_coauthors(&self, amendment: &mut BillAmendment, url: &str) {
        match self.fetcher.fetch(url).await {
            Ok(Some(html)) => match parse_coauthors(&html) {
                Some(names) => amendment.co_authors = Some(CoAuthors::List(names)),
                None => log::warn!("No co-authors listed at {}", url),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Failed to fetch co-authors from {}: {}", url, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::stub::StubTransport;
    use crate::types::{CommitteeRecord, DocumentCategory, DocumentLink, FileType};
    use async_trait::async_trait;
    use std::fs;
    use std::time::Duration;

    /// Answers every request with an empty page after a short delay and
    /// records the most requests it saw open at once.
    #[derive(Default)]
    struct InFlightTransport {
        open: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for InFlightTransport {
        async fn get(&self, _url: &str) -> Result<String, FetchError> {
            let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(open, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.open.fetch_sub(1, Ordering::SeqCst);
            Ok("<html><body></body></html>".to_string())
        }
    }

    const HB1: &str = "https://capitol.texas.gov/BillLookup/History.aspx?LegSess=88R&Bill=HB1";

    fn ctx() -> SessionContext {
        SessionContext::new(Chamber::House, "88R")
    }

    fn scraper(transport: Arc<dyn HttpTransport>) -> BillDetailScraper {
        let config = ScraperConfig {
            retry_delay_secs: 0,
            ..ScraperConfig::default()
        };
        BillDetailScraper::with_transport(ctx(), transport, &config)
    }

    fn fixture(name: &str) -> String {
        fs::read_to_string(format!("fixtures/{}", name)).expect("Failed to read fixture")
    }

    fn registry() -> CommitteeRegistry {
        CommitteeRegistry::from_records([
            CommitteeRecord {
                committee_id: "C030".to_string(),
                name: "Appropriations".to_string(),
                chamber: Chamber::House,
                bills: Vec::new(),
            },
            CommitteeRecord {
                committee_id: "C540".to_string(),
                name: "Finance".to_string(),
                chamber: Chamber::Senate,
                bills: Vec::new(),
            },
        ])
    }

    fn stubs(numbers: &[&str]) -> IndexMap<String, BillStub> {
        numbers
            .iter()
            .map(|n| (n.to_string(), BillStub::for_session(&ctx(), n)))
            .collect()
    }

    fn minimal_pages(transport: StubTransport, number: &str, caption: &str) -> StubTransport {
        let stub = BillStub::for_session(&ctx(), number);
        transport
            .page(
                &stub.detail_url,
                &format!(r#"<table><tr><td id="cellCaptionText">{}</td></tr></table>"#, caption),
            )
            .page(
                &stub.text_url(),
                r#"<html><body><form id="Form1"></form><form id="ctl00"><table>
                    <tr><th>Version</th><th>Bill</th><th>Fiscal Note</th><th>Analysis</th><th>Witness List</th><th>Summary</th></tr>
                    <tr><td>Introduced</td><td><a href="../tlodocs/88R/billtext/pdf/HB00010I.pdf">PDF</a></td><td></td><td></td><td></td><td></td></tr>
                </table></form></body></html>"#,
            )
            .page(&stub.actions_url(), "<html><body></body></html>")
            .page(&stub.amendments_url(), "<html><body></body></html>")
    }

    #[tokio::test]
    async fn test_single_bill_end_to_end() {
        let transport = Arc::new(minimal_pages(StubTransport::new(), "HB10", "relating to the budget"));

        let bills = scraper(transport)
            .fetch(&stubs(&["HB10"]), &registry(), 10)
            .await;

        let bill = &bills["HB10"];
        assert_eq!(bill.id, "88R-HB10");
        assert_eq!(bill.caption_text.as_deref(), Some("relating to the budget"));
        assert!(bill.companion.is_none());
        assert!(bill.committees.is_empty());
        assert!(bill.amendments.is_empty());
        assert!(bill.additional_documents.is_empty());
        assert_eq!(bill.versions.len(), 1);
        assert_eq!(
            bill.versions["Introduced"].documents[&DocumentCategory::BillText],
            vec![DocumentLink {
                url: "https://capitol.texas.gov/tlodocs/88R/billtext/pdf/HB00010I.pdf".to_string(),
                file_type: FileType::Pdf,
            }]
        );
        assert_eq!(bill.versions["Introduced"].documents.len(), 1);
    }

    #[tokio::test]
    async fn test_full_bill_from_fixtures() {
        let stub = BillStub::for_session(&ctx(), "HB1");
        assert_eq!(stub.detail_url, HB1);
        let coauthors =
            "https://capitol.texas.gov/BillLookup/AmendCoauthors.aspx?LegSess=88R&Bill=HB1&AmendID=H1";
        let transport = Arc::new(
            StubTransport::new()
                .page(&stub.detail_url, &fixture("history_HB1.html"))
                .page(&stub.text_url(), &fixture("text_HB1.html"))
                .page(&stub.actions_url(), &fixture("actions_HB1.html"))
                .page(&stub.amendments_url(), &fixture("amendments_HB1.html"))
                .page(coauthors, &fixture("coauthors_H1.html")),
        );
        let registry = registry();

        let bill = scraper(transport.clone()).fetch_bill(&stub, &registry).await;

        assert_eq!(bill.caption_version.as_deref(), Some("Enrolled"));
        assert_eq!(bill.subjects.len(), 3);
        assert_eq!(bill.companion.as_ref().map(|c| c.bill_number.as_str()), Some("SB1"));

        assert_eq!(bill.committees.len(), 2);
        assert_eq!(bill.committees[0].committee.chamber, Chamber::House);
        assert_eq!(bill.committees[0].vote.as_ref().map(|v| v.absent), Some(2));
        assert_eq!(bill.committees[1].committee.committee_id, "C540");
        assert_eq!(registry.get("C030").unwrap().bills, vec!["HB1"]);
        assert_eq!(registry.get("C540").unwrap().bills, vec!["HB1"]);

        assert_eq!(bill.versions.len(), 4);
        assert_eq!(bill.additional_documents.len(), 2);
        assert_eq!(bill.actions.len(), 5);
        assert_eq!(bill.amendments.len(), 3);
        assert_eq!(
            bill.amendments[0].co_authors,
            Some(CoAuthors::List(vec![
                "Capriglione".to_string(),
                "Howard".to_string(),
                "Walle".to_string(),
            ]))
        );
        assert_eq!(
            bill.amendments[1].co_authors,
            Some(CoAuthors::Raw("Smith, Jones".to_string()))
        );
        assert_eq!(transport.calls_to(coauthors), 1);
    }

    #[tokio::test]
    async fn test_coauthor_fetch_failure_keeps_raw_text() {
        let stub = BillStub::for_session(&ctx(), "HB1");
        let coauthors =
            "https://capitol.texas.gov/BillLookup/AmendCoauthors.aspx?LegSess=88R&Bill=HB1&AmendID=H1";
        let transport = Arc::new(
            StubTransport::new()
                .page(&stub.amendments_url(), &fixture("amendments_HB1.html"))
                .failing(coauthors, FetchError::TimedOut),
        );

        let bill = scraper(transport.clone()).fetch_bill(&stub, &registry()).await;

        assert_eq!(
            bill.amendments[0].co_authors,
            Some(CoAuthors::Raw("View".to_string()))
        );
        assert_eq!(transport.calls_to(coauthors), 5);
    }

    #[tokio::test]
    async fn test_unknown_committee_fails_only_its_slot() {
        let stub = BillStub::for_session(&ctx(), "HB1");
        let transport = Arc::new(
            StubTransport::new()
                .page(&stub.detail_url, &fixture("history_HB1.html"))
                .page(&stub.text_url(), &fixture("text_HB1.html")),
        );
        let registry = CommitteeRegistry::from_records([CommitteeRecord {
            committee_id: "C540".to_string(),
            name: "Finance".to_string(),
            chamber: Chamber::Senate,
            bills: Vec::new(),
        }]);

        let bill = scraper(transport).fetch_bill(&stub, &registry).await;

        assert_eq!(bill.committees.len(), 1);
        assert_eq!(bill.committees[0].committee.committee_id, "C540");
        assert_eq!(bill.caption_text.as_deref(), Some("General Appropriations Bill."));
        assert_eq!(bill.versions.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_page_leaves_partial_bill() {
        let stub = BillStub::for_session(&ctx(), "HB1");
        let transport = Arc::new(
            StubTransport::new()
                .page(&stub.detail_url, &fixture("history_HB1.html"))
                .failing(&stub.text_url(), FetchError::HttpStatus(500))
                .page(&stub.actions_url(), &fixture("actions_HB1.html")),
        );

        let bill = scraper(transport).fetch_bill(&stub, &registry()).await;

        assert_eq!(bill.caption_text.as_deref(), Some("General Appropriations Bill."));
        assert!(bill.versions.is_empty());
        assert_eq!(bill.actions.len(), 5);
        assert!(bill.amendments.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_bill_does_not_sink_batch() {
        let mut transport = StubTransport::new();
        for (number, caption) in [("HB1", "first"), ("HB2", "second"), ("HB3", "third")] {
            transport = minimal_pages(transport, number, caption);
        }
        let second = BillStub::for_session(&ctx(), "HB2");
        let transport = Arc::new(transport.panicking(&second.text_url()));

        let bills = scraper(transport)
            .fetch(&stubs(&["HB1", "HB2", "HB3"]), &registry(), 2)
            .await;

        assert_eq!(bills.keys().collect::<Vec<_>>(), vec!["HB1", "HB3"]);
        assert_eq!(bills["HB1"].caption_text.as_deref(), Some("first"));
        assert_eq!(bills["HB3"].caption_text.as_deref(), Some("third"));
        assert_eq!(bills["HB3"].versions.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_bill_returns_partial_record_in_batch() {
        let mut transport = StubTransport::new();
        for (number, caption) in [("HB1", "first"), ("HB3", "third")] {
            transport = minimal_pages(transport, number, caption);
        }
        let second = BillStub::for_session(&ctx(), "HB2");
        let transport = Arc::new(
            transport
                .page(
                    &second.detail_url,
                    r#"<table><tr><td id="cellCaptionText">second</td></tr></table>"#,
                )
                .failing(&second.text_url(), FetchError::HttpStatus(503)),
        );

        let bills = scraper(transport)
            .fetch(&stubs(&["HB1", "HB2", "HB3"]), &registry(), 10)
            .await;

        assert_eq!(bills.len(), 3);
        assert_eq!(bills["HB2"].caption_text.as_deref(), Some("second"));
        assert!(bills["HB2"].versions.is_empty());
        assert_eq!(bills["HB1"].versions.len(), 1);
        assert_eq!(bills["HB3"].versions.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_pages_yield_empty_bill() {
        let transport = Arc::new(StubTransport::new().failing(HB1, FetchError::ConnectionRefused));

        let bills = scraper(transport).fetch(&stubs(&["HB1"]), &registry(), 1).await;

        let bill = &bills["HB1"];
        assert!(bill.caption_text.is_none());
        assert!(bill.versions.is_empty());
        assert!(bill.actions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_respects_concurrency_limit() {
        let transport = Arc::new(InFlightTransport::default());
        let numbers: Vec<String> = (1..=20).map(|n| format!("HB{}", n)).collect();
        let numbers: Vec<&str> = numbers.iter().map(String::as_str).collect();

        let bills = scraper(transport.clone())
            .fetch(&stubs(&numbers), &registry(), 3)
            .await;

        assert_eq!(bills.len(), 20);
        let peak = transport.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "{} requests were open at once", peak);
        assert!(peak > 1, "bills were scraped one at a time");
    }
}
