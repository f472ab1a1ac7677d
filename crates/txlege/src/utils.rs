use indexmap::IndexMap;

use crate::types::{Bill, BillStub};

/// Narrows a stub map before scraping.
#[derive(Debug, Default)]
pub struct StubFilter {
    pub bills: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl StubFilter {
    pub fn apply(self, stubs: IndexMap<String, BillStub>) -> IndexMap<String, BillStub> {
        let mut stubs: IndexMap<String, BillStub> = if self.bills.is_empty() {
            stubs
        } else {
            stubs
                .into_iter()
                .filter(|(_, stub)| self.bills.iter().any(|b| b == &stub.bill_number))
                .collect()
        };
        if let Some(off) = self.offset {
            stubs = stubs.into_iter().skip(off).collect();
        }
        if let Some(lim) = self.limit {
            stubs.truncate(lim);
        }
        stubs
    }

    pub fn validate(self) -> Result<Self, String> {
        if self.offset.is_some_and(|o| o == 0) {
            return Err("Offset must be greater than 0".to_string());
        }
        if self.limit.is_some_and(|l| l == 0) {
            return Err("Limit must be greater than 0".to_string());
        }
        Ok(self)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub bills: usize,
    pub versions: usize,
    pub documents: usize,
    pub actions: usize,
    pub amendments: usize,
    pub committee_referrals: usize,
}

impl BatchStats {
    pub fn from_bills<'a>(bills: impl IntoIterator<Item = &'a Bill>) -> BatchStats {
        bills.into_iter().fold(BatchStats::default(), |mut stats, bill| {
            stats.bills += 1;
            stats.versions += bill.versions.len();
            stats.documents += bill
                .versions
                .values()
                .map(|v| v.document_count())
                .sum::<usize>();
            stats.documents += bill
                .amendments
                .iter()
                .flat_map(|a| a.documents.values())
                .map(Vec::len)
                .sum::<usize>();
            stats.documents += bill.additional_documents.values().map(Vec::len).sum::<usize>();
            stats.actions += bill.actions.len();
            stats.amendments += bill.amendments.len();
            stats.committee_referrals += bill.committees.len();
            stats
        })
    }
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Bills:                {}", self.bills)?;
        writeln!(f, "  Versions:             {}", self.versions)?;
        writeln!(f, "  Documents:            {}", self.documents)?;
        writeln!(f, "  Actions:              {}", self.actions)?;
        writeln!(f, "  Amendments:           {}", self.amendments)?;
        writeln!(f, "  Committee referrals:  {}", self.committee_referrals)
    }
}
