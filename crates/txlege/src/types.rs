use std::collections::BTreeMap;
use std::{fmt::Display, str::FromStr};

use chrono::{NaiveDate, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Invalid chamber '{0}'. Accepted values: 'house', 'h', 'senate', 's'")]
pub struct ChamberParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    pub fn bill_prefix(&self) -> &'static str {
        match self {
            Chamber::House => "HB",
            Chamber::Senate => "SB",
        }
    }

    /// Element id prefix of this chamber's committee referral cells on a
    /// bill history page.
    pub fn committee_slot(&self) -> &'static str {
        match self {
            Chamber::House => "cellComm1",
            Chamber::Senate => "cellComm2",
        }
    }
}

impl FromStr for Chamber {
    type Err = ChamberParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "house" | "h" => Ok(Chamber::House),
            "senate" | "s" => Ok(Chamber::Senate),
            _ => Err(ChamberParseError(s.to_string())),
        }
    }
}

impl Display for Chamber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chamber::House => write!(f, "House"),
            Chamber::Senate => write!(f, "Senate"),
        }
    }
}

/// Everything a scrape run knows about the session it is working in.
///
/// Passed by value into the scraper so no component keeps session state
/// of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub chamber: Chamber,
    pub session_id: String,
    pub base_url: String,
}

impl SessionContext {
    pub fn new(chamber: Chamber, session_id: impl Into<String>) -> Self {
        Self {
            chamber,
            session_id: session_id.into(),
            base_url: crate::BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn bill_id(&self, bill_number: &str) -> String {
        format!("{}-{}", self.session_id, bill_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillStub {
    pub bill_number: String,
    pub detail_url: String,
}

impl BillStub {
    /// Builds the stub for a bill's history page from its number alone.
    /// A bare number like `12` takes the session chamber's bill prefix.
    pub fn for_session(ctx: &SessionContext, bill_number: &str) -> Self {
        let mut number: String = bill_number.split_whitespace().collect();
        if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
            number = format!("{}{}", ctx.chamber.bill_prefix(), number);
        }
        Self {
            detail_url: format!(
                "{}/BillLookup/History.aspx?LegSess={}&Bill={}",
                ctx.base_url.trim_end_matches('/'),
                ctx.session_id,
                number
            ),
            bill_number: number,
        }
    }

    pub fn text_url(&self) -> String {
        self.detail_url.replace("History.aspx", "Text.aspx")
    }

    pub fn actions_url(&self) -> String {
        self.detail_url.replace("History.aspx", "Actions.aspx")
    }

    pub fn amendments_url(&self) -> String {
        self.detail_url.replace("History.aspx", "Amendments.aspx")
    }
}

impl Display for BillStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.bill_number, self.detail_url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Pdf,
    Word,
    Html,
    Text,
    Unknown,
}

impl Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Pdf => write!(f, "pdf"),
            FileType::Word => write!(f, "word"),
            FileType::Html => write!(f, "html"),
            FileType::Text => write!(f, "text"),
            FileType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    BillText,
    FiscalNote,
    Analysis,
    WitnessList,
    CommitteeSummary,
    FiscalImpact,
    Amendment,
}

impl Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentCategory::BillText => write!(f, "Bill Text"),
            DocumentCategory::FiscalNote => write!(f, "Fiscal Note"),
            DocumentCategory::Analysis => write!(f, "Analysis"),
            DocumentCategory::WitnessList => write!(f, "Witness List"),
            DocumentCategory::CommitteeSummary => write!(f, "Committee Summary"),
            DocumentCategory::FiscalImpact => write!(f, "Fiscal Impact Statement"),
            DocumentCategory::Amendment => write!(f, "Amendment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub url: String,
    pub file_type: FileType,
}

impl Display for DocumentLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.file_type, self.url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillVersion {
    pub version_label: String,
    pub documents: BTreeMap<DocumentCategory, Vec<DocumentLink>>,
}

impl BillVersion {
    pub fn new(version_label: impl Into<String>) -> Self {
        Self {
            version_label: version_label.into(),
            documents: BTreeMap::new(),
        }
    }

    pub fn document_count(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }
}

impl Display for BillVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "── {}", self.version_label)?;
        for (category, links) in &self.documents {
            for link in links {
                writeln!(f, "    {}: {}", category, link)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitteeRef {
    pub committee_id: String,
    pub chamber: Chamber,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeVote {
    pub committee_id: String,
    pub bill_number: String,
    pub ayes: u32,
    pub nays: u32,
    pub present_not_voting: u32,
    pub absent: u32,
}

impl Display for CommitteeVote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ayes={} Nays={} Present Not Voting={} Absent={}",
            self.ayes, self.nays, self.present_not_voting, self.absent
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeReferral {
    pub committee: CommitteeRef,
    /// The committee's meetings page.
    pub url: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub vote: Option<CommitteeVote>,
}

impl Display for CommitteeReferral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} committee {}",
            self.committee.chamber, self.committee.committee_id
        )?;
        if let Some(name) = &self.name {
            write!(f, " ({})", name)?;
        }
        if let Some(status) = &self.status {
            write!(f, " [{}]", status)?;
        }
        if let Some(vote) = &self.vote {
            write!(f, " {}", vote)?;
        }
        Ok(())
    }
}

/// A committee as seen by the committee listing crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeRecord {
    pub committee_id: String,
    pub name: String,
    pub chamber: Chamber,
    #[serde(default)]
    pub bills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillCompanion {
    pub bill_number: String,
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillAction {
    pub id: String,
    pub chamber: String,
    pub description: String,
    pub description_url: Option<String>,
    pub comment: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub journal_page: Option<String>,
}

impl Display for BillAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.date {
            Some(date) => write!(f, "{}", date)?,
            None => write!(f, "          ")?,
        }
        if let Some(time) = self.time {
            write!(f, " {}", time.format("%H:%M"))?;
        }
        write!(f, " [{}] {}", self.chamber, self.description)?;
        if let Some(comment) = &self.comment {
            write!(f, " ({})", comment)?;
        }
        if let Some(page) = &self.journal_page {
            write!(f, " p.{}", page)?;
        }
        Ok(())
    }
}

/// Co-authors of an amendment: a parsed list when the co-authors page was
/// fetched, otherwise the raw text of the amendment table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoAuthors {
    List(Vec<String>),
    Raw(String),
}

impl Display for CoAuthors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoAuthors::List(names) => write!(f, "{}", names.join(", ")),
            CoAuthors::Raw(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillAmendment {
    pub id: String,
    pub chamber: String,
    pub reading: String,
    pub number: String,
    pub author: String,
    pub amendment_type: String,
    pub action: String,
    pub action_date: Option<NaiveDate>,
    pub co_authors: Option<CoAuthors>,
    /// Amendment text, filed under [`DocumentCategory::Amendment`].
    pub documents: BTreeMap<DocumentCategory, Vec<DocumentLink>>,
}

impl Display for BillAmendment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} #{} by {}: {} {}",
            self.chamber, self.reading, self.number, self.author, self.amendment_type, self.action
        )?;
        if let Some(date) = self.action_date {
            write!(f, " ({})", date)?;
        }
        if let Some(co_authors) = &self.co_authors {
            write!(f, " with {}", co_authors)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub legislative_session: String,
    pub bill_number: String,
    pub bill_url: String,
    pub caption_version: Option<String>,
    pub caption_text: Option<String>,
    pub authors: Option<String>,
    pub sponsors: Option<String>,
    pub last_action_date: Option<NaiveDate>,
    pub subjects: Vec<String>,
    pub companion: Option<BillCompanion>,
    pub committees: Vec<CommitteeReferral>,
    pub versions: IndexMap<String, BillVersion>,
    /// Text tab documents not tied to a version, keyed by link text.
    pub additional_documents: IndexMap<String, Vec<DocumentLink>>,
    pub actions: Vec<BillAction>,
    pub amendments: Vec<BillAmendment>,
}

impl Bill {
    pub fn from_stub(ctx: &SessionContext, stub: &BillStub) -> Self {
        Self {
            id: ctx.bill_id(&stub.bill_number),
            legislative_session: ctx.session_id.clone(),
            bill_number: stub.bill_number.clone(),
            bill_url: stub.detail_url.clone(),
            caption_version: None,
            caption_text: None,
            authors: None,
            sponsors: None,
            last_action_date: None,
            subjects: Vec::new(),
            companion: None,
            committees: Vec::new(),
            versions: IndexMap::new(),
            additional_documents: IndexMap::new(),
            actions: Vec::new(),
            amendments: Vec::new(),
        }
    }
}

impl Display for Bill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} ─ {}", self.bill_number, self.legislative_session)?;
        if let Some(caption) = &self.caption_text {
            writeln!(f, "│  Caption: {}", caption)?;
        }
        if let Some(authors) = &self.authors {
            writeln!(f, "│  Authors: {}", authors)?;
        }
        if let Some(sponsors) = &self.sponsors {
            writeln!(f, "│  Sponsors: {}", sponsors)?;
        }
        if let Some(date) = self.last_action_date {
            writeln!(f, "│  Last action: {}", date)?;
        }
        if !self.subjects.is_empty() {
            writeln!(f, "│  Subjects: {}", self.subjects.join("; "))?;
        }
        if let Some(companion) = &self.companion {
            writeln!(f, "│  Companion: {}", companion.bill_number)?;
        }
        for referral in &self.committees {
            writeln!(f, "│  {}", referral)?;
        }
        writeln!(
            f,
            "└─ {} version(s), {} action(s), {} amendment(s)",
            self.versions.len(),
            self.actions.len(),
            self.amendments.len()
        )?;
        for version in self.versions.values() {
            write!(f, "{}", version)?;
        }
        for (label, links) in &self.additional_documents {
            for link in links {
                writeln!(f, "  + {}: {}", label, link)?;
            }
        }
        for action in &self.actions {
            writeln!(f, "  ▸ {}", action)?;
        }
        for amendment in &self.amendments {
            writeln!(f, "  ✎ {}", amendment)?;
        }
        Ok(())
    }
}
