use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use regex::Regex;

use crate::parser::CommitteeSlot;
use crate::types::{Chamber, CommitteeRecord, CommitteeRef, CommitteeReferral, CommitteeVote};

#[derive(Debug, thiserror::Error)]
pub enum CommitteeError {
    #[error("Committee {0} not found in committee list")]
    UnknownCommittee(String),
}

static RE_AYES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Ayes=(\d+)").expect("invalid regex: ayes"));
static RE_NAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Nays=(\d+)").expect("invalid regex: nays"));
static RE_PRESENT_NOT_VOTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Present Not Voting=(\d+)").expect("invalid regex: present not voting")
});
static RE_ABSENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Absent=(\d+)").expect("invalid regex: absent"));

fn count(re: &Regex, text: &str) -> u32 {
    re.captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

impl CommitteeVote {
    /// Reads a tally like `Ayes=25 Nays=0 Present Not Voting=0 Absent=2`.
    /// Counts that are missing or unreadable are zero.
    pub fn from_tally(committee_id: &str, bill_number: &str, text: &str) -> Self {
        Self {
            committee_id: committee_id.to_string(),
            bill_number: bill_number.to_string(),
            ayes: count(&RE_AYES, text),
            nays: count(&RE_NAYS, text),
            present_not_voting: count(&RE_PRESENT_NOT_VOTING, text),
            absent: count(&RE_ABSENT, text),
        }
    }
}

/// Committees known to the scrape run, keyed by committee code.
///
/// The registry is built before bill scraping starts and shared by every
/// bill pipeline. Pipelines only append bill numbers to existing entries,
/// one at a time under the lock.
#[derive(Debug, Clone, Default)]
pub struct CommitteeRegistry {
    committees: Arc<Mutex<IndexMap<String, CommitteeRecord>>>,
}

impl CommitteeRegistry {
    pub fn new(committees: IndexMap<String, CommitteeRecord>) -> Self {
        Self {
            committees: Arc::new(Mutex::new(committees)),
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = CommitteeRecord>) -> Self {
        Self::new(
            records
                .into_iter()
                .map(|record| (record.committee_id.clone(), record))
                .collect(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, CommitteeRecord>> {
        self.committees.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, committee_id: &str) -> bool {
        self.lock().contains_key(committee_id)
    }

    pub fn get(&self, committee_id: &str) -> Option<CommitteeRecord> {
        self.lock().get(committee_id).cloned()
    }

    /// A copy of the registry as it stands, bill lists included.
    pub fn snapshot(&self) -> IndexMap<String, CommitteeRecord> {
        self.lock().clone()
    }

    /// Checks a referral against the registry and records the bill under
    /// its committee.
    pub fn resolve(
        &self,
        slot: CommitteeSlot,
        chamber: Chamber,
        bill_number: &str,
    ) -> Result<CommitteeReferral, CommitteeError> {
        {
            let mut committees = self.lock();
            let record = committees
                .get_mut(&slot.committee_id)
                .ok_or_else(|| CommitteeError::UnknownCommittee(slot.committee_id.clone()))?;
            if !record.bills.iter().any(|b| b == bill_number) {
                record.bills.push(bill_number.to_string());
            }
        }

        let vote = slot
            .vote_text
            .as_deref()
            .map(|text| CommitteeVote::from_tally(&slot.committee_id, bill_number, text));

        Ok(CommitteeReferral {
            committee: CommitteeRef {
                committee_id: slot.committee_id,
                chamber,
            },
            url: slot.url,
            name: slot.name,
            status: slot.status,
            vote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
                bills: vec!["SB1".to_string()],
            },
        ])
    }

    fn slot(committee_id: &str, vote_text: Option<&str>) -> CommitteeSlot {
        CommitteeSlot {
            committee_id: committee_id.to_string(),
            name: Some("Appropriations".to_string()),
            url: format!(
                "https://capitol.texas.gov/Committees/MeetingsByCmte.aspx?CmteCode={}",
                committee_id
            ),
            status: Some("Out of committee".to_string()),
            vote_text: vote_text.map(String::from),
        }
    }

    #[test]
    fn test_full_tally() {
        let vote = CommitteeVote::from_tally(
            "C030",
            "HB1",
            "Ayes=25   Nays=3   Present Not Voting=1   Absent=2",
        );
        assert_eq!(
            (vote.ayes, vote.nays, vote.present_not_voting, vote.absent),
            (25, 3, 1, 2)
        );
        assert_eq!(vote.committee_id, "C030");
        assert_eq!(vote.bill_number, "HB1");
    }

    #[test]
    fn test_unmatched_tally_is_zero() {
        let vote = CommitteeVote::from_tally("C030", "HB1", "Reported favorably");
        assert_eq!(
            (vote.ayes, vote.nays, vote.present_not_voting, vote.absent),
            (0, 0, 0, 0)
        );
    }

    #[test]
    fn test_partial_tally() {
        let vote = CommitteeVote::from_tally("C030", "HB1", "Ayes=5");
        assert_eq!(
            (vote.ayes, vote.nays, vote.present_not_voting, vote.absent),
            (5, 0, 0, 0)
        );
    }

    #[test]
    fn test_resolve_records_bill() {
        let registry = registry();

        let referral = registry
            .resolve(slot("C030", Some("Ayes=25 Nays=0")), Chamber::House, "HB1")
            .expect("C030 is registered");

        assert_eq!(referral.committee.committee_id, "C030");
        assert_eq!(referral.committee.chamber, Chamber::House);
        assert_eq!(
            referral.url,
            "https://capitol.texas.gov/Committees/MeetingsByCmte.aspx?CmteCode=C030"
        );
        assert_eq!(referral.status.as_deref(), Some("Out of committee"));
        assert_eq!(referral.vote.as_ref().map(|v| v.ayes), Some(25));
        assert_eq!(registry.get("C030").unwrap().bills, vec!["HB1"]);
    }

    #[test]
    fn test_resolve_appends_once_per_bill() {
        let registry = registry();

        registry.resolve(slot("C540", None), Chamber::Senate, "HB1").unwrap();
        registry.resolve(slot("C540", None), Chamber::Senate, "HB1").unwrap();
        let referral = registry.resolve(slot("C540", None), Chamber::Senate, "HB2").unwrap();

        assert!(referral.vote.is_none());
        assert_eq!(registry.get("C540").unwrap().bills, vec!["SB1", "HB1", "HB2"]);
    }

    #[test]
    fn test_unknown_committee() {
        let registry = registry();

        let result = registry.resolve(slot("C999", None), Chamber::House, "HB1");

        assert!(matches!(result, Err(CommitteeError::UnknownCommittee(id)) if id == "C999"));
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains("C999"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() {
        let registry = registry();

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .resolve(slot("C030", None), Chamber::House, &format!("HB{}", i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.get("C030").unwrap().bills.len(), 50);
    }
}
