//! Member directory seam.
//!
//! The directory is an external collaborator: the engine does not define
//! how members are loaded or persisted, it only reads records and updates
//! `last_scan_at` through `record_scan`. The in-memory implementation backs
//! tests and the demo daemon.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A member record. `id` is the opaque identifier carried by the badge QR
/// payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub group: String,
    pub synod: String,
    pub church: String,
    pub photo_ref: Option<String>,
    /// Last admissible scan, epoch milliseconds. Monotonically
    /// non-decreasing; only the resolver writes it.
    pub last_scan_at: Option<u64>,
}

/// Read/conditional-write access to the member directory.
pub trait MemberDirectory {
    /// Look up a member by badge code.
    fn find(&self, code: &str) -> Option<Member>;

    /// Record an admissible scan: set `last_scan_at = at`.
    ///
    /// Implementations must keep `last_scan_at` monotonically
    /// non-decreasing and fail on unknown codes.
    fn record_scan(&mut self, code: &str, at: u64) -> Result<()>;
}

/// In-memory directory for tests and demos.
#[derive(Default)]
pub struct InMemoryDirectory {
    members: HashMap<String, Member>,
}

impl InMemoryDirectory {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|member| (member.id.clone(), member))
                .collect(),
        }
    }

    pub fn insert(&mut self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl MemberDirectory for InMemoryDirectory {
    fn find(&self, code: &str) -> Option<Member> {
        self.members.get(code).cloned()
    }

    fn record_scan(&mut self, code: &str, at: u64) -> Result<()> {
        let member = self
            .members
            .get_mut(code)
            .ok_or_else(|| anyhow!("cannot record scan for unknown code {}", code))?;
        if let Some(last) = member.last_scan_at {
            if at < last {
                return Err(anyhow!(
                    "scan time {} precedes recorded last scan {} for {}",
                    at,
                    last,
                    code
                ));
            }
        }
        member.last_scan_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_member(id: &str) -> Member {
    Member {
        id: id.to_string(),
        name: "Test Member".to_string(),
        group: "Ushers".to_string(),
        synod: "Central".to_string(),
        church: "First Parish".to_string(),
        photo_ref: None,
        last_scan_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_scan_updates_known_member() -> Result<()> {
        let mut dir = InMemoryDirectory::new(vec![test_member("member-001")]);
        dir.record_scan("member-001", 1_000)?;
        assert_eq!(dir.find("member-001").unwrap().last_scan_at, Some(1_000));
        Ok(())
    }

    #[test]
    fn record_scan_rejects_unknown_code() {
        let mut dir = InMemoryDirectory::default();
        assert!(dir.record_scan("ghost", 1_000).is_err());
    }

    #[test]
    fn last_scan_is_monotonic() -> Result<()> {
        let mut dir = InMemoryDirectory::new(vec![test_member("member-001")]);
        dir.record_scan("member-001", 2_000)?;
        assert!(dir.record_scan("member-001", 1_000).is_err());
        assert_eq!(dir.find("member-001").unwrap().last_scan_at, Some(2_000));
        // Equal timestamps are allowed: non-decreasing, not increasing.
        dir.record_scan("member-001", 2_000)?;
        Ok(())
    }
}
