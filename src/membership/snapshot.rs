//! Audit copies of memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::SnapshotReason;
use super::member::Membership;

/// Immutable copy of a membership taken right before it was overwritten.
///
/// Snapshots are written for support and audit. Business logic never reads
/// them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    /// `snp_` followed by 12 hex characters.
    pub id: String,
    pub reason: SnapshotReason,
    pub created_utc: DateTime<Utc>,
    /// Order whose confirmation replaced this membership.
    pub order_id: Option<String>,
    pub membership: Membership,
}

impl MembershipSnapshot {
    #[must_use]
    pub fn new(membership: Membership, reason: SnapshotReason, created_utc: DateTime<Utc>) -> Self {
        Self {
            id: format!("snp_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
            reason,
            created_utc,
            order_id: None,
            membership,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// A snapshot of the zero membership carries nothing worth backing up.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.membership.is_zero()
    }
}

impl Membership {
    /// Take a snapshot of the current value.
    #[must_use]
    pub fn snapshot(&self, reason: SnapshotReason, at: DateTime<Utc>) -> MembershipSnapshot {
        MembershipSnapshot::new(self.clone(), reason, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{ReaderIds, Tier};

    #[test]
    fn test_snapshot_copies_membership() {
        let m = Membership {
            ids: ReaderIds::ftc("reader-1"),
            tier: Tier::Standard,
            ..Membership::default()
        };
        let snap = m.snapshot(SnapshotReason::Renew, Utc::now()).with_order("FT0011223344556677");

        assert!(snap.id.starts_with("snp_"));
        assert_eq!(snap.membership, m);
        assert_eq!(snap.order_id.as_deref(), Some("FT0011223344556677"));
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_zero_snapshot_is_empty() {
        let snap = Membership::zero(ReaderIds::ftc("reader-1"))
            .snapshot(SnapshotReason::Create, Utc::now());
        assert!(snap.is_empty());
    }
}
