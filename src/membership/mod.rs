//! Membership data model.
//!
//! A [`Membership`] is a reader's current entitlement. It is created by the
//! first confirmed order, overwritten by later confirmations, and never
//! deleted. Every overwrite is preceded by a [`MembershipSnapshot`].

mod enums;
mod member;
mod snapshot;

pub use enums::{Cycle, PaymentMethod, SnapshotReason, SubsKind, SubsStatus, Tier};
pub use member::{Membership, ReaderIds, generate_membership_id};
pub use snapshot::MembershipSnapshot;
