//! OwnershipGuard — pure capability decisions.
//!
//! Every read and mutation in the crate flows through [`capabilities`];
//! internal automation is no exception (the lifecycle coordinator asks as
//! [`SYSTEM_OWNER_ID`], never bypasses the guard).

use crate::types::{Capabilities, Tier, VectorStoreRecord, SYSTEM_OWNER_ID};

/// Capability set granted to `requester_id` for `record`.
///
/// Rules, evaluated in order:
/// 1. Company tier: everyone reads; only the reserved system identity may
///    modify or delete.
/// 2. The owner holds full capability.
/// 3. The reserved system identity holds full capability (this is what
///    lets the lifecycle coordinator cascade session deletions through
///    the guard instead of around it).
/// 4. Anyone else gets read-only — and can only arrive here by presenting
///    the exact id, since listings never include foreign records.
///
/// Pure function: no hidden state, same inputs always yield same output.
pub fn capabilities(record: &VectorStoreRecord, requester_id: &str) -> Capabilities {
    if record.tier == Tier::Company {
        return if requester_id == SYSTEM_OWNER_ID {
            Capabilities::full()
        } else {
            Capabilities::read_only()
        };
    }
    if requester_id == record.owner_id || requester_id == SYSTEM_OWNER_ID {
        return Capabilities::full();
    }
    Capabilities::read_only()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, VectorStoreRecord};

    #[test]
    fn test_company_read_only_for_users() {
        let rec = VectorStoreRecord::new_company("vs_handbook", "Handbook", None);
        let caps = capabilities(&rec, "alice");
        assert!(caps.read);
        assert!(!caps.modify);
        assert!(!caps.delete);
    }

    #[test]
    fn test_company_full_for_system() {
        let rec = VectorStoreRecord::new_company("vs_handbook", "Handbook", None);
        assert_eq!(capabilities(&rec, SYSTEM_OWNER_ID), Capabilities::full());
    }

    #[test]
    fn test_owner_full_capability() {
        let rec = VectorStoreRecord::new_personal("alice", "Notes", Some(Category::Knowledge));
        assert_eq!(capabilities(&rec, "alice"), Capabilities::full());
    }

    #[test]
    fn test_stranger_read_only() {
        let rec = VectorStoreRecord::new_personal("alice", "Notes", None);
        let caps = capabilities(&rec, "bob");
        assert_eq!(caps, Capabilities::read_only());
    }

    #[test]
    fn test_system_can_cascade_session_records() {
        let rec = VectorStoreRecord::new_session("alice", "t1");
        let caps = capabilities(&rec, SYSTEM_OWNER_ID);
        assert!(caps.delete);
    }

    #[test]
    fn test_deterministic() {
        let rec = VectorStoreRecord::new_personal("alice", "Notes", None);
        assert_eq!(capabilities(&rec, "bob"), capabilities(&rec, "bob"));
    }
}
