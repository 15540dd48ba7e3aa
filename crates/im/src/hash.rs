//! Group membership fingerprints.
//!
//! Clients compare a group's fingerprint with the one they last saw to
//! decide whether to re-download the member list. The fingerprint depends
//! only on the member set: IDs are sorted, concatenated without separator,
//! hashed with SHA-256 and the first 8 digest bytes are read as a
//! big-endian `u64`. A dismissed group always reports `0`.

use sha2::{Digest, Sha256};

use crate::model::{Group, GroupStatus};

/// Fingerprint reported for dismissed groups.
pub const DISMISSED_FINGERPRINT: u64 = 0;

/// Order-independent fingerprint of a member-ID set.
#[must_use]
pub fn member_list_hash<S: AsRef<str>>(member_ids: &[S]) -> u64 {
    let mut sorted: Vec<&str> = member_ids.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for id in sorted {
        hasher.update(id.as_bytes());
    }
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Fingerprint of `group`, or [`DISMISSED_FINGERPRINT`] if it was dismissed.
#[must_use]
pub fn group_fingerprint<S: AsRef<str>>(group: &Group, member_ids: &[S]) -> u64 {
    if group.status == GroupStatus::Dismissed {
        return DISMISSED_FINGERPRINT;
    }
    member_list_hash(member_ids)
}
