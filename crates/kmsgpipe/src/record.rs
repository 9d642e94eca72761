//! Per-slot message metadata and caller identity.

/// User id of a writer or reader.
pub type Uid = u32;
/// Group id of a writer or reader.
pub type Gid = u32;

/// The privileged superuser identity. Always allowed to read any message.
pub const ROOT_UID: Uid = 0;

/// Largest slot size a record can describe (`len` is stored as `u16`).
pub const MAX_DATA_SIZE: usize = u16::MAX as usize;

/// Metadata for one slot, index-aligned with the payload region.
///
/// A slot is occupied iff `valid` is set; `len` bytes of the slot's payload
/// are meaningful while it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageRecord {
    /// Caller-supplied ordering/expiry key, stored opaquely.
    pub timestamp: u64,
    /// Writer's uid at push time.
    pub owner_uid: Uid,
    /// Writer's gid at push time.
    pub owner_gid: Gid,
    /// Number of valid payload bytes in the slot.
    pub len: u16,
    /// Whether the slot holds a live, unconsumed message.
    pub valid: bool,
}

impl MessageRecord {
    /// A cleared record: no owner, no payload, not valid.
    pub const EMPTY: Self = Self {
        timestamp: 0,
        owner_uid: 0,
        owner_gid: 0,
        len: 0,
        valid: false,
    };

    /// Access policy for reading this record's message.
    ///
    /// Granted when any one of these holds: the requester is root, the uid
    /// matches the owner, or the gid matches the owner's group. A group match
    /// alone is enough even when the uids differ.
    #[inline]
    pub fn readable_by(&self, uid: Uid, gid: Gid) -> bool {
        uid == ROOT_UID || uid == self.owner_uid || gid == self.owner_gid
    }

    /// Returns `true` if this is a live message stamped strictly before `cutoff`.
    #[inline]
    pub fn is_expired(&self, cutoff: u64) -> bool {
        self.valid && self.timestamp < cutoff
    }
}

/// Identity of a pipe endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub uid: Uid,
    pub gid: Gid,
}

impl Credentials {
    /// Superuser credentials.
    pub const ROOT: Self = Self::new(ROOT_UID, 0);

    pub const fn new(uid: Uid, gid: Gid) -> Self {
        Self { uid, gid }
    }

    /// Whether these credentials may run privileged pipe operations
    /// (clearing the ring, changing the expiry).
    #[inline]
    pub const fn is_privileged(&self) -> bool {
        self.uid == ROOT_UID
    }
}
