use crate::invariants::{
    debug_assert_bounded_count, debug_assert_record_len, debug_assert_slot_free,
    debug_assert_slot_in_range, debug_assert_tail_anchored,
};
use crate::record::{Gid, MessageRecord, Uid, MAX_DATA_SIZE};
use crate::{RingConfig, RingError};

// =============================================================================
// SLOT LAYOUT & OCCUPANCY
// =============================================================================
//
// The ring is a circular queue of *slots*, not of bytes:
//
//   base:    [ slot 0 (data_size) | slot 1 | ... | slot capacity-1 ]
//   records: [ rec 0              | rec 1  | ... | rec capacity-1  ]
//
// `head` is the next slot to write, `tail` the oldest unconsumed slot. Both
// wrap modulo capacity.
//
// Occupancy is tracked per slot through `records[i].valid` rather than by
// head/tail distance. That removes the full-vs-empty ambiguity of
// `head == tail` without reserving a sentinel slot:
//
// - full  <=> records[head].valid
// - empty <=> !records[tail].valid
//
// Since push writes only at head and pop/expiry only clear at tail, the
// occupied slots always form one circular run starting at tail.
//
// =============================================================================

/// Fixed-capacity, fixed-slot-size ring of discrete messages.
///
/// Each message carries its writer's uid/gid and a caller-supplied timestamp.
/// The ring does not allocate: it works on two caller-owned regions, a payload
/// region of `capacity * data_size` bytes and a record array of `capacity`
/// entries. Storage can be lent (`&mut [u8]`, see [`BorrowedRing`]) or owned
/// (`Box<[u8]>`, see [`OwnedRing`]).
///
/// All operations are synchronous and bounded-time. The ring performs no
/// locking; callers sharing it across threads wrap it in a single mutex (see
/// [`Pipe`](crate::Pipe)).
pub struct MessageRing<B = Box<[u8]>, R = Box<[MessageRecord]>> {
    /// Payload region, sliced into `capacity` slots of `data_size` bytes
    base: B,
    /// Per-slot metadata, index-aligned with `base`
    records: R,
    capacity: usize,
    data_size: usize,
    /// Next slot to write
    head: usize,
    /// Oldest unconsumed slot
    tail: usize,
}

/// A ring over storage lent by the caller.
pub type BorrowedRing<'a> = MessageRing<&'a mut [u8], &'a mut [MessageRecord]>;

/// A ring that owns its storage as fixed-size boxed slices.
pub type OwnedRing = MessageRing<Box<[u8]>, Box<[MessageRecord]>>;

/// Derived ring-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
    /// No live messages.
    Empty,
    /// Some, but not all, slots are occupied.
    Partial,
    /// The slot at `head` is occupied; the next push fails.
    Full,
}

impl OwnedRing {
    /// Allocates zeroed storage for `config` and initializes a ring over it.
    ///
    /// Storage is a boxed slice rather than a `Vec`: its size is fixed for the
    /// lifetime of the ring.
    pub fn with_config(config: RingConfig) -> Result<Self, RingError> {
        config.validate()?;
        let payload_bytes = config
            .payload_bytes()
            .ok_or(RingError::InvalidArgument("capacity * data_size overflows"))?;

        let base = vec![0u8; payload_bytes].into_boxed_slice();
        let records = vec![MessageRecord::EMPTY; config.capacity].into_boxed_slice();

        Self::init(config.capacity, config.data_size, base, records)
    }
}

impl<B, R> MessageRing<B, R>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
    R: AsRef<[MessageRecord]> + AsMut<[MessageRecord]>,
{
    /// Initializes a ring over caller-provided storage.
    ///
    /// `base` must be exactly `capacity * data_size` bytes and `records`
    /// exactly `capacity` entries; zero-length storage counts as missing.
    /// Both regions are zeroed and every record is marked invalid.
    pub fn init(
        capacity: usize,
        data_size: usize,
        mut base: B,
        mut records: R,
    ) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::InvalidArgument("capacity must be non-zero"));
        }
        if data_size == 0 {
            return Err(RingError::InvalidArgument("data_size must be non-zero"));
        }
        if data_size > MAX_DATA_SIZE {
            return Err(RingError::InvalidArgument("data_size exceeds record length range"));
        }
        let payload_bytes = capacity
            .checked_mul(data_size)
            .ok_or(RingError::InvalidArgument("capacity * data_size overflows"))?;
        if base.as_ref().len() != payload_bytes {
            return Err(RingError::InvalidArgument("payload storage size mismatch"));
        }
        if records.as_ref().len() != capacity {
            return Err(RingError::InvalidArgument("record storage size mismatch"));
        }

        base.as_mut().fill(0);
        records.as_mut().fill(MessageRecord::EMPTY);

        Ok(Self {
            base,
            records,
            capacity,
            data_size,
            head: 0,
            tail: 0,
        })
    }

    // ---------------------------------------------------------------------
    // GEOMETRY & STATUS
    // ---------------------------------------------------------------------

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the maximum payload size of one message.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Slot the next push writes to.
    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    /// Slot holding the oldest unconsumed message.
    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Returns true if there is no message at the read cursor.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.records.as_ref()[self.tail].valid
    }

    /// Returns true if the slot at the write cursor is still occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.records.as_ref()[self.head].valid
    }

    /// Returns whether the ring is empty, partially filled or full.
    pub fn state(&self) -> RingState {
        if self.is_full() {
            RingState::Full
        } else if self.is_empty() {
            RingState::Empty
        } else {
            RingState::Partial
        }
    }

    /// Metadata of `slot`, or `None` if out of range.
    #[inline]
    pub fn record(&self, slot: usize) -> Option<&MessageRecord> {
        self.records.as_ref().get(slot)
    }

    /// Metadata of the oldest live message, if any.
    #[inline]
    pub fn peek(&self) -> Option<&MessageRecord> {
        let record = &self.records.as_ref()[self.tail];
        record.valid.then_some(record)
    }

    /// Number of live messages.
    ///
    /// Scans every record instead of trusting the head/tail distance, so this
    /// is O(capacity).
    pub fn message_count(&self) -> usize {
        let count = self.records.as_ref().iter().filter(|r| r.valid).count();
        debug_assert_bounded_count!(count, self.capacity);
        count
    }

    #[inline]
    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = slot * self.data_size;
        start..start + self.data_size
    }

    #[inline]
    fn next(&self, slot: usize) -> usize {
        (slot + 1) % self.capacity
    }

    // ---------------------------------------------------------------------
    // WRITER API
    // ---------------------------------------------------------------------

    /// Copies `data` into the slot at `head` and stamps its record.
    ///
    /// Fails with `MessageTooLarge` before checking for space, so an oversized
    /// message reports its size even when the ring is also full. Never
    /// overwrites an unconsumed message: a full ring fails with `BufferFull`.
    /// On failure nothing is modified.
    ///
    /// Returns the number of bytes written.
    pub fn push(
        &mut self,
        data: &[u8],
        uid: Uid,
        gid: Gid,
        timestamp: u64,
    ) -> Result<usize, RingError> {
        if data.len() > self.data_size {
            return Err(RingError::MessageTooLarge {
                len: data.len(),
                max: self.data_size,
            });
        }
        if self.is_full() {
            return Err(RingError::BufferFull);
        }

        let slot = self.head;
        debug_assert_slot_free!(self.records.as_ref()[slot], slot);

        let range = self.slot_range(slot);
        let dst = &mut self.base.as_mut()[range];
        dst[..data.len()].copy_from_slice(data);
        // Stale bytes from an earlier, longer message stay out of the slot.
        dst[data.len()..].fill(0);

        let record = &mut self.records.as_mut()[slot];
        *record = MessageRecord {
            timestamp,
            owner_uid: uid,
            owner_gid: gid,
            len: data.len() as u16,
            valid: true,
        };
        debug_assert_record_len!(record.len, self.data_size);

        self.head = self.next(slot);
        debug_assert_slot_in_range!("head", self.head, self.capacity);
        debug_assert_tail_anchored!(!self.is_empty(), self.tail, self.head);

        Ok(data.len())
    }

    // ---------------------------------------------------------------------
    // READER API
    // ---------------------------------------------------------------------

    /// Copies the oldest message into `out` and consumes it.
    ///
    /// Checks run in order: `NoData` if the read cursor is empty,
    /// `AccessDenied` if `uid`/`gid` may not read it (see
    /// [`MessageRecord::readable_by`]), `InvalidArgument` if `out` is shorter
    /// than the message. A failed pop leaves the ring untouched, so a denied
    /// message stays available to an authorized reader.
    ///
    /// Returns the number of bytes copied.
    pub fn pop(&mut self, out: &mut [u8], uid: Uid, gid: Gid) -> Result<usize, RingError> {
        let slot = self.tail;
        let record = self.records.as_ref()[slot];

        if !record.valid {
            return Err(RingError::NoData);
        }
        if !record.readable_by(uid, gid) {
            return Err(RingError::AccessDenied);
        }
        debug_assert_record_len!(record.len, self.data_size);
        let len = record.len as usize;
        if out.len() < len {
            return Err(RingError::InvalidArgument("output buffer shorter than message"));
        }

        let start = slot * self.data_size;
        out[..len].copy_from_slice(&self.base.as_ref()[start..start + len]);

        self.records.as_mut()[slot].valid = false;
        self.tail = self.next(slot);
        debug_assert_slot_in_range!("tail", self.tail, self.capacity);
        debug_assert_tail_anchored!(!self.is_empty(), self.tail, self.head);

        Ok(len)
    }

    // ---------------------------------------------------------------------
    // RETENTION
    // ---------------------------------------------------------------------

    /// Drops messages stamped before `cutoff`, oldest first.
    ///
    /// This is a prefix scan from `tail`: it stops at the first message that
    /// is not expired, so an expired message behind a newer one stays until
    /// the ones before it are gone. Callers must push with non-decreasing
    /// timestamps for this to remove every expired message.
    ///
    /// Returns the number of messages removed.
    pub fn cleanup_expired(&mut self, cutoff: u64) -> usize {
        let mut removed = 0;

        while removed < self.capacity {
            let slot = self.tail;
            let record = &mut self.records.as_mut()[slot];
            if !record.is_expired(cutoff) {
                break;
            }
            record.valid = false;
            self.tail = self.next(slot);
            removed += 1;
        }

        debug_assert_slot_in_range!("tail", self.tail, self.capacity);
        debug_assert_tail_anchored!(!self.is_empty(), self.tail, self.head);
        removed
    }

    /// Discards every message and resets both cursors to slot 0.
    ///
    /// Returns the number of messages present before clearing.
    pub fn clear(&mut self) -> usize {
        let previous = self.message_count();

        self.base.as_mut().fill(0);
        self.records.as_mut().fill(MessageRecord::EMPTY);
        self.head = 0;
        self.tail = 0;

        previous
    }
}

impl<B, R> std::fmt::Debug for MessageRing<B, R>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
    R: AsRef<[MessageRecord]> + AsMut<[MessageRecord]>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRing")
            .field("capacity", &self.capacity)
            .field("data_size", &self.data_size)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: usize = 4;
    const DATA_SIZE: usize = 32;
    const ROOT: Uid = crate::ROOT_UID;

    fn ring() -> OwnedRing {
        OwnedRing::with_config(RingConfig::new(CAPACITY, DATA_SIZE)).unwrap()
    }

    fn pop_vec(ring: &mut OwnedRing, uid: Uid, gid: Gid) -> Result<Vec<u8>, RingError> {
        let mut out = [0u8; DATA_SIZE];
        let n = ring.pop(&mut out, uid, gid)?;
        Ok(out[..n].to_vec())
    }

    fn pop_vec_any(ring: &mut OwnedRing) {
        let mut out = vec![0u8; ring.data_size()];
        ring.pop(&mut out, ROOT, 0).unwrap();
    }

    #[test]
    fn test_init_over_borrowed_storage() {
        let mut base = [0xAAu8; CAPACITY * DATA_SIZE];
        let mut records = [MessageRecord {
            valid: true,
            ..MessageRecord::EMPTY
        }; CAPACITY];

        let ring = BorrowedRing::init(CAPACITY, DATA_SIZE, &mut base[..], &mut records[..]).unwrap();
        assert_eq!(ring.head(), 0);
        assert_eq!(ring.tail(), 0);
        assert_eq!(ring.message_count(), 0);
        drop(ring);

        // Init zeroes both regions.
        assert!(base.iter().all(|&b| b == 0));
        assert!(records.iter().all(|r| *r == MessageRecord::EMPTY));
    }

    #[test]
    fn test_init_rejects_invalid_arguments() {
        let mut base = vec![0u8; CAPACITY * DATA_SIZE];
        let mut records = vec![MessageRecord::EMPTY; CAPACITY];

        let err = BorrowedRing::init(0, DATA_SIZE, &mut base[..], &mut records[..]).unwrap_err();
        assert!(matches!(err, RingError::InvalidArgument(_)));

        let err = BorrowedRing::init(CAPACITY, 0, &mut base[..], &mut records[..]).unwrap_err();
        assert!(matches!(err, RingError::InvalidArgument(_)));

        // Missing (empty) storage.
        let err = BorrowedRing::init(CAPACITY, DATA_SIZE, &mut [0u8; 0][..], &mut records[..])
            .unwrap_err();
        assert!(matches!(err, RingError::InvalidArgument(_)));
        let err =
            BorrowedRing::init(CAPACITY, DATA_SIZE, &mut base[..], &mut [MessageRecord::EMPTY; 0][..])
                .unwrap_err();
        assert!(matches!(err, RingError::InvalidArgument(_)));

        // Wrongly sized storage.
        let err = BorrowedRing::init(CAPACITY, DATA_SIZE, &mut base[1..], &mut records[..])
            .unwrap_err();
        assert!(matches!(err, RingError::InvalidArgument(_)));
    }

    #[test]
    fn test_push_stamps_record_and_advances_head() {
        let mut ring = ring();

        let n = ring.push(b"first data", 1000, 2000, 1000).unwrap();
        assert_eq!(n, 10);
        assert_eq!(ring.head(), 1);
        assert_eq!(ring.tail(), 0);

        let rec = ring.record(0).unwrap();
        assert_eq!(rec.timestamp, 1000);
        assert_eq!(rec.owner_uid, 1000);
        assert_eq!(rec.owner_gid, 2000);
        assert_eq!(rec.len, 10);
        assert!(rec.valid);
        assert_eq!(ring.peek(), Some(rec));
    }

    #[test]
    fn test_fifo_order() {
        let mut ring = ring();
        let payloads: [&[u8]; 4] = [b"first data", b"second", b"third data", b"forth"];

        for (i, p) in payloads.iter().enumerate() {
            ring.push(p, 1000 + i as u32, 2000, i as u64).unwrap();
        }
        for p in payloads {
            assert_eq!(pop_vec(&mut ring, ROOT, 0).unwrap(), p);
        }
        assert_eq!(ring.state(), RingState::Empty);
    }

    #[test]
    fn test_full_ring_rejects_push_without_mutation() {
        let mut ring = ring();
        for i in 0..CAPACITY {
            ring.push(&[i as u8], 1, 1, i as u64).unwrap();
        }
        assert_eq!(ring.state(), RingState::Full);
        assert_eq!(ring.head(), ring.tail());

        let before: Vec<_> = (0..CAPACITY).map(|s| *ring.record(s).unwrap()).collect();
        assert_eq!(ring.push(b"x", 1, 1, 99), Err(RingError::BufferFull));
        let after: Vec<_> = (0..CAPACITY).map(|s| *ring.record(s).unwrap()).collect();

        assert_eq!(before, after);
        assert_eq!(ring.head(), 0);
        assert_eq!(ring.message_count(), CAPACITY);
    }

    #[test]
    fn test_too_large_reported_before_full() {
        let mut ring = ring();
        let oversized = [0u8; DATA_SIZE + 1];

        // Empty ring.
        assert_eq!(
            ring.push(&oversized, 1, 1, 0),
            Err(RingError::MessageTooLarge {
                len: DATA_SIZE + 1,
                max: DATA_SIZE
            })
        );

        for _ in 0..CAPACITY {
            ring.push(b"fill", 1, 1, 0).unwrap();
        }
        // Full ring still reports the size problem first.
        assert!(matches!(
            ring.push(&oversized, 1, 1, 0),
            Err(RingError::MessageTooLarge { .. })
        ));

        // Exactly data_size is fine.
        ring.clear();
        assert_eq!(ring.push(&[7u8; DATA_SIZE], 1, 1, 0), Ok(DATA_SIZE));
    }

    #[test]
    fn test_pop_empty_is_no_data() {
        let mut ring = ring();
        let mut out = [0u8; DATA_SIZE];
        assert_eq!(ring.pop(&mut out, ROOT, 0), Err(RingError::NoData));
        assert_eq!(ring.tail(), 0);
    }

    #[test]
    fn test_denied_pop_is_side_effect_free() {
        let mut ring = ring();
        ring.push(b"secret", 1000, 2000, 5).unwrap();

        let mut out = [0u8; DATA_SIZE];
        assert_eq!(ring.pop(&mut out, 1001, 2001), Err(RingError::AccessDenied));
        assert_eq!(ring.tail(), 0);
        assert!(ring.record(0).unwrap().valid);
        assert!(out.iter().all(|&b| b == 0));

        // Group match alone grants access.
        assert_eq!(pop_vec(&mut ring, 4242, 2000).unwrap(), b"secret");
    }

    #[test]
    fn test_pop_with_short_buffer_keeps_message() {
        let mut ring = ring();
        ring.push(b"twelve bytes", 1, 1, 0).unwrap();

        let mut short = [0u8; 4];
        assert!(matches!(
            ring.pop(&mut short, 1, 1),
            Err(RingError::InvalidArgument(_))
        ));
        assert_eq!(ring.message_count(), 1);
        assert_eq!(pop_vec(&mut ring, 1, 1).unwrap(), b"twelve bytes");
    }

    #[test]
    fn test_zero_length_message() {
        let mut ring = ring();
        assert_eq!(ring.push(b"", 1, 1, 0), Ok(0));
        assert_eq!(ring.message_count(), 1);
        assert_eq!(pop_vec(&mut ring, 1, 1).unwrap(), b"");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_shorter_message_does_not_leak_previous_bytes() {
        let mut ring = OwnedRing::with_config(RingConfig::new(1, 8)).unwrap();
        ring.push(b"abcdefgh", 1, 1, 0).unwrap();
        pop_vec_any(&mut ring);
        ring.push(b"xy", 1, 1, 0).unwrap();

        let mut out = [0u8; 8];
        assert_eq!(ring.pop(&mut out, 1, 1), Ok(2));
        assert_eq!(&out, b"xy\0\0\0\0\0\0");
    }

    #[test]
    fn test_wraparound_cursors_and_count() {
        let mut ring = ring();
        for i in 0..4u8 {
            ring.push(&[i], 1, 1, i as u64).unwrap();
        }
        for _ in 0..3 {
            pop_vec(&mut ring, 1, 1).unwrap();
        }
        ring.push(&[4], 1, 1, 4).unwrap();

        assert_eq!(ring.head(), 1);
        assert_eq!(ring.tail(), 3);
        assert_eq!(ring.message_count(), 2);
        assert_eq!(ring.state(), RingState::Partial);

        assert_eq!(pop_vec(&mut ring, 1, 1).unwrap(), [3u8]);
        assert_eq!(pop_vec(&mut ring, 1, 1).unwrap(), [4u8]);
        assert_eq!(ring.tail(), 1);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_cleanup_expired_is_tail_anchored() {
        let mut ring = ring();
        for t in [10u64, 20, 30, 40] {
            ring.push(b"m", 1, 1, t).unwrap();
        }

        assert_eq!(ring.cleanup_expired(21), 2);
        assert_eq!(ring.tail(), 2);
        assert_eq!(ring.peek().unwrap().timestamp, 30);
        assert_eq!(ring.message_count(), 2);

        // Drain and sweep again: nothing to do, cursors unchanged.
        assert_eq!(ring.cleanup_expired(u64::MAX), 2);
        let (head, tail) = (ring.head(), ring.tail());
        assert_eq!(ring.cleanup_expired(u64::MAX), 0);
        assert_eq!((ring.head(), ring.tail()), (head, tail));
    }

    #[test]
    fn test_cleanup_expired_stops_at_fresh_message() {
        let mut ring = ring();
        // Out-of-order stamp: the older message behind a fresh one survives.
        ring.push(b"fresh", 1, 1, 100).unwrap();
        ring.push(b"stale", 1, 1, 1).unwrap();

        assert_eq!(ring.cleanup_expired(50), 0);
        assert_eq!(ring.message_count(), 2);
    }

    #[test]
    fn test_cleanup_expired_on_full_ring_wraps_once() {
        let mut ring = ring();
        for t in 0..CAPACITY as u64 {
            ring.push(b"m", 1, 1, t).unwrap();
        }
        assert_eq!(ring.cleanup_expired(u64::MAX), CAPACITY);
        assert_eq!(ring.tail(), ring.head());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_clear_returns_previous_count_and_resets() {
        let mut ring = ring();
        for i in 0..3u8 {
            ring.push(&[i], 1, 1, 0).unwrap();
        }
        pop_vec(&mut ring, 1, 1).unwrap();

        assert_eq!(ring.clear(), 2);
        assert_eq!(ring.message_count(), 0);
        assert_eq!((ring.head(), ring.tail()), (0, 0));

        ring.push(b"again", 7, 8, 9).unwrap();
        assert_eq!(ring.head(), 1);
        assert_eq!(ring.record(0).unwrap().owner_uid, 7);
        assert_eq!(ring.clear(), 1);
        assert_eq!(ring.clear(), 0);
    }
}
