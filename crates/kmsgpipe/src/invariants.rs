//! Debug assertion macros for message ring invariants.
//!
//! They are only active in debug builds (`#[cfg(debug_assertions)]`), so there
//! is zero overhead in release builds. Every check is O(1); the O(capacity)
//! count scan is never repeated just to assert.

// =============================================================================
// Cursor bounds: 0 <= head < capacity, 0 <= tail < capacity
// =============================================================================

/// Assert that a slot cursor is within the ring.
///
/// Used in: `push()` / `pop()` / `cleanup_expired()` after advancing a cursor
macro_rules! debug_assert_slot_in_range {
    ($name:literal, $slot:expr, $capacity:expr) => {
        debug_assert!(
            $slot < $capacity,
            "cursor bound violated: {} = {} not below capacity {}",
            $name,
            $slot,
            $capacity
        )
    };
}

// =============================================================================
// Record length: 0 <= len <= data_size
// =============================================================================

/// Assert that a record's payload length fits its slot.
///
/// Used in: `push()` after stamping the record, `pop()` before copying out
macro_rules! debug_assert_record_len {
    ($len:expr, $data_size:expr) => {
        debug_assert!(
            ($len as usize) <= $data_size,
            "record length violated: len {} exceeds slot size {}",
            $len,
            $data_size
        )
    };
}

// =============================================================================
// No overwrite: push only writes into a free slot
// =============================================================================

/// Assert that the slot about to be written holds no live message.
///
/// Used in: `push()` after the full check, before copying the payload
macro_rules! debug_assert_slot_free {
    ($record:expr, $slot:expr) => {
        debug_assert!(
            !$record.valid,
            "overwrite violated: slot {} still holds an unconsumed message",
            $slot
        )
    };
}

// =============================================================================
// Tail anchoring: occupied slots form one run starting at tail
// =============================================================================

/// Assert that the ring is either empty with `tail == head`, or its oldest
/// message sits at `tail`.
///
/// **Invariant**: `records[tail].valid || tail == head`
///
/// Used in: every mutation that moves a cursor
macro_rules! debug_assert_tail_anchored {
    ($tail_valid:expr, $tail:expr, $head:expr) => {
        debug_assert!(
            $tail_valid || $tail == $head,
            "tail anchoring violated: tail {} is free but head is {}",
            $tail,
            $head
        )
    };
}

// =============================================================================
// Bounded count: message_count <= capacity
// =============================================================================

/// Assert that the number of live messages never exceeds the slot count.
///
/// Used in: `message_count()`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded count violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_record_len;
pub(crate) use debug_assert_slot_free;
pub(crate) use debug_assert_slot_in_range;
pub(crate) use debug_assert_tail_anchored;
