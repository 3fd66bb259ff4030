//! Lock-free ring engine: publish paths, subscribe path, slot access
//!
//! A ring is a fixed array of equally sized slots indexed modulo its
//! power-of-two length. Two atomic words drive the whole protocol: the
//! descriptor's `write_head` (reservation counter) and each slot's `seq`
//! (seqlock version and committed-data flag in one). Every other slot
//! field is plain memory guarded by the seqlock discipline: writers
//! finish plain stores, fence, then release-store `seq`; readers
//! acquire-load `seq`, read plainly, fence, then verify `seq` held still.

pub mod mwmr;
pub mod sub;
pub mod swmr;

pub use mwmr::MwmrPublisher;
pub use sub::{Consumed, Subscriber};
pub use swmr::Publisher;

use std::sync::atomic::{AtomicU64, Ordering};

use nix::time::{clock_gettime, ClockId};

use crate::layout::{RingDescriptor, SlotHeader, TopicEntry};

/// Monotonic clock in nanoseconds; commit timestamps and the health
/// inactivity check both use this clock.
pub fn now_monotonic_ns() -> u64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64,
        Err(_) => 0,
    }
}

/// Resolved view of one ring inside a mapped region.
///
/// Holds pointers computed from `(base, offset)` at attach time; nothing
/// pointer-shaped is ever stored back into the region. Valid only while
/// the mapping that produced it stays alive, which the owning publisher,
/// subscriber or region guarantees by holding the mapping.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RingHandle {
    desc: *const RingDescriptor,
    slots_base: *mut u8,
    mask: u64,
    slot_count: u32,
    slot_size: u32,
}

impl RingHandle {
    pub(crate) fn from_entry(base: *mut u8, entry: &TopicEntry) -> Self {
        let desc = unsafe { base.add(entry.ring_desc_offset as usize) } as *const RingDescriptor;
        let d = unsafe { &*desc };
        let slots_base = unsafe { base.add(d.slots_base_offset as usize) };
        Self {
            desc,
            slots_base,
            mask: (d.slot_count - 1) as u64,
            slot_count: d.slot_count,
            slot_size: d.slot_size,
        }
    }

    fn desc(&self) -> &RingDescriptor {
        unsafe { &*self.desc }
    }

    /// Sequence number of the last reservation
    pub(crate) fn write_head(&self) -> u64 {
        self.desc().write_head.load(Ordering::Acquire)
    }

    /// Reserve the next sequence number
    pub(crate) fn reserve(&self) -> u64 {
        self.desc().write_head.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Physical slot index for a sequence number
    pub(crate) fn index_of(&self, seq: u64) -> usize {
        ((seq - 1) & self.mask) as usize
    }

    pub(crate) fn header_ptr(&self, idx: usize) -> *mut SlotHeader {
        unsafe {
            self.slots_base.add(idx * self.slot_size as usize) as *mut SlotHeader
        }
    }

    /// The slot's sequence word
    pub(crate) fn seq(&self, idx: usize) -> &AtomicU64 {
        unsafe { &(*self.header_ptr(idx)).seq }
    }

    pub(crate) fn payload_ptr(&self, idx: usize) -> *mut u8 {
        unsafe { (self.header_ptr(idx) as *mut u8).add(SlotHeader::SIZE) }
    }

    /// Non-atomic read of a slot's commit timestamp; callers must pair it
    /// with a `seq` check per the seqlock discipline.
    pub(crate) fn slot_timestamp_ns(&self, idx: usize) -> u64 {
        unsafe { (*self.header_ptr(idx)).timestamp_ns }
    }

    pub(crate) fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub(crate) fn mask(&self) -> u64 {
        self.mask
    }

    /// Payload bytes a slot can carry
    pub(crate) fn max_payload(&self) -> usize {
        self.slot_size as usize - SlotHeader::SIZE
    }
}

unsafe impl Send for RingHandle {}
unsafe impl Sync for RingHandle {}
