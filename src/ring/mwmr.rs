//! Multi-writer publish path
//!
//! Any number of publishers race on distinct sequence numbers handed out
//! by the same `write_head` counter. Before overwriting a slot a writer
//! must wait for its generation turn: the slot's current sequence must
//! belong to a strictly earlier wrap of the ring. The wait spins with a
//! CPU hint first, then yields, and gives up with `Timeout` after a
//! bounded number of iterations.
//!
//! A publisher that dies between reservation and commit leaves the slot's
//! sequence short of the reserved value; subscribers treat it as "not yet
//! ready" and eventually lag past it, so no recovery protocol is needed.

use std::ptr;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::layout::RingKind;
use crate::region::SharedRegion;
use crate::registry::BusRegion;

use super::{now_monotonic_ns, RingHandle};

/// Iterations spent on the CPU relax hint before falling back to yielding
const SPIN_ITERS: u64 = 10;

/// Generation-wait budget; large enough to ride out scheduling hiccups
const MAX_WAIT_ITERS: u64 = 1_000_000;

#[inline]
fn backoff(iter: u64) {
    if iter < SPIN_ITERS {
        std::hint::spin_loop();
    } else {
        std::thread::yield_now();
    }
}

/// Publisher for a multi-writer ring.
#[derive(Debug)]
pub struct MwmrPublisher {
    _region: Arc<SharedRegion>,
    ring: RingHandle,
    publisher_id: u16,
}

impl MwmrPublisher {
    /// Attach to a multi-writer topic by name.
    pub fn attach(region: &BusRegion, topic: &str, publisher_id: u16) -> Result<Self> {
        let entry = region.topic(topic)?;
        if entry.ring_kind()? != RingKind::MultiWriter {
            return Err(BusError::kind_mismatch(
                topic,
                RingKind::MultiWriter.label(),
            ));
        }
        Ok(Self {
            _region: region.shared(),
            ring: region.ring(entry),
            publisher_id,
        })
    }

    /// Append one message; returns the committed sequence number.
    ///
    /// May block in the generation wait while a slower writer commits an
    /// earlier wrap of the same slot; returns [`BusError::Timeout`] if the
    /// wait budget runs out. Readers never observe a slot's sequence move
    /// backwards regardless of how writers interleave.
    pub fn publish(&mut self, payload: &[u8]) -> Result<u64> {
        let capacity = self.ring.max_payload();
        if payload.len() > capacity {
            return Err(BusError::payload_too_large(payload.len(), capacity));
        }

        let commit_seq = self.ring.reserve();
        let idx = self.ring.index_of(commit_seq);
        let slot_count = self.ring.slot_count() as u64;
        let my_generation = commit_seq / slot_count;

        let mut iter: u64 = 0;
        loop {
            let current = self.ring.seq(idx).load(Ordering::Acquire);
            // Free to proceed once the slot is unused or holds a strictly
            // earlier generation.
            if current == 0 || current / slot_count < my_generation {
                break;
            }
            backoff(iter);
            iter += 1;
            if iter > MAX_WAIT_ITERS {
                return Err(BusError::timeout(iter));
            }
        }

        unsafe {
            ptr::copy_nonoverlapping(payload.as_ptr(), self.ring.payload_ptr(idx), payload.len());
            let hdr = self.ring.header_ptr(idx);
            (*hdr).payload_len = payload.len() as u32;
            (*hdr).publisher_id = self.publisher_id;
            (*hdr).timestamp_ns = now_monotonic_ns();
        }

        fence(Ordering::Release);
        self.ring.seq(idx).store(commit_seq, Ordering::Release);

        Ok(commit_seq)
    }

    /// This publisher's identity as embedded in slot headers
    pub fn publisher_id(&self) -> u16 {
        self.publisher_id
    }

    /// Total messages ever reserved on this ring
    pub fn total_published(&self) -> u64 {
        self.ring.write_head()
    }
}
