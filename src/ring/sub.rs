//! Subscribe path: optimistic consume with torn-read detection
//!
//! Each subscriber owns a private cursor over the shared ring; subscribers
//! never coordinate and may each fall behind independently. A consume call
//! brackets its payload copy between two loads of the slot's sequence
//! word: the slot is only logically readable while that word holds still.
//! A reader the writer has lapped recovers by jumping its cursor forward
//! to the oldest slot that is still valid, counting everything it stepped
//! over in `skipped_count`.

use std::ptr;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::error::{Result, RingCode};
use crate::region::SharedRegion;
use crate::registry::BusRegion;

use super::RingHandle;

/// Outcome of a single consume call.
///
/// A subscriber can always tell which of "message delivered", "nothing
/// available" or "message lost" happened; lost messages surface through
/// [`Subscriber::skipped_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
    /// One message delivered into the caller's buffer
    Message {
        /// Payload bytes written into the buffer
        len: usize,
        /// Identity the committing publisher embedded in the slot
        publisher_id: u16,
    },
    /// No new message is ready
    NoData,
    /// The next message exists but does not fit the buffer; the cursor
    /// has advanced past it
    Truncated,
}

impl Consumed {
    /// Map this outcome onto the shared ring return-code taxonomy
    pub fn code(&self) -> RingCode {
        match self {
            Consumed::Message { .. } => RingCode::Ok,
            Consumed::NoData => RingCode::NoData,
            Consumed::Truncated => RingCode::Truncated,
        }
    }
}

/// Independent reader over a single-writer or multi-writer ring.
#[derive(Debug)]
pub struct Subscriber {
    _region: Arc<SharedRegion>,
    ring: RingHandle,
    last_seq: u64,
    skipped_count: u64,
}

impl Subscriber {
    /// Attach to a topic by name. The cursor starts at zero: read
    /// everything from the beginning that is still present.
    pub fn attach(region: &BusRegion, topic: &str) -> Result<Self> {
        let entry = region.topic(topic)?;
        Ok(Self {
            _region: region.shared(),
            ring: region.ring(entry),
            last_seq: 0,
            skipped_count: 0,
        })
    }

    /// Try to consume the next message into `buf`.
    ///
    /// Wait-free per call: returns [`Consumed::NoData`] rather than
    /// blocking; the caller chooses its own idle policy.
    pub fn next(&mut self, buf: &mut [u8]) -> Consumed {
        let slot_count = self.ring.slot_count() as u64;
        let mut w = self.ring.write_head();
        let mut next = self.last_seq + 1;

        if next > w {
            return Consumed::NoData;
        }

        // Lag jump: the writer has already lapped this reader, so the
        // oldest still-valid message is at w - slot_count + 1.
        if w - next >= slot_count {
            let new_start = w - slot_count + 1;
            self.skipped_count += w - next;
            self.last_seq = new_start - 1;
            next = new_start;

            w = self.ring.write_head();
            if next > w {
                return Consumed::NoData;
            }
        }

        let idx = self.ring.index_of(next);
        let seq_pre = self.ring.seq(idx).load(Ordering::Acquire);

        // Not yet written by the generation we expect.
        if seq_pre == 0 || seq_pre < next {
            return Consumed::NoData;
        }

        // The writer overtook us between the head load and here.
        if seq_pre > next {
            self.skipped_count += seq_pre - next;
            self.last_seq = seq_pre - 1;
            return Consumed::NoData;
        }

        let (payload_len, publisher_id) = unsafe {
            let hdr = self.ring.header_ptr(idx);
            ((*hdr).payload_len as usize, (*hdr).publisher_id)
        };

        // A length beyond the slot capacity can only be a torn header
        // read; committed slots always satisfy the capacity invariant.
        if payload_len > self.ring.max_payload() {
            self.skipped_count += 1;
            self.last_seq = w;
            return Consumed::NoData;
        }

        if payload_len > buf.len() {
            self.last_seq = next;
            return Consumed::Truncated;
        }

        unsafe {
            ptr::copy_nonoverlapping(self.ring.payload_ptr(idx), buf.as_mut_ptr(), payload_len);
        }

        // The copy above must complete before the verifying load; the
        // fence orders it, so the load itself can be relaxed.
        fence(Ordering::Acquire);
        let seq_post = self.ring.seq(idx).load(Ordering::Relaxed);

        if seq_post != seq_pre {
            // Lapped mid-copy; the bytes in `buf` are undefined.
            self.skipped_count += 1;
            self.last_seq = w;
            return Consumed::NoData;
        }

        self.last_seq = next;
        Consumed::Message {
            len: payload_len,
            publisher_id,
        }
    }

    /// Sequence number of the last message this subscriber consumed or
    /// jumped past; monotonically non-decreasing.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Messages this subscriber detectably lost to lag jumps, overtaking
    /// writers and torn reads.
    pub fn skipped_count(&self) -> u64 {
        self.skipped_count
    }

    /// How many messages this subscriber is behind the writer
    pub fn lag(&self) -> u64 {
        self.ring.write_head().saturating_sub(self.last_seq)
    }

    /// Whether the writer is about to lap this subscriber
    pub fn is_lagging(&self) -> bool {
        self.lag() >= self.ring.slot_count() as u64
    }
}
