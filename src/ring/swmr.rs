//! Single-writer publish path
//!
//! One publisher per ring appends fixed-slot messages. The path is
//! wait-free: reserve an index from `write_head`, write payload and
//! header fields plainly, fence, then release-store the slot's sequence
//! word to make the message visible.

use std::ptr;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::layout::RingKind;
use crate::region::SharedRegion;
use crate::registry::BusRegion;

use super::{now_monotonic_ns, RingHandle};

/// Publisher for a single-writer ring.
///
/// Exactly one concurrent publisher may operate per single-writer ring;
/// the publisher id is embedded in every slot header for traceability.
#[derive(Debug)]
pub struct Publisher {
    _region: Arc<SharedRegion>,
    ring: RingHandle,
    publisher_id: u16,
}

impl Publisher {
    /// Attach to a single-writer topic by name.
    pub fn attach(region: &BusRegion, topic: &str, publisher_id: u16) -> Result<Self> {
        let entry = region.topic(topic)?;
        if entry.ring_kind()? != RingKind::SingleWriter {
            return Err(BusError::kind_mismatch(
                topic,
                RingKind::SingleWriter.label(),
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
    /// Fails with [`BusError::PayloadTooLarge`] before touching the ring
    /// if the payload exceeds the slot capacity. Zero-length payloads are
    /// valid.
    pub fn publish(&mut self, payload: &[u8]) -> Result<u64> {
        let capacity = self.ring.max_payload();
        if payload.len() > capacity {
            return Err(BusError::payload_too_large(payload.len(), capacity));
        }

        let commit_seq = self.ring.reserve();
        let idx = self.ring.index_of(commit_seq);

        unsafe {
            ptr::copy_nonoverlapping(payload.as_ptr(), self.ring.payload_ptr(idx), payload.len());
            let hdr = self.ring.header_ptr(idx);
            (*hdr).payload_len = payload.len() as u32;
            (*hdr).publisher_id = self.publisher_id;
            (*hdr).timestamp_ns = now_monotonic_ns();
        }

        // All payload and header stores must be globally visible before
        // the sequence word publishes the slot.
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
