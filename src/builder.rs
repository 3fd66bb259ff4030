//! Region builder: carve a fresh shared region into per-topic rings
//!
//! Building is a one-shot operation performed by exactly one process.
//! The builder lays out the header, the topic table, the ring descriptor
//! array and the slot arenas in order, each cache-line aligned, and fails
//! whole (unlinking the object) if the topics do not fit.

use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::layout::{
    align_up, RegionHeader, RingDescriptor, RingKind, SlotHeader, TopicEntry, CACHE_LINE_SIZE,
    MAX_TOPIC_NAME,
};
use crate::region::SharedRegion;
use crate::registry::BusRegion;

/// Configuration for one topic ring
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Topic name, unique within the region
    pub name: String,
    /// Requested slot count; rounded up to the next power of two
    pub slot_count: u32,
    /// Largest payload a slot must carry
    pub payload_max: u32,
    /// Writer discipline of the ring
    pub kind: RingKind,
}

impl TopicConfig {
    /// Configure a single-writer ring
    pub fn single_writer(name: impl Into<String>, slot_count: u32, payload_max: u32) -> Self {
        Self {
            name: name.into(),
            slot_count,
            payload_max,
            kind: RingKind::SingleWriter,
        }
    }

    /// Configure a multi-writer ring
    pub fn multi_writer(name: impl Into<String>, slot_count: u32, payload_max: u32) -> Self {
        Self {
            name: name.into(),
            slot_count,
            payload_max,
            kind: RingKind::MultiWriter,
        }
    }
}

/// One-shot builder for a named region
#[derive(Debug)]
pub struct RegionBuilder {
    name: String,
    size: usize,
    topics: Vec<TopicConfig>,
}

impl RegionBuilder {
    /// Start a builder for a region of `size` bytes named `name`
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            topics: Vec::new(),
        }
    }

    /// Add a topic ring to the region
    pub fn topic(mut self, config: TopicConfig) -> Self {
        self.topics.push(config);
        self
    }

    /// Create, lay out and initialize the region.
    ///
    /// Once this returns, any process that opens the region sees a valid
    /// header before a single message is published.
    pub fn build(self) -> Result<BusRegion> {
        if self.topics.is_empty() {
            return Err(BusError::invalid_parameter(
                "topics",
                "a region needs at least one topic",
            ));
        }
        for (i, config) in self.topics.iter().enumerate() {
            if config.name.is_empty() {
                return Err(BusError::invalid_parameter(
                    "topic.name",
                    "topic name cannot be empty",
                ));
            }
            if config.name.as_bytes().len() >= MAX_TOPIC_NAME {
                return Err(BusError::invalid_parameter(
                    "topic.name",
                    format!(
                        "topic name '{}' exceeds {} bytes",
                        config.name,
                        MAX_TOPIC_NAME - 1
                    ),
                ));
            }
            if self.topics[..i].iter().any(|other| other.name == config.name) {
                return Err(BusError::invalid_parameter(
                    "topic.name",
                    format!("duplicate topic name '{}'", config.name),
                ));
            }
        }

        let region = SharedRegion::create(&self.name, self.size)?;
        match self.lay_out(&region) {
            Ok(()) => BusRegion::from_shared(Arc::new(region)),
            Err(e) => {
                // Never leave a half-published region behind.
                drop(region);
                let _ = SharedRegion::unlink(&self.name);
                Err(e)
            }
        }
    }

    fn lay_out(&self, region: &SharedRegion) -> Result<()> {
        let base = region.base();
        let size = region.size() as u64;
        let count = self.topics.len();
        let cache_line = CACHE_LINE_SIZE as u64;

        let table_offset = align_up(size_of::<RegionHeader>() as u64, cache_line);
        let desc_start = align_up(
            table_offset + (count * size_of::<TopicEntry>()) as u64,
            cache_line,
        );
        let slots_start = align_up(
            desc_start + (count * size_of::<RingDescriptor>()) as u64,
            cache_line,
        );
        if slots_start > size {
            return Err(BusError::out_of_region(slots_start, size));
        }

        unsafe {
            ptr::write(
                base as *mut RegionHeader,
                RegionHeader::new(size, table_offset, count as u32),
            );
        }

        let mut next_free = slots_start;
        for (i, config) in self.topics.iter().enumerate() {
            let slot_count = config.slot_count.max(1).next_power_of_two();
            let slot_size =
                align_up(SlotHeader::SIZE as u64 + config.payload_max as u64, 8) as u32;
            let arena_bytes = slot_count as u64 * slot_size as u64;

            if next_free + arena_bytes > size {
                return Err(BusError::out_of_region(next_free + arena_bytes, size));
            }

            let desc_offset = desc_start + (i * size_of::<RingDescriptor>()) as u64;
            unsafe {
                let entry_ptr = (base.add(table_offset as usize) as *mut TopicEntry).add(i);
                ptr::write(
                    entry_ptr,
                    TopicEntry::new(&config.name, desc_offset, slot_count, slot_size, config.kind),
                );

                let desc_ptr = base.add(desc_offset as usize) as *mut RingDescriptor;
                ptr::write(
                    desc_ptr,
                    RingDescriptor::new(slot_count, slot_size, next_free),
                );

                // The region arrives zeroed; store each sequence anyway so
                // the slot state never depends on how the mapping was born.
                let arena = base.add(next_free as usize);
                for k in 0..slot_count as usize {
                    let slot = arena.add(k * slot_size as usize) as *mut SlotHeader;
                    (*slot).seq.store(0, Ordering::Relaxed);
                }
            }

            next_free = align_up(next_free + arena_bytes, cache_line);
        }

        Ok(())
    }
}
