//! Validated region attach and topic lookup
//!
//! The topic table is a fixed array of entries written once at build
//! time; lookup is a linear scan with an exact bounded byte match. Topic
//! counts are expected to stay in the tens, so nothing fancier is needed.

use std::mem::size_of;
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::layout::{RegionHeader, TopicEntry};
use crate::region::SharedRegion;
use crate::ring::RingHandle;

/// A mapped region whose header passed magic and version validation.
///
/// Publishers, subscribers and health probes all start from one of these;
/// each keeps the mapping alive through a shared handle.
#[derive(Debug, Clone)]
pub struct BusRegion {
    region: Arc<SharedRegion>,
}

impl BusRegion {
    /// Map an existing region by name and validate its header.
    pub fn attach(name: &str) -> Result<Self> {
        let region = SharedRegion::open(name)?;
        Self::from_shared(Arc::new(region))
    }

    pub(crate) fn from_shared(region: Arc<SharedRegion>) -> Result<Self> {
        if region.size() < size_of::<RegionHeader>() {
            return Err(BusError::map_failed(
                "mapping smaller than the region header",
            ));
        }
        let this = Self { region };
        this.header().validate()?;
        if this.header().region_size > this.region.size() as u64 {
            return Err(BusError::layout_mismatch(
                "region_size",
                this.header().region_size,
                this.region.size() as u64,
            ));
        }
        Ok(this)
    }

    /// The region header at offset 0
    pub fn header(&self) -> &RegionHeader {
        unsafe { &*(self.region.base() as *const RegionHeader) }
    }

    /// Find a topic by exact name; `None` on miss.
    pub fn find_topic(&self, name: &str) -> Option<&TopicEntry> {
        let header = self.header();
        let table = unsafe {
            self.region.base().add(header.topic_table_offset as usize) as *const TopicEntry
        };
        (0..header.topic_count as usize)
            .map(|i| unsafe { &*table.add(i) })
            .find(|entry| entry.matches(name))
    }

    /// Find a topic by exact name, failing with `TopicNotFound` on miss.
    pub fn topic(&self, name: &str) -> Result<&TopicEntry> {
        self.find_topic(name)
            .ok_or_else(|| BusError::topic_not_found(name))
    }

    /// Iterate over every topic entry in table order
    pub fn topics(&self) -> impl Iterator<Item = &TopicEntry> {
        let header = self.header();
        let table = unsafe {
            self.region.base().add(header.topic_table_offset as usize) as *const TopicEntry
        };
        (0..header.topic_count as usize).map(move |i| unsafe { &*table.add(i) })
    }

    pub(crate) fn ring(&self, entry: &TopicEntry) -> RingHandle {
        RingHandle::from_entry(self.region.base(), entry)
    }

    pub(crate) fn shared(&self) -> Arc<SharedRegion> {
        Arc::clone(&self.region)
    }

    /// Current `write_head` of a topic's ring (acquire load).
    ///
    /// Inspection accessor for property tests and tooling; also the
    /// "total published" figure health reports.
    pub fn write_head(&self, topic: &str) -> Result<u64> {
        let entry = self.topic(topic)?;
        Ok(self.ring(entry).write_head())
    }

    /// Sequence word of one physical slot (acquire load); 0 means the
    /// slot was never written.
    pub fn slot_seq(&self, topic: &str, index: u32) -> Result<u64> {
        let entry = self.topic(topic)?;
        if index >= entry.slot_count {
            return Err(BusError::invalid_parameter(
                "index",
                format!("slot index {} out of {}", index, entry.slot_count),
            ));
        }
        let ring = self.ring(entry);
        Ok(ring.seq(index as usize).load(std::sync::atomic::Ordering::Acquire))
    }

    /// Name of the backing shared memory object
    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Size of the mapping in bytes
    pub fn size(&self) -> usize {
        self.region.size()
    }
}
