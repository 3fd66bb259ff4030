//! On-memory layout of a membus region
//!
//! A region is position-independent: every structure refers to others by
//! offset from the region base, never by pointer. Any process that knows
//! these `#[repr(C)]` definitions and the constants below can attach
//! interoperably. Fields are in host byte order; regions are not portable
//! across endianness or pointer width.
//!
//! Layout order inside a region:
//! 1. [`RegionHeader`] at offset 0
//! 2. Topic table: `topic_count` x [`TopicEntry`]
//! 3. Ring descriptor array: one cache-line-aligned [`RingDescriptor`] per topic
//! 4. Slot arenas: `slot_count * slot_size` bytes per topic

use std::mem::size_of;
use std::sync::atomic::AtomicU64;

use crate::error::{BusError, Result};

/// Magic number identifying a valid membus region ("MBUS")
pub const REGION_MAGIC: u32 = 0x4D42_5553;

/// Current layout version
pub const LAYOUT_VERSION: u32 = 1;

/// Maximum topic name length including the null terminator
pub const MAX_TOPIC_NAME: usize = 64;

/// Cache line size used for descriptor and arena alignment
pub const CACHE_LINE_SIZE: usize = 64;

/// Smallest region the builder accepts
pub const MIN_REGION_SIZE: usize = 4096;

/// Round `v` up to the next multiple of `a` (`a` must be a power of two)
#[inline]
pub const fn align_up(v: u64, a: u64) -> u64 {
    (v + (a - 1)) & !(a - 1)
}

/// Header installed at offset 0 of every region
#[repr(C)]
#[derive(Debug)]
pub struct RegionHeader {
    /// Magic number for validation
    pub magic: u32,
    /// Layout version
    pub version: u32,
    /// Total region size in bytes
    pub region_size: u64,
    /// Offset of the topic table from the region base
    pub topic_table_offset: u64,
    /// Number of entries in the topic table
    pub topic_count: u32,
    _pad: u32,
}

impl RegionHeader {
    /// Create a header for a freshly built region
    pub fn new(region_size: u64, topic_table_offset: u64, topic_count: u32) -> Self {
        Self {
            magic: REGION_MAGIC,
            version: LAYOUT_VERSION,
            region_size,
            topic_table_offset,
            topic_count,
            _pad: 0,
        }
    }

    /// Validate magic and version against this build's constants
    pub fn validate(&self) -> Result<()> {
        if self.magic != REGION_MAGIC {
            return Err(BusError::layout_mismatch(
                "magic",
                REGION_MAGIC as u64,
                self.magic as u64,
            ));
        }
        if self.version != LAYOUT_VERSION {
            return Err(BusError::layout_mismatch(
                "version",
                LAYOUT_VERSION as u64,
                self.version as u64,
            ));
        }
        Ok(())
    }
}

/// Writer discipline of a ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RingKind {
    /// Exactly one concurrent publisher
    SingleWriter = 0,
    /// Any number of concurrent publishers
    MultiWriter = 1,
}

impl RingKind {
    /// Human-readable label for diagnostics
    pub fn label(self) -> &'static str {
        match self {
            RingKind::SingleWriter => "single-writer",
            RingKind::MultiWriter => "multi-writer",
        }
    }
}

impl TryFrom<u32> for RingKind {
    type Error = BusError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(RingKind::SingleWriter),
            1 => Ok(RingKind::MultiWriter),
            other => Err(BusError::invalid_parameter(
                "ring_kind",
                format!("unknown ring kind {}", other),
            )),
        }
    }
}

/// Fixed-size record in the topic table
#[repr(C)]
#[derive(Debug)]
pub struct TopicEntry {
    /// Null-terminated topic name, unique within the region
    pub name: [u8; MAX_TOPIC_NAME],
    /// Offset of this topic's ring descriptor from the region base
    pub ring_desc_offset: u64,
    /// Number of slots in the ring (power of two)
    pub slot_count: u32,
    /// Bytes per slot including the slot header, 8-byte aligned
    pub slot_size: u32,
    /// [`RingKind`] discriminant
    pub kind: u32,
    _pad: u32,
}

impl TopicEntry {
    /// Build an entry; the name must already be validated by the builder
    pub(crate) fn new(
        name: &str,
        ring_desc_offset: u64,
        slot_count: u32,
        slot_size: u32,
        kind: RingKind,
    ) -> Self {
        let mut name_buf = [0u8; MAX_TOPIC_NAME];
        let bytes = name.as_bytes();
        name_buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            name: name_buf,
            ring_desc_offset,
            slot_count,
            slot_size,
            kind: kind as u32,
            _pad: 0,
        }
    }

    /// The topic name up to the null terminator
    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_TOPIC_NAME);
        std::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// Exact byte match on the stored name, bounded by [`MAX_TOPIC_NAME`]
    pub fn matches(&self, name: &str) -> bool {
        let bytes = name.as_bytes();
        if bytes.len() >= MAX_TOPIC_NAME {
            return false;
        }
        let stored_len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_TOPIC_NAME);
        stored_len == bytes.len() && &self.name[..stored_len] == bytes
    }

    /// The ring kind recorded for this topic
    pub fn ring_kind(&self) -> Result<RingKind> {
        RingKind::try_from(self.kind)
    }
}

/// Per-ring descriptor, exactly one cache line
#[repr(C, align(64))]
#[derive(Debug)]
pub struct RingDescriptor {
    /// Number of slots (power of two), duplicated from the topic entry
    pub slot_count: u32,
    /// Bytes per slot, duplicated from the topic entry
    pub slot_size: u32,
    /// Offset of the slot arena from the region base
    pub slots_base_offset: u64,
    /// Sequence number of the last slot reservation. Monotonically
    /// non-decreasing; never wraps. Indexing uses `(seq - 1) & (slot_count - 1)`.
    pub write_head: AtomicU64,
    _pad: [u8; CACHE_LINE_SIZE - 24],
}

impl RingDescriptor {
    /// Build a descriptor for a freshly laid-out ring
    pub(crate) fn new(slot_count: u32, slot_size: u32, slots_base_offset: u64) -> Self {
        Self {
            slot_count,
            slot_size,
            slots_base_offset,
            write_head: AtomicU64::new(0),
            _pad: [0; CACHE_LINE_SIZE - 24],
        }
    }
}

/// Header at the start of every slot; payload bytes follow immediately
#[repr(C)]
#[derive(Debug)]
pub struct SlotHeader {
    /// 0 means never written; otherwise the latest sequence number
    /// committed into this physical slot. Only ever grows.
    pub seq: AtomicU64,
    /// Monotonic time of commit in nanoseconds
    pub timestamp_ns: u64,
    /// Payload bytes stored after this header
    pub payload_len: u32,
    /// Identity of the committing publisher
    pub publisher_id: u16,
    _pad: [u8; 2],
}

impl SlotHeader {
    /// Size of the slot header in bytes
    pub const SIZE: usize = size_of::<SlotHeader>();
}

const _: () = assert!(size_of::<RegionHeader>() == 32);
const _: () = assert!(size_of::<TopicEntry>() == MAX_TOPIC_NAME + 24);
const _: () = assert!(size_of::<RingDescriptor>() == CACHE_LINE_SIZE);
const _: () = assert!(size_of::<SlotHeader>() % 8 == 0);
