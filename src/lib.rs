//! # membus - Shared Memory Publish/Subscribe Fabric
//!
//! membus is a low-latency inter-process messaging fabric for a single
//! host. One named shared memory region is carved into per-topic ring
//! buffers at build time; publishers append fixed-slot messages and
//! subscribers read them concurrently without copying through the kernel.
//!
//! ## Features
//!
//! - **Position-independent layout**: all addressing by offset from the
//!   region base, interoperable across processes
//! - **Lock-free rings**: two atomic words per ring drive the protocol;
//!   everything else is seqlock-guarded plain memory
//! - **SWMR and MWMR publish paths**: wait-free single-writer appends,
//!   generation-gated multi-writer appends
//! - **Independent subscribers**: private cursors, torn-read detection,
//!   forward-jump recovery with gap accounting
//! - **Derived health**: published counts, last-publish time, lag and
//!   liveness computed on demand, exportable as a JSON line
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              Shared region (one host)            │
//! ├──────────────────────────────────────────────────┤
//! │ RegionHeader │ topic table │ descriptors │ slots │
//! └──────────────────────────────────────────────────┘
//!        ▲               ▲                    ▲
//!   RegionBuilder   BusRegion::attach   Publisher / MwmrPublisher
//!   (one process)   (any process)       / Subscriber (per handle)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use membus::{BusRegion, Consumed, Publisher, RegionBuilder, Subscriber, TopicConfig};
//!
//! let region = RegionBuilder::new("/membus_demo", 1 << 20)
//!     .topic(TopicConfig::single_writer("sensor/imu", 64, 256))
//!     .build()?;
//!
//! let mut publisher = Publisher::attach(&region, "sensor/imu", 1)?;
//! publisher.publish(b"hello")?;
//!
//! let attached = BusRegion::attach("/membus_demo")?;
//! let mut subscriber = Subscriber::attach(&attached, "sensor/imu")?;
//! let mut buf = [0u8; 256];
//! if let Consumed::Message { len, .. } = subscriber.next(&mut buf) {
//!     assert_eq!(&buf[..len], b"hello");
//! }
//! # Ok::<(), membus::BusError>(())
//! ```

pub mod builder;
pub mod error;
pub mod health;
pub mod layout;
pub mod region;
pub mod registry;
pub mod ring;

pub use builder::{RegionBuilder, TopicConfig};
pub use error::{BusError, Result, RingCode};
pub use health::RingHealth;
pub use layout::{
    RegionHeader, RingDescriptor, RingKind, SlotHeader, TopicEntry, CACHE_LINE_SIZE,
    LAYOUT_VERSION, MAX_TOPIC_NAME, MIN_REGION_SIZE, REGION_MAGIC,
};
pub use region::SharedRegion;
pub use registry::BusRegion;
pub use ring::{now_monotonic_ns, Consumed, MwmrPublisher, Publisher, Subscriber};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default alignment for descriptors and slot arenas
    pub const DEFAULT_ALIGNMENT: usize = 64;

    /// Default ring slot count when a caller has no better number
    pub const DEFAULT_SLOT_COUNT: u32 = 1024;

    /// Default maximum payload per slot
    pub const DEFAULT_PAYLOAD_MAX: u32 = 4096;
}
