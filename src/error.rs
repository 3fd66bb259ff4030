//! Error types and return-code taxonomy for membus

/// Result type alias for membus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Error types for the membus shared memory fabric
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// I/O related errors (file operations, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Creating the backing shared memory object failed
    #[error("Failed to create region '{name}': {message}")]
    CreateFailed { name: String, message: String },

    /// Sizing the backing object failed
    #[error("Failed to size region '{name}': {message}")]
    ResizeFailed { name: String, message: String },

    /// Mapping the region into the address space failed
    #[error("Failed to map region: {message}")]
    MapFailed { message: String },

    /// Topic layout does not fit inside the region
    #[error("Out of region space: need {requested} bytes, region holds {available}")]
    OutOfRegion { requested: u64, available: u64 },

    /// Region not found or doesn't exist
    #[error("Region not found: {name}")]
    RegionNotFound { name: String },

    /// Topic name missing from the region's topic table
    #[error("Topic not found: {name}")]
    TopicNotFound { name: String },

    /// Attaching a publisher of the wrong kind to a ring
    #[error("Ring kind mismatch on topic '{topic}': expected {expected}")]
    KindMismatch { topic: String, expected: String },

    /// Magic or version mismatch while attaching to a region
    #[error("Layout mismatch in {field}: expected {expected:#x}, got {actual:#x}")]
    LayoutMismatch {
        field: &'static str,
        expected: u64,
        actual: u64,
    },

    /// Payload exceeds the slot capacity of the ring
    #[error("Payload too large: {len} bytes, slot capacity {capacity}")]
    PayloadTooLarge { len: usize, capacity: usize },

    /// The MWMR generation wait exhausted its spin budget
    #[error("Publish timed out after {iterations} wait iterations")]
    Timeout { iterations: u64 },

    /// Serialization errors (health export)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl BusError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a create-failed error
    pub fn create_failed(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::CreateFailed {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create a resize-failed error
    pub fn resize_failed(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ResizeFailed {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create a map-failed error
    pub fn map_failed(message: impl std::fmt::Display) -> Self {
        Self::MapFailed {
            message: message.to_string(),
        }
    }

    /// Create an out-of-region error
    pub fn out_of_region(requested: u64, available: u64) -> Self {
        Self::OutOfRegion {
            requested,
            available,
        }
    }

    /// Create a region not found error
    pub fn region_not_found(name: impl Into<String>) -> Self {
        Self::RegionNotFound { name: name.into() }
    }

    /// Create a topic not found error
    pub fn topic_not_found(name: impl Into<String>) -> Self {
        Self::TopicNotFound { name: name.into() }
    }

    /// Create a kind mismatch error
    pub fn kind_mismatch(topic: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::KindMismatch {
            topic: topic.into(),
            expected: expected.into(),
        }
    }

    /// Create a layout mismatch error
    pub fn layout_mismatch(field: &'static str, expected: u64, actual: u64) -> Self {
        Self::LayoutMismatch {
            field,
            expected,
            actual,
        }
    }

    /// Create a payload too large error
    pub fn payload_too_large(len: usize, capacity: usize) -> Self {
        Self::PayloadTooLarge { len, capacity }
    }

    /// Create a timeout error
    pub fn timeout(iterations: u64) -> Self {
        Self::Timeout { iterations }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Map this error onto the shared ring return-code taxonomy
    pub fn code(&self) -> RingCode {
        match self {
            Self::PayloadTooLarge { .. } => RingCode::PayloadTooLarge,
            Self::Timeout { .. } => RingCode::Timeout,
            _ => RingCode::Error,
        }
    }
}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

/// Unified return codes shared by the publish and consume paths.
///
/// The numeric values are part of the on-host interface; external tools
/// that attach to a region report the same codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RingCode {
    /// Success; for consume the payload length travels as a separate value
    Ok = 0,
    /// Invalid arguments or attach failure
    Error = -1,
    /// Payload exceeds slot capacity
    PayloadTooLarge = -2,
    /// Consumer buffer too small for the next message
    Truncated = -3,
    /// MWMR generation wait exhausted
    Timeout = -4,
    /// No new message
    NoData = -11,
}

impl RingCode {
    /// Raw integer value of the code
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
