use crate::record::MAX_DATA_SIZE;
use crate::RingError;
use std::time::Duration;

/// Geometry of a message ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of message slots
    pub capacity: usize,
    /// Maximum bytes per message (slot size)
    pub data_size: usize,
}

impl RingConfig {
    /// Creates a new ring geometry.
    pub const fn new(capacity: usize, data_size: usize) -> Self {
        Self {
            capacity,
            data_size,
        }
    }

    /// Size of the payload region in bytes, or `None` on overflow.
    #[inline]
    pub const fn payload_bytes(&self) -> Option<usize> {
        self.capacity.checked_mul(self.data_size)
    }

    /// Checks the geometry without allocating anything.
    pub fn validate(&self) -> Result<(), RingError> {
        if self.capacity == 0 {
            return Err(RingError::InvalidArgument("capacity must be non-zero"));
        }
        if self.data_size == 0 {
            return Err(RingError::InvalidArgument("data_size must be non-zero"));
        }
        if self.data_size > MAX_DATA_SIZE {
            return Err(RingError::InvalidArgument("data_size exceeds record length range"));
        }
        if self.payload_bytes().is_none() {
            return Err(RingError::InvalidArgument("capacity * data_size overflows"));
        }
        Ok(())
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            data_size: 1024,
        }
    }
}

/// Many small messages (256 slots of 128 bytes)
pub const SMALL_MESSAGES_CONFIG: RingConfig = RingConfig::new(256, 128);

/// Few large messages (16 slots of 64 KiB - 1)
pub const LARGE_MESSAGES_CONFIG: RingConfig = RingConfig::new(16, MAX_DATA_SIZE);

/// Default message lifetime before the reaper may drop it.
pub const DEFAULT_EXPIRY: Duration = Duration::from_millis(5000);

/// Configuration for a [`Pipe`](crate::Pipe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeConfig {
    /// Ring geometry.
    pub ring: RingConfig,
    /// Messages older than this are dropped by `cleanup_expired`.
    ///
    /// Also the reaper's sweep interval.
    pub expiry: Duration,
}

impl PipeConfig {
    pub const fn new(ring: RingConfig) -> Self {
        Self {
            ring,
            expiry: DEFAULT_EXPIRY,
        }
    }

    /// Sets the message expiry.
    pub const fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn validate(&self) -> Result<(), RingError> {
        self.ring.validate()?;
        if self.expiry.is_zero() {
            return Err(RingError::InvalidArgument("expiry must be non-zero"));
        }
        Ok(())
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self::new(RingConfig::default())
    }
}
