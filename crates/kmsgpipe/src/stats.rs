use serde::Serialize;
use std::fmt;

/// Point-in-time view of a pipe.
///
/// `Display` renders the same `key: value` lines the driver's debugfs
/// `stats` file prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipeStats {
    pub capacity: usize,
    pub data_size: usize,
    pub message_count: usize,
    pub readers_waiting: usize,
    pub writers_waiting: usize,
    pub expiry_ms: u64,
}

impl fmt::Display for PipeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "capacity: {}", self.capacity)?;
        writeln!(f, "data_size: {}", self.data_size)?;
        writeln!(f, "message count: {}", self.message_count)?;
        writeln!(f, "readers waiting: {}", self.readers_waiting)?;
        writeln!(f, "writers waiting: {}", self.writers_waiting)?;
        writeln!(f, "expiry ms: {}", self.expiry_ms)
    }
}
