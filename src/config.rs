use crate::ctx::LogLevel;

/// Runtime configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the writer's in-flight delivery queue.
    pub queue_size: usize,
    /// Writer sleep while the queue is full or the builder ring is empty.
    pub poll_interval_us: u64,
    /// Minimum seconds between unforced writer checkpoints.
    pub checkpoint_interval_s: u64,
    /// Catalog checkpoints retained before the GC deletes the oldest.
    pub checkpoints_keep: usize,
    /// Data bytes per builder ring chunk.
    pub buffer_chunk_bytes: usize,
    /// Trace bitmask, see the `TRACE_*` constants.
    pub trace: u64,
    pub log_level: LogLevel,
    /// Redo feature bitmask, see the `REDO_FLAGS_*` constants.
    pub flags: u64,
    /// Check-suppression bitmask, see the `DISABLE_CHECKS_*` constants.
    pub disable_checks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_size: 65536,
            poll_interval_us: 100_000,
            checkpoint_interval_s: 10,
            checkpoints_keep: 100,
            buffer_chunk_bytes: 1024 * 1024,
            trace: 0,
            log_level: LogLevel::Info,
            flags: 0,
            disable_checks: 0,
        }
    }
}

impl EngineConfig {
    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_trace(mut self, trace: u64) -> Self {
        self.trace |= trace;
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }
}
