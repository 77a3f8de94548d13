use crate::config::EngineConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub const TRACE_SYSTEM: u64 = 1 << 0;
pub const TRACE_LOB: u64 = 1 << 1;
pub const TRACE_WRITER: u64 = 1 << 2;
pub const TRACE_CHECKPOINT: u64 = 1 << 3;
pub const TRACE_THREADS: u64 = 1 << 4;

/// Keep mining dictionary objects whose owner is unknown, synthesizing a
/// placeholder user, and allow reclaiming them once the owner disappears.
pub const REDO_FLAGS_ADAPTIVE_SCHEMA: u64 = 1 << 0;

/// Suppress supplemental-log analysis during materialization.
pub const DISABLE_CHECKS_SUPPLEMENTAL_LOG: u64 = 1 << 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Silent,
    Error,
    Warning,
    Info,
    Debug,
}

/// Process context shared by every component: shutdown flags, trace masks,
/// feature flags, and the thresholds the cooperative loops consult. Passed
/// explicitly as a handle; there is no global.
///
/// Warnings and errors are forwarded to `tracing` and counted per code so
/// that callers (and tests) can observe emission without scraping logs.
pub struct Ctx {
    pub trace: u64,
    pub log_level: LogLevel,
    pub flags: u64,
    pub disable_checks: u64,
    pub queue_size: usize,
    pub poll_interval_us: u64,
    pub checkpoint_interval_s: u64,
    pub checkpoints_keep: usize,
    pub buffer_chunk_bytes: usize,
    soft_shutdown: AtomicBool,
    hard_shutdown: AtomicBool,
    replicator_finished: AtomicBool,
    diagnostics: Mutex<HashMap<u32, u64>>,
}

impl Ctx {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            trace: config.trace,
            log_level: config.log_level,
            flags: config.flags,
            disable_checks: config.disable_checks,
            queue_size: config.queue_size,
            poll_interval_us: config.poll_interval_us,
            checkpoint_interval_s: config.checkpoint_interval_s,
            checkpoints_keep: config.checkpoints_keep,
            buffer_chunk_bytes: config.buffer_chunk_bytes,
            soft_shutdown: AtomicBool::new(false),
            hard_shutdown: AtomicBool::new(false),
            replicator_finished: AtomicBool::new(false),
            diagnostics: Mutex::new(HashMap::new()),
        }
    }

    pub fn flag(&self, mask: u64) -> bool {
        self.flags & mask != 0
    }

    pub fn checks_disabled(&self, mask: u64) -> bool {
        self.disable_checks & mask != 0
    }

    pub fn is_debug(&self) -> bool {
        self.log_level >= LogLevel::Debug
    }

    pub fn info(&self, code: u32, message: impl AsRef<str>) {
        if self.log_level >= LogLevel::Info {
            tracing::info!(code, "{}", message.as_ref());
        }
    }

    pub fn warning(&self, code: u32, message: impl AsRef<str>) {
        if self.log_level >= LogLevel::Warning {
            tracing::warn!(code, "{}", message.as_ref());
        }
        self.bump(code);
    }

    pub fn error(&self, code: u32, message: impl AsRef<str>) {
        if self.log_level >= LogLevel::Error {
            tracing::error!(code, "{}", message.as_ref());
        }
        self.bump(code);
    }

    pub fn hint(&self, message: impl AsRef<str>) {
        if self.log_level >= LogLevel::Info {
            tracing::info!("hint: {}", message.as_ref());
        }
    }

    pub fn log_trace(&self, mask: u64, message: impl AsRef<str>) {
        if self.trace & mask != 0 {
            tracing::debug!(mask, "{}", message.as_ref());
        }
    }

    /// Number of warnings/errors emitted with the given code.
    pub fn diagnostic_count(&self, code: u32) -> u64 {
        *self.diagnostics.lock().get(&code).unwrap_or(&0)
    }

    fn bump(&self, code: u32) {
        *self.diagnostics.lock().entry(code).or_insert(0) += 1;
    }

    pub fn stop_soft(&self) {
        self.soft_shutdown.store(true, Ordering::Release);
    }

    pub fn stop_hard(&self) {
        self.soft_shutdown.store(true, Ordering::Release);
        self.hard_shutdown.store(true, Ordering::Release);
    }

    pub fn set_replicator_finished(&self) {
        self.replicator_finished.store(true, Ordering::Release);
    }

    pub fn soft_shutdown(&self) -> bool {
        self.soft_shutdown.load(Ordering::Acquire)
    }

    pub fn hard_shutdown(&self) -> bool {
        self.hard_shutdown.load(Ordering::Acquire)
    }

    pub fn replicator_finished(&self) -> bool {
        self.replicator_finished.load(Ordering::Acquire)
    }
}
