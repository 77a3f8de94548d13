//! The builder ring: chunked buffer carrying finished messages from the
//! redo applier to the writer.
//!
//! The producer appends `(header, payload)` records, 8-byte aligned,
//! spilling payload bytes into following chunks when a record outgrows the
//! current one. Chunk lengths are published producer-side in spill order
//! with the header chunk last, so a consumer that can see a message header
//! can already read every byte the message spans. The consumer advances
//! chunk to chunk and frees consumed chunks once delivery is confirmed.

use crate::ctx::Ctx;
use crate::error::{RedomineError, Result};
use crate::types::Scn;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed message header: id, scn, payload length, little endian.
pub const BUILDER_MSG_HEADER_SIZE: usize = 24;

pub const fn align8(len: usize) -> usize {
    (len + 7) & !7
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub id: u64,
    pub scn: Scn,
    pub length: u64,
}

/// One ring chunk. `length` is the published byte count; bytes below it
/// are immutable. `sealed` flips once the producer will never write to
/// this chunk again, after the final length is published.
#[derive(Debug)]
pub struct BuilderChunk {
    id: u64,
    buf: RwLock<Vec<u8>>,
    length: AtomicU64,
    sealed: AtomicBool,
}

impl BuilderChunk {
    fn new(id: u64, capacity: usize) -> Self {
        Self {
            id,
            buf: RwLock::new(Vec::with_capacity(capacity)),
            length: AtomicU64::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Reads a message header at `offset`. The caller has already checked
    /// that the published length covers it.
    pub fn header_at(&self, offset: usize) -> MsgHeader {
        let buf = self.buf.read();
        let mut field = [0u8; 8];
        field.copy_from_slice(&buf[offset..offset + 8]);
        let id = u64::from_le_bytes(field);
        field.copy_from_slice(&buf[offset + 8..offset + 16]);
        let scn = u64::from_le_bytes(field);
        field.copy_from_slice(&buf[offset + 16..offset + 24]);
        let length = u64::from_le_bytes(field);
        MsgHeader { id, scn, length }
    }

    pub fn data_at(&self, offset: usize, len: usize) -> Vec<u8> {
        self.buf.read()[offset..offset + len].to_vec()
    }
}

/// Single-producer single-consumer ring of chunks.
pub struct Builder {
    chunk_size: usize,
    chunks: Mutex<VecDeque<Arc<BuilderChunk>>>,
    next_chunk_id: AtomicU64,
    next_msg_id: AtomicU64,
    park_mtx: Mutex<()>,
    park_cond: Condvar,
}

impl Builder {
    pub fn new(ctx: &Ctx) -> Arc<Self> {
        // record offsets are 8-aligned; the chunk size must be too
        let chunk_size = (ctx.buffer_chunk_bytes & !7).max(BUILDER_MSG_HEADER_SIZE * 2);
        let first = Arc::new(BuilderChunk::new(0, chunk_size));
        Arc::new(Self {
            chunk_size,
            chunks: Mutex::new(VecDeque::from([first])),
            next_chunk_id: AtomicU64::new(1),
            next_msg_id: AtomicU64::new(1),
            park_mtx: Mutex::new(()),
            park_cond: Condvar::new(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn first_chunk(&self) -> Arc<BuilderChunk> {
        let mut chunks = self.chunks.lock();
        if let Some(front) = chunks.front() {
            return Arc::clone(front);
        }
        let chunk = Arc::new(BuilderChunk::new(
            self.next_chunk_id.fetch_add(1, Ordering::Relaxed),
            self.chunk_size,
        ));
        chunks.push_back(Arc::clone(&chunk));
        chunk
    }

    /// The next live chunk after `id`, if the producer created one.
    pub fn chunk_after(&self, id: u64) -> Option<Arc<BuilderChunk>> {
        self.chunks
            .lock()
            .iter()
            .find(|chunk| chunk.id > id)
            .cloned()
    }

    fn back_chunk(&self) -> Arc<BuilderChunk> {
        let mut chunks = self.chunks.lock();
        if let Some(back) = chunks.back() {
            return Arc::clone(back);
        }
        let chunk = Arc::new(BuilderChunk::new(
            self.next_chunk_id.fetch_add(1, Ordering::Relaxed),
            self.chunk_size,
        ));
        chunks.push_back(Arc::clone(&chunk));
        chunk
    }

    fn push_chunk(&self) -> Arc<BuilderChunk> {
        let chunk = Arc::new(BuilderChunk::new(
            self.next_chunk_id.fetch_add(1, Ordering::Relaxed),
            self.chunk_size,
        ));
        self.chunks.lock().push_back(Arc::clone(&chunk));
        chunk
    }

    /// Appends one message, returning its id. Producer-side only.
    pub fn append(&self, scn: Scn, payload: &[u8]) -> Result<u64> {
        if payload.is_empty() {
            return Err(RedomineError::runtime(
                10017,
                "can't append an empty message to the builder ring",
            ));
        }
        let msg_id = self.next_msg_id.fetch_add(1, Ordering::Relaxed);

        let mut chunk = self.back_chunk();
        let mut buf = chunk.buf.write();
        if buf.len() + BUILDER_MSG_HEADER_SIZE > self.chunk_size {
            // no room for a header, seal and start the next chunk
            drop(buf);
            chunk.sealed.store(true, Ordering::Release);
            chunk = self.push_chunk();
            buf = chunk.buf.write();
        }
        let header_chunk = Arc::clone(&chunk);

        buf.extend_from_slice(&msg_id.to_le_bytes());
        buf.extend_from_slice(&scn.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());

        let mut written = 0usize;
        loop {
            let room = self.chunk_size - buf.len();
            let take = room.min(payload.len() - written);
            buf.extend_from_slice(&payload[written..written + take]);
            written += take;

            if written == payload.len() {
                let aligned = align8(buf.len()).min(self.chunk_size);
                buf.resize(aligned, 0);
                if !Arc::ptr_eq(&chunk, &header_chunk) {
                    chunk.length.store(buf.len() as u64, Ordering::Release);
                }
                drop(buf);
                break;
            }

            // spill: this chunk is full, continue the payload in a new one
            if !Arc::ptr_eq(&chunk, &header_chunk) {
                chunk.length.store(buf.len() as u64, Ordering::Release);
            }
            drop(buf);
            chunk = self.push_chunk();
            buf = chunk.buf.write();
        }

        // publish the header chunk last; seal it if the message spilled
        {
            let header_buf = header_chunk.buf.read();
            header_chunk
                .length
                .store(header_buf.len() as u64, Ordering::Release);
        }
        if !Arc::ptr_eq(&chunk, &header_chunk) {
            header_chunk.sealed.store(true, Ordering::Release);
        }

        self.wake_up();
        Ok(msg_id)
    }

    /// Frees chunks below `max_id`, the chunk holding the start of the
    /// latest in-order-confirmed message. The active chunk always stays.
    pub fn release_buffers(&self, max_id: u64) {
        let mut chunks = self.chunks.lock();
        while chunks.len() > 1 {
            match chunks.front() {
                Some(front) if front.id < max_id => {
                    chunks.pop_front();
                }
                _ => break,
            }
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn wake_up(&self) {
        let _guard = self.park_mtx.lock();
        self.park_cond.notify_all();
    }

    /// Parks the consumer until new work arrives or the poll interval
    /// elapses.
    pub fn sleep_for_writer_work(&self, _queue_size: usize, poll_interval_us: u64) {
        let mut guard = self.park_mtx.lock();
        let _ = self
            .park_cond
            .wait_for(&mut guard, Duration::from_micros(poll_interval_us));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn builder(chunk_bytes: usize) -> Arc<Builder> {
        let config = EngineConfig {
            buffer_chunk_bytes: chunk_bytes,
            ..EngineConfig::default()
        };
        Builder::new(&Ctx::new(&config))
    }

    #[test]
    fn append_publishes_aligned_records() {
        let builder = builder(4096);
        let id = builder.append(100, b"hello").unwrap();
        assert_eq!(id, 1);

        let chunk = builder.first_chunk();
        assert_eq!(chunk.length() as usize, align8(BUILDER_MSG_HEADER_SIZE + 5));

        let header = chunk.header_at(0);
        assert_eq!(header.id, 1);
        assert_eq!(header.scn, 100);
        assert_eq!(header.length, 5);
        assert_eq!(chunk.data_at(BUILDER_MSG_HEADER_SIZE, 5), b"hello");

        let id2 = builder.append(200, b"world!").unwrap();
        assert_eq!(id2, 2);
        let second_off = align8(BUILDER_MSG_HEADER_SIZE + 5);
        let header2 = chunk.header_at(second_off);
        assert_eq!(header2.id, 2);
        assert_eq!(header2.scn, 200);
    }

    #[test]
    fn oversized_message_spills_across_chunks() {
        let builder = builder(64);
        let payload: Vec<u8> = (0..150u8).collect();
        builder.append(7, &payload).unwrap();

        let first = builder.first_chunk();
        assert!(first.is_sealed());
        assert_eq!(first.length() as usize, 64);
        let header = first.header_at(0);
        assert_eq!(header.length, 150);

        // reassemble the payload the way the consumer does
        let mut collected = first.data_at(BUILDER_MSG_HEADER_SIZE, 64 - BUILDER_MSG_HEADER_SIZE);
        let mut chunk = first;
        while collected.len() < payload.len() {
            chunk = builder.chunk_after(chunk.id()).expect("spill chunk");
            let take = (payload.len() - collected.len()).min(chunk.length() as usize);
            collected.extend(chunk.data_at(0, take));
        }
        assert_eq!(collected, payload);
    }

    #[test]
    fn header_never_straddles_a_chunk_boundary() {
        let builder = builder(64);
        // fill so that fewer than 24 bytes remain
        builder.append(1, &[0u8; 24]).unwrap(); // 24 + 24 = 48, 16 left
        builder.append(2, b"x").unwrap();

        let first = builder.first_chunk();
        assert!(first.is_sealed());
        assert_eq!(first.length(), 48);
        let second = builder.chunk_after(first.id()).expect("next chunk");
        assert_eq!(second.header_at(0).id, 2);
    }

    #[test]
    fn release_buffers_keeps_the_active_chunk() {
        let builder = builder(64);
        for scn in 0..8 {
            builder.append(scn, &[1u8; 40]).unwrap();
        }
        let last_id = {
            let mut id = 0;
            let mut chunk = builder.first_chunk();
            while let Some(next) = builder.chunk_after(chunk.id()) {
                chunk = next;
                id = chunk.id();
            }
            id
        };
        builder.release_buffers(last_id);
        assert_eq!(builder.first_chunk().id(), last_id);
        // releasing everything still leaves one chunk
        builder.release_buffers(u64::MAX);
        assert_eq!(builder.chunk_count(), 1);
    }

    #[test]
    fn empty_messages_are_refused() {
        let builder = builder(64);
        assert!(builder.append(1, b"").is_err());
    }
}
