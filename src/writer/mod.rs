//! The writer stage: drains the builder ring, delivers messages over an
//! output stream, tracks confirmations, and persists delivery progress.

pub mod queue;

use crate::builder::{align8, Builder, MsgHeader, BUILDER_MSG_HEADER_SIZE};
use crate::ctx::{Ctx, TRACE_CHECKPOINT, TRACE_THREADS, TRACE_WRITER};
use crate::error::{RedomineError, Result};
use crate::metadata::{Metadata, CHECKPOINT_FILE_MAX_SIZE};
use crate::types::{Scn, ZERO_SCN};
use queue::{DeliveryQueue, QueuedMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct WriterCheckpoint {
    database: String,
    scn: Scn,
    resetlogs: u32,
    activation: u32,
}

/// Transport seam towards the consumer. Sends are synchronous; delivery
/// confirmations arrive asynchronously and are collected by polling.
/// Errors surfaced here should be `Network` so the session loop retries
/// them after a reconnect.
pub trait OutputStream: Send {
    fn name(&self) -> String;
    fn reconnect(&mut self) -> Result<()>;
    fn send(&mut self, msg_id: u64, data: &[u8]) -> Result<()>;
    /// Message ids the client confirmed since the last poll.
    fn poll_confirmations(&mut self) -> Result<Vec<u64>>;
}

/// One writer session pump. The outer loop survives client disconnects;
/// the inner loop streams ring messages in order, confirming and
/// checkpointing as it goes.
pub struct Writer<S: OutputStream> {
    ctx: Arc<Ctx>,
    database: String,
    builder: Arc<Builder>,
    metadata: Arc<Metadata>,
    stream: S,
    queue: DeliveryQueue,
    checkpoint_scn: Scn,
    checkpoint_time: Instant,
    streaming: bool,
}

impl<S: OutputStream> Writer<S> {
    pub fn new(
        ctx: Arc<Ctx>,
        database: impl Into<String>,
        builder: Arc<Builder>,
        metadata: Arc<Metadata>,
        stream: S,
    ) -> Self {
        let queue = DeliveryQueue::new(ctx.queue_size);
        Self {
            ctx,
            database: database.into(),
            builder,
            metadata,
            stream,
            queue,
            checkpoint_scn: ZERO_SCN,
            checkpoint_time: Instant::now(),
            streaming: false,
        }
    }

    pub fn confirmed_scn(&self) -> Scn {
        self.queue.confirmed_scn
    }

    pub fn sent_messages(&self) -> u64 {
        self.queue.sent_messages
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Runs the writer until shutdown. Network errors are logged and the
    /// session restarts after a reconnect; data and runtime errors stop
    /// the whole process.
    pub fn run(&mut self) {
        self.ctx.log_trace(TRACE_THREADS, "writer thread start");
        self.ctx
            .info(0, format!("writer is starting with {}", self.stream.name()));

        while !self.ctx.hard_shutdown() {
            match self.main_loop() {
                Ok(()) => {}
                Err(err) if err.is_network() => {
                    self.ctx.warning(err.code(), err.message());
                    self.streaming = false;
                    if let Err(reconnect_err) = self.stream.reconnect() {
                        self.ctx
                            .warning(reconnect_err.code(), reconnect_err.message());
                        std::thread::sleep(Duration::from_micros(self.ctx.poll_interval_us));
                    }
                }
                Err(err) => {
                    self.ctx.error(err.code(), err.message());
                    self.ctx.stop_hard();
                    break;
                }
            }

            if self.ctx.soft_shutdown() && self.ctx.replicator_finished() {
                break;
            }
        }

        self.ctx.info(
            0,
            format!(
                "writer is stopping: {}, max queue size: {}",
                self.stream.name(),
                self.queue.max_queue_size
            ),
        );
        self.ctx.log_trace(TRACE_THREADS, "writer thread stop");
    }

    fn main_loop(&mut self) -> Result<()> {
        self.read_checkpoint()?;
        self.queue.clear();

        let mut chunk = self.builder.first_chunk();
        let mut old: usize = 0;
        let mut new_len: usize;

        'streaming: while !self.ctx.hard_shutdown() {
            // wait for a message
            loop {
                self.poll_queue()?;
                self.write_checkpoint(false)?;

                // consumed chunk fully, move to the next one
                if chunk.is_sealed() && chunk.length() as usize == old {
                    if let Some(next) = self.builder.chunk_after(chunk.id()) {
                        chunk = next;
                        old = 0;
                    }
                }

                new_len = chunk.length() as usize;
                if new_len > old + BUILDER_MSG_HEADER_SIZE && chunk.header_at(old).length > 0 {
                    break;
                }

                if self.ctx.soft_shutdown() && self.ctx.replicator_finished() {
                    break;
                }
                if self.ctx.hard_shutdown() {
                    break 'streaming;
                }
                self.builder
                    .sleep_for_writer_work(self.queue.len(), self.ctx.poll_interval_us);
            }
            if self.ctx.hard_shutdown() {
                break;
            }

            // stream every message in the published range
            while old + BUILDER_MSG_HEADER_SIZE < new_len && !self.ctx.hard_shutdown() {
                let header = chunk.header_at(old);
                if header.length == 0 {
                    break;
                }

                self.poll_queue()?;
                while self.queue.is_full() && !self.ctx.hard_shutdown() {
                    self.ctx.log_trace(
                        TRACE_WRITER,
                        format!(
                            "output queue is full ({} messages), sleeping {}us",
                            self.queue.len(),
                            self.ctx.poll_interval_us
                        ),
                    );
                    std::thread::sleep(Duration::from_micros(self.ctx.poll_interval_us));
                    self.poll_queue()?;
                }
                self.write_checkpoint(false)?;
                if self.ctx.hard_shutdown() {
                    break;
                }

                let length8 = align8(header.length as usize);
                old += BUILDER_MSG_HEADER_SIZE;

                if old + length8 <= self.builder.chunk_size() {
                    // message is contiguous in this chunk
                    let data = chunk.data_at(old, header.length as usize);
                    self.dispatch(&header, chunk.id(), data, false)?;
                    old += length8;
                } else {
                    // message spans chunks, merge into one owned buffer
                    let queue_id = chunk.id();
                    let mut payload = Vec::with_capacity(header.length as usize);
                    let mut copied = 0usize;
                    let mut avail = new_len;
                    while copied < header.length as usize {
                        let remaining = header.length as usize - copied;
                        let in_chunk = avail - old;
                        if remaining > in_chunk {
                            payload.extend(chunk.data_at(old, in_chunk));
                            copied += in_chunk;
                            chunk = self.builder.chunk_after(chunk.id()).ok_or_else(|| {
                                RedomineError::runtime(
                                    10016,
                                    format!("builder ring truncated inside message {}", header.id),
                                )
                            })?;
                            avail = chunk.length() as usize;
                            old = 0;
                        } else {
                            payload.extend(chunk.data_at(old, remaining));
                            copied += remaining;
                            old += align8(remaining).min(avail - old);
                        }
                    }
                    self.dispatch(&header, queue_id, payload, true)?;
                    self.poll_queue()?;
                    self.write_checkpoint(false)?;
                    break;
                }
            }

            // all work done?
            if self.ctx.soft_shutdown() && self.ctx.replicator_finished() {
                if chunk.length() as usize != old
                    || self.builder.chunk_after(chunk.id()).is_some()
                {
                    continue;
                }
                break;
            }
        }

        self.write_checkpoint(true)?;
        Ok(())
    }

    fn dispatch(
        &mut self,
        header: &MsgHeader,
        queue_id: u64,
        payload: Vec<u8>,
        allocated: bool,
    ) -> Result<()> {
        self.stream.send(header.id, &payload)?;
        self.queue.create_message(QueuedMessage {
            id: header.id,
            queue_id,
            scn: header.scn,
            length: header.length,
            confirmed: false,
            payload: allocated.then_some(payload),
        });
        self.streaming = true;
        Ok(())
    }

    fn poll_queue(&mut self) -> Result<()> {
        for msg_id in self.stream.poll_confirmations()? {
            let max_id = self.queue.confirm_message(&self.ctx, Some(msg_id));
            self.builder.release_buffers(max_id);
        }
        Ok(())
    }

    /// Persists the confirmed SCN under `<database>-chkpt`. A no-op while
    /// nothing new is confirmed, or inside the checkpoint interval unless
    /// forced.
    pub fn write_checkpoint(&mut self, force: bool) -> Result<()> {
        // nothing changed
        if self.checkpoint_scn == self.queue.confirmed_scn
            || self.queue.confirmed_scn == ZERO_SCN
        {
            return Ok(());
        }

        // not yet
        let elapsed = self.checkpoint_time.elapsed().as_secs();
        if elapsed < self.ctx.checkpoint_interval_s && !force {
            return Ok(());
        }

        if self.checkpoint_scn == ZERO_SCN {
            self.ctx.log_trace(
                TRACE_CHECKPOINT,
                format!("writer confirmed scn: {}", self.queue.confirmed_scn),
            );
        } else {
            self.ctx.log_trace(
                TRACE_CHECKPOINT,
                format!(
                    "writer confirmed scn: {} checkpoint scn: {}",
                    self.queue.confirmed_scn, self.checkpoint_scn
                ),
            );
        }

        let checkpoint = WriterCheckpoint {
            database: self.database.clone(),
            scn: self.queue.confirmed_scn,
            resetlogs: self.metadata.resetlogs(),
            activation: self.metadata.activation(),
        };
        let content = serde_json::to_string(&checkpoint)
            .map_err(|err| RedomineError::Encode(err.to_string()))?;
        let name = format!("{}-chkpt", self.database);
        if self.metadata.state_write(&name, &content) {
            self.checkpoint_scn = self.queue.confirmed_scn;
            self.checkpoint_time = Instant::now();
        }
        Ok(())
    }

    /// Positions the session from the stored checkpoint: missing file
    /// boots from the configured start, a valid file resumes replication
    /// at the stored SCN, anything else is a data error.
    pub fn read_checkpoint(&mut self) -> Result<()> {
        let name = format!("{}-chkpt", self.database);
        let Some(content) = self.metadata.state_read(&name, CHECKPOINT_FILE_MAX_SIZE)? else {
            self.metadata.set_status_boot();
            return Ok(());
        };

        let checkpoint: WriterCheckpoint = serde_json::from_str(&content).map_err(|err| {
            RedomineError::data(20001, format!("file: {name} - parse error: {err}"))
        })?;
        if checkpoint.database != self.database {
            return Err(RedomineError::data(
                20001,
                format!(
                    "file: {name} - invalid database name: {}",
                    checkpoint.database
                ),
            ));
        }

        self.metadata.set_resetlogs(checkpoint.resetlogs);
        self.metadata.set_activation(checkpoint.activation);
        self.metadata.set_start_scn(checkpoint.scn);
        self.ctx
            .info(0, format!("checkpoint - reading scn: {}", checkpoint.scn));
        self.metadata.set_status_replicate();
        Ok(())
    }
}
