//! End-to-end delivery: builder ring → writer → transport confirmations →
//! checkpoint persistence, including reconnect after a network error.

use parking_lot::Mutex;
use redomine::builder::Builder;
use redomine::config::EngineConfig;
use redomine::ctx::Ctx;
use redomine::error::{RedomineError, Result};
use redomine::metadata::state::MemoryStateStore;
use redomine::metadata::{Metadata, CHECKPOINT_FILE_MAX_SIZE};
use redomine::writer::{OutputStream, Writer};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct StreamLog {
    sent: Vec<(u64, Vec<u8>)>,
    pending: Vec<u64>,
    reconnects: usize,
    fail_sends: usize,
}

/// In-memory client: records sends and confirms them at the next poll.
#[derive(Clone, Default)]
struct LoopbackStream {
    log: Arc<Mutex<StreamLog>>,
}

impl LoopbackStream {
    fn failing_first(fail_sends: usize) -> Self {
        let stream = Self::default();
        stream.log.lock().fail_sends = fail_sends;
        stream
    }

    fn sent(&self) -> Vec<(u64, Vec<u8>)> {
        self.log.lock().sent.clone()
    }

    fn reconnects(&self) -> usize {
        self.log.lock().reconnects
    }
}

impl OutputStream for LoopbackStream {
    fn name(&self) -> String {
        "loopback:memory".into()
    }

    fn reconnect(&mut self) -> Result<()> {
        self.log.lock().reconnects += 1;
        Ok(())
    }

    fn send(&mut self, msg_id: u64, data: &[u8]) -> Result<()> {
        let mut log = self.log.lock();
        if log.fail_sends > 0 {
            log.fail_sends -= 1;
            return Err(RedomineError::network(10061, "connection reset by peer"));
        }
        log.sent.push((msg_id, data.to_vec()));
        log.pending.push(msg_id);
        Ok(())
    }

    fn poll_confirmations(&mut self) -> Result<Vec<u64>> {
        Ok(std::mem::take(&mut self.log.lock().pending))
    }
}

fn engine(chunk_bytes: usize) -> (Arc<Ctx>, Arc<Builder>, Arc<Metadata>) {
    let ctx = Arc::new(Ctx::new(&EngineConfig {
        buffer_chunk_bytes: chunk_bytes,
        poll_interval_us: 1_000,
        checkpoint_interval_s: 0,
        ..EngineConfig::default()
    }));
    let builder = Builder::new(&ctx);
    let metadata = Arc::new(Metadata::new(
        Arc::clone(&ctx),
        "DB1",
        Box::new(MemoryStateStore::new()),
    ));
    (ctx, builder, metadata)
}

#[test]
fn streams_messages_in_order_and_checkpoints_progress() {
    let (ctx, builder, metadata) = engine(4096);
    for (scn, payload) in [(100u64, "alpha"), (200, "beta"), (300, "gamma")] {
        builder.append(scn, payload.as_bytes()).expect("append");
    }

    let stream = LoopbackStream::default();
    let mut writer = Writer::new(
        Arc::clone(&ctx),
        "DB1",
        Arc::clone(&builder),
        Arc::clone(&metadata),
        stream.clone(),
    );

    let handle = std::thread::spawn(move || {
        writer.run();
        writer
    });
    // let the writer drain and confirm, then wind down
    std::thread::sleep(Duration::from_millis(150));
    ctx.stop_soft();
    ctx.set_replicator_finished();
    builder.wake_up();
    let writer = handle.join().expect("writer thread");

    let sent = stream.sent();
    assert_eq!(
        sent.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(sent[0].1, b"alpha");
    assert_eq!(sent[2].1, b"gamma");
    assert_eq!(writer.confirmed_scn(), 300);

    let checkpoint = metadata
        .state_read("DB1-chkpt", CHECKPOINT_FILE_MAX_SIZE)
        .expect("read")
        .expect("checkpoint written");
    assert!(checkpoint.contains("\"scn\":300"), "{checkpoint}");
}

#[test]
fn merges_chunk_spanning_messages() {
    let (ctx, builder, metadata) = engine(64);
    let big: Vec<u8> = (0..200).map(|byte| byte as u8).collect();
    builder.append(100, b"small").expect("append");
    builder.append(200, &big).expect("append");
    builder.append(300, b"tail").expect("append");

    let stream = LoopbackStream::default();
    let mut writer = Writer::new(
        Arc::clone(&ctx),
        "DB1",
        Arc::clone(&builder),
        Arc::clone(&metadata),
        stream.clone(),
    );

    let handle = std::thread::spawn(move || {
        writer.run();
        writer
    });
    std::thread::sleep(Duration::from_millis(150));
    ctx.stop_soft();
    ctx.set_replicator_finished();
    builder.wake_up();
    let writer = handle.join().expect("writer thread");

    let sent = stream.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[1].1, big);
    assert_eq!(sent[2].1, b"tail");
    assert_eq!(writer.confirmed_scn(), 300);
    // confirmed chunks were released back to the ring
    assert!(builder.chunk_count() <= 2);
}

#[test]
fn reconnects_after_a_network_error_and_redelivers() {
    let (ctx, builder, metadata) = engine(4096);
    builder.append(100, b"alpha").expect("append");
    builder.append(200, b"beta").expect("append");

    let stream = LoopbackStream::failing_first(1);
    let mut writer = Writer::new(
        Arc::clone(&ctx),
        "DB1",
        Arc::clone(&builder),
        Arc::clone(&metadata),
        stream.clone(),
    );

    let handle = std::thread::spawn(move || {
        writer.run();
        writer
    });
    std::thread::sleep(Duration::from_millis(200));
    ctx.stop_soft();
    ctx.set_replicator_finished();
    builder.wake_up();
    let writer = handle.join().expect("writer thread");

    assert_eq!(stream.reconnects(), 1);
    let ids: Vec<u64> = stream.sent().iter().map(|(id, _)| *id).collect();
    // at-least-once: both messages arrive after the session restart
    assert!(ids.contains(&1) && ids.contains(&2), "sent: {ids:?}");
    assert_eq!(writer.confirmed_scn(), 200);
    assert!(!ctx.hard_shutdown());
}

#[test]
fn data_errors_stop_the_process() {
    struct PoisonStream;
    impl OutputStream for PoisonStream {
        fn name(&self) -> String {
            "poison".into()
        }
        fn reconnect(&mut self) -> Result<()> {
            Ok(())
        }
        fn send(&mut self, _msg_id: u64, _data: &[u8]) -> Result<()> {
            Err(RedomineError::data(20001, "client rejected the stream"))
        }
        fn poll_confirmations(&mut self) -> Result<Vec<u64>> {
            Ok(Vec::new())
        }
    }

    let (ctx, builder, metadata) = engine(4096);
    builder.append(100, b"alpha").expect("append");

    let mut writer = Writer::new(
        Arc::clone(&ctx),
        "DB1",
        Arc::clone(&builder),
        Arc::clone(&metadata),
        PoisonStream,
    );
    writer.run();

    assert!(ctx.hard_shutdown());
    assert_eq!(ctx.diagnostic_count(20001), 1);
}
