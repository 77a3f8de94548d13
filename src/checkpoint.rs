use crate::ctx::{Ctx, TRACE_THREADS};
use crate::error::Result;
use crate::metadata::Metadata;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const CHECKPOINT_WAIT: Duration = Duration::from_millis(100);

/// The checkpoint worker: a cooperative loop persisting the catalog and
/// pruning stale snapshots until shutdown. `wake_up` forces an immediate
/// iteration; otherwise the loop ticks every 100 ms.
pub struct CheckpointRunner {
    ctx: Arc<Ctx>,
    metadata: Arc<Metadata>,
    mtx: Mutex<()>,
    cond: Condvar,
}

impl CheckpointRunner {
    pub fn new(ctx: Arc<Ctx>, metadata: Arc<Metadata>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            metadata,
            mtx: Mutex::new(()),
            cond: Condvar::new(),
        })
    }

    pub fn wake_up(&self) {
        let _guard = self.mtx.lock();
        self.cond.notify_all();
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        std::thread::spawn(move || runner.run())
    }

    pub fn run(&self) {
        self.ctx.log_trace(TRACE_THREADS, "checkpoint thread start");

        if let Err(err) = self.run_loop() {
            self.ctx.error(err.code(), err.message());
            self.ctx.stop_hard();
        }

        self.ctx.log_trace(TRACE_THREADS, "checkpoint thread stop");
    }

    fn run_loop(&self) -> Result<()> {
        while !self.ctx.hard_shutdown() {
            self.metadata.write_checkpoint(false)?;
            self.metadata.delete_old_checkpoints()?;

            if self.ctx.hard_shutdown() {
                break;
            }
            if self.ctx.soft_shutdown() && self.ctx.replicator_finished() {
                break;
            }

            let mut guard = self.mtx.lock();
            let _ = self.cond.wait_for(&mut guard, CHECKPOINT_WAIT);
        }

        if self.ctx.soft_shutdown() {
            self.metadata.write_checkpoint(true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::metadata::state::MemoryStateStore;

    fn setup() -> (Arc<Ctx>, Arc<Metadata>) {
        let ctx = Arc::new(Ctx::new(&EngineConfig::default()));
        let metadata = Arc::new(Metadata::new(
            Arc::clone(&ctx),
            "DB1",
            Box::new(MemoryStateStore::new()),
        ));
        (ctx, metadata)
    }

    #[test]
    fn stops_on_hard_shutdown() {
        let (ctx, metadata) = setup();
        let runner = CheckpointRunner::new(Arc::clone(&ctx), metadata);
        let handle = runner.spawn();

        ctx.stop_hard();
        runner.wake_up();
        handle.join().expect("thread exits");
    }

    #[test]
    fn soft_shutdown_flushes_a_final_checkpoint() {
        let (ctx, metadata) = setup();
        metadata.schema.write().scn = 4242;
        let runner = CheckpointRunner::new(Arc::clone(&ctx), Arc::clone(&metadata));
        let handle = runner.spawn();

        ctx.stop_soft();
        ctx.set_replicator_finished();
        runner.wake_up();
        handle.join().expect("thread exits");

        assert_eq!(metadata.checkpoint_scns(), vec![4242]);
    }
}
