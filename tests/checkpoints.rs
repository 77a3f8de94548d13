//! Catalog checkpointing: the background worker, retention GC, and the
//! schema-equality validation of reloaded state.

use redomine::checkpoint::CheckpointRunner;
use redomine::config::EngineConfig;
use redomine::ctx::Ctx;
use redomine::metadata::state::FileStateStore;
use redomine::metadata::Metadata;
use redomine::schema::row::SysObj;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn engine(dir: &std::path::Path, checkpoints_keep: usize) -> (Arc<Ctx>, Arc<Metadata>) {
    let ctx = Arc::new(Ctx::new(&EngineConfig {
        checkpoints_keep,
        ..EngineConfig::default()
    }));
    let state = FileStateStore::new(dir).expect("state store");
    let metadata = Arc::new(Metadata::new(Arc::clone(&ctx), "DB1", Box::new(state)));
    (ctx, metadata)
}

fn seed_schema(ctx: &Ctx, metadata: &Metadata, scn: u64) {
    let mut schema = metadata.schema.write();
    schema.scn = scn;
    schema
        .add_sys_user(ctx, "U1", 7, "HR", 0, 0, false)
        .expect("user");
    schema
        .add_sys_obj(ctx, "O1", 7, 500, 501, SysObj::TYPE_TABLE, "EMP", 0, 0, false)
        .expect("obj");
    schema
        .add_sys_tab(ctx, "T1", 500, 501, 4, 0, 0, 0, 0, 0)
        .expect("tab");
}

fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn worker_persists_the_catalog_and_exits_cleanly() {
    let dir = tempdir().expect("tempdir");
    let (ctx, metadata) = engine(dir.path(), 10);
    seed_schema(&ctx, &metadata, 1000);

    let runner = CheckpointRunner::new(Arc::clone(&ctx), Arc::clone(&metadata));
    let handle = runner.spawn();

    runner.wake_up();
    wait_for("first checkpoint", || {
        metadata.checkpoint_scns().contains(&1000)
    });

    // catalog advances, the worker picks the new SCN up on its own tick
    metadata.schema.write().scn = 1001;
    wait_for("second checkpoint", || {
        metadata.checkpoint_scns().contains(&1001)
    });

    ctx.stop_soft();
    ctx.set_replicator_finished();
    runner.wake_up();
    handle.join().expect("worker exits");

    assert_eq!(metadata.checkpoint_scns(), vec![1000, 1001]);
}

#[test]
fn retention_deletes_stale_snapshots() {
    let dir = tempdir().expect("tempdir");
    let (ctx, metadata) = engine(dir.path(), 2);
    seed_schema(&ctx, &metadata, 1000);

    for scn in 1000..1006 {
        metadata.schema.write().scn = scn;
        metadata.write_checkpoint(false).expect("write");
    }
    metadata.delete_old_checkpoints().expect("gc");

    assert_eq!(metadata.checkpoint_scns(), vec![1004, 1005]);
    assert!(metadata.load_checkpoint(1000).expect("load").is_none());
    assert!(metadata.load_checkpoint(1001).expect("load").is_none());
    assert!(metadata.load_checkpoint(1005).expect("load").is_some());
}

#[test]
fn reloaded_catalog_passes_schema_equality() {
    let dir = tempdir().expect("tempdir");
    let (ctx, metadata) = engine(dir.path(), 10);
    seed_schema(&ctx, &metadata, 1000);
    metadata.set_resetlogs(28);
    metadata.set_activation(1042);
    metadata.write_checkpoint(false).expect("write");

    // a second engine instance over the same state directory
    let (_ctx2, resumed) = engine(dir.path(), 10);
    let reloaded = resumed
        .load_checkpoint(1000)
        .expect("load")
        .expect("checkpoint present");

    let mut msgs = String::new();
    assert!(
        metadata.schema.read().compare(&reloaded, &mut msgs),
        "schema mismatch after reload: {msgs}"
    );
    assert!(reloaded.loaded);
    // identity facts travel with the snapshot
    assert_eq!(resumed.resetlogs(), 28);
    assert_eq!(resumed.activation(), 1042);
}

#[test]
fn reload_divergence_names_the_first_difference() {
    let dir = tempdir().expect("tempdir");
    let (ctx, metadata) = engine(dir.path(), 10);
    seed_schema(&ctx, &metadata, 1000);
    metadata.write_checkpoint(false).expect("write");

    let reloaded = metadata
        .load_checkpoint(1000)
        .expect("load")
        .expect("present");

    // live catalog moves on: one more row mined after the snapshot
    metadata
        .schema
        .write()
        .add_sys_col(
            &ctx, "C1", 500, 1, 1, 1, "ID", 1, 22, -1, -1, 0, 873, false, 0, 0,
        )
        .expect("col");

    let mut msgs = String::new();
    assert!(!metadata.schema.read().compare(&reloaded, &mut msgs));
    assert!(msgs.contains("SYS.COL$ lost ROWID: C1"), "{msgs}");
}
