//! Dictionary shadow scenarios: row identity, secondary indices, the
//! single-flag merge, and teardown hygiene.

use redomine::config::EngineConfig;
use redomine::ctx::Ctx;
use redomine::schema::row::SysObj;
use redomine::schema::Schema;
use redomine::types::RowId;
use std::collections::HashSet;

fn ctx() -> Ctx {
    Ctx::new(&EngineConfig::default())
}

#[test]
fn obj_add_find_drop_round_trip() {
    let ctx = ctx();
    let mut schema = Schema::new();

    assert!(schema
        .add_sys_obj(&ctx, "AAAA", 5, 100, 101, SysObj::TYPE_TABLE, "T1", 0, 0, true)
        .expect("add"));

    let row = schema.find_sys_obj(&RowId::new("AAAA")).expect("found");
    assert_eq!(row.owner, 5);
    assert_eq!(row.obj, 100);
    assert_eq!(row.data_obj, 101);
    assert_eq!(row.name, "T1");
    assert!(row.single);
    assert_eq!(
        schema.sys_obj_by_obj(100).map(|by_obj| by_obj.row_id.clone()),
        Some(RowId::new("AAAA"))
    );

    schema.drop_sys_obj(&ctx, &RowId::new("AAAA")).expect("drop");
    assert!(schema.find_sys_obj(&RowId::new("AAAA")).is_none());
    assert!(schema.sys_obj_by_obj(100).is_none());

    schema.purge(&ctx).expect("purge");
    assert_eq!(ctx.diagnostic_count(50029), 0);
}

#[test]
fn duplicate_ccol_insert_is_fatal() {
    let ctx = ctx();
    let mut schema = Schema::new();

    schema
        .add_sys_ccol(&ctx, "CCCC", 11, 1, 500, 0, 0)
        .expect("first add");
    let err = schema
        .add_sys_ccol(&ctx, "CCCC", 12, 2, 500, 0, 0)
        .expect_err("duplicate rowid");
    assert_eq!(err.code(), 50023);

    // a different rowid with the same unique key is a different violation
    let err = schema
        .add_sys_ccol(&ctx, "CCCD", 11, 1, 500, 0, 0)
        .expect_err("duplicate key");
    assert_eq!(err.code(), 50024);
}

#[test]
fn user_single_flag_clears_once_and_sticks() {
    let ctx = ctx();
    let mut schema = Schema::new();

    assert!(schema
        .add_sys_user(&ctx, "U1", 7, "A", 0, 0, true)
        .expect("seed add"));
    assert!(schema
        .add_sys_user(&ctx, "U1", 7, "A", 0, 0, false)
        .expect("full add clears the flag"));
    assert!(!schema.find_sys_user(&RowId::new("U1")).expect("present").single);

    // the row is now a plain duplicate
    assert!(!schema
        .add_sys_user(&ctx, "U1", 7, "A", 0, 0, false)
        .expect("duplicate is a no-op"));
    assert!(!schema.find_sys_user(&RowId::new("U1")).expect("present").single);
}

#[test]
fn add_then_drop_restores_every_index() {
    let ctx = ctx();
    let mut schema = Schema::new();

    schema
        .add_sys_lob(&ctx, "L1", 500, 2, 2, 900, 4)
        .expect("add lob");
    schema.drop_sys_lob(&ctx, &RowId::new("L1")).expect("drop");

    // both unique indices released: the same keys insert cleanly again
    schema
        .add_sys_lob(&ctx, "L2", 500, 2, 2, 900, 4)
        .expect("re-add with same keys");

    schema.purge(&ctx).expect("purge");
    assert_eq!(ctx.diagnostic_count(50029), 0);
}

#[test]
fn dropping_a_missing_row_is_idempotent() {
    let ctx = ctx();
    let mut schema = Schema::new();
    schema
        .drop_sys_tab(&ctx, &RowId::new("NOPE"))
        .expect("absent drop is a no-op");
    schema
        .drop_sys_user(&ctx, &RowId::new("NOPE"))
        .expect("absent drop is a no-op");
}

#[test]
fn name_length_limits_are_enforced() {
    let ctx = ctx();
    let mut schema = Schema::new();
    let long_name = "X".repeat(31);

    let err = schema
        .add_sys_obj(&ctx, "AAAA", 5, 100, 101, SysObj::TYPE_TABLE, &long_name, 0, 0, false)
        .expect_err("name too long");
    assert_eq!(err.code(), 50025);

    let err = schema
        .add_sys_col(
            &ctx, "CCCC", 100, 1, 1, 1, &long_name, 1, 10, -1, -1, 0, 873, false, 0, 0,
        )
        .expect_err("name too long");
    assert_eq!(err.code(), 50025);

    let err = schema
        .add_sys_col(
            &ctx, "CCCC", 100, 1, 1001, 1, "OK", 1, 10, -1, -1, 0, 873, false, 0, 0,
        )
        .expect_err("segcol out of range");
    assert_eq!(err.code(), 50025);
}

#[test]
fn schema_compare_detects_divergence_both_ways() {
    let ctx = ctx();
    let mut mined = Schema::new();
    let mut reloaded = Schema::new();

    for schema in [&mut mined, &mut reloaded] {
        schema
            .add_sys_user(&ctx, "U1", 7, "HR", 0, 0, false)
            .expect("user");
        schema
            .add_sys_obj(&ctx, "O1", 7, 500, 501, SysObj::TYPE_TABLE, "EMP", 0, 0, false)
            .expect("obj");
    }

    let mut msgs = String::new();
    assert!(mined.compare(&reloaded, &mut msgs));
    assert!(reloaded.compare(&mined, &mut msgs));

    reloaded
        .add_sys_tab(&ctx, "T1", 500, 501, 4, 0, 0, 0, 0, 0)
        .expect("tab");
    assert!(!mined.compare(&reloaded, &mut msgs));
    assert!(msgs.contains("SYS.TAB$ lost ROWID: T1"), "{msgs}");
    assert!(!reloaded.compare(&mined, &mut msgs));
}

#[test]
fn drop_unused_metadata_keeps_listed_users_and_live_objects() {
    let ctx = ctx();
    let mut schema = Schema::new();

    schema
        .add_sys_user(&ctx, "U1", 7, "HR", 0, 0, false)
        .expect("kept user");
    schema
        .add_sys_user(&ctx, "U2", 8, "SCRATCH", 0, 0, false)
        .expect("dropped user");
    schema
        .add_sys_obj(&ctx, "O1", 7, 500, 501, SysObj::TYPE_TABLE, "EMP", 0, 0, false)
        .expect("obj");
    schema
        .add_sys_tab(&ctx, "T1", 500, 501, 4, 0, 0, 0, 0, 0)
        .expect("kept tab");
    schema
        .add_sys_tab(&ctx, "T2", 600, 601, 4, 0, 0, 0, 0, 0)
        .expect("orphan tab");

    let users = HashSet::from(["HR".to_string()]);
    let mut msgs = Vec::new();
    schema
        .drop_unused_metadata(&ctx, &users, &mut msgs)
        .expect("reconcile");

    assert!(schema.find_sys_user(&RowId::new("U1")).is_some());
    assert!(schema.find_sys_user(&RowId::new("U2")).is_none());
    assert!(schema.find_sys_tab(&RowId::new("T1")).is_some());
    assert!(schema.find_sys_tab(&RowId::new("T2")).is_none());

    schema.reset_touched();
    schema.purge(&ctx).expect("purge");
    assert_eq!(ctx.diagnostic_count(50029), 0);
}
