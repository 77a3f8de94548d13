use criterion::{black_box, criterion_group, criterion_main, Criterion};
use redomine::config::EngineConfig;
use redomine::ctx::Ctx;
use redomine::schema::row::SysObj;
use redomine::schema::Schema;
use redomine::types::RowId;
use redomine::writer::queue::{DeliveryQueue, QueuedMessage};

const DICT_ROWS: u32 = 10_000;
const QUEUE_DEPTH: u64 = 4_096;

fn row_id(index: u32) -> String {
    format!("AAA{index:015}")
}

fn bench_dictionary(c: &mut Criterion) {
    let ctx = Ctx::new(&EngineConfig::default());

    c.bench_function("dict_insert_drop_obj", |b| {
        b.iter(|| {
            let mut schema = Schema::new();
            for index in 0..DICT_ROWS {
                schema
                    .add_sys_obj(
                        &ctx,
                        &row_id(index),
                        7,
                        index + 1,
                        index + 1,
                        SysObj::TYPE_TABLE,
                        &format!("T{index}"),
                        0,
                        0,
                        false,
                    )
                    .expect("add");
            }
            for index in 0..DICT_ROWS {
                schema
                    .drop_sys_obj(&ctx, &RowId::new(&row_id(index)))
                    .expect("drop");
            }
            black_box(&schema);
        })
    });

    c.bench_function("dict_seg_range_scan", |b| {
        let mut schema = Schema::new();
        for index in 0..DICT_ROWS {
            schema
                .add_sys_col(
                    &ctx,
                    &row_id(index),
                    index / 100,
                    (index % 100 + 1) as i16,
                    (index % 100 + 1) as i16,
                    (index % 100 + 1) as i16,
                    "C",
                    1,
                    22,
                    -1,
                    -1,
                    0,
                    873,
                    false,
                    0,
                    0,
                )
                .expect("add");
        }
        b.iter(|| {
            let mut total = 0usize;
            for obj in 0..DICT_ROWS / 100 {
                total += schema
                    .sys_col
                    .scan_above(&(obj, 0))
                    .take_while(|col| col.obj == obj)
                    .count();
            }
            black_box(total)
        })
    });
}

fn bench_delivery_queue(c: &mut Criterion) {
    let ctx = Ctx::new(&EngineConfig::default());

    c.bench_function("queue_confirm_in_order", |b| {
        b.iter(|| {
            let mut queue = DeliveryQueue::new(QUEUE_DEPTH as usize);
            for id in 1..=QUEUE_DEPTH {
                queue.create_message(QueuedMessage {
                    id,
                    queue_id: id,
                    scn: id * 10,
                    length: 64,
                    confirmed: false,
                    payload: None,
                });
            }
            for id in 1..=QUEUE_DEPTH {
                queue.confirm_message(&ctx, Some(id));
            }
            black_box(queue.confirmed_scn)
        })
    });

    c.bench_function("queue_confirm_reverse_order", |b| {
        b.iter(|| {
            let mut queue = DeliveryQueue::new(QUEUE_DEPTH as usize);
            for id in 1..=QUEUE_DEPTH {
                queue.create_message(QueuedMessage {
                    id,
                    queue_id: id,
                    scn: id * 10,
                    length: 64,
                    confirmed: false,
                    payload: None,
                });
            }
            for id in (1..=QUEUE_DEPTH).rev() {
                queue.confirm_message(&ctx, Some(id));
            }
            black_box(queue.confirmed_scn)
        })
    });
}

criterion_group!(benches, bench_dictionary, bench_delivery_queue);
criterion_main!(benches);
