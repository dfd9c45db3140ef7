mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use meter_core::{sample_step, sampled_count};
use meter_db::Db;
use support::{SYNCED_AT, filter, insert_entries, sequential_entries, setup_db};

const START: &str = "2025-03-01T00:00:00.000Z";
const END: &str = "2025-03-02T00:00:00.000Z";

#[test]
fn downsampling_is_deterministic() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_entries(db, sequential_entries("2025-03-01T00:00:00Z", 10_000, "gpt-4o"));
    let window = filter(START, END);

    let first = db.sample_entries(&window, Some(2_000)).expect("sample");
    assert_eq!(first.total, 10_000);
    assert_eq!(first.step, 5);
    assert_eq!(first.max_points, 2_000);
    assert_eq!(first.returned, 2_000);
    assert_eq!(first.points.len(), 2_000);
    // Rank 5 is the fifth-oldest row, four seconds after the start.
    assert_eq!(first.points[0].ts, "2025-03-01T00:00:04.000Z");
    assert!(first.points.windows(2).all(|pair| pair[0].ts < pair[1].ts));

    let second = db.sample_entries(&window, Some(2_000)).expect("sample again");
    assert_eq!(first, second);
}

#[test]
fn small_windows_return_every_row() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_entries(db, sequential_entries("2025-03-01T00:00:00Z", 500, "gpt-4o"));

    // Requests below the floor are clamped up to 1000 points.
    let result = db.sample_entries(&filter(START, END), Some(10)).expect("sample");
    assert_eq!(result.max_points, 1_000);
    assert_eq!(result.step, 1);
    assert_eq!(result.returned, 500);
}

#[test]
fn sampling_respects_filters() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_entries(db, sequential_entries("2025-03-01T00:00:00Z", 1_500, "gpt-4o"));
    insert_entries(db, sequential_entries("2025-03-01T06:00:00Z", 1_500, "o3"));

    let window = filter(START, END).with_model("o3");
    let result = db.sample_entries(&window, Some(1_000)).expect("sample");
    assert_eq!(result.total, 1_500);
    assert_eq!(result.step, 2);
    assert_eq!(result.returned, 750);
    assert!(result.points.iter().all(|point| point.model == "o3"));

    let quiet = filter("2024-01-01T00:00:00.000Z", "2024-01-02T00:00:00.000Z");
    let empty = db.sample_entries(&quiet, None).expect("empty");
    assert_eq!(empty.total, 0);
    assert_eq!(empty.step, 1);
    assert!(empty.points.is_empty());
}

#[test]
fn sample_stays_consistent_while_another_connection_writes() {
    let mut test_db = setup_db();
    insert_entries(&mut test_db.db, sequential_entries("2025-03-01T00:00:00Z", 1_500, "gpt-4o"));
    let mut writer = Db::open(&test_db.path).expect("open writer");
    let reader = &test_db.db;
    let window = filter(START, END);
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            for hour in 1..=8 {
                let start = format!("2025-03-01T{hour:02}:00:00Z");
                let batch = sequential_entries(&start, 2_500, "gpt-4o");
                writer
                    .insert_usage_entries(&batch, SYNCED_AT)
                    .expect("concurrent insert");
            }
            done.store(true, Ordering::SeqCst);
        });

        let mut rounds = 0;
        while rounds < 5 || !done.load(Ordering::SeqCst) {
            let result = reader.sample_entries(&window, Some(1_000)).expect("sample");
            assert_eq!(result.step, sample_step(result.total, result.max_points));
            assert_eq!(result.returned, sampled_count(result.total, result.step));
            assert!(result.returned <= u64::from(result.max_points));
            rounds += 1;
        }
    });

    let settled = reader.sample_entries(&window, Some(1_000)).expect("final sample");
    assert_eq!(settled.total, 21_500);
    assert_eq!(settled.step, 22);
    assert_eq!(settled.returned, 977);
}
