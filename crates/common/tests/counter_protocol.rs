//! Integration tests for the counter file read/write protocol
//!
//! Tests cover the read/write laws of a single counter file as seen through
//! independently opened handles on a mounted instance.

mod common;

use ::common::counter_file::CounterFileError;
use ::common::tree::{COUNTER_FILE, SUB_COUNTER_FILE, SUB_DIR};
use ::common::STAGING_CAPACITY;

const COUNTER_PATH: &str = "/mycounter";

fn value(sb: &::common::Superblock, path: &str) -> i64 {
    let id = sb.resolve(path).unwrap().counter().unwrap();
    sb.counters().get(id).unwrap()
}

#[test]
fn test_independent_handles_advance_counter() {
    let (_controller, sb) = common::setup_test_mount("");
    assert_eq!(value(&sb, COUNTER_PATH), 0);

    let mut first = sb.open(COUNTER_PATH).unwrap();
    let mut buf = Vec::new();
    assert_eq!(first.read(&mut buf, 10).unwrap(), 2);
    assert_eq!(buf, b"0\n");
    assert_eq!(value(&sb, COUNTER_PATH), 1);

    let mut second = sb.open(COUNTER_PATH).unwrap();
    let mut buf = Vec::new();
    assert_eq!(second.read(&mut buf, 10).unwrap(), 2);
    assert_eq!(buf, b"1\n");
    assert_eq!(value(&sb, COUNTER_PATH), 2);
}

#[test]
fn test_write_then_read() {
    let (_controller, sb) = common::setup_test_mount("");

    for n in [0i64, 7, -3, 123_456_789, i64::MAX, i64::MIN] {
        let text = n.to_string();
        let mut writer = sb.open(COUNTER_PATH).unwrap();
        assert_eq!(writer.write(text.as_bytes()).unwrap(), text.len());

        let mut reader = sb.open(COUNTER_PATH).unwrap();
        assert_eq!(common::read_all(&mut reader, 64), format!("{}\n", n).into_bytes());
        assert_eq!(value(&sb, COUNTER_PATH), n.wrapping_add(1));
    }
}

#[test]
fn test_split_reads_report_one_value() {
    let (_controller, sb) = common::setup_test_mount("");
    sb.open(COUNTER_PATH)
        .unwrap()
        .write(&b"-987654321"[..])
        .unwrap();

    for chunk in 1..=11 {
        let before = value(&sb, COUNTER_PATH);
        let mut handle = sb.open(COUNTER_PATH).unwrap();

        let text = common::read_all(&mut handle, chunk);
        assert_eq!(text, format!("{}\n", before).into_bytes());
        assert_eq!(value(&sb, COUNTER_PATH), before + 1);
    }
}

#[test]
fn test_eof_does_not_mutate() {
    let (_controller, sb) = common::setup_test_mount("");
    let mut handle = sb.open(COUNTER_PATH).unwrap();
    common::read_all(&mut handle, 64);
    let after = value(&sb, COUNTER_PATH);

    let mut buf = Vec::new();
    for _ in 0..3 {
        assert_eq!(handle.read(&mut buf, 64).unwrap(), 0);
    }
    handle.seek(1_000);
    assert_eq!(handle.read(&mut buf, 64).unwrap(), 0);

    assert!(buf.is_empty());
    assert_eq!(value(&sb, COUNTER_PATH), after);
}

#[test]
fn test_rejected_writes_leave_store_unchanged() {
    let (_controller, sb) = common::setup_test_mount("");
    sb.open(COUNTER_PATH).unwrap().write(&b"5"[..]).unwrap();

    let mut handle = sb.open(COUNTER_PATH).unwrap();
    handle.seek(3);
    assert!(matches!(
        handle.write(&b"9"[..]),
        Err(CounterFileError::InvalidArgument(_))
    ));

    let mut handle = sb.open(COUNTER_PATH).unwrap();
    let oversized = vec![b'9'; STAGING_CAPACITY];
    assert!(matches!(
        handle.write(&oversized[..]),
        Err(CounterFileError::InvalidArgument(_))
    ));

    assert_eq!(value(&sb, COUNTER_PATH), 5);
}

#[test]
fn test_parsing_rules() {
    let (_controller, sb) = common::setup_test_mount("");
    let cases: [(&[u8], i64); 5] = [
        (b"7abc", 7),
        (b"xyz", 0),
        (b"-3", -3),
        (b"42\n", 42),
        (b"", 0),
    ];

    for (input, expected) in cases {
        sb.open(COUNTER_PATH).unwrap().write(input).unwrap();
        assert_eq!(value(&sb, COUNTER_PATH), expected);
    }
}

#[test]
fn test_counters_are_independent() {
    let (_controller, sb) = common::setup_test_mount("");
    let sub_path = format!("/{}/{}", SUB_DIR, SUB_COUNTER_FILE);

    sb.open(&sub_path).unwrap().write(&b"100"[..]).unwrap();
    let mut handle = sb.open(COUNTER_FILE).unwrap();
    assert_eq!(common::read_all(&mut handle, 8), b"0\n");

    assert_eq!(value(&sb, COUNTER_PATH), 1);
    assert_eq!(value(&sb, &sub_path), 100);
}

#[test]
fn test_concurrent_readers_each_increment_once() {
    let (_controller, sb) = common::setup_test_mount("");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let sb = sb.clone();
            std::thread::spawn(move || {
                for _ in 0..250 {
                    let mut handle = sb.open(COUNTER_PATH).unwrap();
                    let text = common::read_all(&mut handle, 3);
                    assert_eq!(text.last(), Some(&b'\n'));
                }
            })
        })
        .collect();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(value(&sb, COUNTER_PATH), 1000);
}

/// Value reported by a single fresh read on a new handle
fn fresh_read(sb: &::common::Superblock) -> i64 {
    let mut handle = sb.open(COUNTER_PATH).unwrap();
    let mut out = Vec::new();
    handle.read(&mut out, STAGING_CAPACITY).unwrap();

    let text = std::str::from_utf8(&out).unwrap();
    text.strip_suffix('\n').unwrap().parse().unwrap()
}

#[test]
fn test_concurrent_writes_and_reads_never_tear() {
    const WRITERS: i64 = 3;
    const WRITES: i64 = 200;
    const READERS: usize = 4;
    const READS: usize = 200;
    // Written values are spaced far wider than the increments readers add
    const SPACING: i64 = 100_000;

    let (_controller, sb) = common::setup_test_mount("");
    let written: std::collections::HashSet<i64> = std::iter::once(0)
        .chain((1..=WRITERS).flat_map(|w| (0..WRITES).map(move |k| (w * WRITES + k) * SPACING)))
        .collect();

    let writers: Vec<_> = (1..=WRITERS)
        .map(|w| {
            let sb = sb.clone();
            std::thread::spawn(move || {
                for k in 0..WRITES {
                    let text = ((w * WRITES + k) * SPACING).to_string();
                    let mut handle = sb.open(COUNTER_PATH).unwrap();
                    assert_eq!(handle.write(text.as_bytes()).unwrap(), text.len());
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let sb = sb.clone();
            std::thread::spawn(move || {
                (0..READS).map(|_| fresh_read(&sb)).collect::<Vec<i64>>()
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    let mut seen: Vec<i64> = readers
        .into_iter()
        .flat_map(|reader| reader.join().unwrap())
        .collect();
    seen.push(fresh_read(&sb));

    let max_increments = (READERS * READS) as i64;
    for value in seen {
        let base = value - value.rem_euclid(SPACING);
        assert!(
            written.contains(&base) && value - base <= max_increments,
            "read {} is not a written value plus increments",
            value
        );
    }
}
