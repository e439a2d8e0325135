use twofilters_rt::{NameBuffer, NameError, NamePool};

#[test]
fn handle_reads_back_written_name() {
    let pool = NamePool::new(4);
    let handle = pool.write("Init Patch");
    let mut out = NameBuffer::default();
    pool.read(handle, &mut out).unwrap();
    assert_eq!(out.as_str(), "Init Patch");
}

#[test]
fn handle_fails_after_slot_reuse() {
    let pool = NamePool::new(2);
    let first = pool.write("first");
    pool.write("second");
    pool.write("third");
    let mut out = NameBuffer::new("unchanged");
    assert!(matches!(pool.read(first, &mut out), Err(NameError::Overwritten { .. })));
    assert_eq!(out.as_str(), "unchanged");
}

#[test]
fn long_names_are_truncated() {
    let pool = NamePool::new(1);
    let name = "x".repeat(400);
    let handle = pool.write(&name);
    assert_eq!(pool.read_to_string(handle).unwrap().len(), 255);
}
