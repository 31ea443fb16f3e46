use super::*;
use crate::source::ListToken;

fn generation(token: u32) -> Generation {
    Generation::from(ListToken::new(token))
}

fn table_with(entries: &[(u32, &str)], token: u32) -> SnapshotTable<u32, String> {
    let table = SnapshotTable::new();
    for (key, value) in entries {
        table.merge(*key, value.to_string(), generation(token));
    }
    table
}

#[test]
fn test_put_get_remove() {
    let table: SnapshotTable<u32, String> = SnapshotTable::new();
    assert!(table.is_empty());

    assert!(table.put(Row::new(1, "a".to_string(), generation(1))).is_none());
    let displaced = table.put(Row::new(1, "b".to_string(), generation(2)));
    assert_eq!(displaced.unwrap().attributes(), "a");

    let row = table.get(&1).unwrap();
    assert_eq!(row.attributes(), "b");
    assert_eq!(row.generation(), generation(2));
    assert_eq!(table.len(), 1);

    assert!(table.remove(&1).is_some());
    assert!(table.get(&1).is_none());
    assert!(table.remove(&1).is_none());
}

#[test]
fn test_merge_outcomes() {
    let table = SnapshotTable::new();

    assert_eq!(
        table.merge(7, "v1".to_string(), generation(1)),
        MergeOutcome::Inserted
    );
    let before = table.get(&7).unwrap();

    assert_eq!(
        table.merge(7, "v1".to_string(), generation(2)),
        MergeOutcome::Confirmed
    );
    let confirmed = table.get(&7).unwrap();
    assert_eq!(confirmed.generation(), generation(2));
    assert!(confirmed.same_allocation(&before));

    assert_eq!(
        table.merge(7, "v2".to_string(), generation(3)),
        MergeOutcome::Replaced
    );
    let replaced = table.get(&7).unwrap();
    assert_eq!(replaced.attributes(), "v2");
    assert_eq!(replaced.generation(), generation(3));
    assert!(!replaced.same_allocation(&before));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_reader_keeps_value_it_read() {
    let table = table_with(&[(1, "old")], 1);
    let held = table.get(&1).unwrap();

    table.merge(1, "new".to_string(), generation(2));

    assert_eq!(held.attributes(), "old");
    assert_eq!(table.get(&1).unwrap().attributes(), "new");
}

#[test]
fn test_sweep_removes_only_unconfirmed() {
    let table = table_with(&[(1, "a"), (2, "b"), (3, "c")], 1);
    table.merge(1, "a".to_string(), generation(2));
    table.merge(3, "c2".to_string(), generation(2));

    assert_eq!(table.stale_keys(generation(2)), vec![2]);

    let removed = table.sweep(generation(2));
    assert_eq!(removed, vec![2]);
    assert_eq!(table.len(), 2);
    assert!(table.get(&2).is_none());

    assert!(table.sweep(generation(2)).is_empty());
}

#[test]
fn test_sweep_everything_when_nothing_confirmed() {
    let table = table_with(&[(1, "a"), (2, "b")], 1);
    let removed = table.sweep(generation(9));
    assert_eq!(removed.len(), 2);
    assert!(table.is_empty());
}

#[test]
fn test_ordered_walk() {
    let table = table_with(&[(30, "c"), (10, "a"), (20, "b")], 1);

    assert_eq!(*table.first().unwrap().key(), 10);
    assert_eq!(*table.next_after(&10).unwrap().key(), 20);
    assert_eq!(*table.next_after(&15).unwrap().key(), 20);
    assert_eq!(*table.next_after(&20).unwrap().key(), 30);
    assert!(table.next_after(&30).is_none());

    let empty: SnapshotTable<u32, String> = SnapshotTable::new();
    assert!(empty.first().is_none());
}

#[test]
fn test_snapshot_is_stable_and_restartable() {
    let table = table_with(&[(1, "a"), (2, "b")], 1);
    let snapshot = table.snapshot();

    table.merge(3, "c".to_string(), generation(1));
    table.remove(&1);

    let keys: Vec<u32> = snapshot.iter().map(|row| *row.key()).collect();
    assert_eq!(keys, vec![1, 2]);

    let again: Vec<u32> = (&snapshot).into_iter().map(|row| *row.key()).collect();
    assert_eq!(again, keys);
    assert_eq!(snapshot.len(), 2);
    assert_eq!(table.snapshot().len(), 2);
}
