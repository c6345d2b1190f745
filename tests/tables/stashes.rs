use cupboard::graph::{scope_stash, stash_scope};
use cupboard::{
    Config, Cupboard, CupboardError, Filter, Stash, StashOp, StashType, Table, Trail,
};
use serde_json::{Value, json};
use std::path::Path;
use tempfile::tempdir;

fn attach(dir: &Path) -> Cupboard {
    let mut config = Config::sqlite(dir);
    config.seed_builtin_properties = false;
    Cupboard::open(config).unwrap()
}

fn stored(stashes: &Table, id: &str) -> Stash {
    stashes.get_as(id).unwrap()
}

#[test]
fn test_lock_acquire_is_reentrant() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    let id = stashes.set("", Stash::lock("deploy")).unwrap();

    let mut lock = stored(&stashes, &id);
    lock.acquire("agent-a", None).unwrap();
    stashes.set(&id, lock).unwrap();
    assert_eq!(stored(&stashes, &id).version, 2);

    let mut lock = stored(&stashes, &id);
    lock.acquire("agent-a", None).unwrap();
    stashes.set(&id, lock).unwrap();
    let lock = stored(&stashes, &id);
    assert_eq!(lock.version, 2);
    assert_eq!(lock.holder(), Some("agent-a"));
    assert_eq!(cupboard.stash_history(&id).unwrap().len(), 2);
}

#[test]
fn test_lock_held_by_other_holder() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    let id = stashes.set("", Stash::lock("deploy")).unwrap();

    let mut lock = stored(&stashes, &id);
    lock.acquire("agent-a", None).unwrap();
    stashes.set(&id, lock).unwrap();

    let mut lock = stored(&stashes, &id);
    let before = lock.value.clone();
    let err = lock.acquire("agent-b", None).unwrap_err();
    assert!(matches!(err, CupboardError::LockHeld { ref holder, .. } if holder == "agent-a"));
    assert_eq!(lock.value, before);

    let err = lock.release("agent-b", None).unwrap_err();
    assert!(matches!(err, CupboardError::NotLockHolder(_)));
    assert_eq!(lock.value, before);

    lock.release("agent-a", Some("crumb-1")).unwrap();
    stashes.set(&id, lock).unwrap();
    let lock = stored(&stashes, &id);
    assert_eq!(lock.value, Value::Null);
    assert_eq!(lock.version, 3);
    assert_eq!(lock.last_operation, StashOp::Release);
    assert_eq!(lock.changed_by.as_deref(), Some("crumb-1"));
}

#[test]
fn test_increment_round_trip() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    let id = stashes
        .set("", Stash::new("builds", StashType::Counter, json!(10)))
        .unwrap();
    let original = stored(&stashes, &id);

    let mut counter = original.clone();
    assert_eq!(counter.increment(5, None).unwrap(), 15);
    stashes.set(&id, counter).unwrap();

    let mut counter = stored(&stashes, &id);
    assert_eq!(counter.increment(-5, None).unwrap(), 10);
    stashes.set(&id, counter).unwrap();

    let counter = stored(&stashes, &id);
    assert_eq!(counter.value, original.value);
    assert_eq!(counter.version, original.version + 2);

    let history = cupboard.stash_history(&id).unwrap();
    let values: Vec<Value> = history.iter().map(|v| v.value.clone()).collect();
    assert_eq!(values, vec![json!(10), json!(15), json!(10)]);
    let versions: Vec<i64> = history.iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[test]
fn test_stale_writes_are_rejected() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    let id = stashes.set("", Stash::counter("jobs")).unwrap();

    let mut first = stored(&stashes, &id);
    let mut second = stored(&stashes, &id);
    first.increment(1, Some("crumb-a")).unwrap();
    second.increment(1, Some("crumb-b")).unwrap();

    stashes.set(&id, first).unwrap();
    let err = stashes.set(&id, second).unwrap_err();
    assert!(matches!(
        err,
        CupboardError::StaleVersion {
            stored: 2,
            offered: 2,
            ..
        }
    ));
    assert_eq!(stored(&stashes, &id).changed_by.as_deref(), Some("crumb-a"));
}

#[test]
fn test_operations_are_gated_by_type() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    let id = stashes
        .set("", Stash::new("ctx", StashType::Context, json!({"branch": "main"})))
        .unwrap();

    let mut ctx = stored(&stashes, &id);
    assert!(matches!(
        ctx.increment(1, None),
        Err(CupboardError::InvalidStashType(_))
    ));
    assert!(matches!(
        ctx.acquire("agent", None),
        Err(CupboardError::InvalidStashType(_))
    ));
    ctx.set_value(json!({"branch": "dev"}), None).unwrap();
    stashes.set(&id, ctx.clone()).unwrap();
    assert_eq!(stored(&stashes, &id).value, json!({"branch": "dev"}));

    ctx.stash_type = StashType::Lock;
    ctx.version += 1;
    assert!(matches!(
        stashes.set(&id, ctx),
        Err(CupboardError::InvalidStashType(_))
    ));
}

#[test]
fn test_names_are_unique_per_scope() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    let trails = cupboard.get_table("trails").unwrap();
    let links = cupboard.get_table("links").unwrap();
    let trail_a = trails.set("", Trail::new()).unwrap();
    let trail_b = trails.set("", Trail::new()).unwrap();

    let first = stashes.set("", Stash::counter("attempts")).unwrap();
    assert!(matches!(
        stashes.set("", Stash::counter("attempts")),
        Err(CupboardError::DuplicateName(_))
    ));

    scope_stash(&links, &first, &trail_a).unwrap();
    assert_eq!(stash_scope(&links, &first).unwrap(), Some(trail_a.clone()));

    // The name is free again globally once the first stash is scoped.
    let second = stashes.set("", Stash::counter("attempts")).unwrap();
    assert_eq!(stash_scope(&links, &second).unwrap(), None);
    assert!(matches!(
        scope_stash(&links, &second, &trail_a),
        Err(CupboardError::DuplicateName(_))
    ));
    scope_stash(&links, &second, &trail_b).unwrap();
    assert!(matches!(
        scope_stash(&links, &second, &trail_a),
        Err(CupboardError::InvalidData(_))
    ));

    let scoped: Vec<Stash> = stashes
        .fetch_as(&Filter::new().with("name", "attempts"))
        .unwrap();
    assert_eq!(scoped.len(), 2);
}

#[test]
fn test_delete_removes_history_and_scope() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    let trails = cupboard.get_table("trails").unwrap();
    let links = cupboard.get_table("links").unwrap();
    let trail = trails.set("", Trail::new()).unwrap();
    let id = stashes.set("", Stash::counter("attempts")).unwrap();
    scope_stash(&links, &id, &trail).unwrap();

    let mut counter = stored(&stashes, &id);
    counter.increment(1, None).unwrap();
    stashes.set(&id, counter).unwrap();
    assert_eq!(cupboard.stash_history(&id).unwrap().len(), 2);

    stashes.delete(&id).unwrap();
    assert!(matches!(
        cupboard.stash_history(&id),
        Err(CupboardError::NotFound { .. })
    ));
    assert!(links.fetch(&Filter::new()).unwrap().is_empty());
    assert!(trails.get(&trail).is_ok());
}

#[test]
fn test_fetch_by_type_and_version() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let stashes = cupboard.get_table("stashes").unwrap();
    stashes.set("", Stash::counter("a")).unwrap();
    stashes.set("", Stash::lock("b")).unwrap();
    let c = stashes.set("", Stash::counter("c")).unwrap();
    let mut counter = stored(&stashes, &c);
    counter.increment(2, None).unwrap();
    stashes.set(&c, counter).unwrap();

    let counters = stashes
        .fetch(&Filter::new().with("stash_type", "counter"))
        .unwrap();
    assert_eq!(counters.len(), 2);
    let bumped: Vec<Stash> = stashes
        .fetch_as(&Filter::new().with("version", 2))
        .unwrap();
    assert_eq!(bumped.len(), 1);
    assert_eq!(bumped[0].id, c);
    assert!(matches!(
        stashes.fetch(&Filter::new().with("version", "two")),
        Err(CupboardError::InvalidFilter(_))
    ));
}
