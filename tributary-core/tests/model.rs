//! Integration Tests for the Model Facade
//!
//! These tests drive the facade end to end: writes go through the store
//! queue, and fetch signals are checked after the queue settles.

mod common;

use std::process::Command;
use std::sync::Arc;

use tributary_core::model::{Goal, Identifier, Model, Review, Role, ENTITIES};
use tributary_core::store::{MemoryStore, Store};
use tributary_core::{FailurePolicy, FetchError, ModelConfig};

use common::{init_tracing, Recorder};

fn role(model: &Model, id: Identifier<Role>) -> Role {
    let signal = model.value_for(id);
    model.settle();
    signal
        .current_value()
        .expect("role fetched")
        .expect("role exists")
}

/// Test that a list signal starts out as an empty list, not silence.
#[test]
fn empty_type_signal_pushes_empty_list() {
    init_tracing();
    let model = Model::in_memory("model-empty");
    let roles = model.values_for::<Role>();
    model.settle();

    assert_eq!(roles.current_value(), Some(Vec::new()));
}

/// Test that newly created entities appear in the type signal.
#[test]
fn created_entities_appear_in_type_signal() {
    init_tracing();
    let model = Model::in_memory("model-create");
    let roles = model.values_for::<Role>();
    let recorder = Recorder::attach(&roles);

    let first = model.instantiate::<Role>();
    let second = model.instantiate::<Role>();
    model.settle();

    let ids: Vec<_> = roles
        .current_value()
        .unwrap()
        .iter()
        .map(|role| role.identifier)
        .collect();
    assert_eq!(ids, vec![first, second]);
    assert!(recorder.count() >= 2);
}

/// Test that inserting other record types does not strobe a type signal.
#[test]
fn type_signal_ignores_other_entities() {
    init_tracing();
    let model = Model::in_memory("model-strobe");
    let roles = model.values_for::<Role>();
    model.instantiate::<Role>();
    model.settle();

    let recorder = Recorder::attach(&roles);
    assert_eq!(recorder.count(), 1, "replayed current list");

    for _ in 0..3 {
        model.instantiate::<Review>();
    }
    model.value_for_new_instance::<Goal>();
    model.settle();

    assert_eq!(recorder.count(), 1);
}

/// Test that two updates in one session produce exactly one notification.
#[test]
fn session_updates_notify_once() {
    init_tracing();
    let model = Model::in_memory("model-session");
    let first = model.instantiate::<Role>();
    let second = model.instantiate::<Role>();
    let roles = model.values_for::<Role>();
    model.settle();

    let recorder = Recorder::attach(&roles);
    let before = recorder.count();

    let mut a = role(&model, first);
    let mut b = role(&model, second);
    a.short_name = "Parent".into();
    b.short_name = "Runner".into();

    let session = model.begin_session();
    model.update_in(&a, &session);
    model.update_in(&b, &session);
    model.settle();
    assert_eq!(recorder.count(), before, "nothing lands before the session ends");

    model.end_session(&session);
    model.settle();
    assert_eq!(recorder.count(), before + 1);

    let names: Vec<String> = roles
        .current_value()
        .unwrap()
        .into_iter()
        .map(|role| role.short_name)
        .collect();
    assert_eq!(names, vec!["Parent".to_string(), "Runner".to_string()]);
}

/// Test that separate updates each notify.
#[test]
fn separate_updates_notify_separately() {
    init_tracing();
    let model = Model::in_memory("model-separate");
    let id = model.instantiate::<Role>();
    let roles = model.values_for::<Role>();
    model.settle();
    let recorder = Recorder::attach(&roles);

    let mut value = role(&model, id);
    value.is_active = true;
    model.update(&value);
    model.settle();
    value.explanation = "Weekends".into();
    model.update(&value);
    model.settle();

    assert_eq!(recorder.count(), 3);
    assert_eq!(roles.current_value(), Some(vec![value]));
}

/// Test that deleting a watched record pushes the deleted result.
#[test]
fn deleting_a_watched_record_reports_deleted() {
    init_tracing();
    let model = Model::in_memory("model-delete");
    let signal = model.value_for_new_instance::<Role>();
    model.settle();
    let recorder = Recorder::attach(&signal);

    let value = signal.current_value().unwrap().unwrap();
    model.delete(&value);
    model.settle();

    assert_eq!(recorder.values(), vec![Ok(value), Err(FetchError::Deleted)]);
}

/// Test that references between records survive a store snapshot.
#[test]
fn snapshot_carries_related_records() {
    init_tracing();
    let config = ModelConfig {
        store_name: "model-snapshot".into(),
        entities: Some(ENTITIES.iter().map(|e| e.to_string()).collect()),
        failure_policy: FailurePolicy::Fatal,
    };
    let memory = Arc::new(MemoryStore::with_schema("model-snapshot", ENTITIES));
    let model = Model::new(memory.clone(), config.clone());

    let parent = model.instantiate::<Role>();
    let goal_id = model.instantiate::<Goal>();
    let goals = model.value_for(goal_id);
    model.settle();

    let mut goal = goals.current_value().unwrap().unwrap();
    goal.title = "Read to the kids".into();
    goal.role_supported = Some(parent);
    model.update(&goal);
    model.settle();

    let bytes = memory.snapshot().unwrap();
    let restored_store = MemoryStore::from_snapshot("model-snapshot-restored", &bytes).unwrap();
    assert_eq!(restored_store.revision(), memory.revision());
    assert_eq!(restored_store.len(), 2);

    let restored = Model::new(
        Arc::new(restored_store),
        ModelConfig {
            store_name: "model-snapshot-restored".into(),
            ..config
        },
    );
    let restored_goal = restored.value_for(goal_id);
    restored.settle();
    assert_eq!(restored_goal.current_value(), Some(Ok(goal)));
}

const FATAL_FETCH_CHILD: &str = "TRIBUTARY_FATAL_FETCH_CHILD";

/// Test that a failed background fetch under the fatal policy stops the
/// process instead of leaving a dead store queue behind.
///
/// The test re-runs itself in a child process, which is expected to abort.
#[test]
fn fatal_fetch_failure_aborts_the_process() {
    if std::env::var_os(FATAL_FETCH_CHILD).is_some() {
        init_tracing();
        let model = Model::from_config(ModelConfig {
            store_name: "model-fatal-fetch".into(),
            entities: Some(vec!["Role".into()]),
            failure_policy: FailurePolicy::Fatal,
        })
        .unwrap();
        let _reviews = model.values_for::<Review>();
        model.settle();
        // Only reached if the failed fetch did not stop the process.
        model.instantiate::<Role>();
        return;
    }

    let status = Command::new(std::env::current_exe().unwrap())
        .args([
            "--exact",
            "fatal_fetch_failure_aborts_the_process",
            "--test-threads=1",
        ])
        .env(FATAL_FETCH_CHILD, "1")
        .status()
        .unwrap();
    assert!(!status.success());

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.code(), None, "child exited instead of aborting");
        assert_eq!(status.signal(), Some(6), "expected SIGABRT, got {status:?}");
    }
}
