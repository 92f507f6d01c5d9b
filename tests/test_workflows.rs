//! Tests for workflow store operations: CRUD, versions, tags, transfer.

use serde_json::json;
use taskflow::engine::types::*;
use taskflow::engine::{EngineError, WorkflowEngine};

fn log(id: &str) -> TaskDefinition {
    TaskDefinition::new(id, "log").with_param("message", json!("hi"))
}

fn create(engine: &WorkflowEngine, name: &str) -> WorkflowDefinition {
    engine
        .create_workflow(NewWorkflow::new(name, vec![log("a"), log("b").depends_on(&["a"])]))
        .unwrap()
}

fn rename(engine: &WorkflowEngine, id: &str, name: &str) -> WorkflowDefinition {
    engine
        .update_workflow(
            id,
            WorkflowUpdate {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
        .unwrap()
}

// --- Create / get ---

#[test]
fn create_starts_at_version_one() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "  Nightly ETL  ");
    assert_eq!(wf.name, "Nightly ETL");
    assert_eq!(wf.version, 1);
    assert_eq!(wf.created_at, wf.updated_at);
    assert_eq!(engine.get_workflow(&wf.id), Some(wf.clone()));
    assert!(engine.get_history(&wf.id).unwrap().is_empty());
}

#[test]
fn create_fills_task_defaults() {
    let engine = WorkflowEngine::with_builtins();
    let task: TaskDefinition = serde_json::from_value(json!({ "action": "log" })).unwrap();
    let wf = engine.create_workflow(NewWorkflow::new("defaults", vec![task])).unwrap();

    let task = &wf.tasks[0];
    assert!(!task.id.is_empty());
    assert_eq!(task.name, "log");
    assert_eq!(task.timeout_seconds, 300);
    assert_eq!(task.retry_count, 0);
    assert_eq!(task.priority, Priority::Normal);
}

#[test]
fn create_rejects_invalid_input() {
    let engine = WorkflowEngine::with_builtins();

    let blank = engine.create_workflow(NewWorkflow::new("   ", vec![]));
    assert!(matches!(blank, Err(EngineError::Validation(_))));

    let long = engine.create_workflow(NewWorkflow::new(&"x".repeat(201), vec![]));
    assert!(matches!(long, Err(EngineError::Validation(_))));

    let tags: Vec<String> = (0..21).map(|i| format!("t{}", i)).collect();
    let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
    let too_many = engine.create_workflow(NewWorkflow::new("tags", vec![]).with_tags(&tag_refs));
    assert!(matches!(too_many, Err(EngineError::Validation(_))));

    let bad_action = engine.create_workflow(NewWorkflow::new("a", vec![TaskDefinition::new("t", "rm -rf")]));
    assert!(matches!(bad_action, Err(EngineError::Validation(_))));

    let dup = engine.create_workflow(NewWorkflow::new("d", vec![log("t"), log("t")]));
    assert!(dup.unwrap_err().to_string().contains("duplicate task id"));

    let bad_cron = engine.create_workflow(NewWorkflow::new("c", vec![]).with_schedule("every day"));
    assert!(matches!(bad_cron, Err(EngineError::Validation(_))));

    assert_eq!(engine.store().workflow_count(), 0);
}

#[test]
fn duplicate_tags_are_suppressed() {
    let engine = WorkflowEngine::with_builtins();
    let wf = engine
        .create_workflow(NewWorkflow::new("t", vec![]).with_tags(&["etl", " etl", "ops", "etl"]))
        .unwrap();
    assert_eq!(wf.tags, vec!["etl", "ops"]);
}

// --- List / search ---

#[test]
fn list_paginates_in_creation_order() {
    let engine = WorkflowEngine::with_builtins();
    for i in 0..5 {
        create(&engine, &format!("wf-{}", i));
    }

    let page = engine
        .list_workflows(&WorkflowQuery {
            offset: Some(1),
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total, 5);
    let names: Vec<&str> = page.items.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["wf-1", "wf-2"]);

    let err = engine
        .list_workflows(&WorkflowQuery {
            limit: Some(101),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn list_filters_by_tag_and_search() {
    let engine = WorkflowEngine::with_builtins();
    engine
        .create_workflow(NewWorkflow::new("Daily Report", vec![]).with_tags(&["reports"]))
        .unwrap();
    engine
        .create_workflow(NewWorkflow::new("Weekly Report", vec![]).with_tags(&["reports", "weekly"]))
        .unwrap();
    engine
        .create_workflow(NewWorkflow::new("Cleanup", vec![]).with_tags(&["ops"]))
        .unwrap();

    let reports = engine
        .list_workflows(&WorkflowQuery {
            tag: Some("reports".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(reports.total, 2);

    let weekly = engine
        .list_workflows(&WorkflowQuery {
            tag: Some("reports".to_string()),
            search: Some("WEEK".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(weekly.total, 1);
    assert_eq!(weekly.items[0].name, "Weekly Report");

    let none = engine
        .list_workflows(&WorkflowQuery {
            tag: Some("missing".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(none.total, 0);
}

#[test]
fn search_is_case_insensitive() {
    let engine = WorkflowEngine::with_builtins();
    create(&engine, "Invoice Sync");
    create(&engine, "invoice archive");
    create(&engine, "Payroll");

    assert_eq!(engine.search_workflows("INVOICE").len(), 2);
    assert_eq!(engine.search_workflows("roll").len(), 1);
    assert!(engine.search_workflows("zzz").is_empty());
}

// --- Update / history / rollback ---

#[test]
fn update_appends_one_history_entry() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "v1");

    let updated = engine
        .update_workflow(
            &wf.id,
            WorkflowUpdate {
                name: Some("v2".to_string()),
                description: Some("changed".to_string()),
                tags: Some(vec!["x".to_string()]),
                tasks: Some(vec![log("only")]),
                schedule: None,
            },
        )
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.created_at, wf.created_at);
    assert!(updated.updated_at >= wf.updated_at);

    let history = engine.get_history(&wf.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, 1);
    assert_eq!(history[0].snapshot, wf);
}

#[test]
fn history_is_newest_first() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "v1");
    rename(&engine, &wf.id, "v2");
    rename(&engine, &wf.id, "v3");

    let history = engine.get_history(&wf.id).unwrap();
    let versions: Vec<u32> = history.iter().map(|h| h.version).collect();
    assert_eq!(versions, vec![2, 1]);
    assert_eq!(history[0].snapshot.name, "v2");

    assert_eq!(engine.get_version(&wf.id, 1).unwrap().name, "v1");
    assert_eq!(engine.get_version(&wf.id, 3).unwrap().name, "v3");
    let err = engine.get_version(&wf.id, 9).unwrap_err();
    assert!(matches!(err, EngineError::VersionNotFound { version: 9, .. }));
}

#[test]
fn update_missing_and_invalid() {
    let engine = WorkflowEngine::with_builtins();
    let err = engine
        .update_workflow("ghost", WorkflowUpdate::default())
        .unwrap_err();
    assert!(err.is_not_found());

    let wf = create(&engine, "keep");
    let err = engine
        .update_workflow(
            &wf.id,
            WorkflowUpdate {
                name: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(engine.get_workflow(&wf.id).unwrap().version, 1);
}

#[test]
fn rollback_restores_as_new_version() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "original");
    rename(&engine, &wf.id, "renamed");

    let restored = engine.rollback_workflow(&wf.id, 1).unwrap();
    assert_eq!(restored.name, "original");
    assert_eq!(restored.tasks, wf.tasks);
    assert_eq!(restored.version, 3);
    assert_eq!(engine.get_history(&wf.id).unwrap().len(), 2);

    assert!(engine.rollback_workflow(&wf.id, 42).is_err());
}

// --- Delete ---

#[test]
fn delete_removes_workflow_and_tag_index() {
    let engine = WorkflowEngine::with_builtins();
    let wf = engine
        .create_workflow(NewWorkflow::new("gone", vec![]).with_tags(&["temp"]))
        .unwrap();

    assert!(engine.delete_workflow(&wf.id));
    assert!(!engine.delete_workflow(&wf.id));
    assert!(engine.get_workflow(&wf.id).is_none());
    assert!(engine.indexes().workflows_with_tag("temp").is_none());
    assert!(engine.get_history(&wf.id).is_err());
}

#[test]
fn bulk_delete_dedups_ids() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "once");
    let other = create(&engine, "twice");

    let result = engine.bulk_delete_workflows(&[
        wf.id.clone(),
        wf.id.clone(),
        wf.id.clone(),
        "ghost".to_string(),
        "ghost".to_string(),
    ]);
    assert_eq!(result.deleted, vec![wf.id.clone()]);
    assert_eq!(result.not_found, vec!["ghost".to_string()]);
    assert!(engine.get_workflow(&other.id).is_some());
}

// --- Clone ---

#[test]
fn clone_copies_tasks_and_tags_only() {
    let engine = WorkflowEngine::with_builtins();
    let wf = engine
        .create_workflow(
            NewWorkflow::new("source", vec![log("a")])
                .with_tags(&["etl"])
                .with_schedule("0 * * * *"),
        )
        .unwrap();
    rename(&engine, &wf.id, "source v2");
    engine.execute_workflow(&wf.id, "manual").unwrap();

    let copy = engine.clone_workflow(&wf.id).unwrap();
    assert_ne!(copy.id, wf.id);
    assert_eq!(copy.name, "source v2 (copy)");
    assert_eq!(copy.version, 1);
    assert_eq!(copy.tasks, wf.tasks);
    assert_eq!(copy.tags, vec!["etl"]);
    assert!(copy.schedule.is_none());
    assert!(engine.get_history(&copy.id).unwrap().is_empty());
    assert!(engine.indexes().executions_of(&copy.id).is_none());
    assert!(engine.schedules().get(&copy.id).is_none());

    assert!(engine.clone_workflow("ghost").unwrap_err().is_not_found());
}

// --- Tags ---

#[test]
fn add_and_remove_tags() {
    let engine = WorkflowEngine::with_builtins();
    let wf = engine
        .create_workflow(NewWorkflow::new("tags", vec![]).with_tags(&["a"]))
        .unwrap();

    let tagged = engine
        .add_tags(&wf.id, &["b".to_string(), "a".to_string()])
        .unwrap();
    assert_eq!(tagged.tags, vec!["a", "b"]);
    assert_eq!(tagged.version, 2);
    assert!(engine.indexes().workflows_with_tag("b").unwrap().contains(&wf.id));

    let untagged = engine.remove_tag(&wf.id, "a").unwrap();
    assert_eq!(untagged.tags, vec!["b"]);
    assert!(engine.indexes().workflows_with_tag("a").is_none());
}

#[test]
fn remove_absent_tag_is_precondition() {
    let engine = WorkflowEngine::with_builtins();
    let wf = engine
        .create_workflow(NewWorkflow::new("tags", vec![]).with_tags(&["keep"]))
        .unwrap();

    let err = engine.remove_tag(&wf.id, "other").unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
    assert!(err.to_string().contains("keep"));
    // A rejected change leaves no version behind.
    assert_eq!(engine.get_workflow(&wf.id).unwrap().version, 1);

    assert!(engine.remove_tag("ghost", "keep").unwrap_err().is_not_found());
}

// --- Export / import ---

#[test]
fn export_strips_identity() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "portable");

    let export = engine.export_workflow(&wf.id).unwrap();
    assert_eq!(export.name, "portable");
    assert_eq!(export.tasks[0].key, "t1");
    assert_eq!(export.tasks[1].key, "t2");
    assert_eq!(export.tasks[1].depends_on, vec!["t1"]);

    let text = serde_json::to_string(&export).unwrap();
    assert!(!text.contains(&wf.id));
    assert!(!text.contains("created_at"));
}

#[test]
fn import_never_collides_with_original() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "roundtrip");
    let export = engine.export_workflow(&wf.id).unwrap();

    let first = engine.import_workflow(export.clone()).unwrap();
    let second = engine.import_workflow(export).unwrap();

    assert_ne!(first.id, wf.id);
    assert_ne!(first.id, second.id);
    assert_ne!(first.tasks[0].id, wf.tasks[0].id);
    assert_eq!(first.tasks[1].depends_on, vec![first.tasks[0].id.clone()]);
    assert_eq!(first.version, 1);
    assert_eq!(engine.get_workflow(&wf.id).unwrap(), wf);

    let execution = engine.execute_workflow(&first.id, "manual").unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
}

#[test]
fn import_rejects_duplicate_keys() {
    let engine = WorkflowEngine::with_builtins();
    let wf = create(&engine, "dups");
    let mut export = engine.export_workflow(&wf.id).unwrap();
    export.tasks[1].key = "t1".to_string();

    let err = engine.import_workflow(export).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
