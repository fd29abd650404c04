mod common;

use common::{new_order, two_service_order, TestApp, ENGINEER, INACTIVE_ENGINEER, SECOND_ENGINEER};
use order_service::config::Config;
use order_service::models::{Actor, Order, SubTaskStatus, UpdateType};
use order_service::services::lifecycle::{NewSubTask, SubTaskChanges};
use rust_decimal_macros::dec;
use serde_json::json;

fn sub_task(title: &str, assignee: &str) -> NewSubTask {
    serde_json::from_value(json!({ "title": title, "assigned_to": assignee })).unwrap()
}

fn child_of(title: &str, parent: &str) -> NewSubTask {
    serde_json::from_value(json!({
        "title": title,
        "assigned_to": ENGINEER,
        "parent_task_id": parent,
    }))
    .unwrap()
}

async fn order(app: &TestApp, actor: &Actor) -> Order {
    app.state
        .engine
        .create_order(actor, new_order(two_service_order()))
        .await
        .unwrap()
}

#[tokio::test]
async fn children_are_nested_under_their_parent() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = order(&app, &actor).await;

    let parent = engine
        .create_sub_task(&actor, &order.id, sub_task("Board repair", ENGINEER))
        .await
        .unwrap();
    let child = engine
        .create_sub_task(&actor, &order.id, child_of("Reflow GPU", &parent.id))
        .await
        .unwrap();
    engine
        .create_sub_task(&actor, &order.id, sub_task("Clean chassis", SECOND_ENGINEER))
        .await
        .unwrap();

    assert_eq!(parent.task_level, 0);
    assert_eq!(child.task_level, 1);

    let tree = engine.list_sub_tasks(&actor, &order.id).await.unwrap();
    assert_eq!(tree.len(), 2);
    let board = tree.iter().find(|n| n.task.id == parent.id).unwrap();
    assert_eq!(board.children.len(), 1);
    assert_eq!(board.children[0].task.id, child.id);
}

#[tokio::test]
async fn parent_with_live_child_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = order(&app, &actor).await;
    let parent = engine
        .create_sub_task(&actor, &order.id, sub_task("Board repair", ENGINEER))
        .await
        .unwrap();
    let child = engine
        .create_sub_task(&actor, &order.id, child_of("Reflow GPU", &parent.id))
        .await
        .unwrap();

    let err = engine.delete_sub_task(&actor, &parent.id).await.unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");

    let parent_after = engine.get_sub_task(&actor, &parent.id).await.unwrap();
    let child_after = engine.get_sub_task(&actor, &child.id).await.unwrap();
    assert_eq!(parent_after.version, parent.version);
    assert_eq!(child_after.version, child.version);

    engine.delete_sub_task(&actor, &child.id).await.unwrap();
    engine.delete_sub_task(&actor, &parent.id).await.unwrap();

    let current = engine.get_order(&actor, &order.id).await.unwrap();
    assert_eq!(current.rollup.total_sub_tasks, 0);
    assert!(!current.rollup.has_sub_tasks);
}

#[tokio::test]
async fn dependencies_must_belong_to_the_same_order() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let first = order(&app, &actor).await;
    let second = order(&app, &actor).await;
    let foreign = engine
        .create_sub_task(&actor, &second.id, sub_task("Order parts", ENGINEER))
        .await
        .unwrap();
    let local = engine
        .create_sub_task(&actor, &first.id, sub_task("Order parts", ENGINEER))
        .await
        .unwrap();

    let mut input = sub_task("Fit parts", ENGINEER);
    input.dependencies = vec![foreign.id.clone()];
    let err = engine
        .create_sub_task(&actor, &first.id, input)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let mut input = sub_task("Fit parts", ENGINEER);
    input.dependencies = vec![local.id.clone(), local.id.clone()];
    let task = engine.create_sub_task(&actor, &first.id, input).await.unwrap();
    assert_eq!(task.dependencies, vec![local.id]);
}

#[tokio::test]
async fn inactive_assignee_is_rejected() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let order = order(&app, &actor).await;

    let err = app
        .state
        .engine
        .create_sub_task(&actor, &order.id, sub_task("Solder", INACTIVE_ENGINEER))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");
}

#[tokio::test]
async fn status_changes_stamp_timestamps_and_history() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = order(&app, &actor).await;
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen", ENGINEER))
        .await
        .unwrap();

    let started = engine
        .update_sub_task_status(&actor, &task.id, "in_progress", None)
        .await
        .unwrap();
    assert!(started.started_at.is_some());

    let done = engine
        .update_sub_task_status(&actor, &task.id, "completed", Some("Screen fitted".into()))
        .await
        .unwrap();
    assert_eq!(done.status, SubTaskStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());
    assert_eq!(done.started_at, started.started_at);

    // Same status again is a no-op.
    let again = engine
        .update_sub_task_status(&actor, &task.id, "completed", None)
        .await
        .unwrap();
    assert_eq!(again.version, done.version);

    let history = engine.sub_task_history(&actor, &task.id).await.unwrap();
    assert_eq!(history[0].note, "Screen fitted");
    assert_eq!(history[0].update_type, UpdateType::Completion);
    assert_eq!(history.last().unwrap().update_type, UpdateType::Assignment);

    let err = engine
        .update_sub_task_status(&actor, &task.id, "finished", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn field_updates_are_logged_with_old_and_new_values() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = order(&app, &actor).await;
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen", ENGINEER))
        .await
        .unwrap();

    let changes: SubTaskChanges = serde_json::from_value(json!({
        "progress": 40,
        "amount": "250",
        "parts_used": [{ "part_name": "OLED panel", "quantity": 1, "cost": "180" }],
    }))
    .unwrap();
    let updated = engine.update_sub_task(&actor, &task.id, changes).await.unwrap();

    assert_eq!(updated.progress, 40);
    assert_eq!(updated.amount, dec!(250));
    assert_eq!(updated.parts_used.len(), 1);

    let history = engine.sub_task_history(&actor, &task.id).await.unwrap();
    let progress = history
        .iter()
        .find(|u| u.note == "Progress updated to 40%")
        .unwrap();
    assert_eq!(progress.old_value.as_deref(), Some("0"));
    assert_eq!(progress.new_value.as_deref(), Some("40"));

    let invalid = SubTaskChanges {
        progress: Some(140),
        ..Default::default()
    };
    let err = engine.update_sub_task(&actor, &task.id, invalid).await.unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn reassignment_and_comments_append_history() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = order(&app, &actor).await;
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen", ENGINEER))
        .await
        .unwrap();

    let moved = engine
        .reassign_sub_task(&actor, &task.id, SECOND_ENGINEER, None)
        .await
        .unwrap();
    assert_eq!(moved.assigned_to, SECOND_ENGINEER);
    assert_eq!(moved.assigned_to_name, "Meena Iyer");

    let commented = engine
        .add_sub_task_update(&actor, &task.id, "Waiting on panel delivery", "comment")
        .await
        .unwrap();
    let latest = commented.updates.last().unwrap();
    assert_eq!(latest.update_type, UpdateType::Comment);
    assert_eq!(latest.note, "Waiting on panel delivery");

    let err = engine
        .add_sub_task_update(&actor, &task.id, "   ", "comment")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sub_task_writers_keep_the_rollup_exact() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let order = order(&app, &actor).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = app.state.engine.clone();
        let actor = actor.clone();
        let order_id = order.id.clone();
        handles.push(tokio::spawn(async move {
            let task = engine
                .create_sub_task(&actor, &order_id, sub_task(&format!("Task {i}"), ENGINEER))
                .await?;
            engine
                .update_sub_task_status(&actor, &task.id, "completed", None)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let current = app.state.engine.get_order(&actor, &order.id).await.unwrap();
    assert_eq!(current.rollup.total_sub_tasks, 8);
    assert_eq!(current.rollup.completed_sub_tasks, 8);
    assert_eq!(current.rollup.sub_task_progress, 100);
    assert_eq!(current.stage_slug, "quality_check");
}

#[tokio::test]
async fn completed_sub_task_progress_cannot_be_lowered() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = order(&app, &actor).await;
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen", ENGINEER))
        .await
        .unwrap();
    engine
        .update_sub_task_status(&actor, &task.id, "completed", None)
        .await
        .unwrap();

    let lowered = SubTaskChanges {
        progress: Some(40),
        ..Default::default()
    };
    let err = engine.update_sub_task(&actor, &task.id, lowered).await.unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let current = engine.get_sub_task(&actor, &task.id).await.unwrap();
    assert_eq!(current.status, SubTaskStatus::Completed);
    assert_eq!(current.progress, 100);
}

#[tokio::test]
async fn failed_order_sync_leaves_sub_tasks_untouched() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = order(&app, &actor).await;
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen", ENGINEER))
        .await
        .unwrap();
    let history_before = engine.sub_task_history(&actor, &task.id).await.unwrap().len();
    let version_before = engine.get_order(&actor, &order.id).await.unwrap().version;

    app.store.fail_order_writes(true);

    let err = engine
        .update_sub_task_status(&actor, &task.id, "in_progress", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "internal");
    let current = engine.get_sub_task(&actor, &task.id).await.unwrap();
    assert_eq!(current.status, SubTaskStatus::Pending);
    assert!(current.started_at.is_none());
    assert_eq!(
        engine.sub_task_history(&actor, &task.id).await.unwrap().len(),
        history_before
    );

    let err = engine
        .create_sub_task(&actor, &order.id, sub_task("Clean chassis", ENGINEER))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "internal");
    let err = engine.delete_sub_task(&actor, &task.id).await.unwrap_err();
    assert_eq!(err.kind(), "internal");

    let tree = engine.list_sub_tasks(&actor, &order.id).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].task.id, task.id);
    let unchanged = engine.get_order(&actor, &order.id).await.unwrap();
    assert_eq!(unchanged.rollup.total_sub_tasks, 1);
    assert_eq!(unchanged.version, version_before);

    app.store.fail_order_writes(false);
    engine
        .update_sub_task_status(&actor, &task.id, "in_progress", None)
        .await
        .unwrap();
    let synced = engine.get_order(&actor, &order.id).await.unwrap();
    assert_eq!(synced.stage_slug, "in_progress");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn conflicting_status_updates_either_apply_fully_or_not_at_all() {
    let mut config = Config::for_tests();
    config.lifecycle.max_retries = 0;
    let app = TestApp::spawn_with(config).await;
    let actor = TestApp::actor();
    let order = order(&app, &actor).await;

    let mut ids = Vec::new();
    for i in 0..16 {
        let task = app
            .state
            .engine
            .create_sub_task(&actor, &order.id, sub_task(&format!("Task {i}"), ENGINEER))
            .await
            .unwrap();
        ids.push(task.id);
    }

    let mut handles = Vec::new();
    for id in &ids {
        let engine = app.state.engine.clone();
        let actor = actor.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let result = engine
                .update_sub_task_status(&actor, &id, "in_progress", None)
                .await;
            (id, result)
        }));
    }

    for handle in handles {
        let (id, result) = handle.await.unwrap();
        let current = app.state.engine.get_sub_task(&actor, &id).await.unwrap();
        match result {
            Ok(_) => assert_eq!(current.status, SubTaskStatus::InProgress),
            Err(err) => {
                assert_eq!(err.kind(), "concurrency_conflict");
                assert_eq!(current.status, SubTaskStatus::Pending, "sub-task {id}");
                assert!(current.started_at.is_none());
            }
        }
    }
}
