mod common;

use common::{
    new_order, two_service_order, TestApp, ENGINEER, INACTIVE_ENGINEER, RECEPTIONIST,
    SECOND_ENGINEER,
};
use order_service::models::{stage, ActivityType, NoteKind, OrderStatus, PaymentStatus};
use order_service::services::lifecycle::{NewSubTask, OrderItemsUpdate, OrderPayment};
use order_service::services::Store;
use rust_decimal_macros::dec;
use serde_json::json;

fn sub_task(title: &str) -> NewSubTask {
    serde_json::from_value(json!({ "title": title, "assigned_to": ENGINEER })).unwrap()
}

#[tokio::test]
async fn create_order_computes_totals_and_issues_invoice() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();

    let order = app
        .state
        .engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();

    let f = &order.financials;
    assert_eq!(f.subtotal, dec!(1500));
    assert_eq!(f.taxable_amount, dec!(1500));
    assert_eq!(f.cgst, dec!(135));
    assert_eq!(f.sgst, dec!(135));
    assert_eq!(f.igst, dec!(0));
    assert_eq!(f.total_tax, dec!(270));
    assert_eq!(f.total_amount, dec!(1770));
    assert_eq!(f.round_off, dec!(0));
    assert_eq!(f.final_cost, Some(dec!(1770)));
    assert_eq!(f.balance_payment, dec!(1770));
    assert_eq!(f.payment_status, PaymentStatus::Unpaid);

    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.stage_slug, "pending");
    assert_eq!(order.stage_history.len(), 1);
    assert!(order.invoice_id.is_some());

    let invoice = app
        .state
        .ledger
        .get_invoice(&actor, order.invoice_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(invoice.final_amount, dec!(1770));
    assert_eq!(invoice.order_id, order.id);
}

#[tokio::test]
async fn create_order_with_engineer_lands_in_assigned_stage() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let mut payload = two_service_order();
    payload["engineer_id"] = json!(ENGINEER);

    let order = app
        .state
        .engine
        .create_order(&actor, new_order(payload))
        .await
        .unwrap();

    assert_eq!(order.stage_slug, stage::ASSIGNED);
    assert_eq!(order.stage_history.len(), 2);
    assert_eq!(order.engineer_id(), Some(ENGINEER));
    let last = order.stage_history.last().unwrap();
    assert_eq!(last.assigned_to.as_deref(), Some("Ravi Kumar"));
}

#[tokio::test]
async fn create_order_rejects_non_engineer_and_inactive_staff() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();

    for (id, kind) in [
        (RECEPTIONIST, "precondition_failed"),
        (INACTIVE_ENGINEER, "precondition_failed"),
        ("nobody", "not_found"),
    ] {
        let mut payload = two_service_order();
        payload["engineer_id"] = json!(id);
        let err = app
            .state
            .engine
            .create_order(&actor, new_order(payload))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "engineer {id}");
    }
}

#[tokio::test]
async fn create_order_requires_items() {
    let app = TestApp::spawn().await;
    let mut payload = two_service_order();
    payload["items"] = json!([]);

    let err = app
        .state
        .engine
        .create_order(&TestApp::actor(), new_order(payload))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn advance_payment_is_recorded_against_the_invoice() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let mut payload = two_service_order();
    payload["advance_payment"] = json!("500");
    payload["payment_method"] = json!("upi");

    let order = app
        .state
        .engine
        .create_order(&actor, new_order(payload))
        .await
        .unwrap();

    assert_eq!(order.financials.advance_payment, dec!(500));
    assert_eq!(order.financials.balance_payment, dec!(1270));
    assert_eq!(order.financials.payment_status, PaymentStatus::Partial);

    let payments = app
        .state
        .ledger
        .list_payments_for_order(&actor, &order.id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, dec!(500));
}

#[tokio::test]
async fn sub_tasks_drive_the_order_stage() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();

    let mut ids = Vec::new();
    for title in ["Replace screen", "Replace battery", "Clean ports"] {
        ids.push(engine.create_sub_task(&actor, &order.id, sub_task(title)).await.unwrap().id);
    }
    engine
        .update_sub_task_status(&actor, &ids[2], "in_progress", None)
        .await
        .unwrap();

    let current = engine.get_order(&actor, &order.id).await.unwrap();
    assert_eq!(current.stage_slug, stage::IN_PROGRESS);
    assert_eq!(current.rollup.total_sub_tasks, 3);
    assert_eq!(current.rollup.completed_sub_tasks, 0);

    for id in &ids {
        engine
            .update_sub_task_status(&actor, id, "completed", None)
            .await
            .unwrap();
    }

    let done = engine.get_order(&actor, &order.id).await.unwrap();
    assert_eq!(done.stage_slug, stage::QUALITY_CHECK);
    assert_eq!(done.rollup.completed_sub_tasks, 3);
    assert_eq!(done.rollup.sub_task_progress, 100);
    assert_eq!(
        done.stage_history.last().unwrap().notes,
        "All sub-tasks completed"
    );
}

#[tokio::test]
async fn order_without_sub_tasks_never_auto_transitions() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let order = app
        .state
        .engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();

    let outcome = app.state.engine.reconcile_order(&actor, &order.id).await.unwrap();

    assert!(outcome.moved.is_none());
    assert_eq!(outcome.order.stage_slug, "pending");
    assert!(!outcome.order.rollup.has_sub_tasks);
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen"))
        .await
        .unwrap();
    engine
        .update_sub_task_status(&actor, &task.id, "completed", None)
        .await
        .unwrap();

    let first = engine.reconcile_order(&actor, &order.id).await.unwrap();
    let second = engine.reconcile_order(&actor, &order.id).await.unwrap();

    assert!(first.moved.is_none());
    assert!(second.moved.is_none());
    assert_eq!(first.order.rollup, second.order.rollup);
    assert_eq!(
        first.order.stage_history.len(),
        second.order.stage_history.len()
    );
    assert_eq!(first.order.version, second.order.version);
}

#[tokio::test]
async fn reconcile_heals_a_missed_order_sync() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen"))
        .await
        .unwrap();

    // Complete the sub-task behind the engine's back, as if the order write had failed.
    let mut stored = app.store.get_sub_task(&task.id).await.unwrap().unwrap();
    let expected = stored.version;
    stored.transition(order_service::models::SubTaskStatus::Completed, chrono::Utc::now());
    stored.version += 1;
    app.store
        .replace_sub_task_if_version(&stored, expected)
        .await
        .unwrap();

    let outcome = engine.reconcile_order(&actor, &order.id).await.unwrap();

    assert_eq!(outcome.order.stage_slug, stage::QUALITY_CHECK);
    assert_eq!(outcome.order.rollup.completed_sub_tasks, 1);
    assert!(outcome.moved.is_some());
}

#[tokio::test]
async fn final_stage_is_never_left_automatically() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();
    let delivered = engine
        .stages()
        .find_by_slug("delivered")
        .await
        .unwrap()
        .unwrap();
    engine
        .move_stage(&actor, &order.id, &delivered.id, None)
        .await
        .unwrap();

    engine
        .create_sub_task(&actor, &order.id, sub_task("Warranty check"))
        .await
        .unwrap();

    let current = engine.get_order(&actor, &order.id).await.unwrap();
    assert_eq!(current.stage_slug, "delivered");
    assert_eq!(current.rollup.total_sub_tasks, 1);
}

#[tokio::test]
async fn assign_engineer_moves_order_to_assigned() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();

    let assigned = engine
        .assign_engineer(&actor, &order.id, ENGINEER, Some("Urgent".to_string()))
        .await
        .unwrap();
    assert_eq!(assigned.stage_slug, stage::ASSIGNED);
    assert_eq!(assigned.engineer_id(), Some(ENGINEER));

    let err = engine
        .assign_engineer(&actor, &order.id, RECEPTIONIST, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");
}

#[tokio::test]
async fn repeating_the_current_engineer_is_not_a_reassignment() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();

    engine.assign_engineer(&actor, &order.id, ENGINEER, None).await.unwrap();
    engine.assign_engineer(&actor, &order.id, ENGINEER, None).await.unwrap();
    app.flush().await;
    let count = |activity: &[order_service::models::ActivityLog], kind: ActivityType| {
        activity.iter().filter(|a| a.activity_type == kind).count()
    };
    let activity = engine.list_activity(&actor, &order.id).await.unwrap();
    assert_eq!(count(&activity, ActivityType::OrderAssigned), 2);
    assert_eq!(count(&activity, ActivityType::OrderReassigned), 0);

    engine
        .assign_engineer(&actor, &order.id, SECOND_ENGINEER, None)
        .await
        .unwrap();
    app.flush().await;
    let activity = engine.list_activity(&actor, &order.id).await.unwrap();
    let reassigned: Vec<_> = activity
        .iter()
        .filter(|a| a.activity_type == ActivityType::OrderReassigned)
        .collect();
    assert_eq!(reassigned.len(), 1);
    assert_eq!(
        reassigned[0].description,
        "Order reassigned from Ravi Kumar to Meena Iyer"
    );
}

#[tokio::test]
async fn status_update_rejects_unknown_values() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();

    let updated = engine
        .update_order_status(&actor, &order.id, "in_progress")
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::InProgress);

    let err = engine
        .update_order_status(&actor, &order.id, "teleported")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn item_update_regenerates_invoice_and_keeps_payments() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();
    engine
        .add_payment(
            &actor,
            &order.id,
            OrderPayment {
                amount: dec!(770),
                method: order_service::models::PaymentMethod::Cash,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let update: OrderItemsUpdate = serde_json::from_value(json!({
        "items": [common::service("Screen replacement", "2000")],
    }))
    .unwrap();
    let updated = engine
        .update_order_items(&actor, &order.id, update)
        .await
        .unwrap();

    assert_eq!(updated.financials.subtotal, dec!(2000));
    assert_eq!(updated.financials.final_cost, Some(dec!(2360)));
    assert_eq!(updated.financials.advance_payment, dec!(770));
    assert_eq!(updated.financials.balance_payment, dec!(1590));
    assert_eq!(updated.financials.payment_status, PaymentStatus::Partial);
}

#[tokio::test]
async fn notes_and_activity_are_recorded() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();

    engine
        .add_note(&actor, &order.id, "Customer prefers a call", NoteKind::Customer)
        .await
        .unwrap();
    let updated = engine
        .add_note(&actor, &order.id, "Check hinge too", NoteKind::Internal)
        .await
        .unwrap();
    assert_eq!(updated.customer_notes.len(), 1);
    assert_eq!(updated.internal_notes.len(), 1);

    app.flush().await;
    let activity = engine.list_activity(&actor, &order.id).await.unwrap();
    let types: Vec<_> = activity.iter().map(|a| a.activity_type).collect();
    assert!(types.contains(&ActivityType::OrderCreated));
    assert!(types.contains(&ActivityType::InvoiceGenerated));
    assert_eq!(
        types
            .iter()
            .filter(|t| **t == ActivityType::NoteAdded)
            .count(),
        2
    );
}

#[tokio::test]
async fn activity_failures_do_not_fail_the_operation() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    app.store.fail_activity_writes(true);

    let order = app
        .state
        .engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();
    app.flush().await;

    assert!(app
        .state
        .engine
        .list_activity(&actor, &order.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn soft_deleted_order_disappears_with_its_sub_tasks() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let order = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();
    let task = engine
        .create_sub_task(&actor, &order.id, sub_task("Replace screen"))
        .await
        .unwrap();

    engine.soft_delete_order(&actor, &order.id).await.unwrap();

    assert_eq!(
        engine.get_order(&actor, &order.id).await.unwrap_err().kind(),
        "not_found"
    );
    assert_eq!(
        engine.get_sub_task(&actor, &task.id).await.unwrap_err().kind(),
        "not_found"
    );
    // Ledger documents are untouched.
    assert!(app
        .state
        .ledger
        .get_invoice(&actor, order.invoice_id.as_deref().unwrap())
        .await
        .is_ok());
}

#[tokio::test]
async fn other_tenants_cannot_see_orders() {
    let app = TestApp::spawn().await;
    let order = app
        .state
        .engine
        .create_order(&TestApp::actor(), new_order(two_service_order()))
        .await
        .unwrap();

    let outsider = order_service::models::Actor::new("other-co", "u-9", "Intruder");
    let err = app
        .state
        .engine
        .get_order(&outsider, &order.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn work_items_list_orders_and_sub_tasks_for_an_engineer() {
    let app = TestApp::spawn().await;
    let actor = TestApp::actor();
    let engine = &app.state.engine;
    let mut payload = two_service_order();
    payload["engineer_id"] = json!(ENGINEER);
    let assigned = engine.create_order(&actor, new_order(payload)).await.unwrap();
    let other = engine
        .create_order(&actor, new_order(two_service_order()))
        .await
        .unwrap();
    engine
        .create_sub_task(&actor, &other.id, sub_task("Diagnose board"))
        .await
        .unwrap();

    let items = engine.work_items(&actor, ENGINEER).await.unwrap();

    assert_eq!(items.len(), 2);
    let json = serde_json::to_value(&items).unwrap();
    let kinds: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"order"));
    assert!(kinds.contains(&"sub_task"));
    assert!(json
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["order_number"] == json!(assigned.order_number)));
}
