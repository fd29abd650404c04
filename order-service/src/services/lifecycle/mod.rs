//! Lifecycle engine: orders, sub-tasks and the derived state that ties them together.
//!
//! Every order write is a read-compute-write cycle guarded by the order's version and
//! retried on conflict. Sub-task mutations write the sub-task first and then re-derive
//! the order's rollup (and, where applicable, its stage) from the full set of live
//! sub-tasks inside one such cycle. If that cycle fails the sub-task write is reverted.

mod orders;
mod sub_tasks;

pub use orders::{NewOrder, OrderItemsUpdate, OrderPayment};
pub use sub_tasks::{NewSubTask, PartInput, SubTaskChanges, SubTaskNode};

use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::{retry_on_conflict, RetryPolicy};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::models::{
    ActivityLog, ActivityType, Actor, Order, Stage, StageHistoryEntry, SubTask, SubTaskRollup,
};
use crate::services::activity::ActivitySink;
use crate::services::directory::StaffDirectory;
use crate::services::ledger::Ledger;
use crate::services::metrics::{record_conflict_retry, record_operation, record_stage_transition};
use crate::services::stages::{classify_sub_tasks, resolve_target, StageRegistry};
use crate::services::store::{load_order, Store};
use crate::services::totals::progress_percent;

pub struct LifecycleEngine {
    store: Arc<dyn Store>,
    stages: StageRegistry,
    directory: Arc<dyn StaffDirectory>,
    activity: Arc<dyn ActivitySink>,
    ledger: Arc<Ledger>,
    retry: RetryPolicy,
    default_tax_rate: Decimal,
}

/// Outcome of re-deriving an order from its sub-tasks.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub order: Order,
    /// `(from, to)` stage names when the stage moved.
    pub moved: Option<(String, String)>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn StaffDirectory>,
        activity: Arc<dyn ActivitySink>,
        ledger: Arc<Ledger>,
        retry: RetryPolicy,
        default_tax_rate: Decimal,
    ) -> Self {
        Self {
            stages: StageRegistry::new(store.clone()),
            store,
            directory,
            activity,
            ledger,
            retry,
            default_tax_rate,
        }
    }

    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Version-guarded read-modify-write of one order.
    ///
    /// `mutate` runs against a fresh read on every attempt; returning `Ok(None)` skips
    /// the write.
    async fn modify_order<T, F>(
        &self,
        operation: &'static str,
        company_id: &str,
        order_id: &str,
        mutate: F,
    ) -> Result<(Order, Option<T>), AppError>
    where
        F: Fn(&mut Order) -> Result<Option<T>, AppError> + Send + Sync,
        T: Send,
    {
        let store = self.store.as_ref();
        let mutate = &mutate;
        retry_on_conflict(
            &self.retry,
            operation,
            |_| record_conflict_retry(operation),
            move || async move {
                let mut order = load_order(store, company_id, order_id).await?;
                let expected = order.version;
                match mutate(&mut order)? {
                    None => Ok((order, None)),
                    Some(out) => {
                        order.version += 1;
                        order.updated_at = Utc::now();
                        store.replace_order_if_version(&order, expected).await?;
                        Ok((order, Some(out)))
                    }
                }
            },
        )
        .await
    }

    /// Recompute the rollup (and optionally the automatic stage) from the live sub-tasks.
    ///
    /// With `force` the order is written even when nothing changed so that concurrent
    /// sub-task writers serialize on the order's version.
    #[instrument(skip(self, actor), fields(order_id = %order_id))]
    pub(crate) async fn sync_order_with_sub_tasks(
        &self,
        actor: &Actor,
        order_id: &str,
        auto_stage: bool,
        force: bool,
    ) -> Result<SyncOutcome, AppError> {
        let stages = self.stages.list_ordered().await?;
        let store = self.store.as_ref();
        let stages = stages.as_slice();
        let company_id = actor.company_id.as_str();

        let outcome = retry_on_conflict(
            &self.retry,
            "sync_order",
            |_| record_conflict_retry("sync_order"),
            move || async move {
                let mut order = load_order(store, company_id, order_id).await?;
                let tasks = store.list_sub_tasks(order_id).await?;
                let expected = order.version;

                let rollup = compute_rollup(&tasks);
                let mut changed = order.rollup != rollup;
                order.rollup = rollup;

                let mut moved = None;
                if auto_stage {
                    if let Some((target, note)) = plan_auto_stage(&order, &tasks, stages) {
                        let from = order.stage_name.clone();
                        let assigned_to = history_assignee(&order, &tasks);
                        push_stage(&mut order, target, actor, assigned_to, note);
                        moved = Some((from, target.name.clone(), target.slug.clone(), note));
                        changed = true;
                    }
                }

                if changed || force {
                    order.version += 1;
                    order.updated_at = Utc::now();
                    store.replace_order_if_version(&order, expected).await?;
                }
                Ok((order, moved))
            },
        )
        .await?;

        let (order, moved) = outcome;
        let moved = moved.map(|(from, to, slug, note)| {
            record_stage_transition(&slug, "auto");
            info!(from = %from, to = %to, "Order stage advanced from sub-task state");
            self.activity.record(
                ActivityLog::new(
                    &order.company_id,
                    &order.id,
                    &order.order_number,
                    ActivityType::StageChanged,
                    "Stage Changed",
                    format!("Stage changed from \"{}\" to \"{}\" ({})", from, to, note),
                )
                .by(&actor.id, &actor.name)
                .at_stage(&order.stage_id, &order.stage_name)
                .change(Some(from.clone()), Some(to.clone())),
            );
            (from, to)
        });

        Ok(SyncOutcome { order, moved })
    }

    /// Re-derive rollup and automatic stage without a triggering mutation.
    pub async fn reconcile_order(&self, actor: &Actor, order_id: &str) -> Result<SyncOutcome, AppError> {
        let result = self
            .sync_order_with_sub_tasks(actor, order_id, true, false)
            .await;
        record_operation("reconcile_order", &result);
        result
    }

    fn log(&self, entry: ActivityLog) {
        self.activity.record(entry);
    }
}

pub(crate) fn compute_rollup(tasks: &[SubTask]) -> SubTaskRollup {
    let total = tasks.len() as i32;
    let completed = tasks.iter().filter(|t| t.is_completed()).count() as i32;
    SubTaskRollup {
        has_sub_tasks: total > 0,
        total_sub_tasks: total,
        completed_sub_tasks: completed,
        sub_task_progress: progress_percent(completed, total),
    }
}

/// The stage the sub-task set calls for, when it differs from the current one.
pub(crate) fn plan_auto_stage<'a>(
    order: &Order,
    tasks: &[SubTask],
    stages: &'a [Stage],
) -> Option<(&'a Stage, &'static str)> {
    let current_is_final = stages
        .iter()
        .find(|s| s.id == order.stage_id)
        .is_some_and(|s| s.is_final);
    if current_is_final {
        return None;
    }

    let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
    let (target, note) = resolve_target(classify_sub_tasks(&statuses)?, stages)?;
    (target.id != order.stage_id).then_some((target, note))
}

/// Engineer named on automatic history entries: the order's engineer, or the only
/// sub-task assignee when every sub-task shares one.
fn history_assignee(order: &Order, tasks: &[SubTask]) -> Option<String> {
    if let Some(name) = order.engineer_name() {
        return Some(name.to_string());
    }
    let first = tasks.first()?;
    tasks
        .iter()
        .all(|t| t.assigned_to == first.assigned_to)
        .then(|| first.assigned_to_name.clone())
}

pub(crate) fn push_stage(
    order: &mut Order,
    stage: &Stage,
    actor: &Actor,
    assigned_to: Option<String>,
    notes: &str,
) {
    order.stage_id = stage.id.clone();
    order.stage_name = stage.name.clone();
    order.stage_slug = stage.slug.clone();
    order.stage_history.append(StageHistoryEntry {
        stage_id: stage.id.clone(),
        stage_name: stage.name.clone(),
        stage_slug: stage.slug.clone(),
        changed_by: actor.id.clone(),
        changed_by_name: actor.name.clone(),
        assigned_to,
        changed_at: Utc::now(),
        notes: notes.to_string(),
    });
}
