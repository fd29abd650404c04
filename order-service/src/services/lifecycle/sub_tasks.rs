use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::retry::retry_on_conflict;
use std::collections::HashMap;
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;
use validator::Validate;

use super::{LifecycleEngine, SyncOutcome};
use crate::models::{
    ActivityLog, ActivityType, Actor, AppendLog, PartUsed, SubTask, SubTaskStatus, SubTaskUpdate,
    UpdateType,
};
use crate::services::metrics::{record_conflict_retry, record_operation};
use crate::services::store::{load_order, load_sub_task};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSubTask {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    #[validate(length(min = 1, message = "Assignee is required"))]
    pub assigned_to: String,
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartInput {
    pub part_name: String,
    pub quantity: i32,
    pub cost: Decimal,
}

/// Field edits; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SubTaskChanges {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i32>,
    pub blocked_by: Option<String>,
    pub amount: Option<Decimal>,
    pub is_paid: Option<bool>,
    #[serde(default)]
    pub parts_used: Vec<PartInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubTaskNode {
    #[serde(flatten)]
    pub task: SubTask,
    pub children: Vec<SubTaskNode>,
}

fn entry(
    actor: &Actor,
    note: String,
    update_type: UpdateType,
    old_value: Option<String>,
    new_value: Option<String>,
) -> SubTaskUpdate {
    SubTaskUpdate {
        note,
        added_by: actor.id.clone(),
        added_by_name: actor.name.clone(),
        timestamp: Utc::now(),
        update_type,
        old_value,
        new_value,
    }
}

/// Apply field edits, logging one update per changed field. Returns the changed field names.
fn apply_changes(
    task: &mut SubTask,
    changes: &SubTaskChanges,
    actor: &Actor,
) -> Result<Vec<&'static str>, AppError> {
    if task.status == SubTaskStatus::Completed && changes.progress.is_some_and(|p| p != 100) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Progress of a completed sub-task is fixed at 100%"
        )));
    }

    let mut changed = Vec::new();
    let mut log = |task: &mut SubTask, field: &'static str, note: String, old: String, new: String| {
        task.updates.append(entry(actor, note, UpdateType::ProgressUpdate, Some(old), Some(new)));
        changed.push(field);
    };

    if let Some(title) = changes.title.as_ref().filter(|t| **t != task.title) {
        let old = std::mem::replace(&mut task.title, title.clone());
        log(task, "title", "Title updated".into(), old, title.clone());
    }
    if let Some(description) = &changes.description {
        if task.description.as_ref() != Some(description) {
            let old = task.description.replace(description.clone()).unwrap_or_default();
            log(task, "description", "Description updated".into(), old, description.clone());
        }
    }
    if let Some(progress) = changes.progress.filter(|p| *p != task.progress) {
        let old = std::mem::replace(&mut task.progress, progress);
        log(
            task,
            "progress",
            format!("Progress updated to {}%", progress),
            old.to_string(),
            progress.to_string(),
        );
    }
    if let Some(blocked_by) = &changes.blocked_by {
        if task.blocked_by.as_ref() != Some(blocked_by) {
            let old = task.blocked_by.replace(blocked_by.clone()).unwrap_or_default();
            log(task, "blocked_by", format!("Blocked by: {}", blocked_by), old, blocked_by.clone());
        }
    }
    if let Some(amount) = changes.amount.filter(|a| *a != task.amount) {
        let old = std::mem::replace(&mut task.amount, amount);
        log(
            task,
            "amount",
            format!("Amount updated to ₹{}", amount),
            old.to_string(),
            amount.to_string(),
        );
    }
    if let Some(is_paid) = changes.is_paid.filter(|p| *p != task.is_paid) {
        let old = std::mem::replace(&mut task.is_paid, is_paid);
        let note = if is_paid { "Marked as paid" } else { "Marked as unpaid" };
        log(task, "is_paid", note.into(), old.to_string(), is_paid.to_string());
    }
    for part in &changes.parts_used {
        task.parts_used.append(PartUsed {
            part_name: part.part_name.clone(),
            quantity: part.quantity,
            cost: part.cost,
            added_at: Utc::now(),
        });
        log(
            task,
            "parts_used",
            format!(
                "Part added: {} (Qty: {}, Cost: ₹{})",
                part.part_name, part.quantity, part.cost
            ),
            String::new(),
            part.part_name.clone(),
        );
    }

    changed.dedup();
    Ok(changed)
}

fn build_tree(tasks: Vec<SubTask>) -> Vec<SubTaskNode> {
    let mut by_parent: HashMap<Option<String>, Vec<SubTask>> = HashMap::new();
    for task in tasks {
        by_parent
            .entry(task.parent_task_id.clone())
            .or_default()
            .push(task);
    }

    fn attach(
        parent: Option<String>,
        by_parent: &mut HashMap<Option<String>, Vec<SubTask>>,
    ) -> Vec<SubTaskNode> {
        by_parent
            .remove(&parent)
            .unwrap_or_default()
            .into_iter()
            .map(|task| {
                let children = attach(Some(task.id.clone()), by_parent);
                SubTaskNode { task, children }
            })
            .collect()
    }

    let mut roots = attach(None, &mut by_parent);
    // Children of deleted parents surface at the top level.
    let orphans: Vec<SubTask> = by_parent.into_values().flatten().collect();
    roots.extend(orphans.into_iter().map(|task| SubTaskNode {
        task,
        children: Vec::new(),
    }));
    roots
}

impl LifecycleEngine {
    async fn modify_sub_task<T, F>(
        &self,
        operation: &'static str,
        company_id: &str,
        sub_task_id: &str,
        mutate: F,
    ) -> Result<(SubTask, Option<(T, SubTask)>), AppError>
    where
        F: Fn(&mut SubTask) -> Result<Option<T>, AppError> + Send + Sync,
        T: Send,
    {
        let store = self.store.as_ref();
        let mutate = &mutate;
        retry_on_conflict(
            &self.retry,
            operation,
            |_| record_conflict_retry(operation),
            move || async move {
                let mut task = load_sub_task(store, company_id, sub_task_id).await?;
                let before = task.clone();
                let expected = task.version;
                match mutate(&mut task)? {
                    None => Ok((task, None)),
                    Some(out) => {
                        task.version += 1;
                        task.updated_at = Utc::now();
                        store.replace_sub_task_if_version(&task, expected).await?;
                        Ok((task, Some((out, before))))
                    }
                }
            },
        )
        .await
    }

    /// Re-derive the order after a committed sub-task write.
    ///
    /// When the order cannot be brought in line, the sub-task is put back to `before`
    /// and the sync error is returned, so a failed operation leaves nothing applied.
    async fn sync_or_revert(
        &self,
        actor: &Actor,
        before: SubTask,
        after: &SubTask,
        auto_stage: bool,
        force: bool,
    ) -> Result<SyncOutcome, AppError> {
        let err = match self
            .sync_order_with_sub_tasks(actor, &after.order_id, auto_stage, force)
            .await
        {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        let mut restored = before;
        restored.version = after.version + 1;
        restored.updated_at = Utc::now();
        match self
            .store
            .replace_sub_task_if_version(&restored, after.version)
            .await
        {
            Ok(()) => {
                warn!(error = %err, sub_task_id = %after.id, "Order sync failed, sub-task change reverted");
                // Siblings may have synced against the reverted state in the meantime.
                if let Err(resync) = self
                    .sync_order_with_sub_tasks(actor, &after.order_id, auto_stage, false)
                    .await
                {
                    warn!(error = %resync, order_id = %after.order_id, "Order resync after revert failed");
                }
            }
            Err(revert) => error!(
                error = %revert,
                sub_task_id = %after.id,
                "Failed to revert sub-task after order sync failure"
            ),
        }
        Err(err)
    }

    fn sub_task_event(&self, task: &SubTask, actor: &Actor, kind: ActivityType, title: &str, description: String) -> ActivityLog {
        ActivityLog::new(
            &task.company_id,
            &task.order_id,
            &task.order_number,
            kind,
            title,
            description,
        )
        .by(&actor.id, &actor.name)
        .for_sub_task(&task.id, &task.title)
    }

    #[instrument(skip(self, actor, input), fields(order_id = %order_id, sub_task_id))]
    pub async fn create_sub_task(
        &self,
        actor: &Actor,
        order_id: &str,
        input: NewSubTask,
    ) -> Result<SubTask, AppError> {
        let result: Result<SubTask, AppError> = async {
            input.validate()?;
            if input.amount < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!("Amount cannot be negative")));
            }

            let order = load_order(self.store.as_ref(), &actor.company_id, order_id).await?;
            let assignee = self
                .directory
                .find_active_by_id(&actor.company_id, &input.assigned_to)
                .await?;

            let task_level = match input.parent_task_id.as_deref() {
                Some(parent_id) => {
                    let parent = load_sub_task(self.store.as_ref(), &actor.company_id, parent_id)
                        .await?;
                    if parent.order_id != order.id {
                        return Err(AppError::BadRequest(anyhow::anyhow!(
                            "Parent sub-task {} belongs to a different order",
                            parent_id
                        )));
                    }
                    parent.task_level + 1
                }
                None => 0,
            };

            let mut dependencies: Vec<String> = Vec::new();
            for dep_id in &input.dependencies {
                if dependencies.contains(dep_id) {
                    continue;
                }
                let dep = load_sub_task(self.store.as_ref(), &actor.company_id, dep_id).await?;
                if dep.order_id != order.id {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Dependency {} belongs to a different order",
                        dep_id
                    )));
                }
                dependencies.push(dep.id);
            }

            let now = Utc::now();
            let mut updates = AppendLog::new();
            updates.append(entry(
                actor,
                input
                    .notes
                    .clone()
                    .unwrap_or_else(|| format!("Sub-task created and assigned to {}", assignee.full_name)),
                UpdateType::Assignment,
                None,
                Some(assignee.full_name.clone()),
            ));

            let task = SubTask {
                id: Uuid::new_v4().to_string(),
                company_id: order.company_id.clone(),
                order_id: order.id.clone(),
                order_number: order.order_number.clone(),
                parent_task_id: input.parent_task_id.clone(),
                task_level,
                title: input.title.clone(),
                description: input.description.clone(),
                task_type: input.task_type.clone(),
                assigned_to: assignee.id.clone(),
                assigned_to_name: assignee.full_name.clone(),
                assigned_at: now,
                status: SubTaskStatus::Pending,
                progress: 0,
                started_at: None,
                completed_at: None,
                amount: input.amount,
                is_paid: false,
                dependencies,
                blocked_by: None,
                parts_used: AppendLog::new(),
                updates,
                created_by: actor.id.clone(),
                created_by_name: actor.name.clone(),
                created_at: now,
                updated_at: now,
                version: 1,
                is_deleted: false,
                deleted_at: None,
            };

            Span::current().record("sub_task_id", task.id.as_str());
            self.store.insert_sub_task(&task).await?;
            let mut unborn = task.clone();
            unborn.is_deleted = true;
            unborn.deleted_at = Some(now);
            self.sync_or_revert(actor, unborn, &task, true, true).await?;

            self.log(
                self.sub_task_event(
                    &task,
                    actor,
                    ActivityType::SubtaskCreated,
                    "Sub-task Created",
                    format!(
                        "Sub-task \"{}\" created and assigned to {}",
                        task.title, assignee.full_name
                    ),
                )
                .assigned_to(&assignee.full_name),
            );
            info!(task_level, "Sub-task created");
            Ok(task)
        }
        .await;
        record_operation("create_sub_task", &result);
        result
    }

    #[instrument(skip(self, actor, notes), fields(sub_task_id = %sub_task_id))]
    pub async fn update_sub_task_status(
        &self,
        actor: &Actor,
        sub_task_id: &str,
        status: &str,
        notes: Option<String>,
    ) -> Result<SubTask, AppError> {
        let result: Result<SubTask, AppError> = async {
            let status: SubTaskStatus = status
                .parse()
                .map_err(|e| AppError::BadRequest(anyhow::Error::new(e)))?;
            let notes = &notes;

            let (task, previous) = self
                .modify_sub_task("update_sub_task_status", &actor.company_id, sub_task_id, |task| {
                    let Some(previous) = task.transition(status, Utc::now()) else {
                        return Ok(None);
                    };
                    let note = notes.clone().unwrap_or_else(|| {
                        format!("Status changed from {} to {}", previous.as_str(), status.as_str())
                    });
                    let update_type = if status == SubTaskStatus::Completed {
                        UpdateType::Completion
                    } else {
                        UpdateType::StatusChange
                    };
                    task.updates.append(entry(
                        actor,
                        note,
                        update_type,
                        Some(previous.as_str().to_string()),
                        Some(status.as_str().to_string()),
                    ));
                    Ok(Some(previous))
                })
                .await?;

            let Some((previous, before)) = previous else {
                return Ok(task);
            };

            self.sync_or_revert(actor, before, &task, true, true).await?;

            self.log(
                self.sub_task_event(
                    &task,
                    actor,
                    ActivityType::SubtaskStatusChanged,
                    "Sub-task Status Changed",
                    format!(
                        "Sub-task \"{}\" status changed from {} to {}",
                        task.title,
                        previous.as_str(),
                        status.as_str()
                    ),
                )
                .change(
                    Some(previous.as_str().to_string()),
                    Some(status.as_str().to_string()),
                ),
            );
            Ok(task)
        }
        .await;
        record_operation("update_sub_task_status", &result);
        result
    }

    #[instrument(skip(self, actor, notes), fields(sub_task_id = %sub_task_id, assignee_id = %assignee_id))]
    pub async fn reassign_sub_task(
        &self,
        actor: &Actor,
        sub_task_id: &str,
        assignee_id: &str,
        notes: Option<String>,
    ) -> Result<SubTask, AppError> {
        let result: Result<SubTask, AppError> = async {
            let assignee = self
                .directory
                .find_active_by_id(&actor.company_id, assignee_id)
                .await?;
            let (assignee, notes) = (&assignee, &notes);

            let (task, previous) = self
                .modify_sub_task("reassign_sub_task", &actor.company_id, sub_task_id, |task| {
                    if task.assigned_to == assignee.id {
                        return Ok(None);
                    }
                    let previous = std::mem::replace(
                        &mut task.assigned_to_name,
                        assignee.full_name.clone(),
                    );
                    task.assigned_to = assignee.id.clone();
                    task.assigned_at = Utc::now();
                    let note = notes.clone().unwrap_or_else(|| {
                        format!("Re-assigned from {} to {}", previous, assignee.full_name)
                    });
                    task.updates.append(entry(
                        actor,
                        note,
                        UpdateType::Assignment,
                        Some(previous.clone()),
                        Some(assignee.full_name.clone()),
                    ));
                    Ok(Some(previous))
                })
                .await?;

            let Some((previous, before)) = previous else {
                return Ok(task);
            };

            self.sync_or_revert(actor, before, &task, false, true).await?;

            self.log(
                self.sub_task_event(
                    &task,
                    actor,
                    ActivityType::SubtaskReassigned,
                    "Sub-task Reassigned",
                    format!(
                        "Sub-task \"{}\" reassigned from {} to {}",
                        task.title, previous, assignee.full_name
                    ),
                )
                .assigned_to(&assignee.full_name)
                .change(Some(previous), Some(assignee.full_name.clone())),
            );
            Ok(task)
        }
        .await;
        record_operation("reassign_sub_task", &result);
        result
    }

    #[instrument(skip(self, actor, changes), fields(sub_task_id = %sub_task_id))]
    pub async fn update_sub_task(
        &self,
        actor: &Actor,
        sub_task_id: &str,
        changes: SubTaskChanges,
    ) -> Result<SubTask, AppError> {
        let result: Result<SubTask, AppError> = async {
            changes.validate()?;
            if changes.amount.is_some_and(|a| a < Decimal::ZERO) {
                return Err(AppError::BadRequest(anyhow::anyhow!("Amount cannot be negative")));
            }
            for part in &changes.parts_used {
                if part.part_name.trim().is_empty() || part.quantity <= 0 || part.cost < Decimal::ZERO {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Parts need a name, a positive quantity and a non-negative cost"
                    )));
                }
            }
            let changes = &changes;

            let (task, fields) = self
                .modify_sub_task("update_sub_task", &actor.company_id, sub_task_id, |task| {
                    let fields = apply_changes(task, changes, actor)?;
                    Ok((!fields.is_empty()).then_some(fields))
                })
                .await?;

            let Some((fields, before)) = fields else {
                return Ok(task);
            };

            self.sync_or_revert(actor, before, &task, false, true).await?;

            self.log(self.sub_task_event(
                &task,
                actor,
                ActivityType::SubtaskUpdated,
                "Sub-task Updated",
                format!("Sub-task \"{}\" updated: {}", task.title, fields.join(", ")),
            ));
            Ok(task)
        }
        .await;
        record_operation("update_sub_task", &result);
        result
    }

    /// Append a free-form entry to the sub-task's history.
    #[instrument(skip(self, actor, note), fields(sub_task_id = %sub_task_id))]
    pub async fn add_sub_task_update(
        &self,
        actor: &Actor,
        sub_task_id: &str,
        note: &str,
        update_type: &str,
    ) -> Result<SubTask, AppError> {
        let update_type: UpdateType = update_type
            .parse()
            .map_err(|e| AppError::BadRequest(anyhow::Error::new(e)))?;
        let note = note.trim();
        if note.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Note cannot be empty")));
        }

        let (task, applied) = self
            .modify_sub_task("add_sub_task_update", &actor.company_id, sub_task_id, |task| {
                task.updates
                    .append(entry(actor, note.to_string(), update_type, None, None));
                Ok(Some(()))
            })
            .await?;

        if let Some(((), before)) = applied {
            self.sync_or_revert(actor, before, &task, false, false).await?;
        }

        self.log(self.sub_task_event(
            &task,
            actor,
            ActivityType::SubtaskUpdated,
            "Sub-task Comment",
            format!("Comment added to sub-task \"{}\": {}", task.title, note),
        ));
        Ok(task)
    }

    /// Soft-delete a childless sub-task and refresh the order's rollup.
    #[instrument(skip(self, actor), fields(sub_task_id = %sub_task_id))]
    pub async fn delete_sub_task(&self, actor: &Actor, sub_task_id: &str) -> Result<(), AppError> {
        let result: Result<(), AppError> = async {
            let task = load_sub_task(self.store.as_ref(), &actor.company_id, sub_task_id).await?;
            let children = self
                .store
                .list_sub_tasks(&task.order_id)
                .await?
                .into_iter()
                .filter(|t| t.parent_task_id.as_deref() == Some(sub_task_id))
                .count();
            if children > 0 {
                return Err(AppError::PreconditionFailed(anyhow::anyhow!(
                    "Cannot delete sub-task with {} active child sub-task(s)",
                    children
                )));
            }

            let (task, applied) = self
                .modify_sub_task("delete_sub_task", &actor.company_id, sub_task_id, |task| {
                    let now = Utc::now();
                    task.is_deleted = true;
                    task.deleted_at = Some(now);
                    task.updates.append(entry(
                        actor,
                        "Sub-task deleted".to_string(),
                        UpdateType::StatusChange,
                        Some(task.status.as_str().to_string()),
                        None,
                    ));
                    Ok(Some(()))
                })
                .await?;

            if let Some(((), before)) = applied {
                self.sync_or_revert(actor, before, &task, false, true).await?;
            }

            self.log(self.sub_task_event(
                &task,
                actor,
                ActivityType::SubtaskDeleted,
                "Sub-task Deleted",
                format!("Sub-task \"{}\" deleted", task.title),
            ));
            Ok(())
        }
        .await;
        record_operation("delete_sub_task", &result);
        result
    }

    pub async fn get_sub_task(&self, actor: &Actor, sub_task_id: &str) -> Result<SubTask, AppError> {
        load_sub_task(self.store.as_ref(), &actor.company_id, sub_task_id).await
    }

    /// Live sub-tasks of an order as a forest of parent/child nodes.
    pub async fn list_sub_tasks(
        &self,
        actor: &Actor,
        order_id: &str,
    ) -> Result<Vec<SubTaskNode>, AppError> {
        load_order(self.store.as_ref(), &actor.company_id, order_id).await?;
        let tasks = self.store.list_sub_tasks(order_id).await?;
        Ok(build_tree(tasks))
    }

    /// History entries, newest first.
    pub async fn sub_task_history(
        &self,
        actor: &Actor,
        sub_task_id: &str,
    ) -> Result<Vec<SubTaskUpdate>, AppError> {
        let task = load_sub_task(self.store.as_ref(), &actor.company_id, sub_task_id).await?;
        Ok(task.updates.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, parent: Option<&str>) -> SubTask {
        let now = Utc::now();
        SubTask {
            id: id.into(),
            company_id: "c".into(),
            order_id: "o".into(),
            order_number: "ORD-2026-00001".into(),
            parent_task_id: parent.map(str::to_string),
            task_level: if parent.is_some() { 1 } else { 0 },
            title: format!("Task {}", id),
            description: None,
            task_type: None,
            assigned_to: "eng".into(),
            assigned_to_name: "Eng".into(),
            assigned_at: now,
            status: SubTaskStatus::Pending,
            progress: 0,
            started_at: None,
            completed_at: None,
            amount: Decimal::ZERO,
            is_paid: false,
            dependencies: vec![],
            blocked_by: None,
            parts_used: AppendLog::new(),
            updates: AppendLog::new(),
            created_by: "u".into(),
            created_by_name: "User".into(),
            created_at: now,
            updated_at: now,
            version: 1,
            is_deleted: false,
            deleted_at: None,
        }
    }

    fn actor() -> Actor {
        Actor::new("c", "u", "User")
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let tree = build_tree(vec![task("a", None), task("b", Some("a")), task("c", None)]);
        assert_eq!(tree.len(), 2);
        let a = tree.iter().find(|n| n.task.id == "a").unwrap();
        assert_eq!(a.children.len(), 1);
        assert_eq!(a.children[0].task.id, "b");
    }

    #[test]
    fn each_changed_field_is_logged() {
        let mut t = task("a", None);
        let changes = SubTaskChanges {
            progress: Some(40),
            title: Some("Task a".into()),
            parts_used: vec![PartInput {
                part_name: "Battery".into(),
                quantity: 1,
                cost: Decimal::from(900),
            }],
            ..Default::default()
        };

        let fields = apply_changes(&mut t, &changes, &actor()).unwrap();

        assert_eq!(fields, vec!["progress", "parts_used"]);
        assert_eq!(t.progress, 40);
        assert_eq!(t.parts_used.len(), 1);
        let notes: Vec<_> = t.updates.iter().map(|u| u.note.as_str()).collect();
        assert_eq!(
            notes,
            vec!["Progress updated to 40%", "Part added: Battery (Qty: 1, Cost: ₹900)"]
        );
    }

    #[test]
    fn unchanged_fields_are_ignored() {
        let mut t = task("a", None);
        let changes = SubTaskChanges {
            progress: Some(0),
            is_paid: Some(false),
            ..Default::default()
        };
        assert!(apply_changes(&mut t, &changes, &actor()).unwrap().is_empty());
        assert!(t.updates.is_empty());
    }

    #[test]
    fn completed_task_keeps_full_progress() {
        let mut t = task("a", None);
        t.transition(SubTaskStatus::Completed, Utc::now());
        let lowered = SubTaskChanges {
            progress: Some(40),
            title: Some("Renamed".into()),
            ..Default::default()
        };

        let err = apply_changes(&mut t, &lowered, &actor()).unwrap_err();

        assert_eq!(err.kind(), "validation_error");
        assert_eq!(t.progress, 100);
        assert_eq!(t.title, "Task a");
        assert!(t.updates.is_empty());

        let unchanged = SubTaskChanges {
            progress: Some(100),
            ..Default::default()
        };
        assert!(apply_changes(&mut t, &unchanged, &actor()).unwrap().is_empty());
    }
}
