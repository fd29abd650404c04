//! Engineer task list entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::order::{Order, Priority};
use super::sub_task::{SubTask, SubTaskStatus};

/// An item on an engineer's work list: either a delegated sub-task or an order
/// assigned to the engineer directly.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    SubTask(SubTaskRef),
    Order(OrderRef),
}

impl WorkItem {
    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            WorkItem::SubTask(s) => s.updated_at,
            WorkItem::Order(o) => o.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubTaskRef {
    pub sub_task_id: String,
    pub order_id: String,
    pub order_number: String,
    pub title: String,
    pub status: SubTaskStatus,
    pub progress: i32,
    pub task_level: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<&SubTask> for SubTaskRef {
    fn from(task: &SubTask) -> Self {
        Self {
            sub_task_id: task.id.clone(),
            order_id: task.order_id.clone(),
            order_number: task.order_number.clone(),
            title: task.title.clone(),
            status: task.status,
            progress: task.progress,
            task_level: task.task_level,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRef {
    pub order_id: String,
    pub order_number: String,
    pub customer_name: String,
    pub stage_name: String,
    pub stage_slug: String,
    pub priority: Priority,
    pub sub_task_progress: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderRef {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            customer_name: order.customer.name.clone(),
            stage_name: order.stage_name.clone(),
            stage_slug: order.stage_slug.clone(),
            priority: order.priority,
            sub_task_progress: order.rollup.sub_task_progress,
            updated_at: order.updated_at,
        }
    }
}
