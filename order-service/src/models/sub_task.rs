//! Delegated work items nested under an order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::append_log::AppendLog;
use super::InvalidVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Blocked,
    OnHold,
}

impl SubTaskStatus {
    pub const ALL: &'static str = "pending, in_progress, completed, cancelled, blocked, on_hold";

    pub fn as_str(&self) -> &'static str {
        match self {
            SubTaskStatus::Pending => "pending",
            SubTaskStatus::InProgress => "in_progress",
            SubTaskStatus::Completed => "completed",
            SubTaskStatus::Cancelled => "cancelled",
            SubTaskStatus::Blocked => "blocked",
            SubTaskStatus::OnHold => "on_hold",
        }
    }
}

impl FromStr for SubTaskStatus {
    type Err = InvalidVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubTaskStatus::Pending),
            "in_progress" => Ok(SubTaskStatus::InProgress),
            "completed" => Ok(SubTaskStatus::Completed),
            "cancelled" => Ok(SubTaskStatus::Cancelled),
            "blocked" => Ok(SubTaskStatus::Blocked),
            "on_hold" => Ok(SubTaskStatus::OnHold),
            other => Err(InvalidVariant::new("sub-task status", other, Self::ALL)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Comment,
    StatusChange,
    Assignment,
    Completion,
    ProgressUpdate,
}

impl FromStr for UpdateType {
    type Err = InvalidVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comment" => Ok(UpdateType::Comment),
            "status_change" => Ok(UpdateType::StatusChange),
            "assignment" => Ok(UpdateType::Assignment),
            "completion" => Ok(UpdateType::Completion),
            "progress_update" => Ok(UpdateType::ProgressUpdate),
            other => Err(InvalidVariant::new(
                "update type",
                other,
                "comment, status_change, assignment, completion, progress_update",
            )),
        }
    }
}

/// One entry in a sub-task's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTaskUpdate {
    pub note: String,
    pub added_by: String,
    pub added_by_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartUsed {
    pub part_name: String,
    pub quantity: i32,
    pub cost: Decimal,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    #[serde(rename = "_id")]
    pub id: String,
    pub company_id: String,
    pub order_id: String,
    pub order_number: String,
    pub parent_task_id: Option<String>,
    /// Depth below the order; fixed at creation.
    pub task_level: i32,
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub assigned_to: String,
    pub assigned_to_name: String,
    pub assigned_at: DateTime<Utc>,
    pub status: SubTaskStatus,
    pub progress: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub amount: Decimal,
    pub is_paid: bool,
    pub dependencies: Vec<String>,
    pub blocked_by: Option<String>,
    pub parts_used: AppendLog<PartUsed>,
    pub updates: AppendLog<SubTaskUpdate>,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SubTask {
    /// Apply a status change with its timestamp side effects.
    ///
    /// Returns the previous status, or `None` when the status is unchanged.
    pub fn transition(&mut self, status: SubTaskStatus, now: DateTime<Utc>) -> Option<SubTaskStatus> {
        if self.status == status {
            return None;
        }

        let previous = self.status;
        self.status = status;

        match status {
            SubTaskStatus::InProgress if self.started_at.is_none() => {
                self.started_at = Some(now);
            }
            SubTaskStatus::Completed => {
                self.completed_at = Some(now);
                self.progress = 100;
            }
            _ => {}
        }

        Some(previous)
    }

    pub fn is_completed(&self) -> bool {
        self.status == SubTaskStatus::Completed
    }
}
