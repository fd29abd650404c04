use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    OrderCreated,
    OrderUpdated,
    OrderAssigned,
    OrderReassigned,
    StageChanged,
    SubtaskCreated,
    SubtaskUpdated,
    SubtaskStatusChanged,
    SubtaskReassigned,
    SubtaskDeleted,
    PaymentAdded,
    PaymentDeleted,
    InvoiceGenerated,
    NoteAdded,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::OrderCreated => "order_created",
            ActivityType::OrderUpdated => "order_updated",
            ActivityType::OrderAssigned => "order_assigned",
            ActivityType::OrderReassigned => "order_reassigned",
            ActivityType::StageChanged => "stage_changed",
            ActivityType::SubtaskCreated => "subtask_created",
            ActivityType::SubtaskUpdated => "subtask_updated",
            ActivityType::SubtaskStatusChanged => "subtask_status_changed",
            ActivityType::SubtaskReassigned => "subtask_reassigned",
            ActivityType::SubtaskDeleted => "subtask_deleted",
            ActivityType::PaymentAdded => "payment_added",
            ActivityType::PaymentDeleted => "payment_deleted",
            ActivityType::InvoiceGenerated => "invoice_generated",
            ActivityType::NoteAdded => "note_added",
        }
    }
}

/// Audit trail entry for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(rename = "_id")]
    pub id: String,
    pub company_id: String,
    pub order_id: String,
    pub order_number: String,
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub performed_by: String,
    pub performed_by_name: String,
    pub stage_id: Option<String>,
    pub stage_name: Option<String>,
    pub sub_task_id: Option<String>,
    pub sub_task_title: Option<String>,
    pub assigned_to: Option<String>,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(
        company_id: &str,
        order_id: &str,
        order_number: &str,
        activity_type: ActivityType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            order_id: order_id.to_string(),
            order_number: order_number.to_string(),
            activity_type,
            title: title.into(),
            description: description.into(),
            performed_by: String::new(),
            performed_by_name: String::new(),
            stage_id: None,
            stage_name: None,
            sub_task_id: None,
            sub_task_title: None,
            assigned_to: None,
            previous_value: None,
            new_value: None,
            metadata: None,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn by(mut self, id: &str, name: &str) -> Self {
        self.performed_by = id.to_string();
        self.performed_by_name = name.to_string();
        self
    }

    pub fn at_stage(mut self, stage_id: &str, stage_name: &str) -> Self {
        self.stage_id = Some(stage_id.to_string());
        self.stage_name = Some(stage_name.to_string());
        self
    }

    pub fn for_sub_task(mut self, sub_task_id: &str, title: &str) -> Self {
        self.sub_task_id = Some(sub_task_id.to_string());
        self.sub_task_title = Some(title.to_string());
        self
    }

    pub fn assigned_to(mut self, name: &str) -> Self {
        self.assigned_to = Some(name.to_string());
        self
    }

    pub fn change(mut self, previous: Option<String>, new: Option<String>) -> Self {
        self.previous_value = previous;
        self.new_value = new;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
