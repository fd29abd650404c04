//! Pipeline stage catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PENDING: &str = "pending";
pub const ASSIGNED: &str = "assigned";
pub const IN_PROGRESS: &str = "in_progress";
pub const QUALITY_CHECK: &str = "quality_check";
pub const COMPLETED: &str = "completed";
pub const DELIVERED: &str = "delivered";
pub const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(rename = "_id")]
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub sequence_order: i32,
    /// Terminal stages never receive an automatic transition.
    pub is_final: bool,
    pub is_active: bool,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Stage {
    pub fn new(name: &str, sequence_order: i32, is_final: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            slug: slugify(name),
            name: name.to_string(),
            description: None,
            sequence_order,
            is_final,
            is_active: true,
            color: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }
}

/// Lowercase the display name and join whitespace-separated words with `_`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Catalog installed when the stage collection is empty.
pub fn default_catalog() -> Vec<Stage> {
    vec![
        Stage::new("Pending", 1, false).with_color("#9E9E9E"),
        Stage::new("Assigned", 2, false).with_color("#2196F3"),
        Stage::new("In Progress", 3, false).with_color("#FF9800"),
        Stage::new("Quality Check", 4, false).with_color("#9C27B0"),
        Stage::new("Completed", 5, false).with_color("#4CAF50"),
        Stage::new("Delivered", 6, true).with_color("#009688"),
        Stage::new("Cancelled", 7, true).with_color("#F44336"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_matches_catalog_constants() {
        assert_eq!(slugify("In Progress"), IN_PROGRESS);
        assert_eq!(slugify("  Quality   Check "), QUALITY_CHECK);
        assert_eq!(slugify("Pending"), PENDING);
    }

    #[test]
    fn default_catalog_has_unique_orders_and_two_terminal_stages() {
        let catalog = default_catalog();
        let mut orders: Vec<_> = catalog.iter().map(|s| s.sequence_order).collect();
        orders.dedup();
        assert_eq!(orders.len(), catalog.len());

        let finals: Vec<_> = catalog
            .iter()
            .filter(|s| s.is_final)
            .map(|s| s.slug.as_str())
            .collect();
        assert_eq!(finals, vec![DELIVERED, CANCELLED]);
    }
}
