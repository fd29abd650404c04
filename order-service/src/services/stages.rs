//! Stage registry: read-mostly catalog of pipeline stages.

use service_core::error::AppError;
use std::sync::Arc;

use crate::models::stage::{self, Stage};
use crate::models::SubTaskStatus;
use crate::services::store::Store;

#[derive(Clone)]
pub struct StageRegistry {
    store: Arc<dyn Store>,
}

impl StageRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Install the default catalog when no stages exist yet.
    pub async fn ensure_seeded(&self) -> Result<(), AppError> {
        if self.store.list_stages().await?.is_empty() {
            self.store.insert_stages(&stage::default_catalog()).await?;
            tracing::info!("Seeded default stage catalog");
        }
        Ok(())
    }

    /// Active stages in pipeline order.
    pub async fn list_ordered(&self) -> Result<Vec<Stage>, AppError> {
        Ok(self
            .store
            .list_stages()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .collect())
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Stage>, AppError> {
        Ok(self
            .list_ordered()
            .await?
            .into_iter()
            .find(|s| s.slug == slug))
    }

    /// Any stage with this id, active or not.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Stage>, AppError> {
        Ok(self
            .store
            .list_stages()
            .await?
            .into_iter()
            .find(|s| s.id == id))
    }

    /// The active stage with the lowest sequence order.
    pub async fn find_initial(&self) -> Result<Stage, AppError> {
        self.list_ordered().await?.into_iter().next().ok_or_else(|| {
            AppError::PreconditionFailed(anyhow::anyhow!(
                "No stages configured. Seed the stage catalog first."
            ))
        })
    }
}

/// Where a set of sub-task statuses says the order should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoTarget {
    /// Every sub-task is completed.
    WorkDone,
    InProgress(&'static str),
}

/// Classify the current sub-task set. `None` means no automatic transition applies.
pub fn classify_sub_tasks(statuses: &[SubTaskStatus]) -> Option<AutoTarget> {
    if statuses.is_empty() {
        return None;
    }

    let all_completed = statuses.iter().all(|s| *s == SubTaskStatus::Completed);
    let has_in_progress = statuses.iter().any(|s| *s == SubTaskStatus::InProgress);
    let any_completed = statuses.iter().any(|s| *s == SubTaskStatus::Completed);
    let all_pending = statuses.iter().all(|s| *s == SubTaskStatus::Pending);

    if all_completed {
        Some(AutoTarget::WorkDone)
    } else if has_in_progress {
        Some(AutoTarget::InProgress("Sub-tasks in progress"))
    } else if any_completed {
        Some(AutoTarget::InProgress("Sub-tasks partially completed"))
    } else if all_pending {
        Some(AutoTarget::InProgress("Sub-tasks created and assigned"))
    } else {
        None
    }
}

/// Resolve a classification to a concrete active stage and a history note.
pub fn resolve_target<'a>(target: AutoTarget, active: &'a [Stage]) -> Option<(&'a Stage, &'static str)> {
    let by_slug = |slug: &str| active.iter().find(|s| s.slug == slug);
    match target {
        AutoTarget::WorkDone => by_slug(stage::QUALITY_CHECK)
            .or_else(|| by_slug(stage::COMPLETED))
            .map(|s| (s, "All sub-tasks completed")),
        AutoTarget::InProgress(note) => by_slug(stage::IN_PROGRESS).map(|s| (s, note)),
    }
}
