//! Storage collaborator interface and target-side types.
//!
//! The pipeline does not implement persistence; it drives an [`ImportStore`]
//! and reacts to its results. Every operation is scoped to the store's
//! authenticated principal. `sqlite` provides the reference adapter used by
//! the CLI and the integration tests.

pub mod sqlite;

pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage-layer failure, split by how the executor must react.
///
/// `Unavailable` is the only fatal variant: the run aborts. Everything else
/// is recorded against the current item and the run continues.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached at all (cannot open, connection lost).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A single operation failed; the record it concerned was not written.
    #[error("storage operation failed: {0}")]
    Query(String),
}

/// Status of a target-side project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    #[default]
    Active,
    Someday,
    Completed,
    Dropped,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Active => "active",
            TargetStatus::Someday => "someday",
            TargetStatus::Completed => "completed",
            TargetStatus::Dropped => "dropped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "someday" => TargetStatus::Someday,
            "completed" => TargetStatus::Completed,
            "dropped" => TargetStatus::Dropped,
            _ => TargetStatus::Active,
        }
    }
}

/// Three-bucket effort scale derived from the source's estimated minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Energy {
    Low,
    Medium,
    High,
}

impl Energy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Energy::Low => "low",
            Energy::Medium => "medium",
            Energy::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Energy::Low),
            "medium" => Some(Energy::Medium),
            "high" => Some(Energy::High),
            _ => None,
        }
    }
}

/// A project row in the target store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub note: Option<String>,
    pub status: TargetStatus,
    pub kind: crate::types::ProjectKind,
    pub review_interval_days: Option<u32>,
    pub sort_order: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task row in the target store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: Option<String>,
    pub parent_id: Option<String>,
    pub title: String,
    pub note: Option<String>,
    pub completed: bool,
    pub flagged: bool,
    pub defer_at: Option<i64>,
    pub due_at: Option<i64>,
    pub energy: Option<Energy>,
    pub sort_order: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A tag row in the target store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    pub created_at: i64,
}

/// Field set for a project insert or replace, produced by the mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub note: Option<String>,
    pub status: TargetStatus,
    pub kind: crate::types::ProjectKind,
    pub review_interval_days: Option<u32>,
    pub sort_order: i32,
}

/// Field set for a task insert or replace, produced by the mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub note: Option<String>,
    pub completed: bool,
    pub flagged: bool,
    pub defer_at: Option<chrono::DateTime<chrono::Utc>>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
    pub energy: Option<Energy>,
    pub project_id: Option<String>,
    pub sort_order: i32,
    /// Resolved tag names to attach after insert.
    pub tags: Vec<String>,
}

/// Fixed palette for tags created during an import.
pub const TAG_PALETTE: [&str; 8] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#8b5cf6", "#ec4899",
];

/// Pick a palette color for a tag name. Deterministic so re-imports assign
/// the same color.
pub fn palette_color(name: &str) -> &'static str {
    let sum: usize = name.bytes().map(usize::from).sum();
    TAG_PALETTE[sum % TAG_PALETTE.len()]
}

/// Per-principal storage operations the executor depends on.
///
/// Implementations decide what "principal" means (a user id, a tenant, a
/// local profile). `principal()` returning `None` makes any import run fail
/// fast with a fatal error before anything is written.
pub trait ImportStore {
    fn principal(&self) -> Option<String>;

    fn find_project_by_name(&self, name: &str) -> Result<Option<Project>, StoreError>;

    fn insert_project(&self, project: &NewProject) -> Result<Project, StoreError>;

    fn update_project(&self, id: &str, project: &NewProject) -> Result<Project, StoreError>;

    /// Duplicate key for tasks is (title, project), not title alone; a task
    /// outside any project matches `project_id = None`.
    fn find_task_by_title_and_project(
        &self,
        title: &str,
        project_id: Option<&str>,
    ) -> Result<Option<Task>, StoreError>;

    fn insert_task(&self, task: &NewTask, parent_id: Option<&str>) -> Result<Task, StoreError>;

    fn update_task(&self, id: &str, task: &NewTask) -> Result<Task, StoreError>;

    /// Returns the tag and whether it was created by this call.
    fn find_or_create_tag(&self, name: &str) -> Result<(Tag, bool), StoreError>;

    fn link_task_tag(&self, task_id: &str, tag_id: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_color_is_deterministic() {
        assert_eq!(palette_color("errands"), palette_color("errands"));
        assert!(TAG_PALETTE.contains(&palette_color("errands")));
    }
}
