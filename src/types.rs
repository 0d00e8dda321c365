//! Intermediate archive model produced by the parser.
//!
//! These types mirror the source document, not the target store: the mapper
//! is the only place where source-side concepts (contexts, review intervals,
//! estimated minutes) are translated into store-side ones (tags, day counts,
//! energy levels). All of them are plain data and immutable once the parser
//! returns.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a source project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    Dropped,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on-hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Dropped => "dropped",
        }
    }

    /// Parse the archive's status attribute. Unknown values fall back to
    /// `Active`, matching the mapper's "everything else is active" rule.
    pub fn parse(s: &str) -> Self {
        match s {
            "on-hold" => ProjectStatus::OnHold,
            "completed" => ProjectStatus::Completed,
            "dropped" => ProjectStatus::Dropped,
            _ => ProjectStatus::Active,
        }
    }
}

/// How a source project sequences its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectKind {
    Sequential,
    #[default]
    Parallel,
    SingleActions,
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Sequential => "sequential",
            ProjectKind::Parallel => "parallel",
            ProjectKind::SingleActions => "single-actions",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sequential" => ProjectKind::Sequential,
            "single-actions" => ProjectKind::SingleActions,
            _ => ProjectKind::Parallel,
        }
    }
}

/// Optional location attached to a context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: Option<f64>,
}

/// A context from the source system. Contexts become tags on the target
/// side; the geofence is carried along for stores that support it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveContext {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub geofence: Option<Geofence>,
}

/// A task from the source document, possibly with nested subtasks.
///
/// Invariant: `name` is never empty. Tasks without a parseable name are
/// dropped by the parser rather than surfaced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveTask {
    pub id: String,
    pub name: String,
    pub note: Option<String>,
    pub completed: bool,
    pub flagged: bool,
    pub defer_at: Option<chrono::DateTime<chrono::Utc>>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
    pub context_id: Option<String>,
    pub estimated_minutes: Option<u32>,
    pub order: i32,
    pub children: Vec<ArchiveTask>,
}

impl ArchiveTask {
    /// Number of tasks in this subtree, the task itself included.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(ArchiveTask::subtree_size).sum::<usize>()
    }
}

/// A project from the source document with its task tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveProject {
    pub id: String,
    pub name: String,
    pub note: Option<String>,
    pub status: ProjectStatus,
    pub kind: ProjectKind,
    pub parent_id: Option<String>,
    /// Raw review interval string, e.g. `"1 week"`. Normalized by the mapper.
    pub review_interval: Option<String>,
    pub order: i32,
    pub tasks: Vec<ArchiveTask>,
}

/// The parse result: everything the archive contained, in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Archive {
    pub projects: Vec<ArchiveProject>,
    pub contexts: Vec<ArchiveContext>,
    /// Tasks found directly under the archive root, outside any project.
    pub tasks: Vec<ArchiveTask>,
}

impl Archive {
    /// Total number of tasks at every nesting depth, standalone tasks and
    /// all projects' trees included. This is the task share of the
    /// executor's progress total.
    pub fn task_count(&self) -> usize {
        let standalone: usize = self.tasks.iter().map(ArchiveTask::subtree_size).sum();
        let in_projects: usize = self
            .projects
            .iter()
            .flat_map(|p| p.tasks.iter())
            .map(ArchiveTask::subtree_size)
            .sum();
        standalone + in_projects
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.contexts.is_empty() && self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, children: Vec<ArchiveTask>) -> ArchiveTask {
        ArchiveTask {
            id: format!("task-{name}"),
            name: name.to_string(),
            note: None,
            completed: false,
            flagged: false,
            defer_at: None,
            due_at: None,
            context_id: None,
            estimated_minutes: None,
            order: 0,
            children,
        }
    }

    #[test]
    fn task_count_includes_every_depth() {
        let archive = Archive {
            projects: vec![ArchiveProject {
                id: "p1".into(),
                name: "P".into(),
                note: None,
                status: ProjectStatus::Active,
                kind: ProjectKind::Parallel,
                parent_id: None,
                review_interval: None,
                order: 0,
                tasks: vec![task("a", vec![task("b", vec![task("c", vec![])])])],
            }],
            contexts: vec![],
            tasks: vec![task("solo", vec![])],
        };

        assert_eq!(archive.task_count(), 4);
    }

    #[test]
    fn status_parse_falls_back_to_active() {
        assert_eq!(ProjectStatus::parse("on-hold"), ProjectStatus::OnHold);
        assert_eq!(ProjectStatus::parse("garbage"), ProjectStatus::Active);
    }
}
