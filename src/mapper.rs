//! Pure mapping and pre-flight validation.
//!
//! Everything in this module is deterministic and side-effect free: no I/O,
//! no storage, no mutation of the archive. The executor calls `Mapper` for
//! field translation; callers run [`validate_mapping`] before committing to
//! the write phase to preview consequences of their `MappingConfig`.

use crate::config::MappingConfig;
use crate::store::{Energy, NewProject, NewTask, TargetStatus};
use crate::types::{Archive, ArchiveProject, ArchiveTask, ProjectStatus};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Mapping-level rejection. Not a failure: a `SkippedByConfig` project is
/// simply left out of the import, uncounted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("project '{0}' is excluded by configuration")]
    SkippedByConfig(String),
}

/// Pre-flight report: what the current config would do to this archive.
/// Advisory only; never blocks execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Context names with no `context_tags` entry that are not skipped;
    /// their tasks will get slugified fallback tags.
    pub unmapped_contexts: Vec<String>,
    /// Task names appearing more than once anywhere in the archive, each
    /// reported exactly once.
    pub duplicate_task_names: Vec<String>,
    /// Human-readable renderings of the above.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.unmapped_contexts.is_empty() && self.duplicate_task_names.is_empty()
    }
}

/// Translates intermediate entities into target field sets.
pub struct Mapper<'a> {
    config: &'a MappingConfig,
    /// Context id → context name, built once from the archive.
    context_names: HashMap<&'a str, &'a str>,
}

impl<'a> Mapper<'a> {
    pub fn new(config: &'a MappingConfig, archive: &'a Archive) -> Self {
        let context_names = archive
            .contexts
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();
        Self {
            config,
            context_names,
        }
    }

    /// Map a source project to target fields.
    ///
    /// Status mapping is fixed: on-hold → someday, completed and dropped map
    /// through, everything else is active. An unparsable review interval
    /// maps to "no interval" rather than erroring.
    pub fn map_project(&self, project: &ArchiveProject) -> Result<NewProject, MapError> {
        if self.config.skip_projects.contains(&project.name) {
            return Err(MapError::SkippedByConfig(project.name.clone()));
        }

        let status = match project.status {
            ProjectStatus::OnHold => TargetStatus::Someday,
            ProjectStatus::Completed => TargetStatus::Completed,
            ProjectStatus::Dropped => TargetStatus::Dropped,
            ProjectStatus::Active => TargetStatus::Active,
        };

        Ok(NewProject {
            name: project.name.clone(),
            note: project.note.clone(),
            status,
            kind: project.kind,
            review_interval_days: project
                .review_interval
                .as_deref()
                .and_then(review_interval_days),
            sort_order: project.order,
        })
    }

    /// Map a source task to target fields. Infallible: tasks are only ever
    /// skipped by the executor (duplicates, completed-filter), never by
    /// mapping.
    pub fn map_task(&self, task: &ArchiveTask, project_id: Option<&str>) -> NewTask {
        NewTask {
            title: task.name.clone(),
            note: task.note.clone(),
            completed: task.completed,
            flagged: task.flagged,
            defer_at: task.defer_at,
            due_at: task.due_at,
            energy: task.estimated_minutes.map(energy_for_estimate),
            project_id: project_id.map(str::to_string),
            sort_order: task.order,
            tags: self.tags_for_task(task),
        }
    }

    /// Resolve a context name to a tag name: explicit mapping first, then
    /// the slugified raw name, so a context always yields a tag.
    pub fn tag_name_for(&self, context_name: &str) -> String {
        self.config
            .context_tags
            .get(context_name)
            .cloned()
            .unwrap_or_else(|| slugify(context_name))
    }

    fn tags_for_task(&self, task: &ArchiveTask) -> Vec<String> {
        let Some(context_id) = task.context_id.as_deref() else {
            return Vec::new();
        };
        let Some(name) = self.context_names.get(context_id).copied() else {
            // Dangling context reference; nothing to tag with.
            return Vec::new();
        };
        if self.config.skip_contexts.iter().any(|s| s == name) {
            return Vec::new();
        }
        vec![self.tag_name_for(name)]
    }
}

/// Lower-cased, spaces replaced with hyphens.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Normalize `"<n> <unit>"` review intervals to a day count.
pub fn review_interval_days(raw: &str) -> Option<u32> {
    static INTERVAL_RE: OnceLock<Regex> = OnceLock::new();
    let re = INTERVAL_RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s+(day|week|month|year)s?\s*$").expect("interval pattern")
    });

    let caps = re.captures(raw)?;
    let n: u32 = caps.get(1)?.as_str().parse().ok()?;
    let per_unit = match caps.get(2)?.as_str() {
        "day" => 1,
        "week" => 7,
        "month" => 30,
        "year" => 365,
        _ => return None,
    };
    n.checked_mul(per_unit)
}

fn energy_for_estimate(minutes: u32) -> Energy {
    if minutes <= 15 {
        Energy::Low
    } else if minutes <= 45 {
        Energy::Medium
    } else {
        Energy::High
    }
}

/// Pre-flight validation: unmapped contexts and archive-wide duplicate task
/// names. Reads the archive only; storage is never consulted.
pub fn validate_mapping(archive: &Archive, config: &MappingConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    for context in &archive.contexts {
        if config.context_tags.contains_key(&context.name) {
            continue;
        }
        if config.skip_contexts.contains(&context.name) {
            continue;
        }
        if report.unmapped_contexts.contains(&context.name) {
            continue;
        }
        report.warnings.push(format!(
            "context '{}' has no tag mapping; tasks will be tagged '{}'",
            context.name,
            slugify(&context.name)
        ));
        report.unmapped_contexts.push(context.name.clone());
    }

    // Duplicates are counted across the entire archive, at every depth.
    // A name is reported when its count first reaches two, not on every
    // further repeat.
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut note_name = |t: &ArchiveTask| {
        let count = counts.entry(t.name.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            report
                .warnings
                .push(format!("task name '{}' appears more than once in the archive", t.name));
            report.duplicate_task_names.push(t.name.clone());
        }
    };
    for task in &archive.tasks {
        walk_tasks(task, &mut note_name);
    }
    for project in &archive.projects {
        for task in &project.tasks {
            walk_tasks(task, &mut note_name);
        }
    }

    report
}

fn walk_tasks(task: &ArchiveTask, f: &mut impl FnMut(&ArchiveTask)) {
    f(task);
    for child in &task.children {
        walk_tasks(child, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProjectKind, ProjectStatus};

    fn task(name: &str, children: Vec<ArchiveTask>) -> ArchiveTask {
        ArchiveTask {
            id: name.to_string(),
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

    fn project(name: &str, status: ProjectStatus) -> ArchiveProject {
        ArchiveProject {
            id: name.to_string(),
            name: name.to_string(),
            note: None,
            status,
            kind: ProjectKind::Parallel,
            parent_id: None,
            review_interval: None,
            order: 0,
            tasks: vec![],
        }
    }

    #[test]
    fn status_mapping_is_fixed() {
        let config = MappingConfig::default();
        let archive = Archive::default();
        let mapper = Mapper::new(&config, &archive);

        let on_hold = mapper.map_project(&project("a", ProjectStatus::OnHold)).unwrap();
        assert_eq!(on_hold.status, TargetStatus::Someday);

        let dropped = mapper.map_project(&project("b", ProjectStatus::Dropped)).unwrap();
        assert_eq!(dropped.status, TargetStatus::Dropped);

        let active = mapper.map_project(&project("c", ProjectStatus::Active)).unwrap();
        assert_eq!(active.status, TargetStatus::Active);
    }

    #[test]
    fn skip_projects_rejects_by_name() {
        let config = MappingConfig {
            skip_projects: vec!["Template".into()],
            ..Default::default()
        };
        let archive = Archive::default();
        let mapper = Mapper::new(&config, &archive);

        let err = mapper
            .map_project(&project("Template", ProjectStatus::Active))
            .unwrap_err();
        assert_eq!(err, MapError::SkippedByConfig("Template".into()));
    }

    #[test]
    fn review_intervals_normalize_to_days() {
        assert_eq!(review_interval_days("1 week"), Some(7));
        assert_eq!(review_interval_days("2 weeks"), Some(14));
        assert_eq!(review_interval_days("3 day"), Some(3));
        assert_eq!(review_interval_days("1 month"), Some(30));
        assert_eq!(review_interval_days("2 years"), Some(730));
        assert_eq!(review_interval_days("fortnightly"), None);
        assert_eq!(review_interval_days("week 1"), None);
    }

    #[test]
    fn estimated_minutes_bucket_into_energy() {
        let config = MappingConfig::default();
        let archive = Archive::default();
        let mapper = Mapper::new(&config, &archive);

        let mut t = task("t", vec![]);
        t.estimated_minutes = Some(15);
        assert_eq!(mapper.map_task(&t, None).energy, Some(Energy::Low));
        t.estimated_minutes = Some(45);
        assert_eq!(mapper.map_task(&t, None).energy, Some(Energy::Medium));
        t.estimated_minutes = Some(46);
        assert_eq!(mapper.map_task(&t, None).energy, Some(Energy::High));
        t.estimated_minutes = None;
        assert_eq!(mapper.map_task(&t, None).energy, None);
    }

    #[test]
    fn context_falls_back_to_slug() {
        let config = MappingConfig::default();
        let mut archive = Archive::default();
        archive.contexts.push(crate::types::ArchiveContext {
            id: "c1".into(),
            name: "Hardware Store".into(),
            parent_id: None,
            geofence: None,
        });
        let mapper = Mapper::new(&config, &archive);

        let mut t = task("t", vec![]);
        t.context_id = Some("c1".into());
        assert_eq!(mapper.map_task(&t, None).tags, vec!["hardware-store"]);
    }

    #[test]
    fn explicit_context_mapping_wins_over_slug() {
        let config = MappingConfig {
            context_tags: [("Errands".to_string(), "shopping".to_string())].into(),
            ..Default::default()
        };
        let mut archive = Archive::default();
        archive.contexts.push(crate::types::ArchiveContext {
            id: "c1".into(),
            name: "Errands".into(),
            parent_id: None,
            geofence: None,
        });
        let mapper = Mapper::new(&config, &archive);

        let mut t = task("t", vec![]);
        t.context_id = Some("c1".into());
        assert_eq!(mapper.map_task(&t, None).tags, vec!["shopping"]);
    }

    #[test]
    fn validate_reports_each_duplicate_name_once() {
        let mut archive = Archive::default();
        archive.tasks.push(task("repeat", vec![task("repeat", vec![task("repeat", vec![])])]));
        archive.tasks.push(task("unique", vec![]));

        let report = validate_mapping(&archive, &MappingConfig::default());
        assert_eq!(report.duplicate_task_names, vec!["repeat"]);
    }

    #[test]
    fn validate_flags_unmapped_but_not_skipped_contexts() {
        let mut archive = Archive::default();
        for (id, name) in [("c1", "Errands"), ("c2", "Office"), ("c3", "Waiting")] {
            archive.contexts.push(crate::types::ArchiveContext {
                id: id.into(),
                name: name.into(),
                parent_id: None,
                geofence: None,
            });
        }
        let config = MappingConfig {
            context_tags: [("Errands".to_string(), "shopping".to_string())].into(),
            skip_contexts: vec!["Waiting".into()],
            ..Default::default()
        };

        let report = validate_mapping(&archive, &config);
        assert_eq!(report.unmapped_contexts, vec!["Office"]);
        assert!(!report.is_clean());
    }
}
