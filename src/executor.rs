//! Import executor: the write phase.
//!
//! Walks the archive in dependency order (tags → projects → tasks →
//! subtasks), consults the store to skip duplicates, remaps source ids to
//! freshly created target ids, attaches tags, and emits progress after every
//! state-relevant mutation.
//!
//! Failure tiers: a `StoreError::Unavailable` (or a missing principal)
//! aborts the run with an `ImportError`; any other per-item failure is
//! recorded in the error lists and the run continues with the next item.
//! Child records always reference ids through the remap table, never source
//! ids, which is why a parent that was not written (skipped, failed) takes
//! its whole subtree out of the import.

use crate::config::{DuplicateStrategy, MappingConfig};
use crate::error::ImportError;
use crate::mapper::{MapError, Mapper, validate_mapping};
use crate::progress::{ImportPhase, ImportProgress, ImportResult, ProgressFn};
use crate::store::{ImportStore, NewTask, StoreError};
use crate::types::{Archive, ArchiveProject, ArchiveTask};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Marker tags guaranteed to exist after every successful run.
pub const MARKER_TAGS: [&str; 2] = ["imported", "omnifocus-import"];

/// Cap on suffix probing for the create-new duplicate strategy.
const MAX_NAME_SUFFIX: usize = 1000;

/// One-shot import executor. Construct per run; all run state is scoped to a
/// single `execute` call and discarded afterwards.
pub struct ImportExecutor<S: ImportStore> {
    store: S,
    config: MappingConfig,
    on_progress: Option<ProgressFn>,
}

/// What happened to a single task node.
enum TaskOutcome {
    Imported(String),
    DuplicateSkipped,
}

/// Why a subtree is being passed over without writes.
#[derive(Clone, Copy, PartialEq)]
enum SkipReason {
    /// Counted into `duplicates_skipped`, node and descendants alike.
    Duplicate,
    /// Config-driven or parent-failed: advances progress only.
    Silent,
}

/// Mutable state for one `execute` call.
struct Run {
    progress: ImportProgress,
    /// Source id → target id, write-once per key, populated in write order.
    remap: HashMap<String, String>,
    projects_imported: usize,
    tasks_imported: usize,
    duplicates_skipped: usize,
    tags_created: usize,
    errors: Vec<String>,
}

impl Run {
    fn new(total: usize) -> Self {
        Self {
            progress: ImportProgress::new(total),
            remap: HashMap::new(),
            projects_imported: 0,
            tasks_imported: 0,
            duplicates_skipped: 0,
            tags_created: 0,
            errors: Vec::new(),
        }
    }

    /// Record an item-level error in both the live progress and the final
    /// result.
    fn record_error(&mut self, message: String) {
        warn!(error = %message, "item failed, continuing");
        self.errors.push(message.clone());
        self.progress.errors.push(message);
    }

    fn into_result(self, duration_ms: u64) -> ImportResult {
        ImportResult {
            success: true,
            projects_imported: self.projects_imported,
            tasks_imported: self.tasks_imported,
            duplicates_skipped: self.duplicates_skipped,
            tags_created: self.tags_created,
            errors: self.errors,
            duration_ms,
        }
    }
}

impl<S: ImportStore> ImportExecutor<S> {
    pub fn new(store: S, config: MappingConfig) -> Self {
        Self {
            store,
            config,
            on_progress: None,
        }
    }

    /// Attach a progress callback, invoked synchronously on the executing
    /// thread.
    pub fn with_progress(
        mut self,
        f: impl Fn(&ImportProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Run the import. Returns the result summary, or a fatal error if the
    /// run could not complete (in which case no partial summary is
    /// surfaced).
    pub fn execute(&self, archive: &Archive) -> Result<ImportResult, ImportError> {
        let started = Instant::now();
        let total = archive.projects.len() + archive.task_count();
        let mut run = Run::new(total);

        match self.run_phases(archive, &mut run) {
            Ok(()) => {
                self.set_phase(&mut run, ImportPhase::Done, "import complete");
                let result = run.into_result(started.elapsed().as_millis() as u64);
                info!(
                    projects = result.projects_imported,
                    tasks = result.tasks_imported,
                    duplicates = result.duplicates_skipped,
                    errors = result.errors.len(),
                    duration_ms = result.duration_ms,
                    "import finished"
                );
                Ok(result)
            }
            Err(err) => {
                run.progress.phase = ImportPhase::Error;
                run.progress.message = err.to_string();
                self.emit(&run.progress);
                Err(err)
            }
        }
    }

    fn run_phases(&self, archive: &Archive, run: &mut Run) -> Result<(), ImportError> {
        // Preparing: principal check, totals, pre-flight validation.
        self.set_phase(run, ImportPhase::Preparing, "preparing import");
        if self.store.principal().is_none() {
            return Err(ImportError::NoPrincipal);
        }

        let report = validate_mapping(archive, &self.config);
        if !report.warnings.is_empty() {
            debug!(warnings = report.warnings.len(), "pre-flight warnings");
            run.progress.errors.extend(report.warnings.iter().cloned());
            self.emit(&run.progress);
        }

        let mapper = Mapper::new(&self.config, archive);

        // Tags: pre-create one tag per non-skipped context so the task
        // phase always finds them.
        self.set_phase(run, ImportPhase::Tags, "creating tags for contexts");
        for context in &archive.contexts {
            if self.config.skip_contexts.contains(&context.name) {
                continue;
            }
            let tag_name = mapper.tag_name_for(&context.name);
            match self.store.find_or_create_tag(&tag_name) {
                Ok((_, created)) => {
                    if created {
                        run.tags_created += 1;
                    }
                }
                Err(err) => self.note_failure(run, format!("tag '{tag_name}'"), err)?,
            }
        }

        // Projects, in archive order.
        self.set_phase(run, ImportPhase::Projects, "importing projects");
        for project in &archive.projects {
            run.progress.message = format!("project '{}'", project.name);
            let outcome = self.import_project(project, &mapper, run);
            run.progress.current += 1;
            if let Err(err) = outcome {
                self.note_failure(run, format!("project '{}'", project.name), err)?;
            }
            self.emit(&run.progress);
        }

        // Tasks: standalone first, then each project's tree.
        self.set_phase(run, ImportPhase::Tasks, "importing tasks");
        for task in &archive.tasks {
            self.import_task_tree(task, None, None, &mapper, run)?;
        }
        for project in &archive.projects {
            let Some(project_target) = run.remap.get(&project.id).cloned() else {
                // Config-skipped or failed project: its tree is accounted
                // for in `total`, so progress still advances per node.
                debug!(project = %project.name, "no target id, skipping task tree");
                for task in &project.tasks {
                    self.skip_subtree(task, SkipReason::Silent, run);
                }
                continue;
            };
            for task in &project.tasks {
                self.import_task_tree(task, Some(project_target.as_str()), None, &mapper, run)?;
            }
        }

        // Completing: marker tags exist for future reference; nothing
        // historical is re-tagged.
        self.set_phase(run, ImportPhase::Completing, "ensuring marker tags");
        for marker in MARKER_TAGS {
            match self.store.find_or_create_tag(marker) {
                Ok((_, created)) => {
                    if created {
                        run.tags_created += 1;
                    }
                }
                Err(err) => self.note_failure(run, format!("marker tag '{marker}'"), err)?,
            }
        }

        Ok(())
    }

    /// Import one project record, applying the duplicate strategy. The
    /// remap entry is the gate for its task tree later.
    fn import_project(
        &self,
        project: &ArchiveProject,
        mapper: &Mapper,
        run: &mut Run,
    ) -> Result<(), StoreError> {
        if let Some(existing) = self.store.find_project_by_name(&project.name)? {
            match self.config.duplicates {
                DuplicateStrategy::Skip => {
                    debug!(project = %project.name, "duplicate, skipping");
                    run.duplicates_skipped += 1;
                    run.remap.insert(project.id.clone(), existing.id);
                }
                DuplicateStrategy::Replace => {
                    let fields = match mapper.map_project(project) {
                        Ok(fields) => fields,
                        Err(MapError::SkippedByConfig(_)) => return Ok(()),
                    };
                    let updated = self.store.update_project(&existing.id, &fields)?;
                    run.remap.insert(project.id.clone(), updated.id);
                    run.projects_imported += 1;
                }
                DuplicateStrategy::CreateNew => {
                    let mut fields = match mapper.map_project(project) {
                        Ok(fields) => fields,
                        Err(MapError::SkippedByConfig(_)) => return Ok(()),
                    };
                    fields.name = self.free_project_name(&project.name)?;
                    let created = self.store.insert_project(&fields)?;
                    run.remap.insert(project.id.clone(), created.id);
                    run.projects_imported += 1;
                }
            }
            return Ok(());
        }

        match mapper.map_project(project) {
            Ok(fields) => {
                let created = self.store.insert_project(&fields)?;
                run.remap.insert(project.id.clone(), created.id);
                run.projects_imported += 1;
            }
            Err(MapError::SkippedByConfig(name)) => {
                // Silent: not a duplicate, not an error, progress only.
                debug!(project = %name, "excluded by configuration");
            }
        }
        Ok(())
    }

    /// Depth-first import of one task subtree. Item-level failures are
    /// absorbed here; only fatal errors propagate.
    fn import_task_tree(
        &self,
        task: &ArchiveTask,
        project_id: Option<&str>,
        parent_id: Option<&str>,
        mapper: &Mapper,
        run: &mut Run,
    ) -> Result<(), ImportError> {
        if task.completed && !self.config.import_completed {
            self.skip_subtree(task, SkipReason::Silent, run);
            return Ok(());
        }

        run.progress.message = format!("task '{}'", task.name);
        match self.import_task(task, project_id, parent_id, mapper, run) {
            Ok(TaskOutcome::Imported(task_id)) => {
                run.tasks_imported += 1;
                run.progress.current += 1;
                self.emit(&run.progress);

                let child_parent = self.config.preserve_hierarchy.then_some(task_id.as_str());
                for child in &task.children {
                    self.import_task_tree(child, project_id, child_parent, mapper, run)?;
                }
            }
            Ok(TaskOutcome::DuplicateSkipped) => {
                // Children of a skipped duplicate are skipped too: they
                // would need the duplicate's new id, which doesn't exist.
                self.skip_subtree(task, SkipReason::Duplicate, run);
            }
            Err(err) => {
                run.progress.current += 1;
                self.note_failure(run, format!("task '{}'", task.name), err)?;
                self.emit(&run.progress);
                for child in &task.children {
                    self.skip_subtree(child, SkipReason::Silent, run);
                }
            }
        }
        Ok(())
    }

    /// Import one task record and attach its tags.
    fn import_task(
        &self,
        task: &ArchiveTask,
        project_id: Option<&str>,
        parent_id: Option<&str>,
        mapper: &Mapper,
        run: &mut Run,
    ) -> Result<TaskOutcome, StoreError> {
        if let Some(existing) = self
            .store
            .find_task_by_title_and_project(&task.name, project_id)?
        {
            match self.config.duplicates {
                DuplicateStrategy::Skip => return Ok(TaskOutcome::DuplicateSkipped),
                DuplicateStrategy::Replace => {
                    let fields = mapper.map_task(task, project_id);
                    let updated = self.store.update_task(&existing.id, &fields)?;
                    self.attach_tags(&updated.id, &fields, run)?;
                    return Ok(TaskOutcome::Imported(updated.id));
                }
                DuplicateStrategy::CreateNew => {
                    let mut fields = mapper.map_task(task, project_id);
                    fields.title = self.free_task_title(&task.name, project_id)?;
                    let created = self.store.insert_task(&fields, parent_id)?;
                    self.attach_tags(&created.id, &fields, run)?;
                    return Ok(TaskOutcome::Imported(created.id));
                }
            }
        }

        let fields = mapper.map_task(task, project_id);
        let created = self.store.insert_task(&fields, parent_id)?;
        self.attach_tags(&created.id, &fields, run)?;
        Ok(TaskOutcome::Imported(created.id))
    }

    fn attach_tags(&self, task_id: &str, fields: &NewTask, run: &mut Run) -> Result<(), StoreError> {
        for tag_name in &fields.tags {
            let (tag, created) = self.store.find_or_create_tag(tag_name)?;
            if created {
                run.tags_created += 1;
            }
            self.store.link_task_tag(task_id, &tag.id)?;
        }
        Ok(())
    }

    /// Account for a subtree without writing it: one progress increment per
    /// node, and one `duplicates_skipped` per node when the reason is a
    /// duplicate.
    fn skip_subtree(&self, task: &ArchiveTask, reason: SkipReason, run: &mut Run) {
        if reason == SkipReason::Duplicate {
            run.duplicates_skipped += 1;
            run.progress.message = format!("duplicate task '{}'", task.name);
        }
        run.progress.current += 1;
        self.emit(&run.progress);
        for child in &task.children {
            self.skip_subtree(child, reason, run);
        }
    }

    /// First unused "name (n)" for the create-new strategy.
    fn free_project_name(&self, name: &str) -> Result<String, StoreError> {
        for n in 2..=MAX_NAME_SUFFIX {
            let candidate = format!("{name} ({n})");
            if self.store.find_project_by_name(&candidate)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(StoreError::Query(format!(
            "no free name for duplicate project '{name}'"
        )))
    }

    fn free_task_title(
        &self,
        title: &str,
        project_id: Option<&str>,
    ) -> Result<String, StoreError> {
        for n in 2..=MAX_NAME_SUFFIX {
            let candidate = format!("{title} ({n})");
            if self
                .store
                .find_task_by_title_and_project(&candidate, project_id)?
                .is_none()
            {
                return Ok(candidate);
            }
        }
        Err(StoreError::Query(format!(
            "no free title for duplicate task '{title}'"
        )))
    }

    /// Promote unavailability to a fatal error; record anything else
    /// against the current item and keep going.
    fn note_failure(
        &self,
        run: &mut Run,
        what: String,
        err: StoreError,
    ) -> Result<(), ImportError> {
        match err {
            StoreError::Unavailable(_) => Err(ImportError::Store(err)),
            other => {
                run.record_error(format!("{what}: {other}"));
                Ok(())
            }
        }
    }

    fn set_phase(&self, run: &mut Run, phase: ImportPhase, message: &str) {
        debug!(phase = %phase, "phase transition");
        run.progress.phase = phase;
        run.progress.message = message.to_string();
        self.emit(&run.progress);
    }

    fn emit(&self, progress: &ImportProgress) {
        if let Some(cb) = &self.on_progress {
            cb(progress);
        }
    }
}
