//! Progress reporting and the final import result.

use serde::Serialize;

/// Executor phase. Phases advance strictly left to right; `Error` is
/// terminal and reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Preparing,
    Tags,
    Projects,
    Tasks,
    Completing,
    Done,
    Error,
}

impl ImportPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportPhase::Preparing => "preparing",
            ImportPhase::Tags => "tags",
            ImportPhase::Projects => "projects",
            ImportPhase::Tasks => "tasks",
            ImportPhase::Completing => "completing",
            ImportPhase::Done => "done",
            ImportPhase::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportPhase::Done | ImportPhase::Error)
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live progress snapshot handed to the progress callback.
///
/// `current` increments exactly once per accounted project or task
/// (successes, skipped duplicates, and per-item failures alike), so it
/// always reaches `total` when the phase becomes `Done`. `errors` is
/// append-only and also carries pre-flight validation warnings.
#[derive(Debug, Clone, Serialize)]
pub struct ImportProgress {
    pub current: usize,
    pub total: usize,
    pub phase: ImportPhase,
    pub message: String,
    pub errors: Vec<String>,
}

impl ImportProgress {
    pub fn new(total: usize) -> Self {
        Self {
            current: 0,
            total,
            phase: ImportPhase::Preparing,
            message: String::new(),
            errors: Vec::new(),
        }
    }
}

/// Callback invoked synchronously on the executing thread after every
/// state-relevant mutation: at least once per phase transition and once per
/// project or task processed. Not buffered or batched.
pub type ProgressFn = Box<dyn Fn(&ImportProgress) + Send + Sync>;

/// Immutable summary of a completed run; the only artifact that outlives
/// `execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub success: bool,
    pub projects_imported: usize,
    pub tasks_imported: usize,
    pub duplicates_skipped: usize,
    pub tags_created: usize,
    /// Item-level errors. May be non-empty even when `success` is true.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}
