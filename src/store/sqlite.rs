//! SQLite-backed reference implementation of [`ImportStore`].
//!
//! Wraps a single connection behind a mutex; schema is applied through
//! embedded refinery migrations. Ids are UUIDv7 strings, timestamps are
//! epoch milliseconds.

use super::{
    Energy, ImportStore, NewProject, NewTask, Project, StoreError, Tag, TargetStatus,
    palette_color,
};
use crate::types::ProjectKind;
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Store handle. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    owner: String,
}

impl SqliteStore {
    /// Open or create the store at the given path, bound to `owner`.
    pub fn open<P: AsRef<Path>>(path: P, owner: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            owner: owner.to_string(),
        };

        store.run_migrations()?;

        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory(owner: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            owner: owner.to_string(),
        };

        store.run_migrations()?;

        Ok(store)
    }

    /// A handle onto the same database bound to a different principal.
    pub fn with_owner(&self, owner: &str) -> SqliteStore {
        SqliteStore {
            conn: Arc::clone(&self.conn),
            owner: owner.to_string(),
        }
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| StoreError::Unavailable(format!("migrations failed: {e}")))?;
        Ok(())
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().unwrap();
        f(&conn).map_err(StoreError::from)
    }

    /// Number of projects owned by this principal (test/CLI helper).
    pub fn count_projects(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM projects WHERE owner_id = ?1",
                params![self.owner],
                |row| row.get(0),
            )
        })
    }

    /// Number of tasks owned by this principal (test/CLI helper).
    pub fn count_tasks(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE owner_id = ?1",
                params![self.owner],
                |row| row.get(0),
            )
        })
    }

    /// All tag names for this principal, sorted.
    pub fn tag_names(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT name FROM tags WHERE owner_id = ?1 ORDER BY name")?;
            let rows = stmt.query_map(params![self.owner], |row| row.get(0))?;
            rows.collect()
        })
    }

    /// Tag names attached to one task, sorted.
    pub fn task_tag_names(&self, task_id: &str) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.name FROM tags t
                 JOIN task_tags tt ON tt.tag_id = t.id
                 WHERE tt.task_id = ?1
                 ORDER BY t.name",
            )?;
            let rows = stmt.query_map(params![task_id], |row| row.get(0))?;
            rows.collect()
        })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                rusqlite::ErrorCode::CannotOpen
                | rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::DatabaseCorrupt
                | rusqlite::ErrorCode::DiskFull
                | rusqlite::ErrorCode::NotADatabase => StoreError::Unavailable(err.to_string()),
                _ => StoreError::Query(err.to_string()),
            },
            _ => StoreError::Query(err.to_string()),
        }
    }
}

fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    let status: String = row.get("status")?;
    let kind: String = row.get("kind")?;
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        note: row.get("note")?,
        status: TargetStatus::parse(&status),
        kind: ProjectKind::parse(&kind),
        review_interval_days: row.get("review_interval_days")?,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_task_row(row: &Row) -> rusqlite::Result<super::Task> {
    let energy: Option<String> = row.get("energy")?;
    Ok(super::Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        note: row.get("note")?,
        completed: row.get("completed")?,
        flagged: row.get("flagged")?,
        defer_at: row.get("defer_at")?,
        due_at: row.get("due_at")?,
        energy: energy.as_deref().and_then(Energy::parse),
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Current timestamp in milliseconds.
fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ImportStore for SqliteStore {
    fn principal(&self) -> Option<String> {
        if self.owner.is_empty() {
            None
        } else {
            Some(self.owner.clone())
        }
    }

    fn find_project_by_name(&self, name: &str) -> Result<Option<Project>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM projects
                 WHERE owner_id = ?1 AND name = ?2
                 ORDER BY created_at LIMIT 1",
            )?;
            match stmt.query_row(params![self.owner, name], parse_project_row) {
                Ok(project) => Ok(Some(project)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn insert_project(&self, project: &NewProject) -> Result<Project, StoreError> {
        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects
                   (id, owner_id, name, note, status, kind, review_interval_days,
                    sort_order, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    self.owner,
                    project.name,
                    project.note,
                    project.status.as_str(),
                    project.kind.as_str(),
                    project.review_interval_days,
                    project.sort_order,
                    now,
                    now,
                ],
            )?;
            Ok(())
        })?;

        Ok(Project {
            id,
            name: project.name.clone(),
            note: project.note.clone(),
            status: project.status,
            kind: project.kind,
            review_interval_days: project.review_interval_days,
            sort_order: project.sort_order,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_project(&self, id: &str, project: &NewProject) -> Result<Project, StoreError> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE projects
                 SET note = ?1, status = ?2, kind = ?3, review_interval_days = ?4,
                     sort_order = ?5, updated_at = ?6
                 WHERE id = ?7 AND owner_id = ?8",
                params![
                    project.note,
                    project.status.as_str(),
                    project.kind.as_str(),
                    project.review_interval_days,
                    project.sort_order,
                    now,
                    id,
                    self.owner,
                ],
            )?;
            conn.query_row(
                "SELECT * FROM projects WHERE id = ?1",
                params![id],
                parse_project_row,
            )
        })
    }

    fn find_task_by_title_and_project(
        &self,
        title: &str,
        project_id: Option<&str>,
    ) -> Result<Option<super::Task>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE owner_id = ?1 AND title = ?2 AND project_id IS ?3
                 ORDER BY created_at LIMIT 1",
            )?;
            match stmt.query_row(params![self.owner, title, project_id], parse_task_row) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn insert_task(
        &self,
        task: &NewTask,
        parent_id: Option<&str>,
    ) -> Result<super::Task, StoreError> {
        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        let defer_at = task.defer_at.map(|d| d.timestamp_millis());
        let due_at = task.due_at.map(|d| d.timestamp_millis());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks
                   (id, owner_id, project_id, parent_id, title, note, completed, flagged,
                    defer_at, due_at, energy, sort_order, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    id,
                    self.owner,
                    task.project_id,
                    parent_id,
                    task.title,
                    task.note,
                    task.completed,
                    task.flagged,
                    defer_at,
                    due_at,
                    task.energy.map(|e| e.as_str()),
                    task.sort_order,
                    now,
                    now,
                ],
            )?;
            Ok(())
        })?;

        Ok(super::Task {
            id,
            project_id: task.project_id.clone(),
            parent_id: parent_id.map(str::to_string),
            title: task.title.clone(),
            note: task.note.clone(),
            completed: task.completed,
            flagged: task.flagged,
            defer_at,
            due_at,
            energy: task.energy,
            sort_order: task.sort_order,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_task(&self, id: &str, task: &NewTask) -> Result<super::Task, StoreError> {
        let now = now_ms();
        let defer_at = task.defer_at.map(|d| d.timestamp_millis());
        let due_at = task.due_at.map(|d| d.timestamp_millis());
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks
                 SET note = ?1, completed = ?2, flagged = ?3, defer_at = ?4, due_at = ?5,
                     energy = ?6, sort_order = ?7, updated_at = ?8
                 WHERE id = ?9 AND owner_id = ?10",
                params![
                    task.note,
                    task.completed,
                    task.flagged,
                    defer_at,
                    due_at,
                    task.energy.map(|e| e.as_str()),
                    task.sort_order,
                    now,
                    id,
                    self.owner,
                ],
            )?;
            conn.query_row(
                "SELECT * FROM tasks WHERE id = ?1",
                params![id],
                parse_task_row,
            )
        })
    }

    fn find_or_create_tag(&self, name: &str) -> Result<(Tag, bool), StoreError> {
        let existing = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, color, created_at FROM tags
                 WHERE owner_id = ?1 AND name = ?2",
            )?;
            match stmt.query_row(params![self.owner, name], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                    created_at: row.get(3)?,
                })
            }) {
                Ok(tag) => Ok(Some(tag)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })?;

        if let Some(tag) = existing {
            return Ok((tag, false));
        }

        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        let color = palette_color(name);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (id, owner_id, name, color, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, self.owner, name, color, now],
            )?;
            Ok(())
        })?;

        Ok((
            Tag {
                id,
                name: name.to_string(),
                color: color.to_string(),
                created_at: now,
            },
            true,
        ))
    }

    fn link_task_tag(&self, task_id: &str, tag_id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
                params![task_id, tag_id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SqliteStore {
        SqliteStore::open_in_memory("tester").expect("in-memory store")
    }

    fn sample_project(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            note: None,
            status: TargetStatus::Active,
            kind: ProjectKind::Parallel,
            review_interval_days: None,
            sort_order: 0,
        }
    }

    #[test]
    fn insert_then_find_project() {
        let store = setup();
        let created = store.insert_project(&sample_project("Home")).unwrap();

        let found = store.find_project_by_name("Home").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, TargetStatus::Active);
    }

    #[test]
    fn find_project_scoped_to_owner() {
        let store = setup();
        store.insert_project(&sample_project("Home")).unwrap();

        let other = store.with_owner("somebody-else");
        assert!(other.find_project_by_name("Home").unwrap().is_none());
    }

    #[test]
    fn task_duplicate_key_distinguishes_projects() {
        let store = setup();
        let project = store.insert_project(&sample_project("Home")).unwrap();

        let task = NewTask {
            title: "Buy milk".into(),
            note: None,
            completed: false,
            flagged: false,
            defer_at: None,
            due_at: None,
            energy: None,
            project_id: Some(project.id.clone()),
            sort_order: 0,
            tags: vec![],
        };
        store.insert_task(&task, None).unwrap();

        assert!(
            store
                .find_task_by_title_and_project("Buy milk", Some(project.id.as_str()))
                .unwrap()
                .is_some()
        );
        // Same title in the inbox (no project) is a different key.
        assert!(
            store
                .find_task_by_title_and_project("Buy milk", None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn find_or_create_tag_reports_creation_once() {
        let store = setup();
        let (tag, created) = store.find_or_create_tag("errands").unwrap();
        assert!(created);

        let (again, created) = store.find_or_create_tag("errands").unwrap();
        assert!(!created);
        assert_eq!(tag.id, again.id);
        assert_eq!(tag.color, palette_color("errands"));
    }

    #[test]
    fn empty_owner_has_no_principal() {
        let store = SqliteStore::open_in_memory("").unwrap();
        assert!(store.principal().is_none());
    }

    #[test]
    fn reopening_on_disk_store_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.sqlite3");
        {
            let store = SqliteStore::open(&path, "tester").unwrap();
            store.insert_project(&sample_project("Persistent")).unwrap();
        }

        let store = SqliteStore::open(&path, "tester").unwrap();
        assert!(store.find_project_by_name("Persistent").unwrap().is_some());
    }
}
