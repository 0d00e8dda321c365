//! Archive document parser.
//!
//! Typed recursive descent over the XML tree into the [`Archive`] model: one
//! builder per node kind, built bottom-up. The parser is best-effort, not
//! validating. A malformed element (most commonly a task or project with no
//! name) is skipped without aborting the parse and without being counted as
//! an error. Only a document that is not an archive at all is fatal.
//!
//! Elements missing an `id` attribute get one synthesized from a positional
//! counter (`"task-3"`). Those ids are stable within a single parse but must
//! not be assumed stable across parses of an edited document.

use crate::error::ImportError;
use crate::types::{Archive, ArchiveContext, ArchiveProject, ArchiveTask, Geofence, ProjectKind, ProjectStatus};
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use tracing::debug;

/// Root element that marks a document as an archive export.
const ARCHIVE_ROOT: &str = "omnifocus";

/// Parse a raw archive document into the intermediate model.
pub fn parse(bytes: &[u8]) -> Result<Archive, ImportError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ImportError::Format(format!("document is not valid UTF-8: {e}")))?;
    let doc = Document::parse(text)
        .map_err(|e| ImportError::Format(format!("malformed XML: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != ARCHIVE_ROOT {
        return Err(ImportError::Format(format!(
            "unexpected root element <{}>, expected <{}>",
            root.tag_name().name(),
            ARCHIVE_ROOT
        )));
    }

    let mut parser = ArchiveParser::default();
    let mut archive = Archive::default();
    let mut position = 0;

    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "project" => {
                if let Some(project) = parser.parse_project(child, position) {
                    archive.projects.push(project);
                }
            }
            "task" => {
                if let Some(task) = parser.parse_task(child, position) {
                    archive.tasks.push(task);
                }
            }
            "context" => {
                if let Some(context) = parser.parse_context(child) {
                    archive.contexts.push(context);
                }
            }
            other => debug!(element = other, "skipping unknown archive element"),
        }
        position += 1;
    }

    debug!(
        projects = archive.projects.len(),
        contexts = archive.contexts.len(),
        standalone_tasks = archive.tasks.len(),
        "archive parsed"
    );

    Ok(archive)
}

/// Positional counters for synthesized ids, shared across the whole walk.
#[derive(Default)]
struct ArchiveParser {
    project_seq: usize,
    task_seq: usize,
    context_seq: usize,
}

impl ArchiveParser {
    fn parse_project(&mut self, node: Node, position: usize) -> Option<ArchiveProject> {
        let name = element_text(node, "name")?;

        self.project_seq += 1;
        let id = node
            .attribute("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("project-{}", self.project_seq));

        let mut tasks = Vec::new();
        let mut task_position = 0;
        for child in node.children().filter(Node::is_element) {
            if child.tag_name().name() == "task" {
                if let Some(task) = self.parse_task(child, task_position) {
                    tasks.push(task);
                }
                task_position += 1;
            }
        }

        Some(ArchiveProject {
            id,
            name,
            note: element_text(node, "note"),
            status: ProjectStatus::parse(node.attribute("status").unwrap_or_default()),
            kind: ProjectKind::parse(node.attribute("type").unwrap_or_default()),
            parent_id: node.attribute("parent").map(str::to_string),
            review_interval: element_text(node, "review-interval"),
            order: attr_order(node, position),
            tasks,
        })
    }

    fn parse_task(&mut self, node: Node, position: usize) -> Option<ArchiveTask> {
        // A task without a name is malformed; drop it and its subtree.
        let name = element_text(node, "name")?;

        self.task_seq += 1;
        let id = node
            .attribute("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("task-{}", self.task_seq));

        let mut children = Vec::new();
        let mut child_position = 0;
        for child in node.children().filter(Node::is_element) {
            if child.tag_name().name() == "task" {
                if let Some(task) = self.parse_task(child, child_position) {
                    children.push(task);
                }
                child_position += 1;
            }
        }

        let context_id = child_element(node, "context")
            .and_then(|c| c.attribute("idref"))
            .map(str::to_string);

        Some(ArchiveTask {
            id,
            name,
            note: element_text(node, "note"),
            completed: attr_bool(node, "completed"),
            flagged: attr_bool(node, "flagged"),
            defer_at: element_text(node, "defer-date").as_deref().and_then(parse_date),
            due_at: element_text(node, "due-date").as_deref().and_then(parse_date),
            context_id,
            estimated_minutes: element_text(node, "estimated-minutes")
                .and_then(|s| s.trim().parse().ok()),
            order: attr_order(node, position),
            children,
        })
    }

    fn parse_context(&mut self, node: Node) -> Option<ArchiveContext> {
        let name = element_text(node, "name")?;

        self.context_seq += 1;
        let id = node
            .attribute("id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("context-{}", self.context_seq));

        Some(ArchiveContext {
            id,
            name,
            parent_id: node.attribute("parent").map(str::to_string),
            geofence: child_element(node, "location").and_then(parse_geofence),
        })
    }
}

fn parse_geofence(node: Node) -> Option<Geofence> {
    let latitude: f64 = node.attribute("latitude")?.trim().parse().ok()?;
    let longitude: f64 = node.attribute("longitude")?.trim().parse().ok()?;
    Some(Geofence {
        latitude,
        longitude,
        radius_meters: node
            .attribute("radius")
            .and_then(|r| r.trim().parse().ok()),
    })
}

/// First direct child element with the given tag name.
fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Trimmed text content of a direct child element; `None` when the element
/// is absent or its text is empty.
fn element_text(node: Node, name: &str) -> Option<String> {
    let text = child_element(node, name)?.text()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn attr_bool(node: Node, name: &str) -> bool {
    matches!(node.attribute(name), Some("true") | Some("1"))
}

/// `order` attribute, falling back to the element's position in its parent.
fn attr_order(node: Node, position: usize) -> i32 {
    node.attribute("order")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(position as i32)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_archive_root() {
        let err = parse(b"<backup><task/></backup>").unwrap_err();
        assert!(matches!(err, ImportError::Format(_)));
    }

    #[test]
    fn empty_archive_is_not_an_error() {
        let archive = parse(b"<omnifocus></omnifocus>").unwrap();
        assert!(archive.is_empty());
    }

    #[test]
    fn synthesizes_missing_ids() {
        let archive = parse(
            b"<omnifocus>
                <task><name>One</name></task>
                <task><name>Two</name></task>
              </omnifocus>",
        )
        .unwrap();

        assert_eq!(archive.tasks[0].id, "task-1");
        assert_eq!(archive.tasks[1].id, "task-2");
    }

    #[test]
    fn nameless_task_is_dropped_silently() {
        let archive = parse(
            b"<omnifocus>
                <task><name>Kept</name></task>
                <task><note>no name here</note></task>
              </omnifocus>",
        )
        .unwrap();

        assert_eq!(archive.tasks.len(), 1);
        assert_eq!(archive.tasks[0].name, "Kept");
    }
}
