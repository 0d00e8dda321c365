//! Parser tests over representative archive documents.

use focusport::parser::parse;
use focusport::types::{ProjectKind, ProjectStatus};

const SAMPLE: &str = r#"
<omnifocus>
  <context id="c1">
    <name>Errands</name>
    <location latitude="52.668" longitude="-8.630" radius="150"/>
  </context>
  <context id="c2" parent="c1">
    <name>Hardware Store</name>
  </context>
  <project id="p1" status="on-hold" type="sequential">
    <name>Home</name>
    <note>Everything around the house</note>
    <review-interval>1 week</review-interval>
    <task id="t1" flagged="true">
      <name>Buy milk</name>
      <context idref="c1"/>
      <estimated-minutes>10</estimated-minutes>
      <due-date>2026-03-01T09:00:00Z</due-date>
      <task id="t2">
        <name>Find wallet</name>
        <task id="t3">
          <name>Check coat pockets</name>
        </task>
      </task>
    </task>
  </project>
  <task id="t9" completed="true">
    <name>Standalone chore</name>
  </task>
</omnifocus>
"#;

#[test]
fn parses_structure_counts() {
    let archive = parse(SAMPLE.as_bytes()).unwrap();

    assert_eq!(archive.projects.len(), 1);
    assert_eq!(archive.contexts.len(), 2);
    assert_eq!(archive.tasks.len(), 1);
    // 3 nested in the project + 1 standalone, every depth counted.
    assert_eq!(archive.task_count(), 4);
}

#[test]
fn parses_project_fields() {
    let archive = parse(SAMPLE.as_bytes()).unwrap();
    let project = &archive.projects[0];

    assert_eq!(project.id, "p1");
    assert_eq!(project.name, "Home");
    assert_eq!(project.status, ProjectStatus::OnHold);
    assert_eq!(project.kind, ProjectKind::Sequential);
    assert_eq!(project.note.as_deref(), Some("Everything around the house"));
    assert_eq!(project.review_interval.as_deref(), Some("1 week"));
}

#[test]
fn parses_task_tree_and_fields() {
    let archive = parse(SAMPLE.as_bytes()).unwrap();
    let root = &archive.projects[0].tasks[0];

    assert_eq!(root.name, "Buy milk");
    assert!(root.flagged);
    assert!(!root.completed);
    assert_eq!(root.context_id.as_deref(), Some("c1"));
    assert_eq!(root.estimated_minutes, Some(10));
    assert!(root.due_at.is_some());
    assert!(root.defer_at.is_none());

    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].name, "Find wallet");
    assert_eq!(root.children[0].children[0].name, "Check coat pockets");
}

#[test]
fn parses_context_geofence() {
    let archive = parse(SAMPLE.as_bytes()).unwrap();

    let errands = &archive.contexts[0];
    let fence = errands.geofence.expect("geofence");
    assert!((fence.latitude - 52.668).abs() < 1e-9);
    assert!((fence.longitude + 8.630).abs() < 1e-9);
    assert_eq!(fence.radius_meters, Some(150.0));

    let nested = &archive.contexts[1];
    assert_eq!(nested.parent_id.as_deref(), Some("c1"));
    assert!(nested.geofence.is_none());
}

#[test]
fn completed_attribute_is_parsed() {
    let archive = parse(SAMPLE.as_bytes()).unwrap();
    assert!(archive.tasks[0].completed);
}

#[test]
fn deep_nesting_counts_every_level() {
    let mut doc = String::from("<omnifocus><project><name>Deep</name>");
    for i in 0..12 {
        doc.push_str(&format!("<task><name>level {i}</name>"));
    }
    for _ in 0..12 {
        doc.push_str("</task>");
    }
    doc.push_str("</project></omnifocus>");

    let archive = parse(doc.as_bytes()).unwrap();
    assert_eq!(archive.projects.len(), 1);
    assert_eq!(archive.task_count(), 12);
}

#[test]
fn malformed_elements_are_skipped_not_fatal() {
    let archive = parse(
        br#"<omnifocus>
          <project><note>a project with no name</note></project>
          <project><name>Real</name>
            <task><note>nameless, dropped with nothing else lost</note></task>
            <task><name>Kept</name></task>
          </project>
          <context><location latitude="1" longitude="2"/></context>
        </omnifocus>"#,
    )
    .unwrap();

    assert_eq!(archive.projects.len(), 1);
    assert_eq!(archive.projects[0].tasks.len(), 1);
    assert_eq!(archive.projects[0].tasks[0].name, "Kept");
    assert!(archive.contexts.is_empty());
}

#[test]
fn wrong_root_is_fatal() {
    let err = parse(b"<export><project><name>P</name></project></export>").unwrap_err();
    assert!(err.to_string().contains("root element"));
}

#[test]
fn garbage_bytes_are_fatal() {
    assert!(parse(b"not xml at all").is_err());
    assert!(parse(&[0xff, 0xfe, 0x00]).is_err());
}

#[test]
fn empty_archive_yields_empty_model() {
    let archive = parse(b"<omnifocus/>").unwrap();
    assert!(archive.is_empty());
    assert_eq!(archive.task_count(), 0);
}

#[test]
fn unparsable_dates_and_numbers_degrade_to_none() {
    let archive = parse(
        br#"<omnifocus>
          <task>
            <name>Fuzzy</name>
            <due-date>next tuesday</due-date>
            <estimated-minutes>soon</estimated-minutes>
          </task>
        </omnifocus>"#,
    )
    .unwrap();

    let task = &archive.tasks[0];
    assert!(task.due_at.is_none());
    assert!(task.estimated_minutes.is_none());
}

#[test]
fn synthesized_ids_follow_document_position() {
    let archive = parse(
        br#"<omnifocus>
          <project><name>First</name>
            <task><name>a</name></task>
          </project>
          <project id="explicit"><name>Second</name></project>
        </omnifocus>"#,
    )
    .unwrap();

    assert_eq!(archive.projects[0].id, "project-1");
    assert_eq!(archive.projects[0].tasks[0].id, "task-1");
    assert_eq!(archive.projects[1].id, "explicit");
}
