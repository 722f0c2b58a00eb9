use super::{load_case_definition, parse_case_definition, DocumentFormat};
use case_core::PlanItemKind;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const YAML_DEFINITION: &str = r#"
key: claims
name: Claims handling
plan_model:
  id: root
  kind: stage
  children:
    - id: review
      name: Review claim
      kind: human_task
      required: true
    - id: payout
      kind: task
      entry_criteria:
        - id: reviewed
          on_parts:
            - source: review
              state: completed
          if_part:
            condition: ${approved}
"#;

#[test]
fn format_follows_extension() {
    assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
    assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
    assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")), DocumentFormat::Yaml);
    assert_eq!(DocumentFormat::from_path(Path::new("definition")), DocumentFormat::Auto);
}

#[test]
fn load_case_definition_reads_yaml() {
    let root = temp_dir("definition-yaml");
    let path = root.join("claims.yaml");
    write(&path, YAML_DEFINITION);

    let definition = load_case_definition(&path).expect("definition must load");
    assert_eq!(definition.key, "claims");
    assert_eq!(definition.plan_model.children.len(), 2);
    assert_eq!(definition.plan_model.children[1].kind, PlanItemKind::Task);
    assert_eq!(
        definition.plan_model.children[1].entry_criteria[0]
            .if_part
            .as_ref()
            .map(|if_part| if_part.condition.as_str()),
        Some("${approved}")
    );
}

#[test]
fn auto_format_accepts_json_without_extension() {
    let root = temp_dir("definition-auto");
    let path = root.join("definition");
    write(
        &path,
        r#"{"key":"tiny","plan_model":{"id":"root","kind":"stage","children":[{"id":"only","kind":"task"}]}}"#,
    );
    let definition = load_case_definition(&path).expect("definition must load");
    assert_eq!(definition.key, "tiny");
}

#[test]
fn parse_errors_become_issues_with_file() {
    let root = temp_dir("definition-broken");
    let path = root.join("broken.json");
    write(&path, r#"{"key": "broken", "plan_model": {"id": "root", "kind": "spaceship"}}"#);

    let issues = load_case_definition(&path).expect_err("kind is unknown");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "definition_parse_error");
    let file = issues[0]
        .related
        .as_ref()
        .and_then(|related| related.get("file"))
        .and_then(|file| file.as_str())
        .expect("file attached");
    assert!(file.ends_with("broken.json"));
}

#[test]
fn missing_file_is_reported_as_io_issue() {
    let root = temp_dir("definition-missing");
    let issues = load_case_definition(root.join("absent.yaml")).expect_err("file is missing");
    assert_eq!(issues[0].kind, "definition_io_error");
}

#[test]
fn parse_case_definition_rejects_unknown_fields() {
    let issues = parse_case_definition(
        r#"{"key": "x", "plan_model": {"id": "root", "kind": "stage"}, "extra": 1}"#,
        DocumentFormat::Json,
    )
    .expect_err("unknown field");
    assert!(issues[0].message.contains("extra"));
}

fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time must be monotonic")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("case-runner-{prefix}-{}-{nanos}", std::process::id()));
    fs::create_dir_all(&dir).expect("must create temp dir");
    dir
}

fn write(path: impl AsRef<Path>, content: &str) {
    fs::write(path, content).expect("must write file");
}
