use super::{IssueSeverity, StructuredIssue};
use crate::FieldPath;

#[test]
fn issues_are_sorted_by_severity_then_kind() {
    let mut issues = vec![
        StructuredIssue {
            kind: "definition.listener".to_string(),
            severity: IssueSeverity::Warning,
            plan_item_id: None,
            field_path: FieldPath::root().key("b"),
            message: "second".to_string(),
            related: None,
        },
        StructuredIssue::error(
            "definition.sentry.unknown_source",
            Some("task-1"),
            FieldPath::root(),
            "first",
        ),
    ];

    StructuredIssue::sort_stable(&mut issues);

    assert_eq!(issues[0].severity, IssueSeverity::Error);
    assert_eq!(issues[1].severity, IssueSeverity::Warning);
    assert!(StructuredIssue::has_errors(&issues));
    assert!(!StructuredIssue::has_errors(&issues[1..]));
}
