use case_core::{CaseDefinition, FieldPath, StructuredIssue};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    /// YAML first, JSON as fallback.
    Auto,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => DocumentFormat::Json,
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Auto,
        }
    }
}

pub fn parse_case_definition(
    text: &str,
    format: DocumentFormat,
) -> Result<CaseDefinition, Vec<StructuredIssue>> {
    let parsed = match format {
        DocumentFormat::Json => serde_json::from_str::<CaseDefinition>(text)
            .map_err(|error| format!("json decode error: {error}")),
        DocumentFormat::Yaml => serde_yaml::from_str::<CaseDefinition>(text)
            .map_err(|error| format!("yaml decode error: {error}")),
        DocumentFormat::Auto => serde_yaml::from_str::<CaseDefinition>(text)
            .or_else(|_| serde_json::from_str::<CaseDefinition>(text))
            .map_err(|error| format!("decode error: {error}")),
    };
    parsed.map_err(|message| {
        vec![StructuredIssue::error(
            "definition_parse_error",
            None,
            FieldPath::root(),
            message,
        )]
    })
}

/// Reads one definition file. Every reported issue carries the file it came from.
pub fn load_case_definition(path: impl AsRef<Path>) -> Result<CaseDefinition, Vec<StructuredIssue>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|error| {
        vec![attach_issue_file(
            StructuredIssue::error(
                "definition_io_error",
                None,
                FieldPath::root(),
                format!("read file failed: {error}"),
            ),
            path,
        )]
    })?;
    parse_case_definition(text.as_str(), DocumentFormat::from_path(path)).map_err(|issues| {
        issues
            .into_iter()
            .map(|issue| attach_issue_file(issue, path))
            .collect()
    })
}

fn attach_issue_file(mut issue: StructuredIssue, path: &Path) -> StructuredIssue {
    let file = Value::String(path.display().to_string());
    issue.related = Some(match issue.related.take() {
        Some(Value::Object(mut object)) => {
            object.insert("file".to_string(), file);
            Value::Object(object)
        }
        Some(other) => json!({ "file": file, "details": other }),
        None => {
            let mut object = Map::new();
            object.insert("file".to_string(), file);
            Value::Object(object)
        }
    });
    issue
}

#[cfg(test)]
#[path = "read_document_test.rs"]
mod tests;
