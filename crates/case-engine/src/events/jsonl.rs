use super::types::CaseEventRecord;

pub fn encode_event_jsonl_line(record: &CaseEventRecord) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

pub fn parse_event_jsonl_line(line: &str) -> serde_json::Result<CaseEventRecord> {
    serde_json::from_str::<CaseEventRecord>(line.trim_end())
}
