use super::types::CaseCommandEnvelope;

pub fn encode_command_jsonl_line(envelope: &CaseCommandEnvelope) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_command_jsonl_line(line: &str) -> serde_json::Result<CaseCommandEnvelope> {
    serde_json::from_str::<CaseCommandEnvelope>(line.trim_end())
}

#[cfg(test)]
#[path = "jsonl_test.rs"]
mod tests;
