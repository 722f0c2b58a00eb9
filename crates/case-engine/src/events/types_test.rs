use super::{
    ensure_monotonic_sequence, CaseEvent, CaseEventRecord, CaseEventSequenceError,
    CaseEventStream, CaseEventType, CASE_EVENT_SCHEMA_0_0_1,
};
use crate::events::{encode_event_jsonl_line, parse_event_jsonl_line};
use serde_json::json;

#[test]
fn jsonl_line_carries_schema_and_payload() {
    let event = CaseEvent::for_plan_item(CaseEventType::PlanItemTransitioned, "pi-1")
        .with("from", "available")
        .with("to", "active");

    let record = CaseEventRecord::new("case-1", 0, "2026-02-13T00:00:00Z", event);
    let line = encode_event_jsonl_line(&record).expect("must encode");
    assert!(line.ends_with('\n'));
    assert!(line.contains(r#""type":"plan_item_transitioned""#));

    let decoded = parse_event_jsonl_line(&line).expect("must decode");
    assert_eq!(decoded.schema, CASE_EVENT_SCHEMA_0_0_1);
    assert_eq!(decoded.case_instance_id, "case-1");
    assert_eq!(decoded.event.plan_item_instance_id.as_deref(), Some("pi-1"));
    assert_eq!(decoded.event.data.get("to"), Some(&json!("active")));
}

#[test]
fn stream_continues_from_persisted_sequence() {
    let mut stream = CaseEventStream::with_start_seq("case-2", 5);
    let first = stream.next_record("t0", CaseEvent::new(CaseEventType::VariablesUpdated));
    let second = stream.next_record("t1", CaseEvent::new(CaseEventType::CaseCompleted));
    assert_eq!(first.seq, 5);
    assert_eq!(second.seq, 6);
    assert_eq!(stream.next_seq(), 7);
}

#[test]
fn sequence_validator_rejects_gap_and_bad_start() {
    let records = vec![
        CaseEventRecord::new("case-3", 0, "t0", CaseEvent::new(CaseEventType::CaseStarted)),
        CaseEventRecord::new("case-3", 2, "t1", CaseEvent::new(CaseEventType::CaseCompleted)),
    ];
    assert_eq!(
        ensure_monotonic_sequence(&records),
        Err(CaseEventSequenceError::NonMonotonic {
            index: 1,
            expected: 1,
            actual: 2,
        })
    );
    assert_eq!(
        ensure_monotonic_sequence(&records[1..]),
        Err(CaseEventSequenceError::InvalidStart { actual: 2 })
    );
    assert_eq!(ensure_monotonic_sequence(&[]), Err(CaseEventSequenceError::Empty));
}
