mod jsonl;
mod types;

pub use jsonl::{decode_command_jsonl_line, encode_command_jsonl_line};
pub use types::{
    CaseCommand, CaseCommandEnvelope, CommandAdmission, CommandDeduper, DuplicateCommandMode, PlanItemTarget,
    StartCaseRequest, CASE_COMMAND_SCHEMA_0_0_1,
};
