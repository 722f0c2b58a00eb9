mod read_document;

pub use read_document::{load_case_definition, parse_case_definition, DocumentFormat};
