mod case_engine;
mod definitions;
mod options;

pub use case_engine::{CaseEngine, CommandOutcome};
pub use definitions::{DefinitionRepository, DeployedDefinition};
pub use options::EngineOptions;
