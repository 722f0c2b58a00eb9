mod command;
mod operation;
mod queue;
mod unit_of_work;

pub use operation::{Operation, TransitionOrigin};
pub use queue::{Agenda, DEFAULT_MAX_OPERATIONS};
pub use unit_of_work::{UnitOfWork, UnitOfWorkOutcome};
