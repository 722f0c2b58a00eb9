use super::operation::Operation;
use crate::error::EngineError;
use std::collections::VecDeque;

pub const DEFAULT_MAX_OPERATIONS: usize = 10_000;

/// FIFO of pending operations for one unit of work, with a hard cap on executed operations.
#[derive(Debug, Clone)]
pub struct Agenda {
    pending: VecDeque<Operation>,
    executed: usize,
    max_operations: usize,
}

impl Agenda {
    pub fn new(max_operations: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            executed: 0,
            max_operations,
        }
    }

    pub fn push(&mut self, operation: Operation) {
        self.pending.push_back(operation);
    }

    /// Next operation, or `None` at quiescence.
    pub fn pop(&mut self) -> Result<Option<Operation>, EngineError> {
        let Some(operation) = self.pending.pop_front() else {
            return Ok(None);
        };
        if self.executed >= self.max_operations {
            return Err(EngineError::AgendaLimitExceeded(self.max_operations));
        }
        self.executed += 1;
        Ok(Some(operation))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn executed(&self) -> usize {
        self.executed
    }
}

impl Default for Agenda {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OPERATIONS)
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
