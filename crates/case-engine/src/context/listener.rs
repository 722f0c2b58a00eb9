use crate::commands::CaseCommand;
use case_core::{PlanItemKind, PlanItemState};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named listener referenced from a definition through a `delegate` action.
pub trait LifecycleListener: Send + Sync {
    fn on_transition(&self, context: &mut ListenerContext<'_>) -> Result<(), String>;
}

/// View handed to a listener for one transition. Variable writes and issued commands are applied
/// by the unit of work once the listener returns.
#[derive(Debug)]
pub struct ListenerContext<'a> {
    pub case_instance_id: &'a str,
    pub plan_item_instance_id: &'a str,
    pub definition_id: &'a str,
    pub kind: PlanItemKind,
    pub from: PlanItemState,
    pub to: PlanItemState,
    variables: &'a Map<String, Value>,
    writes: Map<String, Value>,
    commands: Vec<CaseCommand>,
}

impl<'a> ListenerContext<'a> {
    pub fn new(
        case_instance_id: &'a str,
        plan_item_instance_id: &'a str,
        definition_id: &'a str,
        kind: PlanItemKind,
        from: PlanItemState,
        to: PlanItemState,
        variables: &'a Map<String, Value>,
    ) -> Self {
        Self {
            case_instance_id,
            plan_item_instance_id,
            definition_id,
            kind,
            from,
            to,
            variables,
            writes: Map::new(),
            commands: Vec::new(),
        }
    }

    /// Reads a variable, seeing writes made earlier by the same listener.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.writes.get(name).or_else(|| self.variables.get(name))
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.writes.insert(name.into(), value);
    }

    pub fn issue(&mut self, command: CaseCommand) {
        self.commands.push(command);
    }

    pub fn into_effects(self) -> (Map<String, Value>, Vec<CaseCommand>) {
        (self.writes, self.commands)
    }
}

#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: BTreeMap<String, Arc<dyn LifecycleListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, listener: Arc<dyn LifecycleListener>) {
        self.listeners.insert(name.into(), listener);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn LifecycleListener>> {
        self.listeners.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.listeners.keys().cloned().collect()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.names())
            .finish()
    }
}

/// Listener that merges a fixed set of variables; what a `set_variables` binding resolves to.
#[derive(Debug, Clone, Default)]
pub struct SetVariablesListener {
    variables: Map<String, Value>,
}

impl SetVariablesListener {
    pub fn new(variables: Map<String, Value>) -> Self {
        Self { variables }
    }
}

impl LifecycleListener for SetVariablesListener {
    fn on_transition(&self, context: &mut ListenerContext<'_>) -> Result<(), String> {
        for (name, value) in &self.variables {
            context.set_variable(name.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "listener_test.rs"]
mod tests;
