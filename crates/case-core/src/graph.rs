use crate::definition::{CaseDefinition, PlanItemDefinition, SentryKind};
use crate::lifecycle::PlanItemState;
use std::collections::BTreeMap;

/// Points at one sentry of one plan item definition, together with the on-parts of that sentry
/// that listen to a given (source, state) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentryRef {
    pub target: String,
    pub kind: SentryKind,
    pub sentry_index: usize,
    pub on_part_indexes: Vec<usize>,
}

#[derive(Debug, Clone)]
struct GraphEntry {
    order: usize,
    parent: Option<String>,
    path: Vec<usize>,
}

/// Read-only index over an immutable case definition: document order, parent links and the
/// reverse on-part lookup used by sentry evaluation.
#[derive(Debug, Clone)]
pub struct DefinitionGraph {
    definition: CaseDefinition,
    entries: BTreeMap<String, GraphEntry>,
    listeners: BTreeMap<(String, PlanItemState), Vec<SentryRef>>,
}

impl DefinitionGraph {
    pub fn new(definition: CaseDefinition) -> Self {
        let mut entries = BTreeMap::new();
        let mut order = 0usize;
        index_item(&definition.plan_model, None, Vec::new(), &mut order, &mut entries);

        let mut listeners = BTreeMap::<(String, PlanItemState), Vec<SentryRef>>::new();
        let mut ordered = entries.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|(_, entry)| entry.order);
        for (target_id, entry) in ordered {
            let Some(target) = item_at(&definition.plan_model, &entry.path) else {
                continue;
            };
            // Exit sentries are registered first so they are evaluated first for each target.
            for kind in [SentryKind::Exit, SentryKind::Entry] {
                for (sentry_index, sentry) in target.sentries(kind).iter().enumerate() {
                    let mut grouped = BTreeMap::<(String, PlanItemState), Vec<usize>>::new();
                    for (on_part_index, on_part) in sentry.on_parts.iter().enumerate() {
                        grouped
                            .entry((on_part.source.clone(), on_part.state))
                            .or_default()
                            .push(on_part_index);
                    }
                    for (key, on_part_indexes) in grouped {
                        listeners.entry(key).or_default().push(SentryRef {
                            target: target_id.clone(),
                            kind,
                            sentry_index,
                            on_part_indexes,
                        });
                    }
                }
            }
        }

        Self {
            definition,
            entries,
            listeners,
        }
    }

    pub fn definition(&self) -> &CaseDefinition {
        &self.definition
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn root(&self) -> &PlanItemDefinition {
        &self.definition.plan_model
    }

    pub fn get(&self, id: &str) -> Option<&PlanItemDefinition> {
        let entry = self.entries.get(id)?;
        item_at(&self.definition.plan_model, &entry.path)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Position of `id` in a pre-order walk of the plan model; the root is 0.
    pub fn document_order(&self, id: &str) -> usize {
        self.entries
            .get(id)
            .map(|entry| entry.order)
            .unwrap_or(usize::MAX)
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id)?.parent.as_deref()
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.definition.plan_model.id == id
    }

    /// Sentries with at least one on-part waiting for `source` to reach `state`, in document
    /// order of their owners, exit sentries before entry sentries per owner.
    pub fn sentries_listening_to(&self, source: &str, state: PlanItemState) -> &[SentryRef] {
        self.listeners
            .get(&(source.to_string(), state))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn index_item(
    item: &PlanItemDefinition,
    parent: Option<&str>,
    path: Vec<usize>,
    order: &mut usize,
    entries: &mut BTreeMap<String, GraphEntry>,
) {
    entries.insert(
        item.id.clone(),
        GraphEntry {
            order: *order,
            parent: parent.map(str::to_string),
            path: path.clone(),
        },
    );
    *order += 1;
    for (index, child) in item.children.iter().enumerate() {
        let mut child_path = path.clone();
        child_path.push(index);
        index_item(child, Some(item.id.as_str()), child_path, order, entries);
    }
}

fn item_at<'a>(root: &'a PlanItemDefinition, path: &[usize]) -> Option<&'a PlanItemDefinition> {
    let mut current = root;
    for index in path {
        current = current.children.get(*index)?;
    }
    Some(current)
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
