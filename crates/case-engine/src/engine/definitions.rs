use crate::error::EngineError;
use case_core::{
    definition_hash, validate_case_definition, CaseDefinition, DefinitionGraph, IssueSeverity,
};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Debug)]
pub struct DeployedDefinition {
    pub key: String,
    pub version: u32,
    pub hash: String,
    pub graph: Arc<DefinitionGraph>,
}

/// Versioned deployments per definition key. Redeploying an unchanged definition returns the
/// existing deployment.
#[derive(Debug, Default)]
pub struct DefinitionRepository {
    deployments: RwLock<BTreeMap<String, Vec<Arc<DeployedDefinition>>>>,
}

impl DefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy(&self, definition: CaseDefinition) -> Result<Arc<DeployedDefinition>, EngineError> {
        let errors = validate_case_definition(&definition)
            .into_iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
            .collect::<Vec<_>>();
        if !errors.is_empty() {
            return Err(EngineError::InvalidDefinition(errors));
        }
        let hash =
            definition_hash(&definition).map_err(|err| EngineError::Serialization(err.to_string()))?;

        let mut deployments = match self.deployments.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let versions = deployments.entry(definition.key.clone()).or_default();
        if let Some(latest) = versions.last() {
            if latest.hash == hash {
                return Ok(Arc::clone(latest));
            }
        }
        let deployed = Arc::new(DeployedDefinition {
            key: definition.key.clone(),
            version: versions.len() as u32 + 1,
            hash,
            graph: Arc::new(DefinitionGraph::new(definition)),
        });
        info!(key = %deployed.key, version = deployed.version, "case definition deployed");
        versions.push(Arc::clone(&deployed));
        Ok(deployed)
    }

    pub fn latest(&self, key: &str) -> Option<Arc<DeployedDefinition>> {
        self.with_versions(key, |versions| versions.last().cloned())
    }

    pub fn get(&self, key: &str, version: u32) -> Option<Arc<DeployedDefinition>> {
        self.with_versions(key, |versions| {
            versions
                .iter()
                .find(|deployed| deployed.version == version)
                .cloned()
        })
    }

    pub fn find_by_hash(&self, key: &str, hash: &str) -> Option<Arc<DeployedDefinition>> {
        self.with_versions(key, |versions| {
            versions.iter().find(|deployed| deployed.hash == hash).cloned()
        })
    }

    pub fn keys(&self) -> Vec<String> {
        match self.deployments.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    fn with_versions<T>(
        &self,
        key: &str,
        f: impl FnOnce(&[Arc<DeployedDefinition>]) -> Option<T>,
    ) -> Option<T> {
        let deployments = match self.deployments.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(deployments.get(key)?.as_slice())
    }
}

#[cfg(test)]
#[path = "definitions_test.rs"]
mod tests;
