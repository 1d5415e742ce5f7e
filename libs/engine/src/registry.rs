//! Executor registry (C2)
//!
//! A table from step-kind tag to [`StepExecutor`]. Populated once at engine
//! setup; a missing lookup at dispatch time is a fatal [`OrchestratorError::NotFound`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::OrchestratorError;
use crate::executor::StepExecutor;

/// Lookup table from step-kind tag to a [`StepExecutor`]
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for a step-kind tag; last registration wins
    pub fn register(&mut self, tag: impl Into<String>, executor: Arc<dyn StepExecutor>) {
        self.executors.insert(tag.into(), executor);
    }

    /// Look up the executor for a step-kind tag
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<Arc<dyn StepExecutor>> {
        self.executors.get(tag).cloned()
    }

    /// Look up the executor for a tag, or a [`OrchestratorError::NotFound`]
    /// listing the known kinds as a hint.
    pub fn get_or_err(&self, tag: &str) -> Result<Arc<dyn StepExecutor>, OrchestratorError> {
        self.get(tag).ok_or_else(|| OrchestratorError::NotFound {
            what: "executor kind".to_string(),
            name: tag.to_string(),
            available: self.types(),
        })
    }

    /// Every registered step-kind tag
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::transform::TransformExecutor;

    #[test]
    fn last_registration_wins_and_types_lists_known_tags() {
        let mut registry = ExecutorRegistry::new();
        registry.register("transform", Arc::new(TransformExecutor));
        assert!(registry.get("transform").is_some());
        assert_eq!(registry.types(), vec!["transform".to_string()]);
    }

    #[test]
    fn missing_lookup_reports_available_kinds() {
        let mut registry = ExecutorRegistry::new();
        registry.register("transform", Arc::new(TransformExecutor));
        let err = registry.get_or_err("agent").unwrap_err();
        match err {
            OrchestratorError::NotFound { available, .. } => {
                assert_eq!(available, vec!["transform".to_string()]);
            }
            _ => panic!("expected NotFound"),
        }
    }
}
