pub mod builtin;
pub mod interpolate;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use thiserror::Error;

use crate::engine::types::{ActionOutput, Parameters};

/// Trait that every action handler implements.
pub trait Action: Send + Sync {
    /// Registry key (e.g., "log", "transform").
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Run the action against the task's parameters.
    fn run(&self, params: &Parameters) -> Result<ActionOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Action '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Unknown action: {0}")]
    Unknown(String),
}

/// Adapter registering a plain closure as an [`Action`].
struct FnAction<F> {
    name: String,
    description: String,
    handler: F,
}

impl<F> Action for FnAction<F>
where
    F: Fn(&Parameters) -> Result<ActionOutput> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn run(&self, params: &Parameters) -> Result<ActionOutput> {
        (self.handler)(params)
    }
}

/// Registry of available actions, shared by every engine operation.
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with all built-in actions registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Add an action while the registry is still exclusively owned.
    pub(crate) fn install(&mut self, action: Arc<dyn Action>) {
        self.actions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(action.name().to_string(), action);
    }

    /// Register an action. Names are never silently replaced.
    pub fn register(&self, action: Arc<dyn Action>) -> Result<(), ActionError> {
        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        let name = action.name().to_string();
        if actions.contains_key(&name) {
            return Err(ActionError::AlreadyRegistered(name));
        }
        tracing::debug!(action = %name, "Registered action");
        actions.insert(name, action);
        Ok(())
    }

    /// Register a closure under `name`.
    pub fn register_fn<F>(&self, name: &str, description: &str, handler: F) -> Result<(), ActionError>
    where
        F: Fn(&Parameters) -> Result<ActionOutput> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnAction {
            name: name.to_string(),
            description: description.to_string(),
            handler,
        }))
    }

    /// Look up an action by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Action>, ActionError> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// List all registered actions as `(name, description)`, sorted by name.
    pub fn list(&self) -> Vec<(String, String)> {
        let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(String, String)> = actions
            .values()
            .map(|a| (a.name().to_string(), a.description().to_string()))
            .collect();
        entries.sort();
        entries
    }

    /// Remove every action, built-ins included.
    pub fn clear(&self) {
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Drop custom registrations and restore the built-in set.
    pub fn reset(&self) {
        let fresh = Self::with_builtins();
        let builtins = fresh.actions.into_inner().unwrap_or_else(PoisonError::into_inner);
        *self.actions.write().unwrap_or_else(PoisonError::into_inner) = builtins;
    }
}
