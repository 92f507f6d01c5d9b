mod aggregate_action;
mod log_action;
mod notify_action;
mod transform_action;
mod validate_action;

use std::sync::Arc;

use crate::actions::ActionRegistry;

/// Register all built-in actions into a freshly constructed registry.
pub fn register_all(registry: &mut ActionRegistry) {
    registry.install(Arc::new(log_action::LogAction));
    registry.install(Arc::new(transform_action::TransformAction));
    registry.install(Arc::new(validate_action::ValidateAction));
    registry.install(Arc::new(notify_action::NotifyAction));
    registry.install(Arc::new(aggregate_action::AggregateAction));
}
