pub mod dag;
pub mod error;
pub mod executor;
pub mod types;
pub mod validate;
mod workflows;

pub use dag::{CycleError, topological_sort};
pub use error::{EngineError, EngineResult};
pub use executor::{EngineConfig, WorkflowEngine};
