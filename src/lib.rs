pub mod actions;
pub mod analytics;
pub mod api;
pub mod cli;
pub mod engine;
pub mod scheduler;
pub mod storage;
