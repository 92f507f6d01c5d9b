//! Input checks applied before any state is mutated.

use std::collections::HashSet;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::TaskDefinition;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;
pub const MAX_ACTION_NAME_LEN: usize = 64;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;
pub const DEFAULT_EXECUTION_LIMIT: usize = 100;
pub const MAX_EXECUTION_LIMIT: usize = 1000;
pub const MAX_DAYS: u32 = 365;
pub const MAX_HOURS: u32 = 720;
pub const MAX_BUCKET_MINUTES: u32 = 1440;

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::Validation(msg.into())
}

/// Trim and check a workflow name.
pub fn workflow_name(name: &str) -> EngineResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("workflow name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "workflow name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Trim tags, drop duplicates (first occurrence wins) and check limits.
pub fn tags(tags: &[String]) -> EngineResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(invalid("tags must not be empty"));
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(invalid(format!(
                "tag '{}' exceeds {} characters",
                tag, MAX_TAG_LEN
            )));
        }
        if seen.insert(tag.to_string()) {
            out.push(tag.to_string());
        }
    }
    if out.len() > MAX_TAGS {
        return Err(invalid(format!("at most {} tags are allowed", MAX_TAGS)));
    }
    Ok(out)
}

pub fn action_name(name: &str) -> EngineResult<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_ACTION_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if ok {
        Ok(())
    } else {
        Err(invalid(format!(
            "invalid action name '{}': use 1-{} characters from [A-Za-z0-9_.-]",
            name, MAX_ACTION_NAME_LEN
        )))
    }
}

/// Normalize tasks in place and check action names and id uniqueness.
pub fn tasks(tasks: &mut [TaskDefinition]) -> EngineResult<()> {
    let mut ids = HashSet::new();
    for task in tasks.iter_mut() {
        task.normalize();
        action_name(&task.action)?;
        for hook in [&task.pre_hook, &task.post_hook].into_iter().flatten() {
            action_name(hook)?;
        }
        if !ids.insert(task.id.clone()) {
            return Err(invalid(format!("duplicate task id '{}'", task.id)));
        }
    }
    Ok(())
}

/// Resolve `(offset, limit)` for workflow listings.
pub fn page(offset: Option<usize>, limit: Option<usize>) -> EngineResult<(usize, usize)> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(invalid(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    Ok((offset.unwrap_or(0), limit))
}

pub fn execution_limit(limit: Option<usize>) -> EngineResult<usize> {
    let limit = limit.unwrap_or(DEFAULT_EXECUTION_LIMIT);
    if limit == 0 || limit > MAX_EXECUTION_LIMIT {
        return Err(invalid(format!(
            "limit must be between 1 and {}",
            MAX_EXECUTION_LIMIT
        )));
    }
    Ok(limit)
}

pub fn within(field: &str, value: u32, max: u32) -> EngineResult<u32> {
    if value == 0 || value > max {
        return Err(invalid(format!("{} must be between 1 and {}", field, max)));
    }
    Ok(value)
}
