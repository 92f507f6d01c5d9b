use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::engine::types::TaskDefinition;

/// A dependency cycle. `path` starts and ends with the same task id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cycle detected in task dependencies: {}", path.join(" -> "))]
pub struct CycleError {
    pub path: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Order tasks so every dependency precedes its dependents.
///
/// Depth-first with three-state marking, driven by an explicit stack so very
/// deep graphs cannot overflow the call stack. Roots are visited in input
/// order, so tasks without a relative constraint keep their original order.
/// Dependencies naming ids outside `tasks` are ignored; repeated entries are
/// collapsed.
pub fn topological_sort(tasks: &[TaskDefinition]) -> Result<Vec<&TaskDefinition>, CycleError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        index.entry(task.id.as_str()).or_insert(i);
    }

    // Resolved, de-duplicated dependency lists in declaration order.
    let edges: Vec<Vec<usize>> = tasks
        .iter()
        .map(|task| {
            let mut seen = HashSet::new();
            task.depends_on
                .iter()
                .filter_map(|dep| index.get(dep.as_str()).copied())
                .filter(|dep| seen.insert(*dep))
                .collect()
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; tasks.len()];
    let mut order = Vec::with_capacity(tasks.len());
    // (task index, next dependency cursor)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..tasks.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InProgress;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            match edges[node].get(cursor) {
                Some(&dep) => {
                    frame.1 += 1;
                    match marks[dep] {
                        Mark::Unvisited => {
                            marks[dep] = Mark::InProgress;
                            stack.push((dep, 0));
                        }
                        Mark::InProgress => return Err(cycle_from_stack(tasks, &stack, dep)),
                        Mark::Done => {}
                    }
                }
                None => {
                    stack.pop();
                    marks[node] = Mark::Done;
                    order.push(&tasks[node]);
                }
            }
        }
    }

    Ok(order)
}

/// The stack holds the current DFS path (dependents first). The cycle is the
/// slice from `dep` to the top, reported in dependency direction.
fn cycle_from_stack(tasks: &[TaskDefinition], stack: &[(usize, usize)], dep: usize) -> CycleError {
    let start = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
    let mut path: Vec<String> = stack[start..]
        .iter()
        .map(|(n, _)| tasks[*n].id.clone())
        .collect();
    path.push(tasks[dep].id.clone());
    CycleError { path }
}
