//! Tests for dependency ordering and cycle detection.

use taskflow::engine::topological_sort;
use taskflow::engine::types::TaskDefinition;

fn task(id: &str, deps: &[&str]) -> TaskDefinition {
    TaskDefinition::new(id, "log").depends_on(deps)
}

fn ids(tasks: &[TaskDefinition]) -> Vec<String> {
    topological_sort(tasks)
        .unwrap()
        .into_iter()
        .map(|t| t.id.clone())
        .collect()
}

fn assert_respects_edges(tasks: &[TaskDefinition], order: &[String]) {
    assert_eq!(order.len(), tasks.len());
    let pos = |id: &str| order.iter().position(|o| o == id);
    for t in tasks {
        let at = pos(&t.id).unwrap();
        for dep in &t.depends_on {
            if let Some(d) = pos(dep) {
                assert!(d < at, "{} must precede {}", dep, t.id);
            }
        }
    }
}

#[test]
fn empty_input() {
    assert!(ids(&[]).is_empty());
}

#[test]
fn independent_tasks_keep_input_order() {
    let tasks = vec![task("c", &[]), task("a", &[]), task("b", &[])];
    assert_eq!(ids(&tasks), vec!["c", "a", "b"]);
}

#[test]
fn dependency_listed_after_dependent() {
    let tasks = vec![task("b", &["a"]), task("a", &[])];
    assert_eq!(ids(&tasks), vec!["a", "b"]);
}

#[test]
fn diamond() {
    let tasks = vec![
        task("d", &["b", "c"]),
        task("b", &["a"]),
        task("c", &["a"]),
        task("a", &[]),
    ];
    let order = ids(&tasks);
    assert_eq!(order.first().map(String::as_str), Some("a"));
    assert_eq!(order.last().map(String::as_str), Some("d"));
    assert_respects_edges(&tasks, &order);
}

#[test]
fn long_chain_is_ordered() {
    let names: Vec<String> = (0..200).map(|i| format!("t{}", i)).collect();
    let mut tasks: Vec<TaskDefinition> = names
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let deps: Vec<&str> = if i == 0 { vec![] } else { vec![names[i - 1].as_str()] };
            task(n, &deps)
        })
        .collect();
    tasks.reverse();

    let order = ids(&tasks);
    assert_eq!(order, names);
}

#[test]
fn missing_dependency_is_ignored() {
    let tasks = vec![task("a", &["ghost"]), task("b", &["a", "phantom"])];
    assert_eq!(ids(&tasks), vec!["a", "b"]);
}

#[test]
fn duplicate_dependencies_collapse() {
    let tasks = vec![task("b", &["a", "a", "a"]), task("a", &[])];
    assert_eq!(ids(&tasks), vec!["a", "b"]);
}

#[test]
fn self_loop_is_a_cycle() {
    let tasks = vec![task("a", &["a"])];
    let err = topological_sort(&tasks).unwrap_err();
    assert!(err.to_string().contains("Cycle detected"));
    assert_eq!(err.path, vec!["a", "a"]);
}

#[test]
fn two_node_cycle() {
    let tasks = vec![task("a", &["b"]), task("b", &["a"])];
    let err = topological_sort(&tasks).unwrap_err();
    assert!(err.path.contains(&"a".to_string()));
    assert!(err.path.contains(&"b".to_string()));
    assert_eq!(err.path.first(), err.path.last());
}

#[test]
fn three_node_cycle_behind_valid_prefix() {
    let tasks = vec![
        task("start", &[]),
        task("x", &["start", "z"]),
        task("y", &["x"]),
        task("z", &["y"]),
    ];
    let err = topological_sort(&tasks).unwrap_err();
    assert!(err.to_string().contains("Cycle detected"));
    assert!(!err.path.contains(&"start".to_string()));
}

#[test]
fn large_cycle() {
    let n = 50;
    let tasks: Vec<TaskDefinition> = (0..n)
        .map(|i| {
            let dep = format!("n{}", (i + 1) % n);
            task(&format!("n{}", i), &[dep.as_str()])
        })
        .collect();
    assert!(topological_sort(&tasks).is_err());
}

#[test]
fn wide_fan_in() {
    let mut tasks: Vec<TaskDefinition> = (0..20).map(|i| task(&format!("p{}", i), &[])).collect();
    let parents: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let refs: Vec<&str> = parents.iter().map(String::as_str).collect();
    tasks.insert(0, task("sink", &refs));

    let order = ids(&tasks);
    assert_eq!(order.last().map(String::as_str), Some("sink"));
    assert_respects_edges(&tasks, &order);
}
