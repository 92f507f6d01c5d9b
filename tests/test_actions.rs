//! Tests for the action registry and built-in actions.

use std::sync::Arc;

use serde_json::json;
use taskflow::actions::{Action, ActionError, ActionRegistry};
use taskflow::engine::types::{ActionOutput, Parameters};

// --- Helper ---

fn params(pairs: Vec<(&str, serde_json::Value)>) -> Parameters {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn run(action: &str, p: Parameters) -> anyhow::Result<ActionOutput> {
    let reg = ActionRegistry::with_builtins();
    reg.get(action).unwrap().run(&p)
}

struct Echo;

impl Action for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the parameters unchanged"
    }

    fn run(&self, params: &Parameters) -> anyhow::Result<ActionOutput> {
        Ok(params.clone())
    }
}

// --- ActionRegistry ---

#[test]
fn registry_with_builtins_lists_sorted() {
    let reg = ActionRegistry::with_builtins();
    let names: Vec<String> = reg.list().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["aggregate", "log", "notify", "transform", "validate"]);
}

#[test]
fn registry_get_unknown_is_error() {
    let reg = ActionRegistry::with_builtins();
    let err = reg.get("nope").err().unwrap();
    assert_eq!(err, ActionError::Unknown("nope".to_string()));
    assert_eq!(err.to_string(), "Unknown action: nope");
}

#[test]
fn registry_rejects_duplicate_names() {
    let reg = ActionRegistry::new();
    reg.register(Arc::new(Echo)).unwrap();
    let err = reg.register(Arc::new(Echo)).unwrap_err();
    assert_eq!(err, ActionError::AlreadyRegistered("echo".to_string()));
}

#[test]
fn registry_rejects_overriding_builtin() {
    let reg = ActionRegistry::with_builtins();
    let result = reg.register_fn("log", "shadow", |_| Ok(ActionOutput::new()));
    assert!(result.is_err());
}

#[test]
fn register_fn_is_callable() {
    let reg = ActionRegistry::new();
    reg.register_fn("double", "Double 'n'", |p| {
        let n = p.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(params(vec![("n", json!(n * 2))]))
    })
    .unwrap();

    assert!(reg.contains("double"));
    let out = reg.get("double").unwrap().run(&params(vec![("n", json!(21))])).unwrap();
    assert_eq!(out["n"], json!(42));
}

#[test]
fn clear_and_reset() {
    let reg = ActionRegistry::with_builtins();
    reg.register(Arc::new(Echo)).unwrap();

    reg.clear();
    assert!(reg.list().is_empty());
    assert!(!reg.contains("log"));

    reg.register(Arc::new(Echo)).unwrap();
    reg.reset();
    assert!(reg.contains("log"));
    assert!(!reg.contains("echo"));
    // A name freed by reset can be registered again.
    reg.register(Arc::new(Echo)).unwrap();
}

// --- log ---

#[test]
fn log_renders_message() {
    let out = run(
        "log",
        params(vec![("message", json!("hello ${who}")), ("who", json!("world"))]),
    )
    .unwrap();
    assert_eq!(out["logged"], json!(true));
    assert_eq!(out["level"], json!("info"));
    assert_eq!(out["message"], json!("hello world"));
}

#[test]
fn log_rejects_unknown_level() {
    let err = run("log", params(vec![("level", json!("loud"))])).unwrap_err();
    assert!(err.to_string().contains("unsupported level"));
}

// --- transform ---

#[test]
fn transform_uppercase_array() {
    let out = run(
        "transform",
        params(vec![("data", json!(["a", "b"])), ("operation", json!("uppercase"))]),
    )
    .unwrap();
    assert_eq!(out["result"], json!(["A", "B"]));
}

#[test]
fn transform_sort_numbers_and_length() {
    let sorted = run(
        "transform",
        params(vec![("data", json!([3, 1, 2])), ("operation", json!("sort"))]),
    )
    .unwrap();
    assert_eq!(sorted["result"], json!([1, 2, 3]));

    let len = run(
        "transform",
        params(vec![("data", json!({"a": 1, "b": 2})), ("operation", json!("length"))]),
    )
    .unwrap();
    assert_eq!(len["result"], json!(2));
}

#[test]
fn transform_multiply_needs_factor() {
    let p = params(vec![("data", json!([1, 2])), ("operation", json!("multiply"))]);
    assert!(run("transform", p).is_err());

    let out = run(
        "transform",
        params(vec![
            ("data", json!([1, 2])),
            ("operation", json!("multiply")),
            ("factor", json!(1.5)),
        ]),
    )
    .unwrap();
    assert_eq!(out["result"], json!([1.5, 3.0]));
}

#[test]
fn transform_unknown_operation() {
    let err = run(
        "transform",
        params(vec![("data", json!("x")), ("operation", json!("explode"))]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown operation"));
}

#[test]
fn transform_requires_data() {
    assert!(run("transform", Parameters::new()).is_err());
}

// --- aggregate ---

#[test]
fn aggregate_operations() {
    let values = json!([4, 8, 6]);
    let sum = run("aggregate", params(vec![("values", values.clone())])).unwrap();
    assert_eq!(sum["result"], json!(18.0));
    assert_eq!(sum["count"], json!(3));

    let avg = run(
        "aggregate",
        params(vec![("values", values.clone()), ("operation", json!("avg"))]),
    )
    .unwrap();
    assert_eq!(avg["result"], json!(6.0));

    let max = run(
        "aggregate",
        params(vec![("values", values), ("operation", json!("max"))]),
    )
    .unwrap();
    assert_eq!(max["result"], json!(8.0));
}

#[test]
fn aggregate_empty_min_is_null() {
    let out = run(
        "aggregate",
        params(vec![("values", json!([])), ("operation", json!("min"))]),
    )
    .unwrap();
    assert!(out["result"].is_null());
}

#[test]
fn aggregate_rejects_non_numeric() {
    assert!(run("aggregate", params(vec![("values", json!([1, "two"]))])).is_err());
}

// --- notify ---

#[test]
fn notify_defaults_to_email() {
    let out = run(
        "notify",
        params(vec![
            ("recipient", json!("ops@example.com")),
            ("message", json!("build ${id} done")),
            ("id", json!(7)),
        ]),
    )
    .unwrap();
    assert_eq!(out["channel"], json!("email"));
    assert_eq!(out["message"], json!("build 7 done"));
}

#[test]
fn notify_rejects_unknown_channel() {
    let err = run(
        "notify",
        params(vec![
            ("recipient", json!("x")),
            ("message", json!("y")),
            ("channel", json!("pigeon")),
        ]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown channel"));
}

#[test]
fn notify_requires_recipient() {
    assert!(run("notify", params(vec![("message", json!("hi"))])).is_err());
}

// --- validate ---

#[test]
fn validate_required_fields() {
    let ok = run(
        "validate",
        params(vec![("data", json!({"a": 1})), ("required", json!(["a"]))]),
    )
    .unwrap();
    assert_eq!(ok["valid"], json!(true));

    let err = run(
        "validate",
        params(vec![("data", json!({"a": null})), ("required", json!(["a", "b"]))]),
    )
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("missing field 'a'"));
    assert!(msg.contains("missing field 'b'"));
}

#[test]
fn validate_json_schema() {
    let schema = json!({
        "type": "object",
        "properties": { "age": { "type": "integer", "minimum": 0 } },
        "required": ["age"]
    });

    let ok = run(
        "validate",
        params(vec![("data", json!({"age": 30})), ("schema", schema.clone())]),
    );
    assert!(ok.is_ok());

    let bad = run(
        "validate",
        params(vec![("data", json!({"age": -1})), ("schema", schema)]),
    );
    assert!(bad.unwrap_err().to_string().starts_with("Validation failed"));
}
