use crate::engine::types::Parameters;

/// Render `${key}` and `${key.nested}` placeholders from task parameters.
///
/// Placeholders that do not resolve are kept verbatim so a misspelled key is
/// visible in the rendered text.
pub fn render(template: &str, params: &Parameters) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("${") {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let close = open + len;
        out.push_str(&rest[..open]);

        let path = &rest[open + 2..close];
        match lookup(path, params) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    out
}

fn lookup(path: &str, params: &Parameters) -> Option<String> {
    let mut parts = path.trim().split('.');
    let mut current = params.get(parts.next()?)?;
    for part in parts {
        current = match current {
            serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            other => other.get(part)?,
        };
    }

    Some(match current {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: serde_json::Value) -> Parameters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn renders_top_level_key() {
        let p = params(serde_json::json!({"name": "Alice"}));
        assert_eq!(render("Hello ${name}!", &p), "Hello Alice!");
    }

    #[test]
    fn renders_nested_and_indexed_keys() {
        let p = params(serde_json::json!({
            "user": {"email": "alice@example.com"},
            "items": [1, 2, 3]
        }));
        assert_eq!(
            render("${user.email} has ${items.2}", &p),
            "alice@example.com has 3"
        );
    }

    #[test]
    fn keeps_unresolved_placeholder() {
        let p = Parameters::new();
        assert_eq!(render("Hello ${missing}!", &p), "Hello ${missing}!");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let p = params(serde_json::json!({"a": 1}));
        assert_eq!(render("value ${a", &p), "value ${a");
    }
}
