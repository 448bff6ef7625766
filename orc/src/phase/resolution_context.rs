//! Variable substitution for prompt assembly (§9 "Embedded templates +
//! dynamic variable maps"): `{{NAME}}` is replaced by the map value when
//! present, left in place otherwise, except for a small reserved set that
//! is always substituted (empty string if unset).

use std::collections::HashMap;

use serde_json::Value;

const RESERVED: &[&str] = &["TASK_ID", "TASK_TITLE", "TASK_BRANCH"];

#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub variables: HashMap<String, Value>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let Some(end) = rest[start..].find("}}") else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let name = rest[start + 2..start + end].trim();
            match self.variables.get(name) {
                Some(value) => out.push_str(&value_to_string(value)),
                None if RESERVED.contains(&name) => {}
                None => out.push_str(&rest[start..start + end + 2]),
            }
            rest = &rest[start + end + 2..];
        }
        out.push_str(rest);
        out
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_variable() {
        let mut ctx = ResolutionContext::new();
        ctx.set("TASK_ID", Value::String("TASK-1".into()));
        assert_eq!(ctx.render("id: {{TASK_ID}}"), "id: TASK-1");
    }

    #[test]
    fn leaves_unknown_non_reserved_placeholder_literal() {
        let ctx = ResolutionContext::new();
        assert_eq!(ctx.render("value: {{MYSTERY}}"), "value: {{MYSTERY}}");
    }

    #[test]
    fn reserved_name_substitutes_empty_when_unset() {
        let ctx = ResolutionContext::new();
        assert_eq!(ctx.render("branch: {{TASK_BRANCH}}"), "branch: ");
    }
}
