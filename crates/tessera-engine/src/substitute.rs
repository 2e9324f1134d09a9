//! Deferred argument resolution.
//!
//! A string argument may reference an output of a completed dependency as
//! `${<dependency id>.<key>[.<nested key>...]}`. A string that is exactly one
//! reference takes the referenced JSON value; references inside a longer
//! string are interpolated as text. Only declared dependencies may be
//! referenced, since nothing else is guaranteed to exist yet.

use dashmap::DashMap;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;
use tessera_core::{Error, Fields, Resource, Result};

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("reference pattern compiles"))
}

/// Every `${...}` reference found in `args`, recursing into arrays and objects.
fn references(args: &Fields) -> Vec<String> {
    let mut out = Vec::new();
    args.values().for_each(|v| collect(v, &mut out));
    out
}

/// References in `resource`'s arguments that name something other than one
/// of `dependencies`. Each of them will fail the node when it runs.
pub fn undeclared_references(resource: &Resource, dependencies: &[String]) -> Vec<String> {
    references(&resource.args)
        .into_iter()
        .filter(|r| {
            let dep = r.split('.').next().unwrap_or_default();
            !dependencies.iter().any(|d| d == dep)
        })
        .collect()
}

fn collect(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(
            reference_pattern()
                .captures_iter(s)
                .map(|c| c[1].to_string()),
        ),
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        _ => {}
    }
}

/// Provider arguments for `resource` with every reference resolved against
/// `results`, the outputs of completed resources keyed by declarative id.
pub fn resolve_args(
    resource: &Resource,
    dependencies: &[String],
    results: &DashMap<String, Fields>,
) -> Result<Fields> {
    let resolver = Resolver {
        resource_id: &resource.id,
        dependencies,
        results,
    };
    resource
        .provider_args()
        .into_iter()
        .map(|(key, value)| Ok((key, resolver.value(value)?)))
        .collect()
}

struct Resolver<'a> {
    resource_id: &'a str,
    dependencies: &'a [String],
    results: &'a DashMap<String, Fields>,
}

impl Resolver<'_> {
    fn value(&self, value: Value) -> Result<Value> {
        match value {
            Value::String(s) => self.string(s),
            Value::Array(items) => items
                .into_iter()
                .map(|v| self.value(v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Ok((k, self.value(v)?)))
                .collect::<Result<Fields>>()
                .map(Value::Object),
            other => Ok(other),
        }
    }

    fn string(&self, s: String) -> Result<Value> {
        let pattern = reference_pattern();
        if !pattern.is_match(&s) {
            return Ok(Value::String(s));
        }
        if let Some(whole) = pattern.captures(&s) {
            if whole.get(0).is_some_and(|m| m.start() == 0 && m.end() == s.len()) {
                return self.lookup(&whole[1]);
            }
        }

        let mut failure = None;
        let replaced = pattern.replace_all(&s, |caps: &Captures| {
            match self.lookup(&caps[1]) {
                Ok(Value::String(text)) => text,
                Ok(other) => other.to_string(),
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(Value::String(replaced.into_owned())),
        }
    }

    fn lookup(&self, reference: &str) -> Result<Value> {
        let mut parts = reference.split('.');
        let dep = parts.next().unwrap_or_default();
        let path: Vec<&str> = parts.collect();

        if path.is_empty() {
            return Err(self.unresolved(reference, "expected <id>.<output key>"));
        }
        if !self.dependencies.iter().any(|d| d == dep) {
            return Err(self.unresolved(
                reference,
                format!("'{}' is not a declared dependency", dep),
            ));
        }
        let outputs = self
            .results
            .get(dep)
            .ok_or_else(|| self.unresolved(reference, format!("'{}' has no outputs", dep)))?;

        let mut current = outputs
            .get(path[0])
            .ok_or_else(|| self.unresolved(reference, format!("no output '{}'", path[0])))?;
        for key in &path[1..] {
            current = match current {
                Value::Object(map) => map.get(*key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| self.unresolved(reference, format!("no output '{}'", key)))?;
        }
        Ok(current.clone())
    }

    fn unresolved(&self, reference: &str, reason: impl Into<String>) -> Error {
        Error::unresolved(self.resource_id, reference, reason)
    }
}
