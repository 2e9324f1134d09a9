//! Core types for Tessera

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments, outputs, and custom fields are all free-form JSON objects.
pub type Fields = serde_json::Map<String, Value>;

/// Reserved argument key listing the ids a resource must be created after.
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// A caller-declared unit of infrastructure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub args: Fields,
    #[serde(default, skip_serializing_if = "Fields::is_empty")]
    pub outputs: Fields,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            args: Fields::new(),
            outputs: Fields::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Replace the `dependencies` argument.
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deps = ids
            .into_iter()
            .map(|id| Value::String(id.into()))
            .collect::<Vec<_>>();
        self.args.insert(DEPENDENCIES_KEY.into(), Value::Array(deps));
        self
    }

    /// The declared dependency ids. A missing key means no dependencies;
    /// anything other than an array of strings is rejected.
    pub fn dependencies(&self) -> Result<Vec<String>> {
        match self.args.get(DEPENDENCIES_KEY) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(id) => Ok(id.clone()),
                    other => Err(Error::invalid_argument(
                        &self.id,
                        format!("dependency entries must be strings, got {}", other),
                    )),
                })
                .collect(),
            Some(other) => Err(Error::invalid_argument(
                &self.id,
                format!("'{}' must be an array, got {}", DEPENDENCIES_KEY, other),
            )),
        }
    }

    /// Arguments as handed to a provider: everything but the reserved keys.
    pub fn provider_args(&self) -> Fields {
        let mut args = self.args.clone();
        args.remove(DEPENDENCIES_KEY);
        args
    }
}

/// Persisted record of a resource created through a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub name: String,
    /// Identifier assigned by the provider, distinct from `id`.
    pub backend_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub custom_fields: Fields,
}

impl ResourceRecord {
    /// Build a fresh record with a generated id and both timestamps set to now.
    pub fn new(
        resource_type: impl Into<String>,
        backend_id: impl Into<String>,
        args: &Fields,
        custom_fields: Fields,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resource_type: resource_type.into(),
            label: string_arg(args, "label"),
            name: string_arg(args, "name"),
            backend_id: backend_id.into(),
            created_at: now,
            updated_at: now,
            custom_fields,
        }
    }

    /// Apply an update: display fields come from `args`, custom fields are replaced.
    pub fn apply_update(&mut self, args: &Fields, custom_fields: Fields) {
        self.label = string_arg(args, "label");
        self.name = string_arg(args, "name");
        self.custom_fields = custom_fields;
        self.updated_at = Utc::now();
    }
}

fn string_arg(args: &Fields, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_dependencies_key_is_empty() {
        let r = Resource::new("a", "memory");
        assert!(r.dependencies().unwrap().is_empty());
    }

    #[test]
    fn malformed_dependencies_rejected() {
        let r = Resource::new("a", "memory").with_arg(DEPENDENCIES_KEY, "b");
        assert!(matches!(
            r.dependencies(),
            Err(Error::InvalidArgument { .. })
        ));

        let r = Resource::new("a", "memory").with_arg(DEPENDENCIES_KEY, json!(["b", 3]));
        assert!(r.dependencies().is_err());
    }

    #[test]
    fn provider_args_strip_dependencies() {
        let r = Resource::new("a", "memory")
            .with_arg("name", "topic")
            .depends_on(["b"]);
        let args = r.provider_args();
        assert!(!args.contains_key(DEPENDENCIES_KEY));
        assert_eq!(args["name"], "topic");
    }

    #[test]
    fn record_takes_display_fields_from_args() {
        let args = json!({"name": "topic", "label": 7}).as_object().cloned().unwrap();
        let rec = ResourceRecord::new("memory", "arn:1", &args, Fields::new());
        assert_eq!(rec.name, "topic");
        assert_eq!(rec.label, "");
        assert_eq!(rec.created_at, rec.updated_at);
    }
}
