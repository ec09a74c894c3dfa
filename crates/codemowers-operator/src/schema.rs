//! Small constructors for the OpenAPI v3 fragments used in the generated CRDs.
use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceColumnDefinition, JSON, JSONSchemaProps, JSONSchemaPropsOrArray,
    ValidationRule,
};

pub fn string(description: &str) -> JSONSchemaProps {
    JSONSchemaProps {
        type_: Some("string".to_owned()),
        description: Some(description.to_owned()),
        ..JSONSchemaProps::default()
    }
}

pub fn integer(description: &str) -> JSONSchemaProps {
    JSONSchemaProps {
        type_: Some("integer".to_owned()),
        description: Some(description.to_owned()),
        ..JSONSchemaProps::default()
    }
}

/// An object the API server stores verbatim, used for embedded templates like
/// pod specs.
pub fn preserved_object(description: &str) -> JSONSchemaProps {
    JSONSchemaProps {
        type_: Some("object".to_owned()),
        description: Some(description.to_owned()),
        x_kubernetes_preserve_unknown_fields: Some(true),
        ..JSONSchemaProps::default()
    }
}

pub fn object(properties: BTreeMap<String, JSONSchemaProps>, required: &[&str]) -> JSONSchemaProps {
    JSONSchemaProps {
        type_: Some("object".to_owned()),
        properties: Some(properties),
        required: (!required.is_empty())
            .then(|| required.iter().map(|field| (*field).to_owned()).collect()),
        ..JSONSchemaProps::default()
    }
}

pub fn array(items: JSONSchemaProps) -> JSONSchemaProps {
    JSONSchemaProps {
        type_: Some("array".to_owned()),
        items: Some(JSONSchemaPropsOrArray::Schema(Box::new(items))),
        ..JSONSchemaProps::default()
    }
}

pub fn with_pattern(mut schema: JSONSchemaProps, pattern: &str) -> JSONSchemaProps {
    schema.pattern = Some(pattern.to_owned());
    schema
}

pub fn with_enum(mut schema: JSONSchemaProps, values: &[&str]) -> JSONSchemaProps {
    schema.enum_ = Some(
        values
            .iter()
            .map(|value| JSON(serde_json::Value::from(*value)))
            .collect(),
    );
    schema
}

pub fn with_default(mut schema: JSONSchemaProps, value: impl Into<serde_json::Value>) -> JSONSchemaProps {
    schema.default = Some(JSON(value.into()));
    schema
}

/// Rejects updates changing the field once it is set.
pub fn immutable(mut schema: JSONSchemaProps) -> JSONSchemaProps {
    schema.x_kubernetes_validations = Some(vec![ValidationRule {
        rule: "self == oldSelf".to_owned(),
        message: Some("Value is immutable".to_owned()),
        ..ValidationRule::default()
    }]);
    schema
}

/// Whether [`immutable`] was applied to `schema`.
pub fn is_immutable(schema: &JSONSchemaProps) -> bool {
    schema
        .x_kubernetes_validations
        .iter()
        .flatten()
        .any(|validation| validation.rule == "self == oldSelf")
}

pub fn column(name: &str, json_path: &str, type_: &str) -> CustomResourceColumnDefinition {
    CustomResourceColumnDefinition {
        name: name.to_owned(),
        json_path: json_path.to_owned(),
        type_: type_.to_owned(),
        ..CustomResourceColumnDefinition::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_rule() {
        let schema = immutable(string("Storage class"));
        assert!(is_immutable(&schema));
        assert!(!is_immutable(&string("Storage class")));
    }

    #[test]
    fn object_without_required() {
        let schema = object(BTreeMap::new(), &[]);
        assert_eq!(schema.required, None);
        assert_eq!(schema.type_.as_deref(), Some("object"));
    }
}
