//! Templated secrets.
//!
//! Secrets are generated as [`SecretManifest`]s which carry key templates
//! instead of values. The plaintext is chosen when the secret is first
//! created and never regenerated afterwards, otherwise every retry would
//! rotate credentials.
use std::collections::BTreeMap;

use k8s_openapi::{
    ByteString, api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use snafu::{OptionExt, ResultExt, Snafu};

mod hasher;
mod template;

pub use hasher::*;
pub use template::*;

/// The default length of generated secret values.
pub const DEFAULT_SECRET_SIZE: usize = 32;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("secret has no name"))]
    MissingName,

    #[snafu(display("failed to render key {key:?} of secret {name:?}"))]
    RenderKey {
        source: TemplateError,
        key: String,
        name: String,
    },

    #[snafu(display("source secret {namespace}/{name} has no key {key:?}"))]
    MissingSourceKey {
        namespace: String,
        name: String,
        key: String,
    },

    #[snafu(display("key {key:?} of source secret {namespace}/{name} is not valid UTF-8"))]
    NonUtf8SourceKey {
        source: std::string::FromUtf8Error,
        namespace: String,
        name: String,
        key: String,
    },
}

/// Where the plaintext of a secret comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecretSource {
    /// A fresh alphanumeric value of the given length.
    Generate { size: usize },

    /// A key of another secret, which must already exist. Used to hand
    /// cluster credentials to the namespace of the instance.
    FromSecret {
        namespace: String,
        name: String,
        key: String,
    },
}

/// A secret whose values are rendered from templates at apply time.
#[derive(Clone, Debug, PartialEq)]
pub struct SecretManifest {
    pub metadata: ObjectMeta,
    pub source: SecretSource,

    /// Key to template, in insertion order.
    pub templates: Vec<(String, String)>,
}

impl SecretManifest {
    pub fn new(metadata: ObjectMeta, source: SecretSource) -> Self {
        Self {
            metadata,
            source,
            templates: Vec::new(),
        }
    }

    /// Adds a key whose value is rendered from `template`.
    pub fn with_template(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.push((key.into(), template.into()));
        self
    }

    /// Adds a key with a fixed value.
    pub fn with_literal(self, key: impl Into<String>, value: &str) -> Self {
        self.with_template(key, escape(value))
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Renders all templates against `plaintext` and returns the final
    /// [`Secret`].
    pub fn materialize(&self, plaintext: &str, hasher: &PasswordHasher) -> Result<Secret, Error> {
        let name = self.metadata.name.as_deref().context(MissingNameSnafu)?;
        let namespace = self.metadata.namespace.as_deref().unwrap_or_default();
        let values = SecretValues::new(namespace, name, plaintext, hasher);

        let data = self
            .templates
            .iter()
            .map(|(key, template)| {
                let value = render_template(template, &values)
                    .with_context(|_| RenderKeySnafu { key, name })?;
                Ok((key.clone(), ByteString(value.into_bytes())))
            })
            .collect::<Result<BTreeMap<_, _>, Error>>()?;

        Ok(Secret {
            metadata: self.metadata.clone(),
            data: Some(data),
            ..Secret::default()
        })
    }
}

/// Reads `key` from an existing secret.
pub fn read_key(secret: &Secret, key: &str) -> Result<String, Error> {
    let namespace = secret.metadata.namespace.clone().unwrap_or_default();
    let name = secret.metadata.name.clone().unwrap_or_default();

    if let Some(value) = secret.string_data.as_ref().and_then(|data| data.get(key)) {
        return Ok(value.clone());
    }

    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .with_context(|| MissingSourceKeySnafu {
            namespace: namespace.clone(),
            name: name.clone(),
            key,
        })?;

    String::from_utf8(bytes.0.clone()).context(NonUtf8SourceKeySnafu {
        namespace,
        name,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> SecretManifest {
        SecretManifest::new(
            ObjectMeta {
                name: Some("redis-cluster-cache1-secrets".to_owned()),
                namespace: Some("app".to_owned()),
                ..ObjectMeta::default()
            },
            SecretSource::Generate {
                size: DEFAULT_SECRET_SIZE,
            },
        )
        .with_template("REDIS_PASSWORD", "{plaintext}")
        .with_template(
            "redis.conf",
            "masterauth \"{plaintext}\"\nrequirepass \"{plaintext}\"\n",
        )
        .with_literal("LITERAL", "{not a placeholder}")
    }

    fn get<'a>(secret: &'a Secret, key: &str) -> &'a str {
        std::str::from_utf8(&secret.data.as_ref().unwrap()[key].0).unwrap()
    }

    #[test]
    fn materialize_renders_templates() {
        let secret = manifest()
            .materialize("hunter2", &PasswordHasher::new(4))
            .unwrap();

        assert_eq!(get(&secret, "REDIS_PASSWORD"), "hunter2");
        assert_eq!(
            get(&secret, "redis.conf"),
            "masterauth \"hunter2\"\nrequirepass \"hunter2\"\n"
        );
        assert_eq!(get(&secret, "LITERAL"), "{not a placeholder}");
        assert_eq!(secret.metadata.name.as_deref(), Some("redis-cluster-cache1-secrets"));
    }

    #[test]
    fn materialize_reports_key() {
        let err = manifest()
            .with_template("BROKEN", "{nope}")
            .materialize("hunter2", &PasswordHasher::new(4))
            .unwrap_err();

        assert!(matches!(err, Error::RenderKey { ref key, .. } if key == "BROKEN"));
    }

    #[test]
    fn read_key_from_materialized() {
        let secret = manifest()
            .materialize("hunter2", &PasswordHasher::new(4))
            .unwrap();

        assert_eq!(read_key(&secret, "REDIS_PASSWORD").unwrap(), "hunter2");
        assert!(matches!(
            read_key(&secret, "MISSING"),
            Err(Error::MissingSourceKey { .. })
        ));
    }
}
