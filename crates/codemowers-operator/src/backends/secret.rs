use std::collections::BTreeMap;

use crate::{
    backends::Backend,
    binding::Binding,
    manifest::{self, Manifest},
    schema,
    secret::{DEFAULT_SECRET_SIZE, SecretManifest, SecretSource},
    traits::Properties,
};

/// Generated opaque secrets, laid out by `spec.mapping`.
pub struct SecretBackend;

impl Backend for SecretBackend {
    fn instance_properties(&self) -> Properties {
        let mapping = schema::object(
            BTreeMap::from([
                ("key".to_owned(), schema::string("Secret key")),
                (
                    "value".to_owned(),
                    schema::string("Secret value with suitable placeholders"),
                ),
            ]),
            &["key", "value"],
        );

        vec![
            (
                "size",
                schema::with_default(
                    schema::integer("Generated secret length"),
                    DEFAULT_SECRET_SIZE,
                ),
            ),
            ("mapping", schema::array(mapping)),
        ]
    }

    fn extra_manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let spec = &binding.instance.spec;
        let secret = spec.mapping.iter().fold(
            SecretManifest::new(
                binding.target_meta(binding.target_name()),
                SecretSource::Generate {
                    size: spec.size.unwrap_or(DEFAULT_SECRET_SIZE),
                },
            ),
            |secret, mapping| secret.with_template(&mapping.key, &mapping.value),
        );

        Ok(vec![Manifest::Secret(secret)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kind,
        resources::{Instance, InstanceSpec, SecretMapping},
        secret::PasswordHasher,
    };

    #[test]
    fn mapping_is_rendered() {
        let instance = Instance {
            namespace: "app".to_owned(),
            name: "oidc".to_owned(),
            uid: Some("instance-uid".to_owned()),
            generation: Some(1),
            spec: InstanceSpec {
                size: Some(16),
                mapping: vec![
                    SecretMapping {
                        key: "OIDC_CLIENT_SECRET".to_owned(),
                        value: "{plaintext}".to_owned(),
                    },
                    SecretMapping {
                        key: "OIDC_CLIENT_ID".to_owned(),
                        value: "{namespace}-{name}".to_owned(),
                    },
                ],
                ..InstanceSpec::default()
            },
        };
        let binding = Binding::new(&kind::SECRET, &instance, None).unwrap();

        let manifests = kind::SECRET.generate(&binding).unwrap();
        assert_eq!(manifests.len(), 1);
        let Manifest::Secret(secret) = &manifests[0] else {
            panic!("expected a Secret");
        };
        assert_eq!(manifests[0].to_string(), "Secret app/oidc");
        assert_eq!(secret.source, SecretSource::Generate { size: 16 });

        let data = secret
            .materialize("0123456789abcdef", &PasswordHasher::new(4))
            .unwrap()
            .data
            .unwrap();
        assert_eq!(data["OIDC_CLIENT_SECRET"].0, b"0123456789abcdef");
        assert_eq!(data["OIDC_CLIENT_ID"].0, b"app-oidc");
    }
}
