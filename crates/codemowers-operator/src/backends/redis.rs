use k8s_openapi::api::{
    apps::v1::StatefulSetSpec,
    core::v1::{EnvVar, SecretVolumeSource, ServicePort, Volume, VolumeMount},
};
use snafu::OptionExt;

use crate::{
    backends::{Backend, data_volume_claim, main_container, service_port},
    binding::Binding,
    manifest::{self, Manifest, MissingImageSnafu},
    secret::{DEFAULT_SECRET_SIZE, SecretManifest, SecretSource},
};

const PORT: i32 = 6379;
const PASSWORD_KEY: &str = "REDIS_PASSWORD";
const CONFIG_VOLUME: &str = "config";

/// Numbered databases exposed as `REDIS_<n>_URI`.
const DATABASES: u8 = 16;

/// Redis and KeyDB, told apart by the image of the first container.
pub struct RedisBackend;

impl RedisBackend {
    fn cluster_secret_name(target: &str) -> String {
        format!("redis-cluster-{target}-secrets")
    }
}

impl Backend for RedisBackend {
    fn workload_name(&self, target: &str) -> String {
        format!("redis-cluster-{target}")
    }

    fn service_ports(&self) -> Vec<ServicePort> {
        vec![service_port("redis", PORT, None)]
    }

    fn headless_service_ports(&self) -> Vec<ServicePort> {
        vec![service_port("redis", PORT, None)]
    }

    fn provides_stateful_set(&self) -> bool {
        true
    }

    fn cluster_secret(&self, binding: &Binding<'_>) -> Result<Option<SecretManifest>, manifest::Error> {
        let secret = SecretManifest::new(
            binding.target_meta(Self::cluster_secret_name(binding.target_name())),
            SecretSource::Generate {
                size: DEFAULT_SECRET_SIZE,
            },
        )
        .with_template(PASSWORD_KEY, "{plaintext}")
        .with_template(
            "redis.conf",
            "masterauth \"{plaintext}\"\nrequirepass \"{plaintext}\"\n",
        );

        Ok(Some(secret))
    }

    fn stateful_set(
        &self,
        binding: &Binding<'_>,
        mut spec: StatefulSetSpec,
    ) -> Result<StatefulSetSpec, manifest::Error> {
        let bytes = binding.capacity()?.bytes();
        let replicas = binding.replicas();
        let target = binding.target_name();
        let storage_class = binding.storage_class();

        let container = main_container(&mut spec)?;
        let image = container.image.clone().context(MissingImageSnafu)?;
        let image_lower = image.to_lowercase();

        let mut args = vec!["--maxmemory".to_owned(), bytes.to_string()];
        if image_lower.contains("keydb") {
            if replicas > 1 {
                args.extend(
                    ["--active-replica", "yes", "--multi-master", "yes"].map(String::from),
                );
            }
        } else if image_lower.contains("redis") {
            if replicas > 1 {
                return manifest::UnsupportedTopologySnafu { image, replicas }.fail();
            }
        } else {
            return manifest::UnknownImplementationSnafu { image }.fail();
        }

        if storage_class.is_none() {
            args.extend(["--save", ""].map(String::from));
        }

        container.args.get_or_insert_with(Vec::new).extend(args);
        container.env = Some(vec![
            EnvVar {
                name: "SERVICE_NAME".to_owned(),
                value: Some(self.headless_service_name(target)),
                ..EnvVar::default()
            },
            EnvVar {
                name: "REPLICAS".to_owned(),
                value: Some(
                    (0..replicas)
                        .map(|ordinal| format!("{}-{ordinal}", self.workload_name(target)))
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                ..EnvVar::default()
            },
        ]);
        container.volume_mounts = Some(vec![VolumeMount {
            name: CONFIG_VOLUME.to_owned(),
            mount_path: "/etc/redis".to_owned(),
            read_only: Some(true),
            ..VolumeMount::default()
        }]);

        if let Some(pod) = spec.template.spec.as_mut() {
            pod.volumes.get_or_insert_with(Vec::new).push(Volume {
                name: CONFIG_VOLUME.to_owned(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(Self::cluster_secret_name(target)),
                    ..SecretVolumeSource::default()
                }),
                ..Volume::default()
            });
        }

        if storage_class.is_some() {
            // Twice the memory to fit a BGSAVE, in mebibytes
            spec.volume_claim_templates = Some(vec![data_volume_claim(
                format!("{}Mi", bytes / 524_288),
                storage_class,
            )]);
        }

        Ok(spec)
    }

    fn extra_manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        // Without a pod spec there is no cluster secret to take the password from
        if binding.class_spec().pod_spec.is_none() {
            return Ok(Vec::new());
        }

        let fqdn = binding.service_fqdn(&self.workload_name(binding.target_name()));
        let mut secret = SecretManifest::new(
            binding.origin_meta(format!("redis-{}-owner-secrets", binding.instance.name)),
            SecretSource::FromSecret {
                namespace: binding.target_namespace().to_owned(),
                name: Self::cluster_secret_name(binding.target_name()),
                key: PASSWORD_KEY.to_owned(),
            },
        )
        .with_template(PASSWORD_KEY, "{plaintext}")
        .with_literal("REDIS_HOST_PORT", &format!("{fqdn}:{PORT}"))
        .with_literal("REDIS_HOST", &fqdn)
        .with_literal("REDIS_PORT", &PORT.to_string())
        .with_template("REDIS_URI", format!("redis://:{{plaintext}}@{fqdn}"));
        for database in 0..DATABASES {
            secret = secret.with_template(
                format!("REDIS_{database}_URI"),
                format!("redis://:{{plaintext}}@{fqdn}/{database}"),
            );
        }

        Ok(vec![Manifest::Secret(secret)])
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{
        kind,
        resources::{Class, ClassSpec, Instance, InstanceSpec},
    };

    fn instance() -> Instance {
        Instance {
            namespace: "app".to_owned(),
            name: "cache1".to_owned(),
            uid: Some("instance-uid".to_owned()),
            generation: Some(1),
            spec: InstanceSpec {
                capacity: Some("1Gi".to_owned()),
                class: Some("ephemeral".to_owned()),
                ..InstanceSpec::default()
            },
        }
    }

    fn class(image: &str, replicas: i32, storage_class: Option<&str>) -> Class {
        Class {
            name: "ephemeral".to_owned(),
            uid: Some("class-uid".to_owned()),
            spec: ClassSpec {
                replicas: Some(replicas),
                storage_class: storage_class.map(ToOwned::to_owned),
                pod_spec: Some(json!({"containers": [{"name": "redis", "image": image}]})),
                ..ClassSpec::default()
            },
        }
    }

    fn stateful_set(manifests: &[Manifest]) -> &StatefulSetSpec {
        manifests
            .iter()
            .find_map(|manifest| match manifest {
                Manifest::StatefulSet(stateful_set) => stateful_set.spec.as_ref(),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn keydb_without_storage() {
        let instance = instance();
        let class = class("eqalpha/keydb:x86_64_v6.3.4", 1, None);
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let manifests = kind::REDIS.generate(&binding).unwrap();
        let names: Vec<_> = manifests.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            [
                "Service app/redis-cluster-cache1-headless",
                "Secret app/redis-cluster-cache1-secrets",
                "StatefulSet app/redis-cluster-cache1",
                "Service app/redis-cluster-cache1",
                "Secret app/redis-cache1-owner-secrets",
            ]
        );

        let spec = stateful_set(&manifests);
        let container = &spec.template.spec.as_ref().unwrap().containers[0];
        assert_eq!(
            container.args.as_deref().unwrap(),
            ["--maxmemory", "1073741824", "--save", ""]
        );
        assert_eq!(spec.volume_claim_templates, None);
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.pod_management_policy.as_deref(), Some("Parallel"));

        let env = container.env.as_ref().unwrap();
        assert_eq!(env[0].value.as_deref(), Some("redis-cluster-cache1-headless"));
        assert_eq!(env[1].value.as_deref(), Some("redis-cluster-cache1-0"));
    }

    #[test]
    fn keydb_multi_master() {
        let instance = instance();
        let class = class("eqalpha/keydb", 3, Some("local-path"));
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let manifests = kind::REDIS.generate(&binding).unwrap();
        let spec = stateful_set(&manifests);
        let container = &spec.template.spec.as_ref().unwrap().containers[0];
        assert_eq!(
            container.args.as_deref().unwrap(),
            [
                "--maxmemory",
                "1073741824",
                "--active-replica",
                "yes",
                "--multi-master",
                "yes"
            ]
        );
        assert_eq!(
            container.env.as_ref().unwrap()[1].value.as_deref(),
            Some("redis-cluster-cache1-0 redis-cluster-cache1-1 redis-cluster-cache1-2")
        );

        let claim = &spec.volume_claim_templates.as_ref().unwrap()[0];
        let claim_spec = claim.spec.as_ref().unwrap();
        assert_eq!(claim.metadata.name.as_deref(), Some("data"));
        assert_eq!(claim_spec.storage_class_name.as_deref(), Some("local-path"));
        assert_eq!(
            claim_spec.resources.as_ref().unwrap().requests.as_ref().unwrap()["storage"].0,
            "2048Mi"
        );
    }

    #[test]
    fn image_from_class() {
        let instance = instance();
        let mut class = class("unused", 1, None);
        class.spec.image = Some("eqalpha/keydb".to_owned());
        class.spec.pod_spec = Some(json!({"containers": [{"name": "redis"}]}));
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let manifests = kind::REDIS.generate(&binding).unwrap();
        let container = &stateful_set(&manifests).template.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("eqalpha/keydb"));
    }

    #[test]
    fn pod_spec_image_wins_over_class_image() {
        let instance = instance();
        let mut class = class("eqalpha/keydb:x86_64_v6.3.4", 1, None);
        class.spec.image = Some("redis:7".to_owned());
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let manifests = kind::REDIS.generate(&binding).unwrap();
        let container = &stateful_set(&manifests).template.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("eqalpha/keydb:x86_64_v6.3.4"));
    }

    #[test]
    fn missing_image() {
        let instance = instance();
        let mut class = class("unused", 1, None);
        class.spec.pod_spec = Some(json!({"containers": [{"name": "redis"}]}));
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let err = kind::REDIS.generate(&binding).unwrap_err();
        assert!(matches!(err, manifest::Error::MissingImage));
    }

    #[test]
    fn vanilla_redis_rejects_replicas() {
        let instance = instance();
        let class = class("redis:7", 3, None);
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let err = kind::REDIS.generate(&binding).unwrap_err();
        assert!(matches!(
            err,
            manifest::Error::UnsupportedTopology { replicas: 3, .. }
        ));
    }

    #[rstest]
    #[case("docker.io/library/memcached")]
    #[case("valkey/valkey:8")]
    fn unknown_image(#[case] image: &str) {
        let instance = instance();
        let class = class(image, 1, None);
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let err = kind::REDIS.generate(&binding).unwrap_err();
        assert!(matches!(err, manifest::Error::UnknownImplementation { .. }));
    }

    #[test]
    fn owner_secret_reads_cluster_password() {
        let instance = instance();
        let class = class("redis:7", 1, None);
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        let manifests = kind::REDIS.generate(&binding).unwrap();
        let Some(Manifest::Secret(secret)) = manifests.last() else {
            panic!("owner secret is generated last");
        };
        assert_eq!(
            secret.source,
            SecretSource::FromSecret {
                namespace: "app".to_owned(),
                name: "redis-cluster-cache1-secrets".to_owned(),
                key: "REDIS_PASSWORD".to_owned(),
            }
        );

        let rendered = secret
            .materialize("hunter2", &crate::secret::PasswordHasher::new(4))
            .unwrap();
        let data = rendered.data.unwrap();
        assert_eq!(
            data["REDIS_URI"].0,
            b"redis://:hunter2@redis-cluster-cache1.app.svc.cluster.local"
        );
        assert_eq!(
            data["REDIS_15_URI"].0,
            b"redis://:hunter2@redis-cluster-cache1.app.svc.cluster.local/15"
        );
        assert_eq!(data["REDIS_PORT"].0, b"6379");
    }

    #[test]
    fn external_backend_without_pod_spec() {
        let instance = instance();
        let mut class = class("redis", 1, None);
        class.spec.pod_spec = None;
        let binding = Binding::new(&kind::REDIS, &instance, Some(&class)).unwrap();

        assert!(kind::REDIS.generate(&binding).unwrap().is_empty());
    }
}
