use k8s_openapi::api::{
    apps::v1::StatefulSetSpec,
    core::v1::{EnvFromSource, SecretEnvSource, ServicePort},
};

use serde::Serialize;

use crate::{
    backends::{Backend, data_volume_claim, main_container, service_port},
    binding::Binding,
    manifest::{self, Manifest},
    resources::QuotaType,
    schema,
    secret::{DEFAULT_SECRET_SIZE, SecretManifest, SecretSource},
    traits::Properties,
};

const HTTP_PORT: i32 = 9000;
const REGION: &str = "us-east-1";

/// MinIO tenants serving one bucket per instance.
///
/// Creating the bucket and the access key through the MinIO admin API is left
/// to an external controller, this backend only lays out the tenant and the
/// credentials.
pub struct MinioBackend;

/// Body of the admin API `set-bucket-quota` call for the bucket of an
/// instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketQuota {
    /// Bytes.
    pub quota: u64,

    #[serde(rename = "quotatype")]
    pub quota_type: QuotaType,
}

impl MinioBackend {
    /// The quota of the bucket of `binding`, the instance capacity enforced
    /// per `quotaType` (`hard` by default).
    pub fn bucket_quota(binding: &Binding<'_>) -> Result<BucketQuota, manifest::Error> {
        Ok(BucketQuota {
            quota: binding.capacity()?.bytes(),
            quota_type: binding.instance.spec.quota_type.unwrap_or_default(),
        })
    }

    fn cluster_secret_name(target: &str) -> String {
        format!("minio-cluster-{target}-secrets")
    }
}

impl Backend for MinioBackend {
    fn workload_name(&self, target: &str) -> String {
        format!("minio-cluster-{target}")
    }

    fn instance_properties(&self) -> Properties {
        vec![(
            "quotaType",
            schema::with_default(
                schema::with_enum(schema::string("Bucket quota enforcement"), &["none", "fifo", "hard"]),
                "hard",
            ),
        )]
    }

    fn service_ports(&self) -> Vec<ServicePort> {
        vec![service_port("http", 80, Some(HTTP_PORT))]
    }

    fn headless_service_ports(&self) -> Vec<ServicePort> {
        vec![service_port("http", HTTP_PORT, None)]
    }

    fn provides_stateful_set(&self) -> bool {
        true
    }

    fn cluster_secret(&self, binding: &Binding<'_>) -> Result<Option<SecretManifest>, manifest::Error> {
        let fqdn = binding.service_fqdn(&self.workload_name(binding.target_name()));
        let secret = SecretManifest::new(
            binding.target_meta(Self::cluster_secret_name(binding.target_name())),
            SecretSource::Generate {
                size: DEFAULT_SECRET_SIZE,
            },
        )
        .with_literal("MINIO_ROOT_USER", "root")
        .with_template("MINIO_ROOT_PASSWORD", "{plaintext}")
        .with_template("MINIO_URI", format!("http://root:{{plaintext}}@{fqdn}"))
        .with_literal("AWS_S3_ENDPOINT_URL", &format!("http://{fqdn}"));

        Ok(Some(secret))
    }

    fn stateful_set(
        &self,
        binding: &Binding<'_>,
        mut spec: StatefulSetSpec,
    ) -> Result<StatefulSetSpec, manifest::Error> {
        let capacity = binding.capacity()?;
        let target = binding.target_name();
        let workload = self.workload_name(target);

        let container = main_container(&mut spec)?;
        container.args.get_or_insert_with(Vec::new).push(format!(
            "http://{workload}-{{0...{last}}}.{headless}.{namespace}.svc.cluster.local/data",
            last = binding.replicas() - 1,
            headless = self.headless_service_name(target),
            namespace = binding.target_namespace(),
        ));
        container.env_from = Some(vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: Self::cluster_secret_name(target).into(),
                ..SecretEnvSource::default()
            }),
            ..EnvFromSource::default()
        }]);

        spec.volume_claim_templates = Some(vec![data_volume_claim(
            capacity.to_string(),
            binding.storage_class(),
        )]);

        Ok(spec)
    }

    fn extra_manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let instance = binding.instance;
        let fqdn = binding.service_fqdn(&self.workload_name(binding.target_name()));
        let bucket = format!("{}.{}", instance.namespace, instance.name);
        let size = instance.spec.size.unwrap_or(DEFAULT_SECRET_SIZE);

        let secret = SecretManifest::new(
            binding.origin_meta(format!("bucket-{}-owner-secrets", instance.name)),
            SecretSource::Generate { size },
        )
        .with_literal("BASE_URI", &format!("http://{fqdn}/{bucket}/"))
        .with_literal("BUCKET_NAME", &bucket)
        .with_literal("AWS_S3_ENDPOINT_URL", &format!("http://{fqdn}"))
        .with_literal("AWS_DEFAULT_REGION", REGION)
        .with_literal("AWS_ACCESS_KEY_ID", &bucket)
        .with_template("AWS_SECRET_ACCESS_KEY", "{plaintext}")
        .with_template(
            "MINIO_URI",
            format!("http://{access_key}:{{plaintext}}@{fqdn}", access_key = bucket),
        );

        Ok(vec![Manifest::Secret(secret)])
    }
}
