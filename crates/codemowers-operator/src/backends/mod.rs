//! Per-kind hooks used by the generic capabilities.
//!
//! The capabilities in [`crate::traits`] build everything kinds have in
//! common (selectors, anti-affinity, Service skeletons). What differs between
//! Redis, MinIO and the database operators lives behind [`Backend`].
use k8s_openapi::{
    api::{
        apps::v1::StatefulSetSpec,
        core::v1::{
            Container, PersistentVolumeClaim, PersistentVolumeClaimSpec, ServicePort,
            VolumeResourceRequirements,
        },
    },
    apimachinery::pkg::{
        api::resource::Quantity, apis::meta::v1::ObjectMeta, util::intstr::IntOrString,
    },
};

use serde_json::Value;
use snafu::{OptionExt, ResultExt};

use crate::{
    binding::Binding,
    labels::Labels,
    manifest::{self, Manifest, MissingContainerSnafu, SerializeSnafu},
    registry::CustomResourceType,
    secret::SecretManifest,
    traits::Properties,
};

mod minio;
mod mysql;
mod postgres;
mod redis;
mod secret;

pub use minio::MinioBackend;
pub use mysql::MysqlBackend;
pub use postgres::{Flavor, PostgresBackend};
pub use redis::RedisBackend;
pub use secret::SecretBackend;

pub trait Backend: Sync {
    /// Name of the StatefulSet and the client facing Service.
    fn workload_name(&self, target: &str) -> String {
        target.to_owned()
    }

    fn headless_service_name(&self, target: &str) -> String {
        format!("{}-headless", self.workload_name(target))
    }

    /// Kind specific class properties, appended after those of the
    /// capabilities.
    fn class_properties(&self) -> Properties {
        Properties::new()
    }

    fn instance_properties(&self) -> Properties {
        Properties::new()
    }

    fn service_ports(&self) -> Vec<ServicePort> {
        Vec::new()
    }

    fn headless_service_ports(&self) -> Vec<ServicePort> {
        Vec::new()
    }

    /// Whether the class `podSpec` is rendered into a StatefulSet by the
    /// operator itself.
    fn provides_stateful_set(&self) -> bool {
        false
    }

    /// Credentials of the backend, created before the workload.
    fn cluster_secret(&self, _binding: &Binding<'_>) -> Result<Option<SecretManifest>, manifest::Error> {
        Ok(None)
    }

    /// Completes the generic StatefulSet spec, usually by adding arguments,
    /// environment and volume claims to the pod.
    fn stateful_set(
        &self,
        _binding: &Binding<'_>,
        spec: StatefulSetSpec,
    ) -> Result<StatefulSetSpec, manifest::Error> {
        Ok(spec)
    }

    /// Custom resources handed to a vendor operator.
    fn custom_resources(&self, _binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        Ok(Vec::new())
    }

    /// Manifests appended after all capabilities ran, such as the owner
    /// secret in the namespace of the instance.
    fn extra_manifests(&self, _binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        Ok(Vec::new())
    }

    /// The registered custom resource types this backend may emit. Used to
    /// clean up hoarded targets.
    fn custom_resource_types(&self) -> &'static [&'static CustomResourceType] {
        &[]
    }
}

/// The first container of a pod spec, which all backends treat as the main
/// container.
pub(crate) fn main_container(spec: &mut StatefulSetSpec) -> Result<&mut Container, manifest::Error> {
    spec.template
        .spec
        .as_mut()
        .and_then(|pod| pod.containers.first_mut())
        .context(MissingContainerSnafu)
}

pub(crate) fn service_port(name: &str, port: i32, target_port: Option<i32>) -> ServicePort {
    ServicePort {
        name: Some(name.to_owned()),
        port,
        target_port: target_port.map(IntOrString::Int),
        ..ServicePort::default()
    }
}

/// A single ReadWriteOnce volume claim template named `data`.
pub(crate) fn data_volume_claim(storage: String, storage_class: Option<&str>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some("data".to_owned()),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_owned()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some([("storage".to_owned(), Quantity(storage))].into()),
                ..VolumeResourceRequirements::default()
            }),
            storage_class_name: storage_class.map(ToOwned::to_owned),
            ..PersistentVolumeClaimSpec::default()
        }),
        status: None,
    }
}

/// Sets the anti-affinity for `labels` on a raw pod spec.
pub(crate) fn with_affinity(
    pod_spec: Option<Value>,
    binding: &Binding<'_>,
    labels: &Labels,
) -> Result<Value, manifest::Error> {
    let affinity = serde_json::to_value(binding.anti_affinity(labels.selector()))
        .context(SerializeSnafu { what: "affinity" })?;

    let mut pod_spec = match pod_spec {
        Some(Value::Object(pod_spec)) => pod_spec,
        _ => serde_json::Map::new(),
    };
    pod_spec.insert("affinity".to_owned(), affinity);
    Ok(Value::Object(pod_spec))
}
