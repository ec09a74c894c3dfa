use k8s_openapi::{
    api::{
        apps::v1::{StatefulSet, StatefulSetSpec},
        core::v1::{PodTemplateSpec, Service, ServiceSpec},
    },
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceColumnDefinition,
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::ResultExt;

use crate::{
    binding::Binding,
    capacity::CAPACITY_PATTERN,
    manifest::{self, InvalidClassFieldSnafu, Manifest, SerializeSnafu},
    schema,
    traits::{Capability, Properties},
};

/// Instances request a size, e.g. `5Gi`.
pub struct Capacity;

impl Capability for Capacity {
    fn name(&self) -> &'static str {
        "Capacity"
    }

    fn instance_properties(&self) -> Properties {
        vec![(
            "capacity",
            schema::with_pattern(schema::string("Capacity, e.g. 512Mi or 5Gi"), CAPACITY_PATTERN),
        )]
    }

    fn printer_columns(&self) -> Vec<CustomResourceColumnDefinition> {
        vec![schema::column("Capacity", ".spec.capacity", "string")]
    }
}

/// Data is kept on persistent volumes of the given storage class.
pub struct Persistent;

impl Capability for Persistent {
    fn name(&self) -> &'static str {
        "Persistent"
    }

    fn class_properties(&self) -> Properties {
        vec![(
            "storageClass",
            schema::immutable(schema::string("Storage class for the persistent volumes")),
        )]
    }
}

/// The backend runs as a StatefulSet rendered from the class pod spec.
///
/// Nothing is emitted without a class `podSpec`, in that case the backend is
/// expected to live outside of the cluster.
pub struct StatefulWorkload;

impl Capability for StatefulWorkload {
    fn name(&self) -> &'static str {
        "StatefulWorkload"
    }

    fn class_properties(&self) -> Properties {
        vec![
            ("image", schema::string("Container image")),
            ("replicas", schema::integer("Replica count")),
            (
                "topologyKey",
                schema::immutable(schema::string(
                    "Topology key for pod anti-affinity, defaults to topology.kubernetes.io/zone",
                )),
            ),
            ("secretSpec", schema::preserved_object("Secret template")),
            ("podSpec", schema::preserved_object("Pod template")),
        ]
    }

    fn manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let backend = binding.kind.backend;
        if !backend.provides_stateful_set() {
            return Ok(Vec::new());
        }
        let Some(mut pod_spec) = binding.pod_spec()? else {
            return Ok(Vec::new());
        };

        let mut manifests = Vec::new();
        if let Some(secret) = backend.cluster_secret(binding)? {
            manifests.push(Manifest::Secret(secret));
        }

        // The class image applies to a main container without one
        if let Some(container) = pod_spec
            .containers
            .first_mut()
            .filter(|container| container.image.is_none())
        {
            container.image.clone_from(&binding.class_spec().image);
        }
        pod_spec.affinity = Some(binding.anti_affinity(binding.labels.selector()));
        let template = StatefulSetSpec {
            selector: binding.labels.match_labels(),
            service_name: backend.headless_service_name(binding.target_name()).into(),
            replicas: Some(binding.replicas()),
            pod_management_policy: Some("Parallel".to_owned()),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some((&binding.labels).into()),
                    ..ObjectMeta::default()
                }),
                spec: Some(pod_spec),
            },
            ..StatefulSetSpec::default()
        };

        let spec = backend.stateful_set(binding, template)?;
        manifests.push(Manifest::StatefulSet(StatefulSet {
            metadata: binding.target_meta(backend.workload_name(binding.target_name())),
            spec: Some(spec),
            status: None,
        }));

        Ok(manifests)
    }
}

/// A headless Service addressing the individual pods. Like the workload it
/// is only generated when the class carries a pod spec.
pub struct Headless;

impl Capability for Headless {
    fn name(&self) -> &'static str {
        "Headless"
    }

    fn class_properties(&self) -> Properties {
        vec![(
            "headlessServiceSpec",
            schema::preserved_object("Merged over the generated headless Service spec"),
        )]
    }

    fn manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let backend = binding.kind.backend;
        let ports = backend.headless_service_ports();
        if ports.is_empty() || binding.class_spec().pod_spec.is_none() {
            return Ok(Vec::new());
        }

        let spec = ServiceSpec {
            selector: Some((&binding.labels).into()),
            cluster_ip: Some("None".to_owned()),
            publish_not_ready_addresses: Some(true),
            ports: Some(ports),
            ..ServiceSpec::default()
        };
        let spec = overlay(
            spec,
            binding.class_spec().headless_service_spec.as_ref(),
            "headlessServiceSpec",
        )?;

        Ok(vec![Manifest::Service(Service {
            metadata: binding.target_meta(backend.headless_service_name(binding.target_name())),
            spec: Some(spec),
            status: None,
        })])
    }
}

/// A ClusterIP Service for clients.
pub struct ClusterService;

impl Capability for ClusterService {
    fn name(&self) -> &'static str {
        "Service"
    }

    fn class_properties(&self) -> Properties {
        vec![(
            "serviceSpec",
            schema::preserved_object("Merged over the generated Service spec"),
        )]
    }

    fn manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let backend = binding.kind.backend;
        let ports = backend.service_ports();
        if ports.is_empty() || binding.class_spec().pod_spec.is_none() {
            return Ok(Vec::new());
        }

        let spec = ServiceSpec {
            selector: Some((&binding.labels).into()),
            session_affinity: Some("ClientIP".to_owned()),
            type_: Some("ClusterIP".to_owned()),
            ports: Some(ports),
            ..ServiceSpec::default()
        };
        let spec = overlay(spec, binding.class_spec().service_spec.as_ref(), "serviceSpec")?;

        Ok(vec![Manifest::Service(Service {
            metadata: binding.target_meta(backend.workload_name(binding.target_name())),
            spec: Some(spec),
            status: None,
        })])
    }
}

/// JSON merge patches `patch` from the class over `generated`.
fn overlay<T>(generated: T, patch: Option<&Value>, field: &'static str) -> Result<T, manifest::Error>
where
    T: Serialize + DeserializeOwned,
{
    let Some(patch) = patch else {
        return Ok(generated);
    };

    let mut value = serde_json::to_value(&generated).context(SerializeSnafu { what: field })?;
    json_patch::merge(&mut value, patch);
    serde_json::from_value(value).context(InvalidClassFieldSnafu { field })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ServicePort;
    use serde_json::json;

    use super::*;

    #[test]
    fn overlay_merges_class_fields() {
        let spec = ServiceSpec {
            type_: Some("ClusterIP".to_owned()),
            ports: Some(vec![ServicePort {
                port: 6379,
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        };

        let merged = overlay(
            spec,
            Some(&json!({"type": "LoadBalancer", "loadBalancerClass": "metallb"})),
            "serviceSpec",
        )
        .unwrap();

        assert_eq!(merged.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(merged.load_balancer_class.as_deref(), Some("metallb"));
        assert_eq!(merged.ports.unwrap()[0].port, 6379);
    }

    #[test]
    fn overlay_rejects_invalid_fields() {
        let err = overlay(
            ServiceSpec::default(),
            Some(&json!({"ports": "not a list"})),
            "serviceSpec",
        )
        .unwrap_err();

        assert!(matches!(err, manifest::Error::InvalidClassField { field: "serviceSpec", .. }));
    }

    #[test]
    fn capacity_schema_has_pattern() {
        let properties = Capacity.instance_properties();
        assert_eq!(properties[0].0, "capacity");
        assert_eq!(properties[0].1.pattern.as_deref(), Some(CAPACITY_PATTERN));
    }
}
