//! An instance bound to its resolved class.
use k8s_openapi::{
    api::core::v1::{Affinity, PodSpec},
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
};
use serde_json::Value;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    builder::{
        affinity::{DEFAULT_TOPOLOGY_KEY, required_pod_anti_affinity},
        meta::{self, ObjectMetaBuilder, OwnerReferenceBuilder},
    },
    capacity::Capacity,
    identity::{Owner, TargetIdentity},
    kind::Kind,
    labels::{LabelError, Labels},
    manifest::{self, InvalidCapacitySnafu, InvalidClassFieldSnafu, MissingCapacitySnafu},
    resources::{Class, ClassSpec, Instance},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{kind} {name:?} does not reference a class"))]
    MissingClassReference { kind: &'static str, name: String },

    #[snafu(display("invalid labels for target {target:?}"))]
    InvalidLabel { source: LabelError, target: String },

    #[snafu(display("failed to build owner reference to the {owner}"))]
    OwnerReference {
        source: meta::Error,
        owner: Owner,
    },
}

impl Error {
    /// The taxonomy name used as condition reason.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingClassReference { .. } => "MissingClassReference",
            Self::InvalidLabel { .. } => "InvalidLabel",
            Self::OwnerReference { .. } => "OwnerReference",
        }
    }
}

/// Everything the manifest generator needs to know about one instance.
#[derive(Clone, Debug)]
pub struct Binding<'a> {
    pub kind: &'static Kind,
    pub instance: &'a Instance,
    pub class: Option<&'a Class>,
    pub identity: TargetIdentity,
    pub labels: Labels,
    class_spec: ClassSpec,
    owner_reference: OwnerReference,
    instance_reference: OwnerReference,
}

impl<'a> Binding<'a> {
    pub fn new(
        kind: &'static Kind,
        instance: &'a Instance,
        class: Option<&'a Class>,
    ) -> Result<Self, Error> {
        if kind.requires_class() && class.is_none() {
            return MissingClassReferenceSnafu {
                kind: kind.singular,
                name: instance.name.clone(),
            }
            .fail();
        }

        let class_spec = class.map(|class| class.spec.clone()).unwrap_or_default();
        let identity = TargetIdentity::resolve(
            &instance.namespace,
            &instance.name,
            class.map(|_| &class_spec),
            kind.shareable(),
        );

        let mut labels = Labels::common(kind.app_name, &identity.name).context(InvalidLabelSnafu {
            target: identity.name.clone(),
        })?;
        if let Some(class) = class {
            labels = labels.with_class(&class.name).context(InvalidLabelSnafu {
                target: identity.name.clone(),
            })?;
        }

        let instance_reference = OwnerReferenceBuilder::new()
            .api_version(Kind::api_version())
            .kind(kind.singular)
            .name(&instance.name)
            .uid_opt(instance.uid.clone())
            .block_owner_deletion(false)
            .controller(true)
            .build()
            .context(OwnerReferenceSnafu {
                owner: Owner::Instance,
            })?;

        let owner_reference = match (identity.owner, class) {
            (Owner::Class, Some(class)) => OwnerReferenceBuilder::new()
                .api_version(Kind::api_version())
                .kind(kind.class_kind())
                .name(&class.name)
                .uid_opt(class.uid.clone())
                .block_owner_deletion(false)
                .controller(true)
                .build()
                .context(OwnerReferenceSnafu {
                    owner: Owner::Class,
                })?,
            _ => instance_reference.clone(),
        };

        Ok(Self {
            kind,
            instance,
            class,
            identity,
            labels,
            class_spec,
            owner_reference,
            instance_reference,
        })
    }

    /// The class spec, empty for kinds without a class.
    pub fn class_spec(&self) -> &ClassSpec {
        &self.class_spec
    }

    pub fn target_name(&self) -> &str {
        &self.identity.name
    }

    pub fn target_namespace(&self) -> &str {
        &self.identity.namespace
    }

    /// The parsed capacity of the instance. Parsed on demand, so that cleanup
    /// of an instance with an unusable capacity still succeeds.
    pub fn capacity(&self) -> Result<Capacity, manifest::Error> {
        self.instance
            .spec
            .capacity
            .as_deref()
            .context(MissingCapacitySnafu)?
            .parse::<Capacity>()
            .context(InvalidCapacitySnafu)
    }

    pub fn replicas(&self) -> i32 {
        self.class_spec.replicas.unwrap_or(1)
    }

    pub fn routers(&self) -> i32 {
        self.class_spec.routers.unwrap_or(0)
    }

    pub fn topology_key(&self) -> &str {
        self.class_spec
            .topology_key
            .as_deref()
            .unwrap_or(DEFAULT_TOPOLOGY_KEY)
    }

    pub fn storage_class(&self) -> Option<&str> {
        self.class_spec.storage_class.as_deref()
    }

    /// Metadata for a child in the target namespace, owned per
    /// [`TargetIdentity::owner`].
    pub fn target_meta(&self, name: impl Into<String>) -> ObjectMeta {
        ObjectMetaBuilder::new()
            .name(name)
            .namespace(self.target_namespace())
            .ownerreference(self.owner_reference.clone())
            .labels(self.labels.clone())
            .build()
    }

    /// Metadata for a child in the namespace of the instance, always owned by
    /// the instance. Used for the credentials handed to the consumer.
    pub fn origin_meta(&self, name: impl Into<String>) -> ObjectMeta {
        ObjectMetaBuilder::new()
            .name(name)
            .namespace(&self.instance.namespace)
            .ownerreference(self.instance_reference.clone())
            .build()
    }

    /// `{service}.{target namespace}.svc.cluster.local`
    pub fn service_fqdn(&self, service_name: &str) -> String {
        format!(
            "{service_name}.{namespace}.svc.cluster.local",
            namespace = self.target_namespace()
        )
    }

    pub fn anti_affinity(&self, selector: LabelSelector) -> Affinity {
        required_pod_anti_affinity(selector, self.topology_key())
    }

    /// The class pod spec, parsed.
    pub fn pod_spec(&self) -> Result<Option<PodSpec>, manifest::Error> {
        self.class_spec
            .pod_spec
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .context(InvalidClassFieldSnafu { field: "podSpec" })
    }

    /// The generated spec of a vendor custom resource, merged over the
    /// `customResourceSpec` of the class.
    pub fn custom_resource_spec(&self, generated: Value) -> Value {
        match &self.class_spec.custom_resource_spec {
            Some(base) => {
                let mut merged = base.clone();
                json_patch::merge(&mut merged, &generated);
                merged
            }
            None => generated,
        }
    }
}
