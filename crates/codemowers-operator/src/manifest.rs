//! The desired children of one instance.
use k8s_openapi::api::{apps::v1::StatefulSet, core::v1::Service};
use kube::core::DynamicObject;
use snafu::Snafu;

use crate::{capacity::ParseCapacityError, labels::LabelError, secret::SecretManifest};

/// Errors raised while generating manifests. No partial manifest list is ever
/// returned, the first error aborts generation.
#[derive(Debug, Snafu, strum::IntoStaticStr)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("instance has no capacity"))]
    MissingCapacity,

    #[snafu(display("invalid capacity"))]
    InvalidCapacity { source: ParseCapacityError },

    #[snafu(display("{replicas} replicas are not supported by image {image:?}"))]
    UnsupportedTopology { image: String, replicas: i32 },

    #[snafu(display("don't know which implementation to use for image {image:?}"))]
    UnknownImplementation { image: String },

    #[snafu(display("class pod spec has no containers"))]
    MissingContainer,

    #[snafu(display("class pod spec has no container image"))]
    MissingImage,

    #[snafu(display("failed to parse class field {field:?}"))]
    #[strum(serialize = "InvalidClassSpec")]
    InvalidClassField {
        source: serde_json::Error,
        field: &'static str,
    },

    #[snafu(display("failed to serialize generated {what}"))]
    Serialize {
        source: serde_json::Error,
        what: &'static str,
    },

    #[snafu(display("invalid labels for generated selector"))]
    InvalidLabel { source: LabelError },

    #[snafu(display("unknown flavor {flavor:?}"))]
    UnknownFlavor {
        source: strum::ParseError,
        flavor: String,
    },
}

/// One generated Kubernetes object.
#[derive(Clone, Debug, PartialEq)]
pub enum Manifest {
    Secret(SecretManifest),
    Service(Service),
    StatefulSet(StatefulSet),

    /// A custom resource of a vendor operator, see [`crate::registry`].
    Custom(DynamicObject),
}

impl Manifest {
    pub fn kind(&self) -> &str {
        match self {
            Self::Secret(_) => "Secret",
            Self::Service(_) => "Service",
            Self::StatefulSet(_) => "StatefulSet",
            Self::Custom(object) => object
                .types
                .as_ref()
                .map_or("Unknown", |types| types.kind.as_str()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Secret(secret) => secret.metadata.name.as_deref(),
            Self::Service(service) => service.metadata.name.as_deref(),
            Self::StatefulSet(stateful_set) => stateful_set.metadata.name.as_deref(),
            Self::Custom(object) => object.metadata.name.as_deref(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Secret(secret) => secret.metadata.namespace.as_deref(),
            Self::Service(service) => service.metadata.namespace.as_deref(),
            Self::StatefulSet(stateful_set) => stateful_set.metadata.namespace.as_deref(),
            Self::Custom(object) => object.metadata.namespace.as_deref(),
        }
    }
}

impl std::fmt::Display for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{kind} {namespace}/{name}",
            kind = self.kind(),
            namespace = self.namespace().unwrap_or_default(),
            name = self.name().unwrap_or_default()
        )
    }
}
