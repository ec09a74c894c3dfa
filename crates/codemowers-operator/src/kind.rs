//! The operator kinds and the fold over their capabilities.
use std::fmt;

use const_format::concatcp;
use indexmap::IndexMap;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceColumnDefinition, JSONSchemaProps,
};
use kube::core::{ApiResource, GroupVersionKind};

use crate::{
    backends::{Backend, MinioBackend, MysqlBackend, PostgresBackend, RedisBackend, SecretBackend},
    binding::Binding,
    manifest::{self, Manifest},
    traits::{
        self, Capability, Claim, ClassedBase, ClusterService, CustomResourceDelegate, Headless,
        Ingress, Persistent, Routed, Shareable, StatefulWorkload,
    },
};

pub const GROUP: &str = "codemowers.io";
pub const VERSION: &str = "v1alpha1";

/// A concrete operator kind: names, capabilities and the backend.
pub struct Kind {
    /// Kind of the instance CRD, e.g. `MysqlDatabase`.
    pub singular: &'static str,

    /// Capitalized plural, e.g. `MysqlDatabases`.
    pub plural: &'static str,

    /// Value of the `app.kubernetes.io/name` label on generated children.
    pub app_name: &'static str,

    /// Capabilities in composition order. Properties and manifests are
    /// accumulated in this order.
    pub capabilities: &'static [&'static dyn Capability],

    pub backend: &'static dyn Backend,
}

pub static REDIS: Kind = Kind {
    singular: "Redis",
    plural: "Redises",
    app_name: "redis",
    capabilities: &[
        &ClassedBase,
        &traits::Capacity,
        &Persistent,
        &Headless,
        &StatefulWorkload,
        &ClusterService,
    ],
    backend: &RedisBackend,
};

pub static BUCKET: Kind = Kind {
    singular: "Bucket",
    plural: "Buckets",
    app_name: "minio",
    capabilities: &[
        &ClassedBase,
        &traits::Capacity,
        &Persistent,
        &Headless,
        &StatefulWorkload,
        &ClusterService,
        &Shareable,
        &Ingress,
        &Claim,
    ],
    backend: &MinioBackend,
};

pub static MYSQL_DATABASE: Kind = Kind {
    singular: "MysqlDatabase",
    plural: "MysqlDatabases",
    app_name: "mysql",
    capabilities: &[
        &ClassedBase,
        &traits::Capacity,
        &Persistent,
        &StatefulWorkload,
        &Routed,
        &CustomResourceDelegate,
        &Shareable,
    ],
    backend: &MysqlBackend,
};

pub static POSTGRES_DATABASE: Kind = Kind {
    singular: "PostgresDatabase",
    plural: "PostgresDatabases",
    app_name: "postgres",
    capabilities: &[
        &ClassedBase,
        &traits::Capacity,
        &Persistent,
        &StatefulWorkload,
        &Routed,
        &CustomResourceDelegate,
        &Shareable,
    ],
    backend: &PostgresBackend,
};

pub static SECRET: Kind = Kind {
    singular: "Secret",
    plural: "Secrets",
    app_name: "secret",
    capabilities: &[],
    backend: &SecretBackend,
};

/// Kinds as selected on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum KindName {
    Redis,
    Bucket,
    Mysql,
    Postgres,
    Secret,
}

impl KindName {
    pub fn kind(self) -> &'static Kind {
        match self {
            Self::Redis => &REDIS,
            Self::Bucket => &BUCKET,
            Self::Mysql => &MYSQL_DATABASE,
            Self::Postgres => &POSTGRES_DATABASE,
            Self::Secret => &SECRET,
        }
    }
}

/// All kinds in a stable order.
pub fn all() -> [&'static Kind; 5] {
    [&REDIS, &BUCKET, &MYSQL_DATABASE, &POSTGRES_DATABASE, &SECRET]
}

impl Kind {
    pub const fn api_version() -> &'static str {
        concatcp!(GROUP, "/", VERSION)
    }

    pub fn requires_class(&self) -> bool {
        self.capabilities.iter().any(|capability| capability.requires_class())
    }

    /// Whether `targetCluster` folds instances onto one backend.
    pub fn shareable(&self) -> bool {
        self.capabilities.iter().any(|capability| capability.shares_target())
    }

    pub fn has_claim(&self) -> bool {
        self.capabilities.iter().any(|capability| capability.provides_claim())
    }

    /// Resource name of the instance CRD, e.g. `mysqldatabases`.
    pub fn plural_name(&self) -> String {
        self.plural.to_lowercase()
    }

    pub fn class_kind(&self) -> String {
        format!("Cluster{}Class", self.singular)
    }

    pub fn class_plural(&self) -> String {
        format!("cluster{}classes", self.singular.to_lowercase())
    }

    pub fn claim_kind(&self) -> String {
        format!("{}Claim", self.singular)
    }

    pub fn claim_plural(&self) -> String {
        format!("{}claims", self.singular.to_lowercase())
    }

    /// Finalizer guarding cleanup of instances.
    pub fn finalizer(&self) -> String {
        format!("{GROUP}/{}-operator", self.plural_name())
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(GROUP, VERSION, self.singular),
            &self.plural_name(),
        )
    }

    pub fn class_api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(GROUP, VERSION, &self.class_kind()),
            &self.class_plural(),
        )
    }

    pub fn instance_properties(&self) -> IndexMap<&'static str, JSONSchemaProps> {
        self.capabilities
            .iter()
            .flat_map(|capability| capability.instance_properties())
            .chain(self.backend.instance_properties())
            .collect()
    }

    pub fn class_properties(&self) -> IndexMap<&'static str, JSONSchemaProps> {
        self.capabilities
            .iter()
            .flat_map(|capability| capability.class_properties())
            .chain(self.backend.class_properties())
            .collect()
    }

    pub fn printer_columns(&self) -> Vec<CustomResourceColumnDefinition> {
        self.capabilities
            .iter()
            .flat_map(|capability| capability.printer_columns())
            .collect()
    }

    /// Generates the children of a bound instance: the contributions of all
    /// capabilities in order, followed by the extras of the backend.
    pub fn generate(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let mut manifests = Vec::new();
        for capability in self.capabilities {
            manifests.extend(capability.manifests(binding)?);
        }
        manifests.extend(self.backend.extra_manifests(binding)?);
        Ok(manifests)
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kind")
            .field("singular", &self.singular)
            .field(
                "capabilities",
                &self
                    .capabilities
                    .iter()
                    .map(|capability| capability.name())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::*;
    use crate::schema;

    #[rstest]
    #[case(&REDIS)]
    #[case(&BUCKET)]
    #[case(&MYSQL_DATABASE)]
    #[case(&POSTGRES_DATABASE)]
    #[case(&SECRET)]
    fn no_duplicate_properties(#[case] kind: &'static Kind) {
        let mut class = HashSet::new();
        let mut instance = HashSet::new();

        for capability in kind.capabilities {
            for (name, _) in capability.class_properties() {
                assert!(class.insert(name), "{} declares {name} twice", kind.singular);
            }
            for (name, _) in capability.instance_properties() {
                assert!(instance.insert(name), "{} declares {name} twice", kind.singular);
            }
        }
        for (name, _) in kind.backend.class_properties() {
            assert!(class.insert(name), "{} declares {name} twice", kind.singular);
        }
        for (name, _) in kind.backend.instance_properties() {
            assert!(instance.insert(name), "{} declares {name} twice", kind.singular);
        }
    }

    #[test]
    fn names() {
        assert_eq!(Kind::api_version(), "codemowers.io/v1alpha1");
        assert_eq!(MYSQL_DATABASE.plural_name(), "mysqldatabases");
        assert_eq!(MYSQL_DATABASE.class_kind(), "ClusterMysqlDatabaseClass");
        assert_eq!(MYSQL_DATABASE.class_plural(), "clustermysqldatabaseclasses");
        assert_eq!(BUCKET.claim_kind(), "BucketClaim");
        assert_eq!(REDIS.finalizer(), "codemowers.io/redises-operator");
        assert_eq!(REDIS.class_api_resource().kind, "ClusterRedisClass");
    }

    #[test]
    fn property_order_follows_capabilities() {
        let names: Vec<_> = REDIS.class_properties().into_keys().collect();
        assert_eq!(
            names,
            [
                "targetNamespace",
                "adminUri",
                "storageClass",
                "headlessServiceSpec",
                "image",
                "replicas",
                "topologyKey",
                "secretSpec",
                "podSpec",
                "serviceSpec",
            ]
        );
        assert_eq!(
            REDIS.instance_properties().keys().copied().collect::<Vec<_>>(),
            ["class", "capacity"]
        );
    }

    #[test]
    fn target_cluster_is_immutable() {
        for kind in [&BUCKET, &MYSQL_DATABASE, &POSTGRES_DATABASE] {
            assert!(kind.shareable());
            assert!(schema::is_immutable(&kind.class_properties()["targetCluster"]));
        }
        assert!(!REDIS.shareable());
    }

    #[test]
    fn capability_flags() {
        assert!(REDIS.requires_class());
        assert!(!SECRET.requires_class());
        assert!(BUCKET.has_claim());
        assert!(!MYSQL_DATABASE.has_claim());
    }

    #[test]
    fn kind_names() {
        assert_eq!(KindName::Mysql.kind().singular, "MysqlDatabase");
        assert_eq!(KindName::Postgres.to_string(), "postgres");
    }
}
