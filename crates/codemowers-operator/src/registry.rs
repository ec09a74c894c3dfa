//! Statically registered vendor custom resources.
//!
//! Every custom resource a backend emits must be listed here, the apply layer
//! refuses to touch anything else.
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};
use serde_json::Value;

#[derive(Debug, PartialEq, Eq)]
pub struct CustomResourceType {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

impl CustomResourceType {
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(self.group, self.version, self.kind),
            self.plural,
        )
    }

    /// Builds an object of this type. `spec` ends up as the `spec` field.
    pub fn object(&self, metadata: ObjectMeta, spec: Value) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta {
                api_version: self.api_version(),
                kind: self.kind.to_owned(),
            }),
            metadata,
            data: serde_json::json!({ "spec": spec }),
        }
    }
}

pub const INNODB_CLUSTER: CustomResourceType = CustomResourceType {
    group: "mysql.oracle.com",
    version: "v2",
    kind: "InnoDBCluster",
    plural: "innodbclusters",
};

pub const CRUNCHY_POSTGRES_CLUSTER: CustomResourceType = CustomResourceType {
    group: "postgres-operator.crunchydata.com",
    version: "v1beta1",
    kind: "PostgresCluster",
    plural: "postgresclusters",
};

pub const CNPG_CLUSTER: CustomResourceType = CustomResourceType {
    group: "postgresql.cnpg.io",
    version: "v1",
    kind: "Cluster",
    plural: "clusters",
};

pub const CNPG_POOLER: CustomResourceType = CustomResourceType {
    group: "postgresql.cnpg.io",
    version: "v1",
    kind: "Pooler",
    plural: "poolers",
};

pub static REGISTRY: &[&CustomResourceType] = &[
    &INNODB_CLUSTER,
    &CRUNCHY_POSTGRES_CLUSTER,
    &CNPG_CLUSTER,
    &CNPG_POOLER,
];

/// Finds the registered type of an object by its `apiVersion` and `kind`.
pub fn lookup(api_version: &str, kind: &str) -> Option<&'static CustomResourceType> {
    let (group, version) = api_version.split_once('/')?;
    REGISTRY
        .iter()
        .copied()
        .find(|ty| ty.group == group && ty.version == version && ty.kind == kind)
}

/// Finds the registered type of a generated object.
pub fn lookup_object(object: &DynamicObject) -> Option<&'static CustomResourceType> {
    let types = object.types.as_ref()?;
    lookup(&types.api_version, &types.kind)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("mysql.oracle.com/v2", "InnoDBCluster", Some("innodbclusters"))]
    #[case("postgresql.cnpg.io/v1", "Pooler", Some("poolers"))]
    #[case("postgresql.cnpg.io/v1", "Backup", None)]
    #[case("v1", "Secret", None)]
    fn lookup_by_type(#[case] api_version: &str, #[case] kind: &str, #[case] plural: Option<&str>) {
        assert_eq!(lookup(api_version, kind).map(|ty| ty.plural), plural);
    }

    #[test]
    fn object_round_trips_registration() {
        let object = INNODB_CLUSTER.object(ObjectMeta::default(), serde_json::json!({"instances": 3}));
        assert_eq!(lookup_object(&object), Some(&INNODB_CLUSTER));
        assert_eq!(object.data["spec"]["instances"], 3);
        assert_eq!(INNODB_CLUSTER.api_resource().plural, "innodbclusters");
    }
}
