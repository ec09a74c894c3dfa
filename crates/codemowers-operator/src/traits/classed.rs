use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceColumnDefinition;

use crate::{
    schema,
    traits::{Capability, Properties},
};

/// Binds instances to a cluster scoped class via `spec.class`.
pub struct ClassedBase;

impl Capability for ClassedBase {
    fn name(&self) -> &'static str {
        "ClassedBase"
    }

    fn class_properties(&self) -> Properties {
        vec![
            (
                "targetNamespace",
                schema::string("Namespace to create the backend in, defaults to the namespace of the instance"),
            ),
            ("adminUri", schema::string("URI of the administrative interface")),
        ]
    }

    fn instance_properties(&self) -> Properties {
        vec![("class", schema::string("Class name"))]
    }

    fn printer_columns(&self) -> Vec<CustomResourceColumnDefinition> {
        vec![schema::column("Class", ".spec.class", "string")]
    }

    fn requires_class(&self) -> bool {
        true
    }
}

/// Generates an additional namespaced `<Kind>Claim` CRD with the instance
/// schema.
pub struct Claim;

impl Capability for Claim {
    fn name(&self) -> &'static str {
        "Claim"
    }

    fn provides_claim(&self) -> bool {
        true
    }
}
