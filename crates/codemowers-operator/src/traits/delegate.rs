use crate::{
    binding::Binding,
    manifest::{self, Manifest},
    schema,
    traits::{Capability, Properties},
};

/// Several instances may point at one named backend via `targetCluster`.
pub struct Shareable;

impl Capability for Shareable {
    fn name(&self) -> &'static str {
        "Shareable"
    }

    fn class_properties(&self) -> Properties {
        vec![(
            "targetCluster",
            schema::immutable(schema::string(
                "Name of a shared cluster, all instances of the class are placed on it",
            )),
        )]
    }

    fn shares_target(&self) -> bool {
        true
    }
}

/// Connections go through a pool of routers in front of the backend.
pub struct Routed;

impl Capability for Routed {
    fn name(&self) -> &'static str {
        "Routed"
    }

    fn class_properties(&self) -> Properties {
        vec![
            ("routers", schema::integer("Router replica count")),
            ("routerPodSpec", schema::preserved_object("Router pod template")),
        ]
    }
}

/// The backend is run by a vendor operator, the kind emits that operator's
/// custom resources.
pub struct CustomResourceDelegate;

impl Capability for CustomResourceDelegate {
    fn name(&self) -> &'static str {
        "CustomResourceDelegate"
    }

    fn class_properties(&self) -> Properties {
        vec![(
            "customResourceSpec",
            schema::preserved_object("Base spec of the generated custom resource"),
        )]
    }

    fn manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        binding.kind.backend.custom_resources(binding)
    }
}

pub struct Ingress;

impl Capability for Ingress {
    fn name(&self) -> &'static str {
        "Ingress"
    }

    fn class_properties(&self) -> Properties {
        vec![("ingressClass", schema::string("Ingress class for the web interface"))]
    }
}
