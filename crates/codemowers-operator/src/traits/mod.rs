//! Composable capabilities of an operator kind.
//!
//! A [`Kind`](crate::kind::Kind) is an ordered list of capabilities. Each one
//! may contribute class properties, instance properties, printer columns and
//! manifests. Contributions are accumulated in list order by
//! [`Kind`](crate::kind::Kind), no capability sees the others.
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceColumnDefinition, JSONSchemaProps,
};

use crate::{
    binding::Binding,
    manifest::{self, Manifest},
};

mod classed;
mod delegate;
mod workload;

pub use classed::*;
pub use delegate::*;
pub use workload::*;

/// Schema properties in declaration order.
pub type Properties = Vec<(&'static str, JSONSchemaProps)>;

pub trait Capability: Sync {
    fn name(&self) -> &'static str;

    fn class_properties(&self) -> Properties {
        Properties::new()
    }

    fn instance_properties(&self) -> Properties {
        Properties::new()
    }

    /// Additional instance printer columns.
    fn printer_columns(&self) -> Vec<CustomResourceColumnDefinition> {
        Vec::new()
    }

    /// Instances can only be bound together with a class.
    fn requires_class(&self) -> bool {
        false
    }

    /// The `targetCluster` class field folds instances onto one backend.
    fn shares_target(&self) -> bool {
        false
    }

    /// A namespaced claim CRD mirroring the instance is generated.
    fn provides_claim(&self) -> bool {
        false
    }

    fn manifests(&self, _binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        Ok(Vec::new())
    }
}
