//! Class-based Kubernetes operators.
//!
//! Each [`kind::Kind`] is an ordered stack of [`traits::Capability`]s over a
//! [`backends::Backend`]. The stack contributes the CRD properties of the
//! instance and class and generates the children of a bound instance, the
//! [`controller`] creates them.

pub mod backends;
pub mod binding;
pub mod builder;
pub mod capacity;
pub mod cli;
pub mod client;
pub mod controller;
pub mod crd;
pub mod identity;
pub mod kind;
pub mod labels;
pub mod logging;
pub mod manifest;
pub mod namespace;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod secret;
pub mod status;
pub mod traits;
pub mod yaml;

// External re-exports
pub use k8s_openapi;
pub use kube;
