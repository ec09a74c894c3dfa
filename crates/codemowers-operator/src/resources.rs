//! Typed views onto the instance and class objects the operators watch.
//!
//! Both are served through hand-built CRDs, so they arrive as
//! [`DynamicObject`]s and are parsed into the structs below at the start of
//! every reconcile.
use kube::{ResourceExt, core::DynamicObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("object has no name"))]
    MissingName,

    #[snafu(display("object {name:?} has no namespace"))]
    MissingNamespace { name: String },

    #[snafu(display("failed to parse spec of {name:?}"))]
    ParseSpec {
        source: serde_json::Error,
        name: String,
    },
}

/// Quota enforcement mode of a bucket.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuotaType {
    None,
    Fifo,
    #[default]
    Hard,
}

/// One key of a generated secret. The value is a template, see
/// [`crate::secret::render_template`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecretMapping {
    pub key: String,
    pub value: String,
}

/// The union of all instance fields across kinds. Every kind only declares the
/// subset it understands in its CRD, the API server prunes the rest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_type: Option<QuotaType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping: Vec<SecretMapping>,
}

/// Deployment policy shared by all instances referencing a class.
///
/// Template fragments are kept as raw JSON, since the class CRD preserves
/// unknown fields for them.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_spec: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_spec: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_spec: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless_service_spec: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cluster: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routers: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_pod_spec: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_resource_spec: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

/// A namespaced instance, e.g. one Redis or one bucket.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
    pub generation: Option<i64>,
    pub spec: InstanceSpec,
}

/// A cluster scoped class.
#[derive(Clone, Debug, PartialEq)]
pub struct Class {
    pub name: String,
    pub uid: Option<String>,
    pub spec: ClassSpec,
}

impl TryFrom<&DynamicObject> for Instance {
    type Error = Error;

    fn try_from(object: &DynamicObject) -> Result<Self, Self::Error> {
        let name = object.metadata.name.clone().context(MissingNameSnafu)?;
        let namespace = object
            .namespace()
            .with_context(|| MissingNamespaceSnafu { name: name.clone() })?;
        let spec = parse_spec(object, &name)?;

        Ok(Self {
            namespace,
            uid: object.metadata.uid.clone(),
            generation: object.metadata.generation,
            name,
            spec,
        })
    }
}

impl TryFrom<&DynamicObject> for Class {
    type Error = Error;

    fn try_from(object: &DynamicObject) -> Result<Self, Self::Error> {
        let name = object.metadata.name.clone().context(MissingNameSnafu)?;
        let spec = parse_spec(object, &name)?;

        Ok(Self {
            uid: object.metadata.uid.clone(),
            name,
            spec,
        })
    }
}

fn parse_spec<T>(object: &DynamicObject, name: &str) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned + Default,
{
    match object.data.get("spec") {
        Some(spec) => serde_json::from_value(spec.clone()).context(ParseSpecSnafu { name }),
        None => Ok(T::default()),
    }
}
